//! A scripted in-process Redis server for driving the client over real TCP.

#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

use zero_redis::Opts;

const TICK: Duration = Duration::from_secs(5);

pub struct TestServer {
    port: u16,
    accepted: mpsc::UnboundedReceiver<Peer>,
}

impl TestServer {
    /// Bind an ephemeral port and accept connections in the background.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, accepted) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                if tx.send(Peer { stream }).is_err() {
                    return;
                }
            }
        });
        Self { port, accepted }
    }

    pub fn opts(&self) -> Opts {
        Opts {
            host: "127.0.0.1".to_owned(),
            port: self.port,
            ..Opts::default()
        }
    }

    /// Wait for the next client connection.
    pub async fn accept(&mut self) -> Peer {
        timeout(TICK, self.accepted.recv())
            .await
            .expect("no connection within the test deadline")
            .expect("listener task gone")
    }
}

/// One accepted client connection, driven byte-for-byte by the test.
pub struct Peer {
    stream: TcpStream,
}

impl Peer {
    /// Read exactly `len` bytes of request data.
    pub async fn read(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        timeout(TICK, self.stream.read_exact(&mut buf))
            .await
            .expect("no request within the test deadline")
            .unwrap();
        buf
    }

    /// Read exactly the given request bytes and assert them.
    pub async fn expect(&mut self, expected: &[u8]) {
        let got = self.read(expected.len()).await;
        assert_eq!(
            got,
            expected,
            "request mismatch: got {:?}, expected {:?}",
            String::from_utf8_lossy(&got),
            String::from_utf8_lossy(expected)
        );
    }

    /// Send scripted reply bytes.
    pub async fn send(&mut self, bytes: &[u8]) {
        timeout(TICK, self.stream.write_all(bytes)).await.unwrap().unwrap();
    }
}
