use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::command::text;
use crate::protocol::reply::PubSubMessage;

use super::conn::Conn;

/// A connection dedicated to Pub/Sub.
///
/// Returned by [`Pool::subscribe`](super::Pool::subscribe). The underlying
/// connection only receives published messages and subscription
/// acknowledgements from here on; it never returns to the pool.
pub struct Subscriber {
    conn: Conn,
    messages: mpsc::UnboundedReceiver<PubSubMessage>,
}

impl Subscriber {
    pub(crate) fn new(conn: Conn, messages: mpsc::UnboundedReceiver<PubSubMessage>) -> Self {
        Self { conn, messages }
    }

    /// Listen for messages published to additional channels. Returns the
    /// server's acknowledgement items.
    pub async fn subscribe(&mut self, channels: &[&str]) -> Result<Vec<String>> {
        let encoded: Vec<Bytes> = channels.iter().map(|c| text(c)).collect();
        let (ack, _receiver) = self.conn.subscribe(&encoded).await?;
        Ok(ack)
    }

    /// Wait for the next Pub/Sub message to be received and return it.
    /// Messages are delivered in wire order.
    pub async fn next_published(&mut self) -> Result<PubSubMessage> {
        self.messages.recv().await.ok_or_else(|| {
            Error::ConnectionLost("connection closed while waiting for messages".to_owned())
        })
    }
}
