//! End-to-end pipeline behavior against a scripted server.

mod common;

use common::TestServer;
use pretty_assertions::assert_eq;
use zero_redis::error::Error;
use zero_redis::tokio::Pool;

#[tokio::test]
async fn set_writes_the_documented_frame() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let client = pool.set("hello", "world");
    let script = async {
        peer.expect(b"*3\r\n$3\r\nSET\r\n$5\r\nhello\r\n$5\r\nworld\r\n")
            .await;
        peer.send(b"+OK\r\n").await;
    };

    let (reply, ()) = tokio::join!(client, script);
    assert_eq!(reply.unwrap(), "OK");
}

#[tokio::test]
async fn mget_streams_nil_and_values() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let client = pool.mget(&["a", "b", "c"]);
    let script = async {
        peer.expect(b"*4\r\n$4\r\nMGET\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n")
            .await;
        peer.send(b"*3\r\n$1\r\nx\r\n$-1\r\n$1\r\nz\r\n").await;
    };

    let (values, ()) = tokio::join!(client, script);
    assert_eq!(
        values.unwrap(),
        vec![Some("x".to_owned()), None, Some("z".to_owned())]
    );
}

#[tokio::test]
async fn pipelined_increments_resolve_in_order() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let first = pool.incr("n");
    let second = pool.incr("n");
    let script = async {
        // Both requests are written back to back on the single connection.
        peer.expect(b"*2\r\n$4\r\nINCR\r\n$1\r\nn\r\n*2\r\n$4\r\nINCR\r\n$1\r\nn\r\n")
            .await;
        peer.send(b":1\r\n:2\r\n").await;
    };

    let (first, second, ()) = tokio::join!(first, second, script);
    assert_eq!(first.unwrap(), 1);
    assert_eq!(second.unwrap(), 2);
}

#[tokio::test]
async fn auth_and_select_run_first_on_every_connection() {
    let mut server = TestServer::start().await;
    let mut opts = server.opts();
    opts.password = Some("sesame".to_owned());
    opts.db = 2;

    let create = Pool::create(opts);
    let script = async {
        let mut peer = server.accept().await;
        peer.expect(b"*2\r\n$4\r\nAUTH\r\n$6\r\nsesame\r\n").await;
        peer.send(b"+OK\r\n").await;
        peer.expect(b"*2\r\n$6\r\nSELECT\r\n$1\r\n2\r\n").await;
        peer.send(b"+OK\r\n").await;
        peer
    };

    let (pool, mut peer) = tokio::join!(create, script);
    let pool = pool.unwrap();

    let client = pool.ping();
    let script = async {
        peer.expect(b"*1\r\n$4\r\nPING\r\n").await;
        peer.send(b"+PONG\r\n").await;
    };
    let (pong, ()) = tokio::join!(client, script);
    assert_eq!(pong.unwrap(), "PONG");
}

#[tokio::test]
async fn server_error_fails_one_call_and_the_pipeline_continues() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let client = pool.incr("k");
    let script = async {
        peer.expect(b"*2\r\n$4\r\nINCR\r\n$1\r\nk\r\n").await;
        peer.send(b"-ERR value is not an integer\r\n").await;
    };
    let (outcome, ()) = tokio::join!(client, script);
    assert!(matches!(outcome, Err(Error::Server(msg)) if msg.contains("not an integer")));

    let client = pool.get("k");
    let script = async {
        peer.expect(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await;
        peer.send(b"$1\r\nv\r\n").await;
    };
    let (value, ()) = tokio::join!(client, script);
    assert_eq!(value.unwrap(), Some("v".to_owned()));
}

#[tokio::test]
async fn empty_multi_bulk_is_an_empty_list() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let client = pool.lrange("empty", 0, -1);
    let script = async {
        peer.expect(b"*4\r\n$6\r\nLRANGE\r\n$5\r\nempty\r\n$1\r\n0\r\n$2\r\n-1\r\n")
            .await;
        peer.send(b"*0\r\n").await;
    };

    let (values, ()) = tokio::join!(client, script);
    assert_eq!(values.unwrap(), Vec::<String>::new());
}

#[tokio::test]
async fn publish_returns_receiver_count() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let client = pool.publish("ch", "hi");
    let script = async {
        peer.expect(b"*3\r\n$7\r\nPUBLISH\r\n$2\r\nch\r\n$2\r\nhi\r\n")
            .await;
        peer.send(b":2\r\n").await;
    };

    let (count, ()) = tokio::join!(client, script);
    assert_eq!(count.unwrap(), 2);
}

#[tokio::test]
async fn zrange_pairs_members_and_scores() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let client = pool.zrange("z", 0, -1);
    let script = async {
        peer.expect(b"*5\r\n$6\r\nZRANGE\r\n$1\r\nz\r\n$1\r\n0\r\n$2\r\n-1\r\n$10\r\nWITHSCORES\r\n")
            .await;
        peer.send(b"*4\r\n$1\r\na\r\n$3\r\n1.5\r\n$1\r\nb\r\n$1\r\n2\r\n")
            .await;
    };

    let (result, ()) = tokio::join!(client, script);
    let pairs = result.unwrap().into_pairs().await.unwrap();
    assert_eq!(pairs, vec![("a".to_owned(), 1.5), ("b".to_owned(), 2.0)]);
}

#[tokio::test]
async fn dump_and_object_are_not_supported() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let _peer = server.accept().await;

    assert!(matches!(
        pool.dump("k").await,
        Err(Error::NotSupported("dump"))
    ));
    assert!(matches!(
        pool.object("encoding", &["k"]).await,
        Err(Error::NotSupported("object"))
    ));
}
