//! MULTI/EXEC behavior against a scripted server.

mod common;

use common::TestServer;
use pretty_assertions::assert_eq;
use zero_redis::error::Error;
use zero_redis::tokio::Pool;

#[tokio::test]
async fn queued_commands_resolve_in_order_after_exec() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let begin = pool.multi(&[]);
    let script = async {
        peer.expect(b"*1\r\n$5\r\nMULTI\r\n").await;
        peer.send(b"+OK\r\n").await;
    };
    let (txn, ()) = tokio::join!(begin, script);
    let txn = txn.unwrap();

    let queue_set = txn.set("k", "v");
    let script = async {
        peer.expect(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await;
        peer.send(b"+QUEUED\r\n").await;
    };
    let (set_result, ()) = tokio::join!(queue_set, script);
    let set_result = set_result.unwrap();

    let queue_incr = txn.incr("c");
    let script = async {
        peer.expect(b"*2\r\n$4\r\nINCR\r\n$1\r\nc\r\n").await;
        peer.send(b"+QUEUED\r\n").await;
    };
    let (incr_result, ()) = tokio::join!(queue_incr, script);
    let incr_result = incr_result.unwrap();

    let exec = txn.exec();
    let script = async {
        peer.expect(b"*1\r\n$4\r\nEXEC\r\n").await;
        peer.send(b"*2\r\n+OK\r\n:1\r\n").await;
    };
    let (done, ()) = tokio::join!(exec, script);
    done.unwrap();

    assert_eq!(set_result.await.unwrap(), "OK");
    assert_eq!(incr_result.await.unwrap(), 1);
}

#[tokio::test]
async fn watch_abort_fails_every_queued_result() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let begin = pool.multi(&["guard"]);
    let script = async {
        peer.expect(b"*2\r\n$5\r\nWATCH\r\n$5\r\nguard\r\n").await;
        peer.send(b"+OK\r\n").await;
        peer.expect(b"*1\r\n$5\r\nMULTI\r\n").await;
        peer.send(b"+OK\r\n").await;
    };
    let (txn, ()) = tokio::join!(begin, script);
    let txn = txn.unwrap();

    let queue_get = txn.get("k");
    let script = async {
        peer.expect(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await;
        peer.send(b"+QUEUED\r\n").await;
    };
    let (get_result, ()) = tokio::join!(queue_get, script);
    let get_result = get_result.unwrap();

    let exec = txn.exec();
    let script = async {
        peer.expect(b"*1\r\n$4\r\nEXEC\r\n").await;
        peer.send(b"*-1\r\n").await;
    };
    let (done, ()) = tokio::join!(exec, script);
    assert!(matches!(done, Err(Error::TransactionAborted)));
    assert!(matches!(get_result.await, Err(Error::TransactionAborted)));
}

#[tokio::test]
async fn discard_fails_queued_results_and_frees_the_connection() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let begin = pool.multi(&[]);
    let script = async {
        peer.expect(b"*1\r\n$5\r\nMULTI\r\n").await;
        peer.send(b"+OK\r\n").await;
    };
    let (txn, ()) = tokio::join!(begin, script);
    let txn = txn.unwrap();
    assert_eq!(pool.connections_in_use(), 1);

    let queue_set = txn.set("k", "v");
    let script = async {
        peer.expect(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await;
        peer.send(b"+QUEUED\r\n").await;
    };
    let (set_result, ()) = tokio::join!(queue_set, script);
    let set_result = set_result.unwrap();

    let discard = txn.discard();
    let script = async {
        peer.expect(b"*1\r\n$7\r\nDISCARD\r\n").await;
        peer.send(b"+OK\r\n").await;
    };
    let (done, ()) = tokio::join!(discard, script);
    done.unwrap();

    assert!(matches!(set_result.await, Err(Error::TransactionDiscarded)));
    assert_eq!(pool.connections_in_use(), 0);
}

#[tokio::test]
async fn unwatch_inside_a_transaction() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let begin = pool.multi(&["guard"]);
    let script = async {
        peer.expect(b"*2\r\n$5\r\nWATCH\r\n$5\r\nguard\r\n").await;
        peer.send(b"+OK\r\n").await;
        peer.expect(b"*1\r\n$5\r\nMULTI\r\n").await;
        peer.send(b"+OK\r\n").await;
    };
    let (txn, ()) = tokio::join!(begin, script);
    let txn = txn.unwrap();

    let unwatch = txn.unwatch();
    let script = async {
        peer.expect(b"*1\r\n$7\r\nUNWATCH\r\n").await;
        peer.send(b"+OK\r\n").await;
    };
    let (done, ()) = tokio::join!(unwatch, script);
    done.unwrap();
}

#[tokio::test]
async fn non_queued_reply_fails_the_command() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let begin = pool.multi(&[]);
    let script = async {
        peer.expect(b"*1\r\n$5\r\nMULTI\r\n").await;
        peer.send(b"+OK\r\n").await;
    };
    let (txn, ()) = tokio::join!(begin, script);
    let txn = txn.unwrap();

    let queue_set = txn.set("k", "v");
    let script = async {
        peer.expect(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await;
        peer.send(b"+OK\r\n").await;
    };
    let (outcome, ()) = tokio::join!(queue_set, script);
    assert!(matches!(outcome, Err(Error::Protocol(_))));
}

#[tokio::test]
async fn transactional_connection_is_unavailable_to_the_pool() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let begin = pool.multi(&[]);
    let script = async {
        peer.expect(b"*1\r\n$5\r\nMULTI\r\n").await;
        peer.send(b"+OK\r\n").await;
    };
    let (txn, ()) = tokio::join!(begin, script);
    let txn = txn.unwrap();

    assert!(matches!(pool.get("k").await, Err(Error::PoolExhausted)));

    let exec = txn.exec();
    let script = async {
        peer.expect(b"*1\r\n$4\r\nEXEC\r\n").await;
        peer.send(b"*0\r\n").await;
    };
    let (done, ()) = tokio::join!(exec, script);
    done.unwrap();

    // Back to normal service afterwards.
    let client = pool.get("k");
    let script = async {
        peer.expect(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await;
        peer.send(b"$-1\r\n").await;
    };
    let (value, ()) = tokio::join!(client, script);
    assert_eq!(value.unwrap(), None);
}

#[tokio::test]
async fn nested_multi_is_rejected() {
    let mut server = TestServer::start().await;
    let pool = Pool::create(server.opts()).await.unwrap();
    let mut peer = server.accept().await;

    let begin = pool.multi(&[]);
    let script = async {
        peer.expect(b"*1\r\n$5\r\nMULTI\r\n").await;
        peer.send(b"+OK\r\n").await;
    };
    let (txn, ()) = tokio::join!(begin, script);
    let _txn = txn.unwrap();

    // The only connection is inside a transaction; a second MULTI cannot be
    // placed anywhere.
    assert!(matches!(pool.multi(&[]).await, Err(Error::PoolExhausted)));
}
