use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::protocol::codec::{RespCodec, RespEvent, write_command};
use crate::protocol::command::{cmd, text, uint};
use crate::protocol::convert;
use crate::protocol::reply::{MultiBulkReply, PubSubMessage, Reply};

type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Track record for a call that is executing in the pipeline.
struct PipelinedCall {
    name: &'static str,
    is_blocking: bool,
}

/// Per-call dispatch options.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CallFlags {
    /// Server-side blocking command; marks the connection busy until the
    /// reply arrives.
    pub(crate) blocking: bool,
    /// Skip the transactional-mode guard (EXEC, DISCARD, UNWATCH).
    pub(crate) bypass: bool,
    /// The connection enters pub/sub mode when this call's reply arrives.
    pub(crate) subscribe: bool,
}

/// A pending slot in the reply queue. New requests append a `Call` at the
/// tail; a decoded multi bulk header pushes `count` `Item` slots at the head
/// so the following frames stream into the enclosing reply.
enum ReplySlot {
    Call {
        tx: oneshot::Sender<Result<Reply>>,
        call: PipelinedCall,
        enters_pubsub: bool,
    },
    Item {
        tx: mpsc::Sender<Result<Reply>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Normal,
    Subscribed,
    Transactional,
}

/// Children of a pub/sub event being collected off the wire.
struct Gather {
    remaining: usize,
    items: Vec<Reply>,
}

struct Inner {
    writer: BoxWriter,
    queue: VecDeque<ReplySlot>,
    mode: Mode,
    blocking_calls: usize,
    /// Claimed for MULTI or SUBSCRIBE setup; keeps the pool away before the
    /// mode transition is acknowledged.
    reserved: bool,
    txn_entries: Vec<(u64, oneshot::Sender<Result<Reply>>)>,
    txn_seq: u64,
    next_entry_id: u64,
    pubsub_tx: Option<mpsc::UnboundedSender<PubSubMessage>>,
    gather: Option<Gather>,
    closed: Option<String>,
}

struct Shared {
    inner: Mutex<Inner>,
    busy: AtomicBool,
    closed: AtomicBool,
}

/// One pipelined Redis connection.
///
/// A single mutex guards the write half together with the pipeline state, so
/// the order requests hit the socket always matches the reply queue. A
/// spawned reader task decodes incoming frames and completes slots
/// head-first.
#[derive(Clone)]
pub(crate) struct Conn {
    shared: Arc<Shared>,
}

impl Conn {
    pub(crate) fn new<T>(transport: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(transport);
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                writer: Box::new(write_half),
                queue: VecDeque::new(),
                mode: Mode::Normal,
                blocking_calls: 0,
                reserved: false,
                txn_entries: Vec::new(),
                txn_seq: 0,
                next_entry_id: 0,
                pubsub_tx: None,
                gather: None,
                closed: None,
            }),
            busy: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        let frames = FramedRead::new(read_half, RespCodec::new());
        tokio::spawn(read_loop(frames, Arc::downgrade(&shared)));
        info!("redis connection made");

        Self { shared }
    }

    /// True while the connection is committed to a blocking, subscribed or
    /// transactional conversation. The pool skips busy connections.
    pub(crate) fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Send one command and await its reply.
    #[instrument(skip_all, fields(command = name))]
    pub(crate) async fn call(
        &self,
        name: &'static str,
        args: Vec<Bytes>,
        flags: CallFlags,
    ) -> Result<Reply> {
        let rx = self.submit(name, args, flags).await?;
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectionLost(
                "connection driver went away".to_owned(),
            )),
        }
    }

    /// Encode a request, append its reply slot and write the frame. Queue
    /// push and socket write happen under one lock so pipeline order is
    /// never violated.
    async fn submit(
        &self,
        name: &'static str,
        args: Vec<Bytes>,
        flags: CallFlags,
    ) -> Result<oneshot::Receiver<Result<Reply>>> {
        let mut frame = Vec::new();
        write_command(&mut frame, &args);

        let mut inner = self.shared.inner.lock().await;
        if let Some(cause) = &inner.closed {
            return Err(Error::ConnectionLost(cause.clone()));
        }
        if inner.mode == Mode::Transactional && !flags.bypass {
            return Err(Error::NotInTransaction);
        }

        let (tx, rx) = oneshot::channel();
        inner.queue.push_back(ReplySlot::Call {
            tx,
            call: PipelinedCall {
                name,
                is_blocking: flags.blocking,
            },
            enters_pubsub: flags.subscribe,
        });
        if flags.blocking {
            inner.blocking_calls += 1;
            refresh_busy(&inner, &self.shared);
        }

        if let Err(err) = write_frame(&mut inner, &frame).await {
            fail_all(&mut inner, &self.shared, format!("write failed: {err}"));
            return Err(err);
        }
        Ok(rx)
    }

    /// AUTH, issued as the first pipelined command when a password is
    /// configured.
    pub(crate) async fn auth(&self, password: &str) -> Result<String> {
        let reply = self
            .call("auth", vec![cmd("AUTH"), text(password)], CallFlags::default())
            .await?;
        convert::status("auth", reply)
    }

    pub(crate) async fn select(&self, db: u32) -> Result<String> {
        let reply = self
            .call("select", vec![cmd("SELECT"), uint(u64::from(db))], CallFlags::default())
            .await?;
        convert::status("select", reply)
    }

    // Transaction support

    /// Send optional WATCH frames then MULTI, and switch to transactional
    /// mode. Returns the transaction generation used to validate the handle.
    pub(crate) async fn enter_multi(&self, watch_keys: Vec<Bytes>) -> Result<u64> {
        {
            let mut inner = self.shared.inner.lock().await;
            if let Some(cause) = &inner.closed {
                return Err(Error::ConnectionLost(cause.clone()));
            }
            if inner.mode != Mode::Normal || inner.reserved {
                return Err(Error::AlreadyInTransaction);
            }
            inner.reserved = true;
            refresh_busy(&inner, &self.shared);
        }

        let setup = async {
            for key in &watch_keys {
                let reply = self
                    .call("watch", vec![cmd("WATCH"), key.clone()], CallFlags::default())
                    .await?;
                expect_ok("watch", reply)?;
            }
            let reply = self.call("multi", vec![cmd("MULTI")], CallFlags::default()).await?;
            expect_ok("multi", reply)
        }
        .await;

        let mut inner = self.shared.inner.lock().await;
        inner.reserved = false;
        match setup {
            Ok(()) => {
                inner.mode = Mode::Transactional;
                inner.txn_seq += 1;
                inner.txn_entries.clear();
                refresh_busy(&inner, &self.shared);
                Ok(inner.txn_seq)
            }
            Err(err) => {
                refresh_busy(&inner, &self.shared);
                Err(err)
            }
        }
    }

    /// Send one command inside a transaction. Returns the wire future (which
    /// must resolve to `+QUEUED`), the detached user future resolved at EXEC
    /// time, and the entry id for removal on a queueing failure.
    pub(crate) async fn submit_queued(
        &self,
        txn_id: u64,
        name: &'static str,
        args: Vec<Bytes>,
    ) -> Result<(
        oneshot::Receiver<Result<Reply>>,
        oneshot::Receiver<Result<Reply>>,
        u64,
    )> {
        let mut frame = Vec::new();
        write_command(&mut frame, &args);

        let mut inner = self.shared.inner.lock().await;
        if let Some(cause) = &inner.closed {
            return Err(Error::ConnectionLost(cause.clone()));
        }
        if inner.mode != Mode::Transactional || inner.txn_seq != txn_id {
            return Err(Error::NotInTransaction);
        }

        let (wire_tx, wire_rx) = oneshot::channel();
        let (user_tx, user_rx) = oneshot::channel();
        let entry_id = inner.next_entry_id;
        inner.next_entry_id += 1;
        inner.queue.push_back(ReplySlot::Call {
            tx: wire_tx,
            call: PipelinedCall {
                name,
                is_blocking: false,
            },
            enters_pubsub: false,
        });
        inner.txn_entries.push((entry_id, user_tx));

        if let Err(err) = write_frame(&mut inner, &frame).await {
            fail_all(&mut inner, &self.shared, format!("write failed: {err}"));
            return Err(err);
        }
        Ok((wire_rx, user_rx, entry_id))
    }

    /// Remove a stored transaction entry whose command failed to queue.
    pub(crate) async fn forget_queued(&self, txn_id: u64, entry_id: u64) {
        let mut inner = self.shared.inner.lock().await;
        if inner.mode == Mode::Transactional && inner.txn_seq == txn_id {
            inner.txn_entries.retain(|(id, _)| *id != entry_id);
        }
    }

    /// Send EXEC and distribute its children to the stored entries in issue
    /// order. A nil reply means a watched key changed; everything fails with
    /// `TransactionAborted`.
    pub(crate) async fn exec_multi(&self, txn_id: u64) -> Result<()> {
        let entries = {
            let mut inner = self.shared.inner.lock().await;
            if let Some(cause) = &inner.closed {
                return Err(Error::ConnectionLost(cause.clone()));
            }
            if inner.mode != Mode::Transactional || inner.txn_seq != txn_id {
                return Err(Error::NotInTransaction);
            }
            std::mem::take(&mut inner.txn_entries)
        };

        let outcome = self
            .call(
                "exec",
                vec![cmd("EXEC")],
                CallFlags {
                    bypass: true,
                    ..CallFlags::default()
                },
            )
            .await;

        match outcome {
            Ok(Reply::MultiBulk(mut results)) => {
                let mut missing = false;
                for (_, tx) in entries {
                    match results.next().await {
                        Some(item) => {
                            let _ = tx.send(item);
                        }
                        None => {
                            missing = true;
                            let _ = tx.send(Err(Error::Protocol(
                                "missing transaction reply".to_owned(),
                            )));
                        }
                    }
                }
                self.exit_multi(txn_id).await;
                if missing {
                    Err(Error::Protocol(
                        "transaction reply count mismatch".to_owned(),
                    ))
                } else {
                    Ok(())
                }
            }
            Ok(Reply::Nil) => {
                for (_, tx) in entries {
                    let _ = tx.send(Err(Error::TransactionAborted));
                }
                self.exit_multi(txn_id).await;
                Err(Error::TransactionAborted)
            }
            Ok(other) => {
                let detail = format!("unexpected {} reply to exec", other.kind());
                for (_, tx) in entries {
                    let _ = tx.send(Err(Error::Protocol(detail.clone())));
                }
                self.exit_multi(txn_id).await;
                Err(Error::Protocol(detail))
            }
            Err(err) => {
                for (_, tx) in entries {
                    let entry_err = match &err {
                        Error::Server(_) => Error::TransactionAborted,
                        other => Error::ConnectionLost(other.to_string()),
                    };
                    let _ = tx.send(Err(entry_err));
                }
                self.exit_multi(txn_id).await;
                Err(err)
            }
        }
    }

    /// Send DISCARD; every stored entry fails with `TransactionDiscarded`.
    pub(crate) async fn discard_multi(&self, txn_id: u64) -> Result<()> {
        let entries = {
            let mut inner = self.shared.inner.lock().await;
            if let Some(cause) = &inner.closed {
                return Err(Error::ConnectionLost(cause.clone()));
            }
            if inner.mode != Mode::Transactional || inner.txn_seq != txn_id {
                return Err(Error::NotInTransaction);
            }
            let entries = std::mem::take(&mut inner.txn_entries);
            // Leave transactional mode before the DISCARD frame goes out so
            // its reply is not expected to be QUEUED.
            inner.mode = Mode::Normal;
            refresh_busy(&inner, &self.shared);
            entries
        };

        for (_, tx) in entries {
            let _ = tx.send(Err(Error::TransactionDiscarded));
        }

        let reply = self
            .call("discard", vec![cmd("DISCARD")], CallFlags::default())
            .await?;
        expect_ok("discard", reply)
    }

    /// Forget about all watched keys, from inside a transaction.
    pub(crate) async fn unwatch_multi(&self, txn_id: u64) -> Result<()> {
        {
            let inner = self.shared.inner.lock().await;
            if inner.mode != Mode::Transactional || inner.txn_seq != txn_id {
                return Err(Error::NotInTransaction);
            }
        }
        let reply = self
            .call(
                "unwatch",
                vec![cmd("UNWATCH")],
                CallFlags {
                    bypass: true,
                    ..CallFlags::default()
                },
            )
            .await?;
        expect_ok("unwatch", reply)
    }

    async fn exit_multi(&self, txn_id: u64) {
        let mut inner = self.shared.inner.lock().await;
        if inner.mode == Mode::Transactional && inner.txn_seq == txn_id {
            inner.mode = Mode::Normal;
            inner.txn_entries.clear();
            refresh_busy(&inner, &self.shared);
        }
    }

    // Pub/Sub support

    /// Send SUBSCRIBE and await the first acknowledgement. The connection is
    /// in pub/sub mode from the moment that acknowledgement arrives and
    /// never leaves it. Returns the acknowledgement items and, on the first
    /// subscription, the receiving end of the message queue.
    pub(crate) async fn subscribe(
        &self,
        channels: &[Bytes],
    ) -> Result<(Vec<String>, Option<mpsc::UnboundedReceiver<PubSubMessage>>)> {
        if channels.is_empty() {
            return Err(Error::BadConfig(
                "subscribe needs at least one channel".to_owned(),
            ));
        }

        let receiver = {
            let mut inner = self.shared.inner.lock().await;
            if let Some(cause) = &inner.closed {
                return Err(Error::ConnectionLost(cause.clone()));
            }
            if inner.mode == Mode::Transactional {
                return Err(Error::AlreadyInTransaction);
            }
            let receiver = if inner.pubsub_tx.is_none() {
                let (tx, rx) = mpsc::unbounded_channel();
                inner.pubsub_tx = Some(tx);
                Some(rx)
            } else {
                None
            };
            if inner.mode == Mode::Normal {
                inner.reserved = true;
                refresh_busy(&inner, &self.shared);
            }
            receiver
        };

        let mut args = Vec::with_capacity(channels.len() + 1);
        args.push(cmd("SUBSCRIBE"));
        args.extend(channels.iter().cloned());

        let outcome = async {
            let reply = self
                .call(
                    "subscribe",
                    args,
                    CallFlags {
                        subscribe: true,
                        ..CallFlags::default()
                    },
                )
                .await?;
            let items = convert::multibulk("subscribe", reply)?.collect().await?;
            let mut ack = Vec::with_capacity(items.len());
            for item in items {
                ack.push(crate::protocol::reply::item_text(item)?);
            }
            if ack.first().map(String::as_str) != Some("subscribe") {
                return Err(Error::Protocol(
                    "unexpected acknowledgement to subscribe".to_owned(),
                ));
            }
            Ok(ack)
        }
        .await;

        let mut inner = self.shared.inner.lock().await;
        inner.reserved = false;
        if outcome.is_err() && inner.mode != Mode::Subscribed && receiver.is_some() {
            inner.pubsub_tx = None;
        }
        refresh_busy(&inner, &self.shared);
        drop(inner);

        outcome.map(|ack| (ack, receiver))
    }
}

/// `+OK` check used for the transaction control frames.
fn expect_ok(op: &'static str, reply: Reply) -> Result<()> {
    match reply {
        Reply::Status(status) if status == "OK" => Ok(()),
        other => Err(Error::Protocol(format!(
            "expected OK reply to {op}, got {}",
            other.kind()
        ))),
    }
}

async fn write_frame(inner: &mut Inner, frame: &[u8]) -> Result<()> {
    inner.writer.write_all(frame).await.map_err(Error::Io)?;
    inner.writer.flush().await.map_err(Error::Io)?;
    Ok(())
}

fn refresh_busy(inner: &Inner, shared: &Shared) {
    let busy = inner.blocking_calls > 0 || inner.mode != Mode::Normal || inner.reserved;
    shared.busy.store(busy, Ordering::Release);
}

/// Fail every outstanding future and mark the connection terminally closed.
fn fail_all(inner: &mut Inner, shared: &Shared, cause: String) {
    if inner.closed.is_some() {
        return;
    }
    info!("redis connection lost: {cause}");
    inner.closed = Some(cause.clone());
    shared.closed.store(true, Ordering::Release);

    for slot in inner.queue.drain(..) {
        match slot {
            ReplySlot::Call { tx, .. } => {
                let _ = tx.send(Err(Error::ConnectionLost(cause.clone())));
            }
            ReplySlot::Item { tx } => {
                let _ = tx.try_send(Err(Error::ConnectionLost(cause.clone())));
            }
        }
    }
    for (_, tx) in inner.txn_entries.drain(..) {
        let _ = tx.send(Err(Error::ConnectionLost(cause.clone())));
    }
    inner.pubsub_tx = None;
    inner.gather = None;
    inner.blocking_calls = 0;
}

/// Drive the decoder and dispatch every frame. Holds only a weak handle so
/// dropping the pool tears the connection down.
async fn read_loop<R>(mut frames: FramedRead<R, RespCodec>, shared: Weak<Shared>)
where
    R: AsyncRead + Unpin,
{
    loop {
        let event = frames.next().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        match event {
            Some(Ok(event)) => {
                let mut inner = shared.inner.lock().await;
                if let Err(err) = dispatch(&mut inner, &shared, event) {
                    warn!("dispatch failed: {err}");
                    fail_all(&mut inner, &shared, err.to_string());
                    return;
                }
            }
            Some(Err(err)) => {
                let mut inner = shared.inner.lock().await;
                fail_all(&mut inner, &shared, err.to_string());
                return;
            }
            None => {
                let mut inner = shared.inner.lock().await;
                fail_all(&mut inner, &shared, "end of stream".to_owned());
                return;
            }
        }
    }
}

/// Route one decoded frame.
///
/// In subscribed mode a multi bulk with no pending command is an incoming
/// pub/sub event; otherwise frames complete reply slots head-first, and a
/// multi bulk header additionally pushes its child slots at the head of the
/// queue.
fn dispatch(inner: &mut Inner, shared: &Shared, event: RespEvent) -> Result<()> {
    if inner.gather.is_some() {
        return gather_item(inner, event);
    }

    match event {
        RespEvent::MultiBulk(count) => {
            if inner.mode == Mode::Subscribed && inner.queue.is_empty() {
                if count == 0 {
                    return Err(Error::Protocol("empty pub/sub event".to_owned()));
                }
                inner.gather = Some(Gather {
                    remaining: count,
                    items: Vec::with_capacity(count),
                });
                return Ok(());
            }
            let (handle, items_tx) = MultiBulkReply::new(count);
            complete_head(inner, shared, Ok(Reply::MultiBulk(handle)))?;
            for _ in 0..count {
                inner.queue.push_front(ReplySlot::Item {
                    tx: items_tx.clone(),
                });
            }
            Ok(())
        }
        RespEvent::Status(status) => complete_head(inner, shared, Ok(Reply::Status(status))),
        RespEvent::Integer(n) => complete_head(inner, shared, Ok(Reply::Integer(n))),
        RespEvent::Bulk(data) => complete_head(inner, shared, Ok(Reply::Bulk(data))),
        RespEvent::Nil => complete_head(inner, shared, Ok(Reply::Nil)),
        RespEvent::Error(message) => complete_head(inner, shared, Err(Error::Server(message))),
    }
}

fn complete_head(inner: &mut Inner, shared: &Shared, result: Result<Reply>) -> Result<()> {
    let slot = inner
        .queue
        .pop_front()
        .ok_or_else(|| Error::Protocol("reply without a pending command".to_owned()))?;
    match slot {
        ReplySlot::Call {
            tx,
            call,
            enters_pubsub,
        } => {
            if call.is_blocking {
                inner.blocking_calls = inner.blocking_calls.saturating_sub(1);
            }
            if enters_pubsub && result.is_ok() {
                inner.mode = Mode::Subscribed;
            }
            refresh_busy(inner, shared);
            debug!(command = call.name, "reply dispatched");
            let _ = tx.send(result);
        }
        ReplySlot::Item { tx } => {
            let _ = tx.try_send(result);
        }
    }
    Ok(())
}

fn gather_item(inner: &mut Inner, event: RespEvent) -> Result<()> {
    let reply = match event {
        RespEvent::Status(status) => Reply::Status(status),
        RespEvent::Integer(n) => Reply::Integer(n),
        RespEvent::Bulk(data) => Reply::Bulk(data),
        RespEvent::Nil => Reply::Nil,
        RespEvent::Error(message) => {
            return Err(Error::Protocol(format!(
                "error reply inside a pub/sub event: {message}"
            )));
        }
        RespEvent::MultiBulk(_) => {
            return Err(Error::Protocol(
                "nested multi bulk inside a pub/sub event".to_owned(),
            ));
        }
    };

    let finished = match inner.gather.as_mut() {
        Some(gather) => {
            gather.items.push(reply);
            gather.remaining -= 1;
            gather.remaining == 0
        }
        None => return Err(Error::Protocol("stray pub/sub item".to_owned())),
    };

    if finished {
        if let Some(gather) = inner.gather.take() {
            let message = PubSubMessage::from_items(gather.items)?;
            if let Some(tx) = &inner.pubsub_tx {
                let _ = tx.send(message);
            }
        }
    }
    Ok(())
}
