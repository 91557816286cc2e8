use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::convert;

/// A single Redis reply.
///
/// Server error replies (`-ERR ...`) are not a variant here; they surface as
/// [`Error::Server`](crate::error::Error::Server) on the awaiting future.
#[derive(Debug)]
pub enum Reply {
    /// Simple string reply (`+OK`, `+QUEUED`, ...)
    Status(String),
    Integer(i64),
    /// Length-prefixed binary reply
    Bulk(Bytes),
    /// Null bulk or null multi bulk reply
    Nil,
    /// Streaming multi bulk reply; items arrive asynchronously
    MultiBulk(MultiBulkReply),
}

impl Reply {
    /// Reply variant name, used in type mismatch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Status(_) => "status",
            Reply::Integer(_) => "integer",
            Reply::Bulk(_) => "bulk",
            Reply::Nil => "nil",
            Reply::MultiBulk(_) => "multi bulk",
        }
    }
}

/// Container for a multi bulk reply.
///
/// The handle stays valid after the connection has moved on to later replies;
/// items stream in as the server sends them. There are two ways of reading
/// the content: await [`collect`](Self::collect) for everything at once, or
/// call [`next`](Self::next) per item.
#[derive(Debug)]
pub struct MultiBulkReply {
    count: usize,
    remaining: usize,
    items: mpsc::Receiver<Result<Reply>>,
}

impl MultiBulkReply {
    /// Create a handle plus the sender side the connection fills. The channel
    /// is bounded to exactly `count` items so the producer can never block.
    pub(crate) fn new(count: usize) -> (Self, mpsc::Sender<Result<Reply>>) {
        let (tx, rx) = mpsc::channel(count.max(1));
        (
            Self {
                count,
                remaining: count,
                items: rx,
            },
            tx,
        )
    }

    /// Number of items in the reply.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Wait for the next item. Returns `None` once all `count` items have
    /// been yielded. A connection that dies mid-reply yields one
    /// `ConnectionLost` error and then `None`.
    pub async fn next(&mut self) -> Option<Result<Reply>> {
        if self.remaining == 0 {
            return None;
        }
        match self.items.recv().await {
            Some(item) => {
                self.remaining -= 1;
                Some(item)
            }
            None => {
                self.remaining = 0;
                Some(Err(Error::ConnectionLost(
                    "connection closed while streaming a multi bulk reply".to_owned(),
                )))
            }
        }
    }

    /// Wait for all of the items of the multi bulk reply to come in and
    /// return them as a list.
    pub async fn collect(mut self) -> Result<Vec<Reply>> {
        let mut out = Vec::with_capacity(self.count);
        while let Some(item) = self.next().await {
            out.push(item?);
        }
        Ok(out)
    }
}

/// Score boundary for sorted set queries like `zrangebyscore`.
///
/// [`ZScoreBoundary::Min`] and [`ZScoreBoundary::Max`] stand for `-inf` and
/// `+inf`; finite boundaries are inclusive unless `exclusive` is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZScoreBoundary {
    Min,
    Max,
    Value { value: f64, exclusive: bool },
}

impl ZScoreBoundary {
    pub fn inclusive(value: f64) -> Self {
        Self::Value {
            value,
            exclusive: false,
        }
    }

    pub fn exclusive(value: f64) -> Self {
        Self::Value {
            value,
            exclusive: true,
        }
    }

    /// Wire encoding: the literal `+inf`/`-inf`, or `<num>` (inclusive) or
    /// `(<num>` (exclusive).
    pub(crate) fn encode(&self) -> Bytes {
        match self {
            Self::Min => Bytes::from_static(b"-inf"),
            Self::Max => Bytes::from_static(b"+inf"),
            Self::Value { value, exclusive } => {
                let text = if *exclusive {
                    format!("({value}")
                } else {
                    format!("{value}")
                };
                Bytes::from(text.into_bytes())
            }
        }
    }
}

/// Container for a `zrange`-style query result.
///
/// The underlying multi bulk reply interleaves members and scores; this view
/// pairs them up in wire order.
#[derive(Debug)]
pub struct ZRangeResult {
    reply: MultiBulkReply,
}

impl ZRangeResult {
    pub(crate) fn new(reply: MultiBulkReply) -> Self {
        Self { reply }
    }

    /// Number of `(member, score)` pairs.
    pub fn count(&self) -> usize {
        self.reply.count() / 2
    }

    /// Wait for the next `(member, score)` pair.
    pub async fn next(&mut self) -> Option<Result<(String, f64)>> {
        let member = match self.reply.next().await? {
            Ok(reply) => match convert::string("zrange", reply) {
                Ok(member) => member,
                Err(err) => return Some(Err(err)),
            },
            Err(err) => return Some(Err(err)),
        };
        let score = match self.reply.next().await {
            Some(Ok(reply)) => match convert::float("zrange", reply) {
                Ok(score) => score,
                Err(err) => return Some(Err(err)),
            },
            Some(Err(err)) => return Some(Err(err)),
            None => {
                return Some(Err(Error::Protocol(
                    "zrange reply with an odd number of items".to_owned(),
                )));
            }
        };
        Some(Ok((member, score)))
    }

    /// Collect every pair in wire order.
    pub async fn into_pairs(mut self) -> Result<Vec<(String, f64)>> {
        let mut out = Vec::with_capacity(self.count());
        while let Some(pair) = self.next().await {
            out.push(pair?);
        }
        Ok(out)
    }

    /// Collect the members only, in wire order.
    pub async fn into_members(self) -> Result<Vec<String>> {
        Ok(self.into_pairs().await?.into_iter().map(|(m, _)| m).collect())
    }
}

/// One received Pub/Sub event.
///
/// `kind` is `message` for a published message, or `subscribe` for the
/// acknowledgements that arrive for channels past the first, in which case
/// `payload` carries the subscription count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubMessage {
    pub kind: String,
    pub channel: String,
    pub payload: String,
}

impl PubSubMessage {
    /// Build an event from the collected children of a pub/sub multi bulk.
    pub(crate) fn from_items(items: Vec<Reply>) -> Result<Self> {
        let mut texts = Vec::with_capacity(items.len());
        for item in items {
            texts.push(item_text(item)?);
        }

        let mut texts = texts.into_iter();
        let kind = texts
            .next()
            .ok_or_else(|| Error::Protocol("empty pub/sub event".to_owned()))?;

        match kind.as_str() {
            "message" | "subscribe" => match (texts.next(), texts.next()) {
                (Some(channel), Some(payload)) => Ok(Self {
                    kind,
                    channel,
                    payload,
                }),
                _ => Err(Error::Protocol(format!("malformed {kind} event"))),
            },
            other => Err(Error::Protocol(format!("unknown pub/sub event kind '{other}'"))),
        }
    }
}

pub(crate) fn item_text(reply: Reply) -> Result<String> {
    match reply {
        Reply::Bulk(data) => convert::decode_text(&data),
        Reply::Status(text) => Ok(text),
        Reply::Integer(n) => Ok(n.to_string()),
        Reply::Nil => Ok(String::new()),
        Reply::MultiBulk(_) => Err(Error::Protocol(
            "nested multi bulk inside a pub/sub event".to_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn boundary_encoding() {
        assert_eq!(ZScoreBoundary::Min.encode(), "-inf");
        assert_eq!(ZScoreBoundary::Max.encode(), "+inf");
        assert_eq!(ZScoreBoundary::inclusive(2.5).encode(), "2.5");
        assert_eq!(ZScoreBoundary::exclusive(2.5).encode(), "(2.5");
        assert_eq!(ZScoreBoundary::inclusive(-1.0).encode(), "-1");
    }

    #[tokio::test]
    async fn multibulk_streams_in_order() {
        let (mut reply, tx) = MultiBulkReply::new(2);
        tx.try_send(Ok(Reply::Integer(1))).unwrap();
        tx.try_send(Ok(Reply::Integer(2))).unwrap();

        assert!(matches!(reply.next().await, Some(Ok(Reply::Integer(1)))));
        assert!(matches!(reply.next().await, Some(Ok(Reply::Integer(2)))));
        assert!(reply.next().await.is_none());
    }

    #[tokio::test]
    async fn empty_multibulk_terminates_immediately() {
        let (mut reply, _tx) = MultiBulkReply::new(0);
        assert_eq!(reply.count(), 0);
        assert!(reply.next().await.is_none());
    }

    #[tokio::test]
    async fn truncated_multibulk_reports_connection_lost() {
        let (mut reply, tx) = MultiBulkReply::new(2);
        tx.try_send(Ok(Reply::Nil)).unwrap();
        drop(tx);

        assert!(matches!(reply.next().await, Some(Ok(Reply::Nil))));
        assert!(matches!(
            reply.next().await,
            Some(Err(Error::ConnectionLost(_)))
        ));
        assert!(reply.next().await.is_none());
    }

    #[test]
    fn pubsub_message_from_items() {
        let msg = PubSubMessage::from_items(vec![
            Reply::Bulk(Bytes::from_static(b"message")),
            Reply::Bulk(Bytes::from_static(b"ch")),
            Reply::Bulk(Bytes::from_static(b"hi")),
        ])
        .unwrap();
        assert_eq!(msg.kind, "message");
        assert_eq!(msg.channel, "ch");
        assert_eq!(msg.payload, "hi");
    }

    #[test]
    fn pubsub_subscribe_ack_from_items() {
        let msg = PubSubMessage::from_items(vec![
            Reply::Bulk(Bytes::from_static(b"subscribe")),
            Reply::Bulk(Bytes::from_static(b"ch")),
            Reply::Integer(1),
        ])
        .unwrap();
        assert_eq!(msg.kind, "subscribe");
        assert_eq!(msg.payload, "1");
    }

    #[test]
    fn pubsub_unknown_kind_is_protocol_error() {
        let result = PubSubMessage::from_items(vec![
            Reply::Bulk(Bytes::from_static(b"mystery")),
            Reply::Bulk(Bytes::from_static(b"ch")),
            Reply::Bulk(Bytes::from_static(b"hi")),
        ]);
        assert!(matches!(result, Err(Error::Protocol(_))));
    }
}
