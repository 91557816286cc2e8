//! Reply post-processing: conversions from a raw [`Reply`] to the value a
//! command documents. Each conversion validates the declared reply variant
//! and reports the offending operation on mismatch.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::protocol::reply::{MultiBulkReply, Reply, ZRangeResult};

/// Decode bulk payload bytes under the connection encoding (UTF-8).
pub(crate) fn decode_text(data: &[u8]) -> Result<String> {
    match simdutf8::basic::from_utf8(data) {
        Ok(text) => Ok(text.to_owned()),
        Err(_) => Err(Error::Encoding(
            "bulk reply is not valid utf-8".to_owned(),
        )),
    }
}

fn mismatch(expected: &'static str, reply: &Reply, op: &'static str) -> Error {
    Error::TypeMismatch {
        expected,
        got: reply.kind(),
        op,
    }
}

/// `+...` status reply, e.g. `OK` or `PONG`.
pub(crate) fn status(op: &'static str, reply: Reply) -> Result<String> {
    match reply {
        Reply::Status(text) => Ok(text),
        other => Err(mismatch("status", &other, op)),
    }
}

pub(crate) fn int(op: &'static str, reply: Reply) -> Result<i64> {
    match reply {
        Reply::Integer(n) => Ok(n),
        other => Err(mismatch("integer", &other, op)),
    }
}

/// Integer reply that may be nil (e.g. `zrank` on a missing member).
pub(crate) fn opt_int(op: &'static str, reply: Reply) -> Result<Option<i64>> {
    match reply {
        Reply::Integer(n) => Ok(Some(n)),
        Reply::Nil => Ok(None),
        other => Err(mismatch("integer", &other, op)),
    }
}

/// Integer reply interpreted as a boolean (0 or 1).
pub(crate) fn bool(op: &'static str, reply: Reply) -> Result<bool> {
    int(op, reply).map(|n| n != 0)
}

pub(crate) fn string(op: &'static str, reply: Reply) -> Result<String> {
    match reply {
        Reply::Bulk(data) => decode_text(&data),
        other => Err(mismatch("bulk", &other, op)),
    }
}

pub(crate) fn opt_string(op: &'static str, reply: Reply) -> Result<Option<String>> {
    match reply {
        Reply::Bulk(data) => decode_text(&data).map(Some),
        Reply::Nil => Ok(None),
        other => Err(mismatch("bulk", &other, op)),
    }
}

/// Bulk reply carrying an ASCII decimal float (e.g. `zincrby`).
pub(crate) fn float(op: &'static str, reply: Reply) -> Result<f64> {
    match reply {
        Reply::Bulk(data) => parse_float(op, &data),
        other => Err(mismatch("bulk", &other, op)),
    }
}

pub(crate) fn opt_float(op: &'static str, reply: Reply) -> Result<Option<f64>> {
    match reply {
        Reply::Bulk(data) => parse_float(op, &data).map(Some),
        Reply::Nil => Ok(None),
        other => Err(mismatch("bulk", &other, op)),
    }
}

fn parse_float(op: &'static str, data: &[u8]) -> Result<f64> {
    decode_text(data)?.parse::<f64>().map_err(|_| Error::TypeMismatch {
        expected: "float",
        got: "bulk",
        op,
    })
}

pub(crate) fn multibulk(op: &'static str, reply: Reply) -> Result<MultiBulkReply> {
    match reply {
        Reply::MultiBulk(items) => Ok(items),
        other => Err(mismatch("multi bulk", &other, op)),
    }
}

/// Multi bulk of non-nil strings (e.g. `lrange`, `hvals`).
pub(crate) async fn string_list(op: &'static str, reply: Reply) -> Result<Vec<String>> {
    let items = multibulk(op, reply)?.collect().await?;
    items.into_iter().map(|item| string(op, item)).collect()
}

/// Multi bulk where individual items may be nil (e.g. `mget`, `hmget`).
pub(crate) async fn opt_string_list(
    op: &'static str,
    reply: Reply,
) -> Result<Vec<Option<String>>> {
    let items = multibulk(op, reply)?.collect().await?;
    items.into_iter().map(|item| opt_string(op, item)).collect()
}

pub(crate) async fn string_set(op: &'static str, reply: Reply) -> Result<HashSet<String>> {
    let items = multibulk(op, reply)?.collect().await?;
    items.into_iter().map(|item| string(op, item)).collect()
}

/// Multi bulk of alternating fields and values (e.g. `hgetall`).
pub(crate) async fn string_map(
    op: &'static str,
    reply: Reply,
) -> Result<HashMap<String, String>> {
    let items = string_list(op, reply).await?;
    if items.len() % 2 != 0 {
        return Err(Error::Protocol(format!(
            "{op} reply with an odd number of items"
        )));
    }
    let mut map = HashMap::with_capacity(items.len() / 2);
    let mut items = items.into_iter();
    while let (Some(field), Some(value)) = (items.next(), items.next()) {
        map.insert(field, value);
    }
    Ok(map)
}

/// Reply to a blocking pop: nil on timeout, otherwise `[key, value]`.
pub(crate) async fn blocking_pop(
    op: &'static str,
    reply: Reply,
) -> Result<Option<Vec<String>>> {
    match reply {
        Reply::Nil => Ok(None),
        other => string_list(op, other).await.map(Some),
    }
}

pub(crate) fn zrange(op: &'static str, reply: Reply) -> Result<ZRangeResult> {
    multibulk(op, reply).map(ZRangeResult::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    fn filled_multibulk(items: Vec<Reply>) -> Reply {
        let (reply, tx) = MultiBulkReply::new(items.len());
        for item in items {
            tx.try_send(Ok(item)).unwrap();
        }
        Reply::MultiBulk(reply)
    }

    #[test]
    fn status_and_mismatch() {
        assert_eq!(status("ping", Reply::Status("PONG".to_owned())).unwrap(), "PONG");
        let err = status("ping", Reply::Integer(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch { expected: "status", got: "integer", op: "ping" }
        ));
    }

    #[test]
    fn ints_and_bools() {
        assert_eq!(int("incr", Reply::Integer(7)).unwrap(), 7);
        assert!(bool("exists", Reply::Integer(1)).unwrap());
        assert!(!bool("exists", Reply::Integer(0)).unwrap());
        assert_eq!(opt_int("zrank", Reply::Nil).unwrap(), None);
    }

    #[test]
    fn strings_and_floats() {
        let bulk = Reply::Bulk(Bytes::from_static(b"3.25"));
        assert_eq!(float("zincrby", bulk).unwrap(), 3.25);
        assert_eq!(opt_string("get", Reply::Nil).unwrap(), None);
        assert_eq!(
            opt_float("zscore", Reply::Bulk(Bytes::from_static(b"1.5"))).unwrap(),
            Some(1.5)
        );
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let bulk = Reply::Bulk(Bytes::from_static(&[0xff, 0xfe]));
        assert!(matches!(string("get", bulk), Err(Error::Encoding(_))));
    }

    #[tokio::test]
    async fn list_with_nil_items() {
        let reply = filled_multibulk(vec![
            Reply::Bulk(Bytes::from_static(b"x")),
            Reply::Nil,
            Reply::Bulk(Bytes::from_static(b"z")),
        ]);
        let values = opt_string_list("mget", reply).await.unwrap();
        assert_eq!(
            values,
            vec![Some("x".to_owned()), None, Some("z".to_owned())]
        );
    }

    #[tokio::test]
    async fn map_from_pairs() {
        let reply = filled_multibulk(vec![
            Reply::Bulk(Bytes::from_static(b"a")),
            Reply::Bulk(Bytes::from_static(b"1")),
            Reply::Bulk(Bytes::from_static(b"b")),
            Reply::Bulk(Bytes::from_static(b"2")),
        ]);
        let map = string_map("hgetall", reply).await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
        assert_eq!(map.get("b").map(String::as_str), Some("2"));
    }

    #[tokio::test]
    async fn odd_map_is_a_protocol_error() {
        let reply = filled_multibulk(vec![Reply::Bulk(Bytes::from_static(b"a"))]);
        assert!(matches!(
            string_map("hgetall", reply).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn blocking_pop_nil_means_timeout() {
        assert_eq!(blocking_pop("blpop", Reply::Nil).await.unwrap(), None);
        let reply = filled_multibulk(vec![
            Reply::Bulk(Bytes::from_static(b"q")),
            Reply::Bulk(Bytes::from_static(b"v")),
        ]);
        assert_eq!(
            blocking_pop("blpop", reply).await.unwrap(),
            Some(vec!["q".to_owned(), "v".to_owned()])
        );
    }

    #[tokio::test]
    async fn zrange_pairs_members_with_scores() {
        let reply = filled_multibulk(vec![
            Reply::Bulk(Bytes::from_static(b"a")),
            Reply::Bulk(Bytes::from_static(b"1.5")),
            Reply::Bulk(Bytes::from_static(b"b")),
            Reply::Bulk(Bytes::from_static(b"2")),
        ]);
        let result = zrange("zrange", reply).unwrap();
        let pairs = result.into_pairs().await.unwrap();
        assert_eq!(pairs, vec![("a".to_owned(), 1.5), ("b".to_owned(), 2.0)]);
    }
}
