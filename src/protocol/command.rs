//! Outbound argument encoders. Redis takes every argument as a binary bulk
//! string; integers and floats are rendered in ASCII decimal, text under the
//! connection encoding (UTF-8).

use bytes::Bytes;

pub(crate) fn cmd(name: &'static str) -> Bytes {
    Bytes::from_static(name.as_bytes())
}

pub(crate) fn text(value: &str) -> Bytes {
    Bytes::copy_from_slice(value.as_bytes())
}

pub(crate) fn int(value: i64) -> Bytes {
    Bytes::from(value.to_string().into_bytes())
}

pub(crate) fn uint(value: u64) -> Bytes {
    Bytes::from(value.to_string().into_bytes())
}

pub(crate) fn float(value: f64) -> Bytes {
    Bytes::from(value.to_string().into_bytes())
}
