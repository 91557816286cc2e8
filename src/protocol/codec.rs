use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::error::Error;

/// A single decoded RESP2 frame.
///
/// Multi-bulk replies are surfaced as a header carrying the child count; the
/// next `n` decoded frames belong to that header. `$-1` and `*-1` both decode
/// to [`RespEvent::Nil`].
#[derive(Debug, Clone, PartialEq)]
pub enum RespEvent {
    Status(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Nil,
    MultiBulk(usize),
}

/// Incremental RESP2 reply decoder.
///
/// The decoder either expects a `\r\n`-terminated type line or is inside a
/// bulk body of known length. Short input is never an error; `decode` returns
/// `Ok(None)` and waits for more bytes.
pub struct RespCodec {
    state: DecoderState,
}

enum DecoderState {
    Line,
    BulkBody { len: usize },
}

impl RespCodec {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Line,
        }
    }
}

impl Default for RespCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RespCodec {
    type Item = RespEvent;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RespEvent>, Error> {
        loop {
            match self.state {
                DecoderState::Line => {
                    let Some(pos) = find_crlf(src) else {
                        return Ok(None);
                    };

                    let line = src.split_to(pos);
                    src.advance(2);

                    let Some((&type_byte, rest)) = line.split_first() else {
                        return Err(Error::Protocol("empty reply line".to_owned()));
                    };

                    match type_byte {
                        b'+' => return Ok(Some(RespEvent::Status(decode_line(rest)?))),
                        b'-' => return Ok(Some(RespEvent::Error(decode_line(rest)?))),
                        b':' => return Ok(Some(RespEvent::Integer(parse_int(rest)?))),
                        b'$' => match parse_int(rest)? {
                            -1 => return Ok(Some(RespEvent::Nil)),
                            len if len >= 0 => {
                                self.state = DecoderState::BulkBody { len: len as usize };
                            }
                            len => {
                                return Err(Error::Protocol(format!(
                                    "invalid bulk reply length {len}"
                                )));
                            }
                        },
                        b'*' => match parse_int(rest)? {
                            -1 => return Ok(Some(RespEvent::Nil)),
                            n if n >= 0 => return Ok(Some(RespEvent::MultiBulk(n as usize))),
                            n => {
                                return Err(Error::Protocol(format!(
                                    "invalid multi bulk reply length {n}"
                                )));
                            }
                        },
                        other => {
                            return Err(Error::Protocol(format!(
                                "invalid reply type byte 0x{other:02x}"
                            )));
                        }
                    }
                }
                DecoderState::BulkBody { len } => {
                    // The body is followed by its own CRLF.
                    if src.len() < len + 2 {
                        return Ok(None);
                    }

                    let body = src.split_to(len).freeze();
                    if &src[..2] != b"\r\n" {
                        return Err(Error::Protocol(
                            "bulk reply missing trailing CRLF".to_owned(),
                        ));
                    }
                    src.advance(2);

                    self.state = DecoderState::Line;
                    return Ok(Some(RespEvent::Bulk(body)));
                }
            }
        }
    }
}

fn find_crlf(src: &BytesMut) -> Option<usize> {
    src.windows(2).position(|w| w == b"\r\n")
}

fn decode_line(line: &[u8]) -> Result<String, Error> {
    match simdutf8::basic::from_utf8(line) {
        Ok(s) => Ok(s.to_owned()),
        Err(_) => Err(Error::Protocol("non-utf8 reply line".to_owned())),
    }
}

fn parse_int(line: &[u8]) -> Result<i64, Error> {
    simdutf8::basic::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            Error::Protocol(format!("invalid integer line {:?}", String::from_utf8_lossy(line)))
        })
}

/// Encode a request as a RESP multi-bulk of binary arguments:
/// `*K\r\n` then `$L\r\n<bytes>\r\n` per argument.
pub fn write_command(out: &mut Vec<u8>, args: &[Bytes]) {
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode_all(input: &[u8]) -> Vec<RespEvent> {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(input);
        let mut events = Vec::new();
        while let Some(event) = codec.decode(&mut buf).unwrap() {
            events.push(event);
        }
        events
    }

    #[test]
    fn status_reply() {
        assert_eq!(decode_all(b"+OK\r\n"), vec![RespEvent::Status("OK".to_owned())]);
    }

    #[test]
    fn error_reply() {
        assert_eq!(
            decode_all(b"-ERR unknown command\r\n"),
            vec![RespEvent::Error("ERR unknown command".to_owned())]
        );
    }

    #[test]
    fn integer_reply() {
        assert_eq!(decode_all(b":1234\r\n"), vec![RespEvent::Integer(1234)]);
        assert_eq!(decode_all(b":-7\r\n"), vec![RespEvent::Integer(-7)]);
    }

    #[test]
    fn bulk_reply() {
        assert_eq!(
            decode_all(b"$5\r\nhello\r\n"),
            vec![RespEvent::Bulk(Bytes::from_static(b"hello"))]
        );
    }

    #[test]
    fn bulk_reply_with_embedded_crlf() {
        assert_eq!(
            decode_all(b"$7\r\na\r\nb\r\n\r\n"),
            vec![RespEvent::Bulk(Bytes::from_static(b"a\r\nb\r\n"))]
        );
    }

    #[test]
    fn empty_bulk_is_empty_string() {
        assert_eq!(
            decode_all(b"$0\r\n\r\n"),
            vec![RespEvent::Bulk(Bytes::new())]
        );
    }

    #[test]
    fn nil_bulk() {
        assert_eq!(decode_all(b"$-1\r\n"), vec![RespEvent::Nil]);
    }

    #[test]
    fn multi_bulk_header_precedes_children() {
        assert_eq!(
            decode_all(b"*3\r\n$1\r\nx\r\n$-1\r\n$1\r\nz\r\n"),
            vec![
                RespEvent::MultiBulk(3),
                RespEvent::Bulk(Bytes::from_static(b"x")),
                RespEvent::Nil,
                RespEvent::Bulk(Bytes::from_static(b"z")),
            ]
        );
    }

    #[test]
    fn empty_multi_bulk() {
        assert_eq!(decode_all(b"*0\r\n"), vec![RespEvent::MultiBulk(0)]);
    }

    #[test]
    fn nil_multi_bulk() {
        assert_eq!(decode_all(b"*-1\r\n"), vec![RespEvent::Nil]);
    }

    #[test]
    fn byte_by_byte_equals_single_chunk() {
        let wire: &[u8] = b"+OK\r\n:42\r\n$5\r\nhello\r\n*2\r\n$1\r\na\r\n$1\r\nb\r\n$-1\r\n*-1\r\n";
        let whole = decode_all(wire);

        let mut codec = RespCodec::new();
        let mut buf = BytesMut::new();
        let mut trickled = Vec::new();
        for &byte in wire {
            buf.extend_from_slice(&[byte]);
            while let Some(event) = codec.decode(&mut buf).unwrap() {
                trickled.push(event);
            }
        }

        assert_eq!(whole, trickled);
    }

    #[test]
    fn incomplete_input_is_not_an_error() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(&b"$10\r\nhel"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn malformed_type_byte_fails() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(&b"!boom\r\n"[..]);
        assert!(matches!(codec.decode(&mut buf), Err(Error::Protocol(_))));
    }

    #[test]
    fn malformed_integer_fails() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(&b":twelve\r\n"[..]);
        assert!(matches!(codec.decode(&mut buf), Err(Error::Protocol(_))));
    }

    #[test]
    fn encode_set_request() {
        let mut out = Vec::new();
        write_command(
            &mut out,
            &[
                Bytes::from_static(b"SET"),
                Bytes::from_static(b"hello"),
                Bytes::from_static(b"world"),
            ],
        );
        assert_eq!(out, b"*3\r\n$3\r\nSET\r\n$5\r\nhello\r\n$5\r\nworld\r\n");
    }

    #[test]
    fn encode_empty_argument() {
        let mut out = Vec::new();
        write_command(&mut out, &[Bytes::from_static(b"ECHO"), Bytes::new()]);
        assert_eq!(out, b"*2\r\n$4\r\nECHO\r\n$0\r\n\r\n");
    }
}
