//! # RESP2 Encoding and Decoding
//!
//! Purpose: Frame outgoing commands and decode node replies incrementally
//! from a socket buffer, so a reply split across reads is simply "not yet".
//!
//! ## Design Principles
//! 1. **Incremental Parsing**: `decode` only consumes bytes once a whole
//!    value (including nested arrays) is available.
//! 2. **Buffer Reuse**: Callers own the read and write buffers.
//! 3. **Binary-Safe**: Bulk strings are treated as raw bytes.
//! 4. **Fail Fast**: Invalid framing returns protocol errors immediately.

use bytes::{Buf, BytesMut};
use thiserror::Error;

use hkv_common::{ServerError, Value};

/// Framing violation in a node reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid RESP frame: {0}")]
pub struct RespError(&'static str);

/// Encodes a RESP2 array command into the provided buffer.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    out.push(b'*');
    push_usize(out, args.len());
    out.extend_from_slice(b"\r\n");
    for arg in args {
        out.push(b'$');
        push_usize(out, arg.len());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

/// Decodes one value from the front of `buf`.
///
/// Returns `Ok(None)` and leaves `buf` untouched when the value is incomplete.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Value>, RespError> {
    match parse_value(&buf[..], 0)? {
        Some((value, consumed)) => {
            buf.advance(consumed);
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

type Parsed = Option<(Value, usize)>;

fn parse_value(data: &[u8], pos: usize) -> Result<Parsed, RespError> {
    let (line, next) = match read_line(data, pos)? {
        Some(found) => found,
        None => return Ok(None),
    };
    if line.is_empty() {
        return Err(RespError("empty line"));
    }

    let body = &line[1..];
    match line[0] {
        b'+' => Ok(Some((
            Value::Simple(String::from_utf8_lossy(body).into_owned()),
            next,
        ))),
        b'-' => Ok(Some((
            Value::Error(ServerError::parse(&String::from_utf8_lossy(body))),
            next,
        ))),
        b':' => Ok(Some((Value::Integer(parse_i64(body)?), next))),
        b'$' => parse_bulk(data, parse_i64(body)?, next),
        b'*' => parse_array(data, parse_i64(body)?, next),
        _ => Err(RespError("unknown type byte")),
    }
}

fn parse_bulk(data: &[u8], len: i64, pos: usize) -> Result<Parsed, RespError> {
    if len < 0 {
        return Ok(Some((Value::Nil, pos)));
    }
    let len = len as usize;
    let end = pos + len;
    if data.len() < end + 2 {
        return Ok(None);
    }
    if &data[end..end + 2] != b"\r\n" {
        return Err(RespError("bulk string without CRLF"));
    }
    Ok(Some((Value::Bulk(data[pos..end].to_vec()), end + 2)))
}

fn parse_array(data: &[u8], len: i64, pos: usize) -> Result<Parsed, RespError> {
    // `*-1` is how EXEC reports a transaction dropped by WATCH.
    if len < 0 {
        return Ok(Some((Value::Nil, pos)));
    }

    let mut items = Vec::with_capacity(len.min(1024) as usize);
    let mut cursor = pos;
    for _ in 0..len {
        match parse_value(data, cursor)? {
            Some((item, next)) => {
                items.push(item);
                cursor = next;
            }
            None => return Ok(None),
        }
    }
    Ok(Some((Value::Array(items), cursor)))
}

fn read_line(data: &[u8], pos: usize) -> Result<Option<(&[u8], usize)>, RespError> {
    let rest = &data[pos..];
    let newline = match rest.iter().position(|&b| b == b'\n') {
        Some(idx) => idx,
        None => return Ok(None),
    };
    if newline == 0 || rest[newline - 1] != b'\r' {
        return Err(RespError("line without CRLF"));
    }
    Ok(Some((&rest[..newline - 1], pos + newline + 1)))
}

fn parse_i64(data: &[u8]) -> Result<i64, RespError> {
    let (negative, digits) = match data.first() {
        Some(b'-') => (true, &data[1..]),
        _ => (false, data),
    };
    if digits.is_empty() {
        return Err(RespError("missing integer"));
    }

    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(RespError("invalid integer"));
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as i64);
    }

    if negative {
        Ok(-value)
    } else {
        Ok(value)
    }
}

fn push_usize(out: &mut Vec<u8>, mut value: usize) {
    // Digits go through a stack buffer; no temporary String.
    let mut buf = [0u8; 20];
    let mut len = 0;
    if value == 0 {
        buf[0] = b'0';
        len = 1;
    } else {
        while value > 0 {
            buf[len] = b'0' + (value % 10) as u8;
            value /= 10;
            len += 1;
        }
    }
    for idx in (0..len).rev() {
        out.push(buf[idx]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(raw: &[u8]) -> Option<Value> {
        let mut buf = BytesMut::from(raw);
        let value = decode(&mut buf).unwrap();
        if value.is_some() {
            assert!(buf.is_empty(), "trailing bytes left in buffer");
        }
        value
    }

    #[test]
    fn encodes_command() {
        let mut buf = Vec::new();
        encode_command(&[b"GET", b"key"], &mut buf);
        assert_eq!(&buf, b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
    }

    #[test]
    fn parses_simple_string() {
        assert_eq!(decode_all(b"+OK\r\n"), Some(Value::Simple("OK".into())));
    }

    #[test]
    fn parses_bulk_string() {
        assert_eq!(
            decode_all(b"$5\r\nhello\r\n"),
            Some(Value::Bulk(b"hello".to_vec()))
        );
    }

    #[test]
    fn parses_null_bulk_and_null_array() {
        assert_eq!(decode_all(b"$-1\r\n"), Some(Value::Nil));
        assert_eq!(decode_all(b"*-1\r\n"), Some(Value::Nil));
    }

    #[test]
    fn parses_integer() {
        assert_eq!(decode_all(b":42\r\n"), Some(Value::Integer(42)));
        assert_eq!(decode_all(b":-2\r\n"), Some(Value::Integer(-2)));
    }

    #[test]
    fn parses_error() {
        let value = decode_all(b"-ERR bad\r\n").unwrap();
        assert_eq!(value, Value::Error(ServerError::new("ERR", "bad")));
    }

    #[test]
    fn parses_nested_exec_reply() {
        let raw = b"*3\r\n+OK\r\n$3\r\nfoo\r\n*2\r\n:1\r\n$-1\r\n";
        let value = decode_all(raw).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![
                Value::Simple("OK".into()),
                Value::Bulk(b"foo".to_vec()),
                Value::Array(vec![Value::Integer(1), Value::Nil]),
            ])
        );
    }

    #[test]
    fn partial_frames_wait_for_more_bytes() {
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nfoo\r\n$3\r\nba"[..]);
        assert_eq!(decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 19);

        buf.extend_from_slice(b"r\r\n+OK\r\n");
        let first = decode(&mut buf).unwrap();
        assert_eq!(
            first,
            Some(Value::Array(vec![
                Value::Bulk(b"foo".to_vec()),
                Value::Bulk(b"bar".to_vec())
            ]))
        );
        assert_eq!(decode(&mut buf).unwrap(), Some(Value::Simple("OK".into())));
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_bad_framing() {
        let mut buf = BytesMut::from(&b"?what\r\n"[..]);
        assert!(decode(&mut buf).is_err());

        let mut buf = BytesMut::from(&b":12x\r\n"[..]);
        assert!(decode(&mut buf).is_err());

        let mut buf = BytesMut::from(&b"$3\r\nfooXY"[..]);
        assert!(decode(&mut buf).is_err());
    }
}
