//! # Reply Values
//!
//! Purpose: Represent one decoded RESP2 reply without interpreting it for a
//! particular command. Typed conversions are left to the caller.
//!
//! ## Design Principles
//! 1. **Binary-Safe**: Bulk strings stay raw bytes.
//! 2. **Errors Are Values**: A `-ERR ...` reply is a value occupying its own
//!    position, not a failure of the surrounding request.
//! 3. **One Null**: Null bulk strings and null arrays both decode to `Nil`.

use std::fmt;

use thiserror::Error;

/// Decoded reply from a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `$-1` or `*-1`.
    Nil,
    /// `+OK`, `+QUEUED` style status replies.
    Simple(String),
    /// `-CODE message` replies.
    Error(ServerError),
    /// `:123` replies.
    Integer(i64),
    /// `$n` bulk strings.
    Bulk(Vec<u8>),
    /// `*n` arrays.
    Array(Vec<Value>),
}

impl Value {
    /// Returns true for `+OK`.
    pub fn is_ok(&self) -> bool {
        matches!(self, Value::Simple(text) if text == "OK")
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Byte view of status and bulk replies.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Simple(text) => Some(text.as_bytes()),
            Value::Bulk(data) => Some(data),
            _ => None,
        }
    }

    /// UTF-8 view of status and bulk replies.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Simple(text) => Some(text),
            Value::Bulk(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ServerError> {
        match self {
            Value::Error(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ServerError> for Value {
    fn from(err: ServerError) -> Self {
        Value::Error(err)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("(nil)"),
            Value::Simple(text) => f.write_str(text),
            Value::Error(err) => write!(f, "(error) {err}"),
            Value::Integer(value) => write!(f, "(integer) {value}"),
            Value::Bulk(data) => write!(f, "\"{}\"", String::from_utf8_lossy(data)),
            Value::Array(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Error reply sent by a node, e.g. `WRONGTYPE Operation against a key ...`.
///
/// The leading upper-case word is the error code; replies without one are
/// filed under `ERR`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} {message}")]
pub struct ServerError {
    code: String,
    message: String,
}

impl ServerError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerError {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Splits a raw error line (without the leading `-`).
    pub fn parse(line: &str) -> Self {
        let (head, rest) = match line.split_once(' ') {
            Some((head, rest)) => (head, rest),
            None => (line, ""),
        };
        let is_code = !head.is_empty()
            && head
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
        if is_code {
            ServerError::new(head, rest)
        } else {
            ServerError::new("ERR", line)
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
