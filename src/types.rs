use std::fmt;

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};

pub type RedisValue = Bytes;

/// A key addressed by a command. The null key stands for "no single key".
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct RedisKey(Option<Bytes>);

impl RedisKey {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Self(Some(key.into()))
    }

    pub const fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Raw bytes sent on the wire; empty for the null key.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_deref().unwrap_or_default()
    }

    pub fn to_bytes(&self) -> Bytes {
        self.0.clone().unwrap_or_default()
    }

    pub fn prepend(&self, prefix: impl AsRef<[u8]>) -> Self {
        let prefix = prefix.as_ref();
        let mut out = BytesMut::with_capacity(prefix.len() + self.as_bytes().len());
        out.extend_from_slice(prefix);
        out.extend_from_slice(self.as_bytes());
        Self(Some(out.freeze()))
    }
}

impl From<&str> for RedisKey {
    fn from(value: &str) -> Self {
        Self::new(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<String> for RedisKey {
    fn from(value: String) -> Self {
        Self::new(Bytes::from(value))
    }
}

impl From<Bytes> for RedisKey {
    fn from(value: Bytes) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for RedisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(b) => f.write_str(&String::from_utf8_lossy(b)),
            None => f.write_str("(null)"),
        }
    }
}

impl fmt::Debug for RedisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedisKey({self})")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashEntry {
    pub name: RedisValue,
    pub value: RedisValue,
}

impl HashEntry {
    pub fn new(name: impl Into<RedisValue>, value: impl Into<RedisValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Conditional execution for set-style commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum When {
    #[default]
    Always,
    Exists,
    NotExists,
}

/// A decoded reply.
#[derive(Debug, Clone, PartialEq)]
pub enum RedisResult {
    Nil,
    Integer(i64),
    Status(String),
    Bulk(Bytes),
    Array(Vec<RedisResult>),
    /// Error nested inside an aggregate reply. Top-level errors become [`Error::Server`].
    Error(String),
}

impl RedisResult {
    pub fn is_nil(&self) -> bool {
        matches!(self, RedisResult::Nil)
    }

    pub fn into_value(self) -> Result<Option<RedisValue>> {
        match self {
            RedisResult::Nil => Ok(None),
            RedisResult::Bulk(b) => Ok(Some(b)),
            RedisResult::Status(s) => Ok(Some(Bytes::from(s))),
            RedisResult::Integer(i) => Ok(Some(Bytes::from(i.to_string()))),
            other => Err(unexpected("value", &other)),
        }
    }

    pub fn into_integer(self) -> Result<i64> {
        match self {
            RedisResult::Nil => Ok(0),
            RedisResult::Integer(i) => Ok(i),
            RedisResult::Bulk(ref b) => std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| unexpected("integer", &self)),
            other => Err(unexpected("integer", &other)),
        }
    }

    /// `OK` status or a non-zero integer.
    pub fn into_bool(self) -> Result<bool> {
        match self {
            RedisResult::Nil => Ok(false),
            RedisResult::Integer(i) => Ok(i != 0),
            RedisResult::Status(s) => Ok(s.eq_ignore_ascii_case("OK")),
            other => Err(unexpected("boolean", &other)),
        }
    }

    pub fn into_array(self) -> Result<Vec<RedisResult>> {
        match self {
            RedisResult::Nil => Ok(Vec::new()),
            RedisResult::Array(items) => Ok(items),
            other => Err(unexpected("array", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &RedisResult) -> Error {
    Error::Protocol(format!("expected {expected} reply, got {got}"))
}

impl fmt::Display for RedisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedisResult::Nil => f.write_str("(nil)"),
            RedisResult::Integer(i) => write!(f, "(integer) {i}"),
            RedisResult::Status(s) => f.write_str(s),
            RedisResult::Bulk(b) => write!(f, "\"{}\"", String::from_utf8_lossy(b)),
            RedisResult::Error(e) => write!(f, "(error) {e}"),
            RedisResult::Array(items) => {
                if items.is_empty() {
                    return f.write_str("(empty array)");
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {item}", i + 1)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_builds_instance_keys() {
        let key = RedisKey::from("session:42").prepend("shop:");
        assert_eq!(key.to_string(), "shop:session:42");
    }

    #[test]
    fn null_key_is_distinct_from_empty() {
        assert!(RedisKey::null().is_null());
        assert!(!RedisKey::from("").is_null());
        assert_eq!(RedisKey::null().as_bytes(), b"");
        assert_ne!(RedisKey::null(), RedisKey::from(""));
    }

    #[test]
    fn reply_conversions() {
        assert_eq!(RedisResult::Nil.into_value().unwrap(), None);
        assert_eq!(
            RedisResult::Bulk(Bytes::from_static(b"v")).into_value().unwrap(),
            Some(Bytes::from_static(b"v"))
        );
        assert!(RedisResult::Status("OK".into()).into_bool().unwrap());
        assert!(!RedisResult::Integer(0).into_bool().unwrap());
        assert_eq!(
            RedisResult::Bulk(Bytes::from_static(b"42")).into_integer().unwrap(),
            42
        );
        assert!(RedisResult::Array(vec![]).into_integer().is_err());
    }
}
