use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::types::RedisResult;

pub use redis_protocol::resp2::types::BytesFrame as Resp2Frame;
pub use redis_protocol::resp3::types::BytesFrame as Resp3Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespVersion {
    Resp2,
    Resp3,
}

#[derive(Debug, Clone)]
pub enum Frame {
    Resp2(Resp2Frame),
    Resp3(Resp3Frame),
}

impl Frame {
    pub fn is_error(&self) -> bool {
        match self {
            Frame::Resp2(f) => matches!(f, Resp2Frame::Error(_)),
            Frame::Resp3(f) => matches!(
                f,
                Resp3Frame::SimpleError { .. } | Resp3Frame::BlobError { .. }
            ),
        }
    }

    /// Out-of-band RESP3 push (invalidation, pub/sub) rather than a reply.
    pub fn is_push(&self) -> bool {
        matches!(self, Frame::Resp3(Resp3Frame::Push { .. }))
    }

    /// Convert a reply frame; a top-level error reply becomes [`Error::Server`].
    pub fn into_result(self) -> Result<RedisResult> {
        match resp_value(self) {
            RedisResult::Error(message) => Err(Error::Server(message)),
            other => Ok(other),
        }
    }
}

fn resp_value(frame: Frame) -> RedisResult {
    match frame {
        Frame::Resp2(f) => resp2_value(f),
        Frame::Resp3(f) => resp3_value(f),
    }
}

fn resp2_value(frame: Resp2Frame) -> RedisResult {
    match frame {
        Resp2Frame::SimpleString(b) => RedisResult::Status(String::from_utf8_lossy(&b).into_owned()),
        Resp2Frame::Error(e) => RedisResult::Error(e.to_string()),
        Resp2Frame::Integer(i) => RedisResult::Integer(i),
        Resp2Frame::BulkString(b) => RedisResult::Bulk(b),
        Resp2Frame::Array(items) => RedisResult::Array(items.into_iter().map(resp2_value).collect()),
        Resp2Frame::Null => RedisResult::Nil,
    }
}

fn resp3_value(frame: Resp3Frame) -> RedisResult {
    match frame {
        Resp3Frame::BlobString { data, .. }
        | Resp3Frame::VerbatimString { data, .. }
        | Resp3Frame::BigNumber { data, .. } => RedisResult::Bulk(data),
        Resp3Frame::SimpleString { data, .. } => {
            RedisResult::Status(String::from_utf8_lossy(&data).into_owned())
        }
        Resp3Frame::SimpleError { data, .. } => RedisResult::Error(data.to_string()),
        Resp3Frame::BlobError { data, .. } => {
            RedisResult::Error(String::from_utf8_lossy(&data).into_owned())
        }
        Resp3Frame::Number { data, .. } => RedisResult::Integer(data),
        Resp3Frame::Double { data, .. } => RedisResult::Bulk(Bytes::from(data.to_string())),
        Resp3Frame::Boolean { data, .. } => RedisResult::Integer(i64::from(data)),
        Resp3Frame::Null => RedisResult::Nil,
        Resp3Frame::Array { data, .. } | Resp3Frame::Push { data, .. } => {
            RedisResult::Array(data.into_iter().map(resp3_value).collect())
        }
        Resp3Frame::Set { data, .. } => {
            RedisResult::Array(data.into_iter().map(resp3_value).collect())
        }
        // Maps flatten to key, value, key, value like their RESP2 rendering.
        Resp3Frame::Map { data, .. } => RedisResult::Array(
            data.into_iter()
                .flat_map(|(k, v)| [resp3_value(k), resp3_value(v)])
                .collect(),
        ),
        other => RedisResult::Error(format!("unsupported RESP3 frame: {other:?}")),
    }
}

#[derive(Debug)]
pub struct RespStream {
    stream: TcpStream,
    buf: BytesMut,
    version: RespVersion,
}

impl RespStream {
    pub fn new(stream: TcpStream, version: RespVersion) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(8 * 1024),
            version,
        }
    }

    /// Switch the decoder, e.g. right after sending `HELLO 3`.
    pub fn set_version(&mut self, v: RespVersion) {
        self.version = v;
    }

    /// Read exactly one RESP frame from the stream.
    ///
    /// Returns `Ok(None)` on clean EOF.
    pub async fn read_frame(&mut self) -> Result<Option<(Frame, Bytes)>> {
        loop {
            let decoded = match self.version {
                RespVersion::Resp2 => {
                    match redis_protocol::resp2::decode::decode_bytes_mut(&mut self.buf) {
                        Ok(Some((frame, _amt, out))) => Some((Frame::Resp2(frame), out)),
                        Ok(None) => None,
                        Err(e) => return Err(Error::Protocol(format!("RESP2 decode error: {e}"))),
                    }
                }
                RespVersion::Resp3 => {
                    match redis_protocol::resp3::decode::complete::decode_bytes_mut(&mut self.buf) {
                        Ok(Some((frame, _amt, out))) => Some((Frame::Resp3(frame), out)),
                        Ok(None) => None,
                        Err(e) => return Err(Error::Protocol(format!("RESP3 decode error: {e}"))),
                    }
                }
            };

            if let Some((frame, raw)) = decoded {
                return Ok(Some((frame, raw)));
            }

            let n = self.stream.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }
        }
    }

    /// Read the next reply, skipping out-of-band push frames.
    ///
    /// EOF before a reply is [`Error::ConnectionClosed`] naming `peer`.
    pub async fn read_reply(&mut self, peer: &str) -> Result<Frame> {
        loop {
            let Some((frame, _raw)) = self.read_frame().await? else {
                return Err(Error::ConnectionClosed(peer.to_string()));
            };

            if frame.is_push() {
                tracing::debug!(peer, "skipping push frame");
                continue;
            }

            return Ok(frame);
        }
    }

    pub async fn send_command(&mut self, parts: &[&str]) -> Result<()> {
        self.write_all(&encode_command_str(parts)).await
    }

    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Encode a Redis command as a RESP Array of Bulk/Blob Strings.
///
/// Redis expects requests in this form for both RESP2 and RESP3.
pub fn encode_command(parts: &[Bytes]) -> BytesMut {
    let mut out = BytesMut::new();
    out.extend_from_slice(format!("*{}\r\n", parts.len()).as_bytes());
    for p in parts {
        out.extend_from_slice(format!("${}\r\n", p.len()).as_bytes());
        out.extend_from_slice(p);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Convenience helper for encoding ASCII command parts.
pub fn encode_command_str(parts: &[&str]) -> BytesMut {
    let b: Vec<Bytes> = parts
        .iter()
        .map(|s| Bytes::copy_from_slice(s.as_bytes()))
        .collect();
    encode_command(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_bulk_array() {
        let out = encode_command_str(&["HGET", "k", "data"]);
        assert_eq!(&out[..], b"*3\r\n$4\r\nHGET\r\n$1\r\nk\r\n$4\r\ndata\r\n");
    }

    #[test]
    fn converts_resp2_replies() {
        let frame = Frame::Resp2(Resp2Frame::Array(vec![
            Resp2Frame::BulkString(Bytes::from_static(b"v")),
            Resp2Frame::Null,
            Resp2Frame::Integer(3),
        ]));
        assert_eq!(
            frame.into_result().unwrap(),
            RedisResult::Array(vec![
                RedisResult::Bulk(Bytes::from_static(b"v")),
                RedisResult::Nil,
                RedisResult::Integer(3),
            ])
        );
        assert!(!Frame::Resp2(Resp2Frame::Null).is_error());
    }
}
