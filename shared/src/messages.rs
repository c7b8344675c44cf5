//! Store wire protocol
//!
//! Requests and responses exchanged between `RemoteStore` clients and the
//! store server. Each message travels as a big-endian `u32` length prefix
//! followed by its bincode encoding.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::{SharedError, SharedResult};

/// Frames larger than this are rejected as corrupt
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// One store operation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum StoreRequest {
    HGet { hash: String, field: String },
    HSet { hash: String, field: String, value: String },
    HSetNx { hash: String, field: String, value: String },
    HDel { hash: String, field: String },
    HDelIf { hash: String, field: String, expected: String },
    HKeys { hash: String },
    HMGet { hash: String, fields: Vec<String> },
    HIncrBy { hash: String, field: String, by: i64 },
    LPush { list: String, value: String },
    RPush { list: String, value: String },
    RPop { list: String },
    BRPop { list: String, timeout_ms: u64 },
    LLen { list: String },
    PeekTail { list: String },
    ListKeys { prefix: String },
    LLenMany { lists: Vec<String> },
}

/// Result of one store operation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum StoreResponse {
    Done,
    Flag(bool),
    Integer(i64),
    Length(usize),
    Value(Option<String>),
    Values(Vec<Option<String>>),
    Keys(Vec<String>),
    Lengths(Vec<usize>),
    Failed(String),
}

impl StoreResponse {
    fn mismatch(self, expected: &str) -> SharedError {
        match self {
            StoreResponse::Failed(message) => SharedError::store(message),
            other => SharedError::protocol(format!("expected {expected} response, got {other:?}")),
        }
    }

    pub fn into_done(self) -> SharedResult<()> {
        match self {
            StoreResponse::Done => Ok(()),
            other => Err(other.mismatch("done")),
        }
    }

    pub fn into_flag(self) -> SharedResult<bool> {
        match self {
            StoreResponse::Flag(flag) => Ok(flag),
            other => Err(other.mismatch("flag")),
        }
    }

    pub fn into_integer(self) -> SharedResult<i64> {
        match self {
            StoreResponse::Integer(value) => Ok(value),
            other => Err(other.mismatch("integer")),
        }
    }

    pub fn into_length(self) -> SharedResult<usize> {
        match self {
            StoreResponse::Length(len) => Ok(len),
            other => Err(other.mismatch("length")),
        }
    }

    pub fn into_value(self) -> SharedResult<Option<String>> {
        match self {
            StoreResponse::Value(value) => Ok(value),
            other => Err(other.mismatch("value")),
        }
    }

    pub fn into_values(self) -> SharedResult<Vec<Option<String>>> {
        match self {
            StoreResponse::Values(values) => Ok(values),
            other => Err(other.mismatch("values")),
        }
    }

    pub fn into_keys(self) -> SharedResult<Vec<String>> {
        match self {
            StoreResponse::Keys(keys) => Ok(keys),
            other => Err(other.mismatch("keys")),
        }
    }

    pub fn into_lengths(self) -> SharedResult<Vec<usize>> {
        match self {
            StoreResponse::Lengths(lens) => Ok(lens),
            other => Err(other.mismatch("lengths")),
        }
    }
}

/// Write one length-prefixed bincode frame
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> SharedResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = bincode::serialize(message).map_err(|e| SharedError::SerializationError {
        message: format!("Serialize failed: {e}"),
    })?;
    let len = u32::try_from(data.len())
        .map_err(|_| SharedError::protocol(format!("frame of {} bytes is too large", data.len())))?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed bincode frame; `None` on a clean end of stream
pub async fn read_frame<R, T>(reader: &mut R) -> SharedResult<Option<T>>
where
    R: AsyncRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    // Only a close before the first header byte is a clean end of stream
    let mut len_bytes = [0u8; 4];
    if reader.read(&mut len_bytes[..1]).await? == 0 {
        return Ok(None);
    }
    match reader.read_exact(&mut len_bytes[1..]).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(SharedError::protocol("stream closed inside a frame header"));
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(SharedError::protocol(format!("frame length {len} exceeds limit")));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;

    bincode::deserialize(&data)
        .map(Some)
        .map_err(|e| SharedError::SerializationError {
            message: format!("Deserialize failed: {e}"),
        })
}
