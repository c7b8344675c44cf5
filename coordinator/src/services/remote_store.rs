//! TCP client for a remote coordination store
//!
//! One connection per role process. Requests are serialized over it, so a
//! blocking pop holds the connection until it returns.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use shared::{read_frame, write_frame, CoordinationStore, SharedError, SharedResult, StoreRequest, StoreResponse};

pub struct RemoteStore {
    addr: String,
    conn: Mutex<Connection>,
}

struct Connection {
    stream: TcpStream,
    /// A request went out without its response being read
    in_flight: bool,
}

async fn open(addr: &str) -> SharedResult<TcpStream> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| SharedError::store(format!("Connect failed to {addr}: {e}")))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

impl RemoteStore {
    pub async fn connect(addr: &str) -> SharedResult<Self> {
        let stream = open(addr).await?;
        Ok(Self {
            addr: addr.to_string(),
            conn: Mutex::new(Connection { stream, in_flight: false }),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn call(&self, request: StoreRequest) -> SharedResult<StoreResponse> {
        let mut conn = self.conn.lock().await;
        // A dropped call leaves its response on the old stream
        if conn.in_flight {
            tracing::warn!("🔌 Reconnecting to store at {} after an interrupted call", self.addr);
            conn.stream = open(&self.addr).await?;
            conn.in_flight = false;
        }

        conn.in_flight = true;
        write_frame(&mut conn.stream, &request).await?;
        let response = read_frame(&mut conn.stream)
            .await?
            .ok_or_else(|| SharedError::store(format!("Store at {} closed the connection", self.addr)))?;
        conn.in_flight = false;
        Ok(response)
    }
}

#[async_trait]
impl CoordinationStore for RemoteStore {
    async fn hget(&self, hash: &str, field: &str) -> SharedResult<Option<String>> {
        self.call(StoreRequest::HGet {
            hash: hash.to_string(),
            field: field.to_string(),
        })
        .await?
        .into_value()
    }

    async fn hset(&self, hash: &str, field: &str, value: &str) -> SharedResult<()> {
        self.call(StoreRequest::HSet {
            hash: hash.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })
        .await?
        .into_done()
    }

    async fn hsetnx(&self, hash: &str, field: &str, value: &str) -> SharedResult<bool> {
        self.call(StoreRequest::HSetNx {
            hash: hash.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })
        .await?
        .into_flag()
    }

    async fn hdel(&self, hash: &str, field: &str) -> SharedResult<bool> {
        self.call(StoreRequest::HDel {
            hash: hash.to_string(),
            field: field.to_string(),
        })
        .await?
        .into_flag()
    }

    async fn hdel_if(&self, hash: &str, field: &str, expected: &str) -> SharedResult<bool> {
        self.call(StoreRequest::HDelIf {
            hash: hash.to_string(),
            field: field.to_string(),
            expected: expected.to_string(),
        })
        .await?
        .into_flag()
    }

    async fn hkeys(&self, hash: &str) -> SharedResult<Vec<String>> {
        self.call(StoreRequest::HKeys { hash: hash.to_string() })
            .await?
            .into_keys()
    }

    async fn hmget(&self, hash: &str, fields: &[String]) -> SharedResult<Vec<Option<String>>> {
        self.call(StoreRequest::HMGet {
            hash: hash.to_string(),
            fields: fields.to_vec(),
        })
        .await?
        .into_values()
    }

    async fn hincrby(&self, hash: &str, field: &str, by: i64) -> SharedResult<i64> {
        self.call(StoreRequest::HIncrBy {
            hash: hash.to_string(),
            field: field.to_string(),
            by,
        })
        .await?
        .into_integer()
    }

    async fn lpush(&self, list: &str, value: &str) -> SharedResult<usize> {
        self.call(StoreRequest::LPush {
            list: list.to_string(),
            value: value.to_string(),
        })
        .await?
        .into_length()
    }

    async fn rpush(&self, list: &str, value: &str) -> SharedResult<usize> {
        self.call(StoreRequest::RPush {
            list: list.to_string(),
            value: value.to_string(),
        })
        .await?
        .into_length()
    }

    async fn rpop(&self, list: &str) -> SharedResult<Option<String>> {
        self.call(StoreRequest::RPop { list: list.to_string() })
            .await?
            .into_value()
    }

    async fn brpop(&self, list: &str, timeout: Duration) -> SharedResult<Option<String>> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.call(StoreRequest::BRPop {
            list: list.to_string(),
            timeout_ms,
        })
        .await?
        .into_value()
    }

    async fn llen(&self, list: &str) -> SharedResult<usize> {
        self.call(StoreRequest::LLen { list: list.to_string() })
            .await?
            .into_length()
    }

    async fn peek_tail(&self, list: &str) -> SharedResult<Option<String>> {
        self.call(StoreRequest::PeekTail { list: list.to_string() })
            .await?
            .into_value()
    }

    async fn list_keys(&self, prefix: &str) -> SharedResult<Vec<String>> {
        self.call(StoreRequest::ListKeys {
            prefix: prefix.to_string(),
        })
        .await?
        .into_keys()
    }

    async fn llen_many(&self, lists: &[String]) -> SharedResult<Vec<usize>> {
        self.call(StoreRequest::LLenMany { lists: lists.to_vec() })
            .await?
            .into_lengths()
    }
}
