//! TCP server exposing a coordination store
//!
//! Each accepted connection is served on its own task as a request/response
//! stream of length-prefixed bincode frames, so a blocking pop on one role's
//! connection never stalls another role.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use shared::{read_frame, write_frame, CoordinationStore, SharedResult, StoreRequest, StoreResponse};

/// Serves any `CoordinationStore` to remote role processes
pub struct StoreServer<S: CoordinationStore + 'static> {
    store: Arc<S>,
    listener: TcpListener,
}

impl<S: CoordinationStore + 'static> StoreServer<S> {
    /// Bind the listening socket
    pub async fn bind(store: Arc<S>, bind_addr: SocketAddr) -> SharedResult<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { store, listener })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SharedResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails
    pub async fn serve(self) -> SharedResult<()> {
        info!("🗄️  Store listening on {}", self.listener.local_addr()?);
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let store = self.store.clone();
            tokio::spawn(async move {
                debug!("Connection from {}", peer);
                if let Err(e) = serve_connection(store, stream).await {
                    warn!("Connection from {} closed with error: {}", peer, e);
                }
            });
        }
    }
}

async fn serve_connection<S: CoordinationStore>(store: Arc<S>, mut stream: TcpStream) -> SharedResult<()> {
    stream.set_nodelay(true)?;
    while let Some(request) = read_frame::<_, StoreRequest>(&mut stream).await? {
        let response = apply(store.as_ref(), request).await;
        write_frame(&mut stream, &response).await?;
    }
    Ok(())
}

/// Execute one request against the store, folding failures into the response
pub async fn apply<S: CoordinationStore + ?Sized>(store: &S, request: StoreRequest) -> StoreResponse {
    let result = match request {
        StoreRequest::HGet { hash, field } => store.hget(&hash, &field).await.map(StoreResponse::Value),
        StoreRequest::HSet { hash, field, value } => {
            store.hset(&hash, &field, &value).await.map(|_| StoreResponse::Done)
        }
        StoreRequest::HSetNx { hash, field, value } => {
            store.hsetnx(&hash, &field, &value).await.map(StoreResponse::Flag)
        }
        StoreRequest::HDel { hash, field } => store.hdel(&hash, &field).await.map(StoreResponse::Flag),
        StoreRequest::HDelIf { hash, field, expected } => {
            store.hdel_if(&hash, &field, &expected).await.map(StoreResponse::Flag)
        }
        StoreRequest::HKeys { hash } => store.hkeys(&hash).await.map(StoreResponse::Keys),
        StoreRequest::HMGet { hash, fields } => store.hmget(&hash, &fields).await.map(StoreResponse::Values),
        StoreRequest::HIncrBy { hash, field, by } => {
            store.hincrby(&hash, &field, by).await.map(StoreResponse::Integer)
        }
        StoreRequest::LPush { list, value } => store.lpush(&list, &value).await.map(StoreResponse::Length),
        StoreRequest::RPush { list, value } => store.rpush(&list, &value).await.map(StoreResponse::Length),
        StoreRequest::RPop { list } => store.rpop(&list).await.map(StoreResponse::Value),
        StoreRequest::BRPop { list, timeout_ms } => store
            .brpop(&list, Duration::from_millis(timeout_ms))
            .await
            .map(StoreResponse::Value),
        StoreRequest::LLen { list } => store.llen(&list).await.map(StoreResponse::Length),
        StoreRequest::PeekTail { list } => store.peek_tail(&list).await.map(StoreResponse::Value),
        StoreRequest::ListKeys { prefix } => store.list_keys(&prefix).await.map(StoreResponse::Keys),
        StoreRequest::LLenMany { lists } => store.llen_many(&lists).await.map(StoreResponse::Lengths),
    };
    result.unwrap_or_else(|e| StoreResponse::Failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[tokio::test]
    async fn test_apply_maps_operations_to_responses() {
        let store = MemoryStore::new();

        let pushed = apply(
            &store,
            StoreRequest::LPush {
                list: "q".to_string(),
                value: "m".to_string(),
            },
        )
        .await;
        assert_eq!(pushed, StoreResponse::Length(1));

        let popped = apply(
            &store,
            StoreRequest::BRPop {
                list: "q".to_string(),
                timeout_ms: 10,
            },
        )
        .await;
        assert_eq!(popped, StoreResponse::Value(Some("m".to_string())));
    }

    #[tokio::test]
    async fn test_apply_reports_store_failures() {
        let store = MemoryStore::new();
        store.hset("counts", "router", "lots").await.unwrap();

        let response = apply(
            &store,
            StoreRequest::HIncrBy {
                hash: "counts".to_string(),
                field: "router".to_string(),
                by: 1,
            },
        )
        .await;
        assert!(matches!(response, StoreResponse::Failed(_)));
    }

    #[tokio::test]
    async fn test_server_answers_over_tcp() {
        let store = Arc::new(MemoryStore::new());
        let server = StoreServer::bind(store.clone(), "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.serve());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(
            &mut stream,
            &StoreRequest::HSetNx {
                hash: "processes".to_string(),
                field: "router".to_string(),
                value: "host,1".to_string(),
            },
        )
        .await
        .unwrap();
        let response: Option<StoreResponse> = read_frame(&mut stream).await.unwrap();
        assert_eq!(response, Some(StoreResponse::Flag(true)));
        assert_eq!(
            store.hget("processes", "router").await.unwrap().as_deref(),
            Some("host,1")
        );
    }
}
