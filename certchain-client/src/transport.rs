//! JSON-RPC transports.
//!
//! A [`Transport`] moves one JSON-RPC request to a node and returns the
//! `result` value, or the typed error decoded from the `error` object.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use certchain_core::error::{CertchainError, Result};
use certchain_core::types::{RpcRequest, RpcResponse};
use certchain_registry::DevNode;

/// Sends JSON-RPC requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `method` with positional `params`.
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        (**self).request(method, params).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON-RPC over HTTP POST.
#[derive(Debug)]
pub struct HttpTransport {
    url: String,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Creates a transport for `url`.
    pub fn new(url: impl Into<String>, timeout_seconds: u64) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| CertchainError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, params), fields(url = %self.url))]
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);

        let response = self
            .http_client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CertchainError::ConnectionTimeout(e.to_string())
                } else {
                    CertchainError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CertchainError::HttpError(e.to_string()))?;

        // Some nodes answer JSON-RPC errors with a 4xx/5xx status
        match serde_json::from_str::<RpcResponse>(&body) {
            Ok(rpc) => {
                debug!(method, id, "RPC response");
                rpc.into_result()
            }
            Err(_) if !status.is_success() => Err(CertchainError::HttpError(format!(
                "RPC endpoint returned {}",
                status
            ))),
            Err(e) => Err(CertchainError::RpcError(format!("malformed response: {}", e))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-PROCESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Calls a [`DevNode`] directly.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    node: Arc<DevNode>,
    next_id: Arc<AtomicU64>,
}

impl LocalTransport {
    /// Wraps a dev node.
    pub fn new(node: Arc<DevNode>) -> Self {
        Self {
            node,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The node behind this transport.
    pub fn node(&self) -> &Arc<DevNode> {
        &self.node
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.node
            .handle(RpcRequest::new(id, method, params))
            .into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certchain_registry::LocalChain;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_chainId" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": "0xaa36a7"
            })))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), 5).unwrap();
        let result = transport.request("eth_chainId", json!([])).await.unwrap();
        assert_eq!(result, json!("0xaa36a7"));
    }

    #[tokio::test]
    async fn test_http_rpc_error_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "error": { "code": 4001, "message": "User rejected the request." }
            })))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), 5).unwrap();
        let err = transport.request("eth_requestAccounts", json!([])).await.unwrap_err();
        assert!(matches!(err, CertchainError::UserRejected));
    }

    #[tokio::test]
    async fn test_http_error_status_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), 5).unwrap();
        let err = transport.request("eth_chainId", json!([])).await.unwrap_err();
        assert!(matches!(err, CertchainError::HttpError(_)));
    }

    #[tokio::test]
    async fn test_local_transport() {
        let node = Arc::new(DevNode::new(Arc::new(LocalChain::dev().unwrap())));
        let transport = LocalTransport::new(node);
        assert_eq!(
            transport.request("eth_chainId", json!([])).await.unwrap(),
            json!("0x7a69")
        );
        let err = transport.request("eth_mine", json!([])).await.unwrap_err();
        assert!(matches!(err, CertchainError::Provider { code: -32601, .. }));
    }
}
