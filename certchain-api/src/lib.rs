//! # CertChain API Server
//!
//! Backend for the certificate dApp: a JSON-RPC endpoint wallets and the
//! CLI can point at, plus REST endpoints over the same chain.
//!
//! ## Endpoints
//!
//! - `GET /health` - Liveness and chain summary
//! - `POST /rpc` - Ethereum JSON-RPC (single or batch)
//! - `GET /api/v1/contract` - Registry overview
//! - `PUT /api/v1/contract/gas-limit` - Change the gas threshold
//! - `POST /api/v1/certificates` - Issue a certificate
//! - `GET /api/v1/certificates/:id` - Fetch a certificate
//! - `GET /api/v1/certificates/:id/verify` - Check validity
//! - `POST /api/v1/certificates/:id/revoke` - Revoke
//! - `POST /api/v1/certificates/:id/transfer` - Move to a new recipient
//! - `GET /api/v1/certificates/:id/metadata` - Pinned metadata
//! - `GET /api/v1/events` - Registry events
//! - `POST /api/v1/ipfs/metadata` - Pin certificate metadata
//!
//! ## Example
//!
//! ```rust,ignore
//! use certchain_api::{ApiConfig, ApiServer};
//!
//! let server = ApiServer::new(ApiConfig::from_env()?).await?;
//! server.run(([127, 0, 0, 1], 8545)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dto;
mod error;
mod handlers;
mod routes;
mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{ApiConfig, AppState};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use certchain_core::error::Result;

/// API server for CertChain.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Opens the chain described by `config`.
    pub async fn new(config: ApiConfig) -> Result<Self> {
        Ok(Self::with_state(AppState::open(config).await?))
    }

    /// Serves prepared state.
    pub fn with_state(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Shared state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Creates the router with all routes and layers configured.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(RequestBodyLimitLayer::new(self.state.config.body_limit))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address.
    pub async fn run(self, addr: impl Into<SocketAddr>) -> std::io::Result<()> {
        let addr = addr.into();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!(
            registry = %self.state.chain().registry_address(),
            "CertChain API server listening on {}", addr
        );

        axum::serve(listener, self.router()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use certchain_registry::ChainStore;

    #[tokio::test]
    async fn test_body_limit() {
        let config = ApiConfig {
            body_limit: 64,
            ..Default::default()
        };
        let server = ApiServer::new(config).await.unwrap();
        let body = format!(r#"{{"recipient_name":"{}"}}"#, "x".repeat(200));
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/certificates")
                    .header("content-type", "application/json")
                    .header("content-length", body.len())
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.bin");
        let config = ApiConfig {
            state_file: Some(path.clone()),
            ..Default::default()
        };

        let server = ApiServer::new(config.clone()).await.unwrap();
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/certificates")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"recipient_name":"Ada"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let snapshot = ChainStore::new(&path).load().await.unwrap().unwrap();
        assert_eq!(snapshot.block_number, 1);

        let restarted = ApiServer::new(config).await.unwrap();
        assert_eq!(restarted.state().chain().certificate_count(), 1);
    }
}
