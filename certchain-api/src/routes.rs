//! API route configuration.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // JSON-RPC for wallets and the CLI
        .route("/rpc", post(handlers::json_rpc))

        // Contract
        .route("/api/v1/contract", get(handlers::contract_info))
        .route("/api/v1/contract/gas-limit", put(handlers::set_gas_limit))

        // Certificates
        .route("/api/v1/certificates", post(handlers::issue_certificate))
        .route("/api/v1/certificates/:id", get(handlers::get_certificate))
        .route("/api/v1/certificates/:id/verify", get(handlers::verify_certificate))
        .route("/api/v1/certificates/:id/revoke", post(handlers::revoke_certificate))
        .route("/api/v1/certificates/:id/transfer", post(handlers::transfer_certificate))
        .route("/api/v1/certificates/:id/metadata", get(handlers::certificate_metadata))

        // Events
        .route("/api/v1/events", get(handlers::list_events))

        // IPFS
        .route("/api/v1/ipfs/metadata", post(handlers::pin_certificate_metadata))

        .with_state(state)
}
