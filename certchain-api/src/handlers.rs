//! API route handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{debug, info};

use certchain_core::calls::{self, RegistryCall};
use certchain_core::constants::{RPC_INVALID_REQUEST, RPC_PARSE_ERROR};
use certchain_core::types::{
    CertificateId, CertificateMetadata, ContractEvent, RpcErrorObject, RpcRequest, RpcResponse,
    TransactionRequest,
};
use certchain_ipfs::{fetch_metadata, parse_ipfs_uri, pin_metadata};

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// Sends `call` to the registry, persists the chain and decodes the events.
async fn submit(state: &AppState, call: RegistryCall, opts: &TxOptions) -> Result<TxResponse> {
    let chain = state.chain();
    let from = opts.from.unwrap_or_else(|| chain.owner());
    let mut tx = TransactionRequest::new(chain.registry_address(), call.encode()).from(from);
    tx.gas = opts.gas;

    let receipt = chain.send_transaction(tx)?;
    state.persist().await;

    let events = receipt
        .logs
        .iter()
        .map(ContractEvent::from_log)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(TxResponse::new(&receipt, events))
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let chain = state.chain();
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: state.uptime_seconds(),
        chain_id: chain.chain_id(),
        block_number: chain.block_number(),
        certificate_count: chain.certificate_count(),
        ipfs_enabled: state.pinning.is_some(),
    })
}

/// POST /rpc
///
/// JSON-RPC 2.0, single or batch. Malformed bodies and empty batches get a
/// JSON-RPC error object, not an HTTP error.
pub async fn json_rpc(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            return Json(RpcResponse::failure(
                Value::Null,
                RpcErrorObject::new(RPC_PARSE_ERROR, format!("parse error: {}", e)),
            ))
            .into_response()
        }
    };
    if matches!(&body, Value::Array(batch) if batch.is_empty()) {
        return Json(RpcResponse::failure(
            Value::Null,
            RpcErrorObject::new(RPC_INVALID_REQUEST, "empty batch"),
        ))
        .into_response();
    }

    let mut mined = false;
    let mut handle = |value: Value| {
        let request: RpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return RpcResponse::failure(
                    Value::Null,
                    RpcErrorObject::new(RPC_INVALID_REQUEST, format!("invalid request: {}", e)),
                )
            }
        };
        let is_tx = request.method == "eth_sendTransaction";
        let response = state.node.handle(request);
        mined |= is_tx && response.error.is_none();
        response
    };

    let response = match body {
        Value::Array(batch) => {
            let responses: Vec<RpcResponse> = batch.into_iter().map(&mut handle).collect();
            Json(responses).into_response()
        }
        single => Json(handle(single)).into_response(),
    };

    if mined {
        state.persist().await;
    }
    response
}

/// GET /api/v1/contract
pub async fn contract_info(State(state): State<Arc<AppState>>) -> Json<ContractInfoResponse> {
    let chain = state.chain();
    Json(ContractInfoResponse {
        address: chain.registry_address(),
        owner: chain.owner(),
        gas_limit: chain.gas_limit(),
        certificate_count: chain.certificate_count(),
        chain_id: chain.chain_id(),
        block_number: chain.block_number(),
    })
}

/// PUT /api/v1/contract/gas-limit
pub async fn set_gas_limit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetGasLimitRequest>,
) -> Result<Json<TxResponse>> {
    let response = submit(&state, RegistryCall::SetGasLimit { limit: req.gas_limit }, &req.tx).await?;
    info!(gas_limit = req.gas_limit, "Gas limit updated");
    Ok(Json(response))
}

/// POST /api/v1/certificates
pub async fn issue_certificate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IssueCertificateRequest>,
) -> Result<Json<IssueCertificateResponse>> {
    let call = match req.metadata_uri {
        Some(metadata_uri) => RegistryCall::IssueCertificateWithMetadata {
            recipient_name: req.recipient_name,
            metadata_uri,
        },
        None => RegistryCall::IssueCertificate {
            recipient_name: req.recipient_name,
        },
    };

    let tx = submit(&state, call, &req.tx).await?;
    let id = tx
        .events
        .iter()
        .find_map(ContractEvent::certificate_id)
        .ok_or_else(|| ApiError::internal("issue emitted no event"))?;

    info!(id, tx = %tx.tx_hash, "Certificate issued");
    Ok(Json(IssueCertificateResponse { id, tx }))
}

/// GET /api/v1/certificates/:id
pub async fn get_certificate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<CertificateId>,
) -> Result<Json<CertificateResponse>> {
    let cert = state.chain().certificate(id)?;
    Ok(Json(cert.into()))
}

/// GET /api/v1/certificates/:id/verify
///
/// Read-only: runs the verification as a call, so nothing is recorded.
pub async fn verify_certificate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<CertificateId>,
) -> Result<Json<VerifyResponse>> {
    let chain = state.chain();
    let tx = TransactionRequest::new(
        chain.registry_address(),
        RegistryCall::VerifyCertificate { id }.encode(),
    );
    let is_valid = calls::decode_bool(&chain.call(&tx)?)?;
    debug!(id, is_valid, "Certificate checked");
    Ok(Json(VerifyResponse { id, is_valid }))
}

/// POST /api/v1/certificates/:id/revoke
pub async fn revoke_certificate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<CertificateId>,
    body: Option<Json<TxOnlyRequest>>,
) -> Result<Json<TxResponse>> {
    let opts = body.map(|Json(req)| req.tx).unwrap_or_default();
    let response = submit(&state, RegistryCall::RevokeCertificate { id }, &opts).await?;
    info!(id, "Certificate revoked");
    Ok(Json(response))
}

/// POST /api/v1/certificates/:id/transfer
pub async fn transfer_certificate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<CertificateId>,
    Json(req): Json<TransferCertificateRequest>,
) -> Result<Json<TxResponse>> {
    let call = RegistryCall::TransferCertificate {
        id,
        new_recipient_name: req.new_recipient_name,
    };
    Ok(Json(submit(&state, call, &req.tx).await?))
}

/// GET /api/v1/certificates/:id/metadata
pub async fn certificate_metadata(
    State(state): State<Arc<AppState>>,
    Path(id): Path<CertificateId>,
) -> Result<Json<CertificateMetadata>> {
    let pinning = state
        .pinning
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("IPFS pinning is not configured"))?;
    let uri = state
        .chain()
        .certificate(id)?
        .metadata_uri
        .ok_or_else(|| ApiError::not_found(format!("Certificate {} has no metadata", id)))?;
    Ok(Json(fetch_metadata(pinning.as_ref(), &uri).await?))
}

/// GET /api/v1/events?from_block=
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse>> {
    let chain = state.chain();
    Ok(Json(EventsResponse {
        events: chain.events(query.from_block)?,
        latest_block: chain.block_number(),
    }))
}

/// POST /api/v1/ipfs/metadata
pub async fn pin_certificate_metadata(
    State(state): State<Arc<AppState>>,
    Json(metadata): Json<PinMetadataRequest>,
) -> Result<Json<PinMetadataResponse>> {
    let pinning = state
        .pinning
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("IPFS pinning is not configured"))?;

    let uri = pin_metadata(pinning.as_ref(), &metadata).await?;
    let cid = parse_ipfs_uri(&uri)?;
    info!(%cid, "Metadata pinned");
    Ok(Json(PinMetadataResponse { cid, uri }))
}
