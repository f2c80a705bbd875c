//! API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use certchain_core::error::CertchainError;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
        }
    }

    /// HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// Caller may not perform the action.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message, "UNAUTHORIZED")
    }

    /// Not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// Conflicts with the certificate's state.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message, "CONFLICT")
    }

    /// Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, "VALIDATION_ERROR")
    }

    /// The contract reverted.
    pub fn reverted(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, "REVERTED")
    }

    /// A backing service is not configured.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message, "UNAVAILABLE")
    }

    /// Internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_ERROR")
    }
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<CertchainError> for ApiError {
    fn from(err: CertchainError) -> Self {
        match &err {
            CertchainError::Unauthorized | CertchainError::AccountNotAuthorized => {
                ApiError::forbidden(err.to_string())
            }
            CertchainError::CertificateNotFound(_) | CertchainError::TransactionNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            CertchainError::CertificateAlreadyRevoked(_) | CertchainError::CertificateNotValid(_) => {
                ApiError::conflict(err.to_string())
            }
            CertchainError::ValidationError(_)
            | CertchainError::InvalidRecipientName(_)
            | CertchainError::InvalidMetadataUri(_)
            | CertchainError::InvalidGasLimit(_)
            | CertchainError::InvalidOwner => ApiError::validation(err.to_string()),
            CertchainError::InsufficientGas { .. }
            | CertchainError::OutOfGas
            | CertchainError::IntrinsicGasTooLow { .. }
            | CertchainError::Reverted(_) => ApiError::reverted(err.to_string()),
            CertchainError::InvalidAddress(_)
            | CertchainError::InvalidTransaction(_)
            | CertchainError::InvalidIpfsCid(_)
            | CertchainError::AbiDecode(_)
            | CertchainError::UnknownSelector(_)
            | CertchainError::JsonError(_)
            | CertchainError::HexError(_) => ApiError::bad_request(err.to_string()),
            CertchainError::ConfigError(_) => ApiError::unavailable(err.to_string()),
            _ => {
                tracing::error!(error = %err, "Internal error");
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CertchainError::Unauthorized, StatusCode::FORBIDDEN),
            (CertchainError::CertificateNotFound(1), StatusCode::NOT_FOUND),
            (CertchainError::CertificateAlreadyRevoked(1), StatusCode::CONFLICT),
            (
                CertchainError::InvalidRecipientName("empty".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CertchainError::InsufficientGas { remaining: 1, required: 2 },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (CertchainError::InvalidAddress("0x".into()), StatusCode::BAD_REQUEST),
            (CertchainError::ConfigError("no jwt".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CertchainError::InternalError("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_internal_message_is_hidden() {
        let err = ApiError::from(CertchainError::StorageError("disk path /secret".into()));
        assert_eq!(err.message, "An internal error occurred");
    }
}
