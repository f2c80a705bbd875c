//! JSON-RPC 2.0 envelopes and the error object mapping.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::abi::encode_revert;
use crate::constants::{
    RPC_CHAIN_DISCONNECTED, RPC_EXECUTION_REVERTED, RPC_INTERNAL_ERROR, RPC_INVALID_PARAMS,
    RPC_REQUEST_PENDING, RPC_SERVER_ERROR, RPC_UNAUTHORIZED, RPC_UNRECOGNIZED_CHAIN,
    RPC_USER_REJECTED,
};
use crate::error::CertchainError;
use crate::types::hexutil;

/// A JSON-RPC request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Always `"2.0"`
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    /// Request id echoed in the response
    #[serde(default)]
    pub id: Value,
    /// Method name
    pub method: String,
    /// Positional parameters
    #[serde(default)]
    pub params: Value,
}

fn jsonrpc_version() -> String {
    "2.0".to_string()
}

impl RpcRequest {
    /// Creates a request.
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Value::from(id),
            method: method.into(),
            params,
        }
    }

    /// Positional parameter `index`, or `Value::Null`.
    pub fn param(&self, index: usize) -> &Value {
        self.params.get(index).unwrap_or(&Value::Null)
    }
}

/// A JSON-RPC error object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// Error code (EIP-1193 / EIP-1474)
    pub code: i64,
    /// Human-readable message
    pub message: String,
    /// Extra data; `0x`-hex revert payload for reverts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    /// Creates an error object without data.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Encodes a typed error the way an Ethereum node reports it.
    pub fn from_error(err: &CertchainError) -> Self {
        if let Some(reason) = err.revert_reason() {
            return Self {
                code: RPC_EXECUTION_REVERTED,
                message: format!("execution reverted: {}", reason),
                data: Some(Value::String(hexutil::encode_bytes(&encode_revert(&reason)))),
            };
        }

        let code = match err {
            CertchainError::UserRejected => RPC_USER_REJECTED,
            CertchainError::AccountNotAuthorized => RPC_UNAUTHORIZED,
            CertchainError::ChainDisconnected(_) => RPC_CHAIN_DISCONNECTED,
            CertchainError::UnrecognizedChain(_) => RPC_UNRECOGNIZED_CHAIN,
            CertchainError::RequestPending => RPC_REQUEST_PENDING,
            CertchainError::Provider { code, message } => return Self::new(*code, message.clone()),
            CertchainError::OutOfGas => return Self::new(RPC_SERVER_ERROR, "out of gas"),
            CertchainError::IntrinsicGasTooLow { supplied, required } => {
                return Self::new(
                    RPC_SERVER_ERROR,
                    format!("intrinsic gas too low: have {}, want {}", supplied, required),
                )
            }
            CertchainError::InsufficientFunds(_)
            | CertchainError::InvalidTransaction(_)
            | CertchainError::AbiDecode(_)
            | CertchainError::UnknownSelector(_) => RPC_SERVER_ERROR,
            CertchainError::ValidationError(_)
            | CertchainError::InvalidAddress(_)
            | CertchainError::JsonError(_)
            | CertchainError::HexError(_) => RPC_INVALID_PARAMS,
            _ => RPC_INTERNAL_ERROR,
        };

        let message = match err {
            CertchainError::ChainDisconnected(msg) | CertchainError::UnrecognizedChain(msg) => {
                msg.clone()
            }
            other => other.to_string(),
        };
        Self::new(code, message)
    }

    /// Decodes the error object back into a typed error.
    pub fn into_error(self) -> CertchainError {
        let data = self.data.as_ref().and_then(Value::as_str);
        CertchainError::from_rpc_error(self.code, &self.message, data)
    }
}

/// A JSON-RPC response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Always `"2.0"`
    pub jsonrpc: String,
    /// Id of the request this answers
    #[serde(default)]
    pub id: Value,
    /// Result on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    /// A success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// A failure response.
    pub fn failure(id: Value, error: RpcErrorObject) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Converts into the result value or a typed error.
    pub fn into_result(self) -> crate::error::Result<Value> {
        match (self.error, self.result) {
            (Some(error), _) => Err(error.into_error()),
            (None, Some(result)) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_survives_the_wire() {
        let original = CertchainError::CertificateNotFound(12);
        let obj = RpcErrorObject::from_error(&original);
        assert_eq!(obj.code, RPC_EXECUTION_REVERTED);
        assert!(obj.message.contains("certificate does not exist: 12"));

        let json = serde_json::to_string(&obj).unwrap();
        let back: RpcErrorObject = serde_json::from_str(&json).unwrap();
        assert!(matches!(back.into_error(), CertchainError::CertificateNotFound(12)));
    }

    #[test]
    fn test_wallet_errors_keep_their_codes() {
        let obj = RpcErrorObject::from_error(&CertchainError::UnrecognizedChain("0x13882".into()));
        assert_eq!(obj.code, RPC_UNRECOGNIZED_CHAIN);
        assert!(matches!(obj.into_error(), CertchainError::UnrecognizedChain(_)));

        let obj = RpcErrorObject::from_error(&CertchainError::UserRejected);
        assert_eq!(obj.code, RPC_USER_REJECTED);
        assert!(matches!(obj.into_error(), CertchainError::UserRejected));
    }

    #[test]
    fn test_intrinsic_gas_message_parses_back() {
        let obj = RpcErrorObject::from_error(&CertchainError::IntrinsicGasTooLow {
            supplied: 1000,
            required: 21_064,
        });
        match obj.into_error() {
            CertchainError::IntrinsicGasTooLow { supplied, required } => {
                assert_eq!(supplied, 1000);
                assert_eq!(required, 21_064);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_response_into_result() {
        let ok = RpcResponse::success(Value::from(1), Value::from("0x1"));
        assert_eq!(ok.into_result().unwrap(), Value::from("0x1"));

        let err = RpcResponse::failure(Value::from(1), RpcErrorObject::new(RPC_REQUEST_PENDING, "busy"));
        assert!(matches!(err.into_result(), Err(CertchainError::RequestPending)));
    }

    #[test]
    fn test_provider_error_keeps_code() {
        let obj = RpcErrorObject::from_error(&CertchainError::Provider {
            code: -32601,
            message: "the method eth_mine does not exist".into(),
        });
        assert_eq!(obj.code, -32601);
        assert!(matches!(obj.into_error(), CertchainError::Provider { code: -32601, .. }));
    }

    #[test]
    fn test_request_defaults() {
        let req: RpcRequest = serde_json::from_str(r#"{"method":"eth_chainId"}"#).unwrap();
        assert_eq!(req.jsonrpc, "2.0");
        assert!(req.param(0).is_null());
    }
}
