//! Transaction requests and receipts in JSON-RPC shape.

use serde::{Deserialize, Serialize};

use crate::types::hexutil;
use crate::types::{Address, RawLog, TxHash};

/// Parameters of `eth_sendTransaction`, `eth_call` and `eth_estimateGas`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Sender (required for transactions, optional for calls)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Target contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Calldata
    #[serde(default, alias = "input", with = "hexutil::bytes")]
    pub data: Vec<u8>,
    /// Gas supplied
    #[serde(default, with = "hexutil::quantity_opt", skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
}

impl TransactionRequest {
    /// A request calling `to` with `data`.
    pub fn new(to: Address, data: Vec<u8>) -> Self {
        Self {
            from: None,
            to: Some(to),
            data,
            gas: None,
        }
    }

    /// Sets the sender.
    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    /// Sets the gas supplied.
    pub fn gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }
}

/// Receipt of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// Transaction hash
    pub transaction_hash: TxHash,
    /// Block the transaction was mined in
    #[serde(with = "hexutil::quantity")]
    pub block_number: u64,
    /// Sender
    pub from: Address,
    /// Target contract
    #[serde(default)]
    pub to: Option<Address>,
    /// Gas consumed, intrinsic cost included
    #[serde(with = "hexutil::quantity")]
    pub gas_used: u64,
    /// `1` on success, `0` on failure
    #[serde(with = "hexutil::quantity")]
    pub status: u64,
    /// Logs emitted
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

impl TransactionReceipt {
    /// True if the transaction succeeded.
    pub fn is_success(&self) -> bool {
        self.status == 1
    }
}
