//! Domain types for CertChain.
//!
//! - [`Address`] / [`TxHash`]: account addresses and transaction hashes
//! - [`Certificate`]: the on-chain record, plus [`CertificateMetadata`] for IPFS
//! - [`ContractEvent`]: typed registry events and their raw log form
//! - [`TransactionRequest`] / [`TransactionReceipt`]: JSON-RPC transaction shapes
//! - [`NetworkConfig`]: chains a wallet can be switched to
//! - [`RpcRequest`] / [`RpcResponse`]: JSON-RPC 2.0 envelopes

mod address;
mod certificate;
mod event;
pub mod hexutil;
mod network;
mod rpc;
mod transaction;

pub use address::*;
pub use certificate::*;
pub use event::*;
pub use network::*;
pub use rpc::*;
pub use transaction::*;
