//! # CertChain Registry
//!
//! The certificate registry contract and the chain it runs on.
//!
//! - **Contract**: the certificate state machine with owner checks and the
//!   gas-threshold guard
//! - **Gas**: a small gas schedule and meter
//! - **Chain**: transaction ordering, atomicity, receipts and logs
//! - **File**: snapshot persistence across restarts
//! - **Node**: a JSON-RPC endpoint that also plays the user's wallet
//!
//! ## Example
//!
//! ```rust
//! use certchain_registry::LocalChain;
//! use certchain_core::{RegistryCall, TransactionRequest};
//!
//! let chain = LocalChain::dev().unwrap();
//! let tx = TransactionRequest::new(
//!     chain.registry_address(),
//!     RegistryCall::IssueCertificate { recipient_name: "Ada".into() }.encode(),
//! )
//! .from(chain.accounts()[0]);
//!
//! let receipt = chain.send_transaction(tx).unwrap();
//! assert!(receipt.is_success());
//! assert_eq!(chain.certificate(1).unwrap().recipient_name, "Ada");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod chain;
mod contract;
mod file;
pub mod gas;
mod node;

pub use chain::{ChainConfig, ChainSnapshot, LocalChain, SharedChain};
pub use contract::{CertificateRegistry, ExecutionContext};
pub use file::ChainStore;
pub use gas::GasMeter;
pub use node::DevNode;
