//! # CertChain Core
//!
//! Core types, errors, and traits shared by every CertChain crate.
//!
//! - **Types**: certificates, addresses, transactions, receipts and events
//! - **ABI**: Solidity ABI encoding for the registry interface
//! - **Errors**: one error hierarchy covering contract reverts, wallet
//!   providers, IPFS and storage
//! - **Constants**: gas schedule, chain ids and registry limits
//! - **Traits**: the wallet provider and pinning service seams
//!
//! ## Example
//!
//! ```rust
//! use certchain_core::{RegistryCall, CertchainError};
//!
//! let calldata = RegistryCall::VerifyCertificate { id: 7 }.encode();
//! let decoded = RegistryCall::decode(&calldata).unwrap();
//! assert_eq!(decoded, RegistryCall::VerifyCertificate { id: 7 });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod abi;
pub mod calls;
pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use calls::RegistryCall;
pub use constants::*;
pub use error::{CertchainError, Result};
pub use traits::*;
pub use types::*;
