//! Protocol constants for CertChain.
//!
//! The gas schedule mirrors the EVM costs that dominate the registry
//! contract (intrinsic cost, storage reads/writes, logs). Values here are
//! consensus-relevant for the local chain: changing them changes receipts.

// ═══════════════════════════════════════════════════════════════════════════════
// GAS SCHEDULE
// ═══════════════════════════════════════════════════════════════════════════════

/// Intrinsic cost of every transaction.
pub const GAS_TX_BASE: u64 = 21_000;

/// Calldata cost per zero byte.
pub const GAS_CALLDATA_ZERO_BYTE: u64 = 4;

/// Calldata cost per non-zero byte.
pub const GAS_CALLDATA_NONZERO_BYTE: u64 = 16;

/// Cold storage read.
pub const GAS_SLOAD: u64 = 2_100;

/// Writing a previously empty storage slot.
pub const GAS_SSTORE_SET: u64 = 20_000;

/// Overwriting an existing storage slot.
pub const GAS_SSTORE_RESET: u64 = 5_000;

/// Extra cost per 32-byte word of string data written to storage.
pub const GAS_STRING_WORD: u64 = 5_000;

/// Base cost of emitting a log.
pub const GAS_LOG: u64 = 375;

/// Cost per log topic.
pub const GAS_LOG_TOPIC: u64 = 375;

/// Cost per byte of log data.
pub const GAS_LOG_DATA_BYTE: u64 = 8;

/// Upper bound on gas a single transaction may supply.
pub const BLOCK_GAS_LIMIT: u64 = 30_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default minimum remaining gas the registry requires before a guarded call.
pub const DEFAULT_GAS_LIMIT: u64 = 50_000;

/// Gas a client supplies to registry transactions unless configured otherwise.
pub const DEFAULT_TX_GAS: u64 = 300_000;

/// Maximum length of a recipient name in bytes.
pub const MAX_RECIPIENT_NAME_LEN: usize = 256;

/// Maximum length of a metadata URI in bytes.
pub const MAX_METADATA_URI_LEN: usize = 512;

/// First certificate id handed out by a fresh registry.
pub const FIRST_CERTIFICATE_ID: u64 = 1;

// ═══════════════════════════════════════════════════════════════════════════════
// CHAINS
// ═══════════════════════════════════════════════════════════════════════════════

/// Chain id of the local development chain (Hardhat/Anvil convention).
pub const LOCAL_CHAIN_ID: u64 = 31_337;

/// Ethereum mainnet.
pub const MAINNET_CHAIN_ID: u64 = 1;

/// Sepolia testnet.
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Polygon Amoy testnet.
pub const AMOY_CHAIN_ID: u64 = 80_002;

/// Default JSON-RPC endpoint of a local node.
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:8545";

/// Number of pre-funded accounts on the local chain.
pub const DEV_ACCOUNT_COUNT: usize = 10;

// ═══════════════════════════════════════════════════════════════════════════════
// ABI
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of an ABI word.
pub const ABI_WORD_SIZE: usize = 32;

/// Size of a function selector.
pub const SELECTOR_SIZE: usize = 4;

/// Selector of Solidity's `Error(string)` revert payload.
pub const REVERT_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Size of an account address in bytes.
pub const ADDRESS_SIZE: usize = 20;

/// Size of a transaction hash in bytes.
pub const HASH_SIZE: usize = 32;

// ═══════════════════════════════════════════════════════════════════════════════
// EIP-1193 PROVIDER ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

/// The user rejected the request.
pub const RPC_USER_REJECTED: i64 = 4001;

/// The requested account or method has not been authorized.
pub const RPC_UNAUTHORIZED: i64 = 4100;

/// The provider is not connected to the requested chain.
pub const RPC_CHAIN_DISCONNECTED: i64 = 4901;

/// The wallet does not know the requested chain.
pub const RPC_UNRECOGNIZED_CHAIN: i64 = 4902;

/// Execution reverted (geth convention).
pub const RPC_EXECUTION_REVERTED: i64 = 3;

/// A request of the same kind is already pending in the wallet.
pub const RPC_REQUEST_PENDING: i64 = -32002;

/// Generic server error used by several nodes for reverts.
pub const RPC_SERVER_ERROR: i64 = -32000;

/// The request body is not valid JSON.
pub const RPC_PARSE_ERROR: i64 = -32700;

/// Invalid request object.
pub const RPC_INVALID_REQUEST: i64 = -32600;

/// Method not found.
pub const RPC_METHOD_NOT_FOUND: i64 = -32601;

/// Invalid method parameters.
pub const RPC_INVALID_PARAMS: i64 = -32602;

/// Internal JSON-RPC error.
pub const RPC_INTERNAL_ERROR: i64 = -32603;

// ═══════════════════════════════════════════════════════════════════════════════
// IPFS
// ═══════════════════════════════════════════════════════════════════════════════

/// URI scheme used to reference pinned metadata from certificates.
pub const IPFS_URI_SCHEME: &str = "ipfs://";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_gas_limit_fits_in_default_tx_gas() {
        // A default transaction must be able to pass the default guard.
        assert!(GAS_TX_BASE + DEFAULT_GAS_LIMIT < DEFAULT_TX_GAS);
        assert!(DEFAULT_TX_GAS < BLOCK_GAS_LIMIT);
    }

    #[test]
    fn test_chain_ids_unique() {
        let ids = [LOCAL_CHAIN_ID, MAINNET_CHAIN_ID, SEPOLIA_CHAIN_ID, AMOY_CHAIN_ID];
        for (i, a) in ids.iter().enumerate() {
            for (j, b) in ids.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }

    #[test]
    fn test_revert_selector_matches_error_string_signature() {
        use sha3::{Digest, Keccak256};
        let hash = Keccak256::digest(b"Error(string)");
        assert_eq!(&hash[..4], &REVERT_SELECTOR);
    }
}
