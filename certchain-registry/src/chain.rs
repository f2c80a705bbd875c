//! A single-contract local chain.
//!
//! Provides what the registry relies on from a real chain: one global
//! transaction order, atomic execution, receipts and an append-only log.
//! Each successful transaction is mined into its own block; a reverted
//! transaction is not mined and leaves no trace.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use certchain_core::abi::keccak256;
use certchain_core::constants::{
    BLOCK_GAS_LIMIT, DEFAULT_GAS_LIMIT, DEFAULT_TX_GAS, DEV_ACCOUNT_COUNT, LOCAL_CHAIN_ID,
};
use certchain_core::error::{CertchainError, Result};
use certchain_core::types::{
    Address, Certificate, CertificateId, LogEntry, RawLog, TransactionReceipt, TransactionRequest,
    TxHash,
};

use crate::contract::{CertificateRegistry, ExecutionContext};
use crate::gas::intrinsic_gas;

/// Parameters for a fresh chain.
#[derive(Clone, Debug)]
pub struct ChainConfig {
    /// EIP-155 chain id
    pub chain_id: u64,
    /// Initial registry gas threshold
    pub gas_limit: u64,
    /// Number of pre-funded dev accounts (account 0 deploys the registry)
    pub accounts: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: LOCAL_CHAIN_ID,
            gas_limit: DEFAULT_GAS_LIMIT,
            accounts: DEV_ACCOUNT_COUNT,
        }
    }
}

/// Serializable chain state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    /// Chain id
    pub chain_id: u64,
    /// Registry contract address
    pub registry_address: Address,
    /// Dev accounts
    pub accounts: Vec<Address>,
    /// Latest mined block
    pub block_number: u64,
    /// Contract state
    pub registry: CertificateRegistry,
    /// Every log in mining order
    pub logs: Vec<RawLog>,
    /// Every receipt in mining order
    pub receipts: Vec<TransactionReceipt>,
}

#[derive(Debug)]
struct ChainState {
    block_number: u64,
    registry: CertificateRegistry,
    logs: Vec<RawLog>,
}

/// An in-process chain hosting one certificate registry.
///
/// Transactions are serialized behind a mutex, which gives them a global
/// order. Receipts are indexed separately so lookups never wait on a
/// running transaction.
#[derive(Debug)]
pub struct LocalChain {
    chain_id: u64,
    registry_address: Address,
    accounts: Vec<Address>,
    state: Mutex<ChainState>,
    receipts: DashMap<TxHash, TransactionReceipt>,
}

impl LocalChain {
    /// Creates a chain and deploys the registry from account 0.
    pub fn new(config: ChainConfig) -> Result<Self> {
        if config.accounts == 0 {
            return Err(CertchainError::ConfigError(
                "local chain needs at least one account".into(),
            ));
        }
        let accounts: Vec<Address> = (0..config.accounts).map(Address::dev_account).collect();
        let deployer = accounts[0];
        let registry = CertificateRegistry::with_gas_limit(deployer, config.gas_limit)?;
        let registry_address = Address::contract_address(&deployer, 0);

        info!(
            chain_id = config.chain_id,
            registry = %registry_address,
            owner = %deployer,
            gas_limit = config.gas_limit,
            "Local chain started"
        );

        Ok(Self {
            chain_id: config.chain_id,
            registry_address,
            accounts,
            state: Mutex::new(ChainState {
                block_number: 0,
                registry,
                logs: Vec::new(),
            }),
            receipts: DashMap::new(),
        })
    }

    /// Creates a chain with default settings.
    pub fn dev() -> Result<Self> {
        Self::new(ChainConfig::default())
    }

    /// Restores a chain from a snapshot.
    pub fn from_snapshot(snapshot: ChainSnapshot) -> Result<Self> {
        if snapshot.accounts.is_empty() {
            return Err(CertchainError::StorageError(
                "snapshot has no accounts".into(),
            ));
        }
        let receipts = DashMap::with_capacity(snapshot.receipts.len());
        for receipt in snapshot.receipts {
            receipts.insert(receipt.transaction_hash, receipt);
        }
        info!(
            chain_id = snapshot.chain_id,
            block = snapshot.block_number,
            certificates = snapshot.registry.certificate_count(),
            "Local chain restored"
        );

        Ok(Self {
            chain_id: snapshot.chain_id,
            registry_address: snapshot.registry_address,
            accounts: snapshot.accounts,
            state: Mutex::new(ChainState {
                block_number: snapshot.block_number,
                registry: snapshot.registry,
                logs: snapshot.logs,
            }),
            receipts,
        })
    }

    /// Captures the full chain state.
    pub fn snapshot(&self) -> ChainSnapshot {
        let state = self.state.lock();
        let mut receipts: Vec<TransactionReceipt> =
            self.receipts.iter().map(|r| r.value().clone()).collect();
        receipts.sort_by_key(|r| r.block_number);

        ChainSnapshot {
            chain_id: self.chain_id,
            registry_address: self.registry_address,
            accounts: self.accounts.clone(),
            block_number: state.block_number,
            registry: state.registry.clone(),
            logs: state.logs.clone(),
            receipts,
        }
    }

    /// Chain id.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Registry contract address.
    pub fn registry_address(&self) -> Address {
        self.registry_address
    }

    /// Dev accounts.
    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// Latest mined block.
    pub fn block_number(&self) -> u64 {
        self.state.lock().block_number
    }

    /// Registry owner.
    pub fn owner(&self) -> Address {
        self.state.lock().registry.owner()
    }

    /// Registry gas threshold.
    pub fn gas_limit(&self) -> u64 {
        self.state.lock().registry.gas_limit()
    }

    /// Certificates issued so far.
    pub fn certificate_count(&self) -> u64 {
        self.state.lock().registry.certificate_count()
    }

    /// Reads a certificate directly from contract storage.
    pub fn certificate(&self, id: CertificateId) -> Result<Certificate> {
        self.state
            .lock()
            .registry
            .certificate(id)
            .cloned()
            .ok_or(CertchainError::CertificateNotFound(id))
    }

    fn check_target(&self, tx: &TransactionRequest) -> Result<()> {
        match tx.to {
            Some(to) if to == self.registry_address => Ok(()),
            Some(to) => Err(CertchainError::InvalidTransaction(format!(
                "no contract at {}",
                to
            ))),
            None => Err(CertchainError::InvalidTransaction(
                "contract creation is not supported".into(),
            )),
        }
    }

    fn execution_gas(&self, tx: &TransactionRequest, default_gas: u64) -> Result<(u64, u64)> {
        let gas = tx.gas.unwrap_or(default_gas);
        if gas > BLOCK_GAS_LIMIT {
            return Err(CertchainError::InvalidTransaction(format!(
                "gas {} exceeds block gas limit {}",
                gas, BLOCK_GAS_LIMIT
            )));
        }
        let intrinsic = intrinsic_gas(&tx.data);
        if gas < intrinsic {
            return Err(CertchainError::IntrinsicGasTooLow {
                supplied: gas,
                required: intrinsic,
            });
        }
        Ok((intrinsic, gas - intrinsic))
    }

    fn now() -> u64 {
        u64::try_from(Utc::now().timestamp()).unwrap_or_default()
    }

    /// Executes and mines a transaction.
    ///
    /// The registry runs on a copy that replaces the live state only once
    /// execution succeeds. A revert returns the typed error and leaves the
    /// chain unchanged.
    #[instrument(skip(self, tx), fields(from = ?tx.from))]
    pub fn send_transaction(&self, tx: TransactionRequest) -> Result<TransactionReceipt> {
        let from = tx
            .from
            .ok_or_else(|| CertchainError::InvalidTransaction("missing sender".into()))?;
        if !self.accounts.contains(&from) {
            return Err(CertchainError::AccountNotAuthorized);
        }
        self.check_target(&tx)?;
        let (intrinsic, execution_gas) = self.execution_gas(&tx, DEFAULT_TX_GAS)?;

        let mut state = self.state.lock();
        let mut registry = state.registry.clone();
        let mut ctx = ExecutionContext::new(from, self.registry_address, Self::now(), execution_gas);
        if let Err(err) = registry.execute(&mut ctx, &tx.data) {
            warn!(error = %err, "Transaction reverted");
            return Err(err);
        }

        state.registry = registry;
        state.block_number += 1;
        let block_number = state.block_number;
        let gas_used = intrinsic + ctx.meter.used();

        let mut preimage = self.chain_id.to_be_bytes().to_vec();
        preimage.extend_from_slice(&block_number.to_be_bytes());
        preimage.extend_from_slice(from.as_bytes());
        preimage.extend_from_slice(&tx.data);
        let transaction_hash = TxHash::from_array(keccak256(&preimage));

        let logs: Vec<RawLog> = ctx
            .into_events()
            .iter()
            .map(|event| {
                let mut log = event.to_log(self.registry_address);
                log.block_number = Some(block_number);
                log.transaction_hash = Some(transaction_hash);
                log
            })
            .collect();
        state.logs.extend(logs.iter().cloned());

        let receipt = TransactionReceipt {
            transaction_hash,
            block_number,
            from,
            to: Some(self.registry_address),
            gas_used,
            status: 1,
            logs,
        };
        self.receipts.insert(transaction_hash, receipt.clone());

        debug!(block_number, gas_used, tx = %transaction_hash, "Transaction mined");
        Ok(receipt)
    }

    /// Executes a call against a copy of the state and returns its output.
    pub fn call(&self, tx: &TransactionRequest) -> Result<Vec<u8>> {
        self.check_target(tx)?;
        let (_, execution_gas) = self.execution_gas(tx, BLOCK_GAS_LIMIT)?;
        let caller = tx.from.unwrap_or_else(Address::zero);

        let mut registry = self.state.lock().registry.clone();
        let mut ctx = ExecutionContext::new(caller, self.registry_address, Self::now(), execution_gas);
        registry.execute(&mut ctx, &tx.data)
    }

    /// Gas a transaction needs: intrinsic cost, execution cost and enough
    /// headroom to pass the registry's gas guard.
    pub fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        self.check_target(tx)?;
        let intrinsic = intrinsic_gas(&tx.data);
        let caller = tx.from.unwrap_or_else(Address::zero);

        let mut registry = self.state.lock().registry.clone();
        let threshold = registry.gas_limit();
        let mut ctx = ExecutionContext::new(
            caller,
            self.registry_address,
            Self::now(),
            BLOCK_GAS_LIMIT - intrinsic.min(BLOCK_GAS_LIMIT),
        );
        registry.execute(&mut ctx, &tx.data)?;

        Ok((intrinsic + ctx.meter.used() + threshold).min(BLOCK_GAS_LIMIT))
    }

    /// Receipt of a mined transaction.
    pub fn receipt(&self, hash: &TxHash) -> Option<TransactionReceipt> {
        self.receipts.get(hash).map(|r| r.value().clone())
    }

    /// Raw logs mined in `from_block..=to_block`.
    pub fn logs(&self, from_block: u64, to_block: Option<u64>) -> Vec<RawLog> {
        let state = self.state.lock();
        let to_block = to_block.unwrap_or(state.block_number);
        state
            .logs
            .iter()
            .filter(|log| {
                log.block_number
                    .is_some_and(|b| b >= from_block && b <= to_block)
            })
            .cloned()
            .collect()
    }

    /// Decoded events mined at or after `from_block`.
    pub fn events(&self, from_block: u64) -> Result<Vec<LogEntry>> {
        self.logs(from_block, None)
            .iter()
            .map(LogEntry::from_raw)
            .collect()
    }
}

/// Shared handle to a chain.
pub type SharedChain = Arc<LocalChain>;

#[cfg(test)]
mod tests {
    use super::*;
    use certchain_core::calls;
    use certchain_core::types::ContractEvent;
    use certchain_core::RegistryCall;

    fn issue_tx(chain: &LocalChain, name: &str) -> TransactionRequest {
        TransactionRequest::new(
            chain.registry_address(),
            RegistryCall::IssueCertificate {
                recipient_name: name.into(),
            }
            .encode(),
        )
        .from(chain.accounts()[0])
    }

    #[test]
    fn test_transaction_is_mined_with_receipt() {
        let chain = LocalChain::dev().unwrap();
        let receipt = chain.send_transaction(issue_tx(&chain, "Alice")).unwrap();

        assert!(receipt.is_success());
        assert_eq!(receipt.block_number, 1);
        assert_eq!(chain.block_number(), 1);
        assert!(receipt.gas_used > intrinsic_gas(&issue_tx(&chain, "Alice").data));
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(chain.receipt(&receipt.transaction_hash), Some(receipt.clone()));

        let events = chain.events(0).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transaction_hash, receipt.transaction_hash);
        assert!(matches!(
            events[0].event,
            ContractEvent::CertificateIssued { id: 1, .. }
        ));
    }

    #[test]
    fn test_reverted_transaction_is_not_mined() {
        let chain = LocalChain::dev().unwrap();
        let tx = TransactionRequest::new(
            chain.registry_address(),
            RegistryCall::RevokeCertificate { id: 1 }.encode(),
        )
        .from(chain.accounts()[0]);

        let err = chain.send_transaction(tx).unwrap_err();
        assert!(matches!(err, CertchainError::CertificateNotFound(1)));
        assert_eq!(chain.block_number(), 0);
        assert!(chain.logs(0, None).is_empty());
    }

    #[test]
    fn test_low_gas_hits_the_guard() {
        let chain = LocalChain::dev().unwrap();
        let tx = issue_tx(&chain, "Alice").gas(60_000);
        let err = chain.send_transaction(tx).unwrap_err();
        assert!(matches!(err, CertchainError::InsufficientGas { .. }));
        assert_eq!(chain.certificate_count(), 0);
    }

    #[test]
    fn test_intrinsic_gas_checked_before_execution() {
        let chain = LocalChain::dev().unwrap();
        let err = chain
            .send_transaction(issue_tx(&chain, "Alice").gas(21_000))
            .unwrap_err();
        assert!(matches!(err, CertchainError::IntrinsicGasTooLow { supplied: 21_000, .. }));

        let err = chain
            .send_transaction(issue_tx(&chain, "Alice").gas(BLOCK_GAS_LIMIT + 1))
            .unwrap_err();
        assert!(matches!(err, CertchainError::InvalidTransaction(_)));
    }

    #[test]
    fn test_unknown_sender_and_target_rejected() {
        let chain = LocalChain::dev().unwrap();
        let tx = issue_tx(&chain, "Alice").from(Address::from_array([9; 20]));
        assert!(matches!(
            chain.send_transaction(tx),
            Err(CertchainError::AccountNotAuthorized)
        ));

        let mut tx = issue_tx(&chain, "Alice");
        tx.to = Some(Address::from_array([9; 20]));
        assert!(matches!(
            chain.send_transaction(tx),
            Err(CertchainError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_call_does_not_change_state() {
        let chain = LocalChain::dev().unwrap();
        chain.send_transaction(issue_tx(&chain, "Alice")).unwrap();

        let verify = TransactionRequest::new(
            chain.registry_address(),
            RegistryCall::VerifyCertificate { id: 1 }.encode(),
        );
        let out = chain.call(&verify).unwrap();
        assert!(calls::decode_bool(&out).unwrap());
        assert_eq!(chain.block_number(), 1);
        assert_eq!(chain.logs(0, None).len(), 1);

        // a call from a non-owner still hits the owner check
        let out = chain.call(&issue_tx(&chain, "Bob").from(chain.accounts()[1]));
        assert!(matches!(out, Err(CertchainError::Unauthorized)));
        assert_eq!(chain.certificate_count(), 1);
    }

    #[test]
    fn test_estimate_covers_the_guard() {
        let chain = LocalChain::dev().unwrap();
        let tx = issue_tx(&chain, "Alice");
        let estimate = chain.estimate_gas(&tx).unwrap();
        assert!(estimate > DEFAULT_GAS_LIMIT + intrinsic_gas(&tx.data));

        let receipt = chain.send_transaction(tx.gas(estimate)).unwrap();
        assert!(receipt.gas_used <= estimate);
    }

    #[test]
    fn test_estimate_reports_revert() {
        let chain = LocalChain::dev().unwrap();
        let tx = issue_tx(&chain, "Alice").from(chain.accounts()[2]);
        assert!(matches!(
            chain.estimate_gas(&tx),
            Err(CertchainError::Unauthorized)
        ));
    }

    #[test]
    fn test_log_range_filter() {
        let chain = LocalChain::dev().unwrap();
        for name in ["A", "B", "C"] {
            chain.send_transaction(issue_tx(&chain, name)).unwrap();
        }
        assert_eq!(chain.logs(2, None).len(), 2);
        assert_eq!(chain.logs(1, Some(1)).len(), 1);
        assert_eq!(chain.events(4).unwrap().len(), 0);
    }

    #[test]
    fn test_snapshot_restores_everything() {
        let chain = LocalChain::dev().unwrap();
        let receipt = chain.send_transaction(issue_tx(&chain, "Alice")).unwrap();

        let restored = LocalChain::from_snapshot(chain.snapshot()).unwrap();
        assert_eq!(restored.block_number(), 1);
        assert_eq!(restored.certificate(1).unwrap().recipient_name, "Alice");
        assert!(restored.receipt(&receipt.transaction_hash).is_some());
        assert_eq!(restored.registry_address(), chain.registry_address());
        assert_eq!(restored.snapshot(), chain.snapshot());
    }

    #[test]
    fn test_transaction_hashes_are_unique() {
        let chain = LocalChain::dev().unwrap();
        let a = chain.send_transaction(issue_tx(&chain, "Same")).unwrap();
        let b = chain.send_transaction(issue_tx(&chain, "Same")).unwrap();
        assert_ne!(a.transaction_hash, b.transaction_hash);
    }

    #[test]
    fn test_snapshot_without_accounts_rejected() {
        let mut snapshot = LocalChain::dev().unwrap().snapshot();
        snapshot.accounts.clear();
        assert!(matches!(
            LocalChain::from_snapshot(snapshot),
            Err(CertchainError::StorageError(_))
        ));
    }

    #[test]
    fn test_out_of_gas_leaves_state_untouched() {
        let chain = LocalChain::dev().unwrap();
        chain.send_transaction(issue_tx(&chain, "Alice")).unwrap();
        let lower = TransactionRequest::new(
            chain.registry_address(),
            RegistryCall::SetGasLimit { limit: 1 }.encode(),
        )
        .from(chain.accounts()[0]);
        chain.send_transaction(lower).unwrap();
        let before = chain.snapshot();

        // passes the guard, then runs dry while paying for storage
        let tx = issue_tx(&chain, "Bob");
        let gas = intrinsic_gas(&tx.data) + 10_000;
        let err = chain.send_transaction(tx.gas(gas)).unwrap_err();

        assert!(matches!(err, CertchainError::OutOfGas));
        assert_eq!(chain.snapshot(), before);
        assert_eq!(chain.certificate_count(), 1);
    }

    #[test]
    fn test_zero_accounts_rejected() {
        let config = ChainConfig {
            accounts: 0,
            ..ChainConfig::default()
        };
        assert!(LocalChain::new(config).is_err());
    }
}
