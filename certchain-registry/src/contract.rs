//! The certificate registry contract.
//!
//! Executed natively rather than as EVM bytecode, but with contract
//! semantics: every call runs inside an [`ExecutionContext`] that carries
//! the caller, the block timestamp and a gas meter, and every failure is a
//! revert. All checks run before the first write, so a reverted call leaves
//! the registry untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use certchain_core::calls::{self, RegistryCall};
use certchain_core::constants::{
    BLOCK_GAS_LIMIT, DEFAULT_GAS_LIMIT, FIRST_CERTIFICATE_ID, GAS_SLOAD, GAS_SSTORE_RESET,
    GAS_SSTORE_SET,
};
use certchain_core::error::{CertchainError, Result};
use certchain_core::types::{
    validate_metadata_uri, validate_recipient_name, Address, Certificate, CertificateId,
    ContractEvent,
};

use crate::gas::{string_storage_gas, GasMeter};

/// Per-call execution environment.
#[derive(Debug)]
pub struct ExecutionContext {
    /// `msg.sender`
    pub caller: Address,
    /// Address of the executing contract (log emitter)
    pub contract: Address,
    /// `block.timestamp`
    pub timestamp: u64,
    /// Gas available to the call
    pub meter: GasMeter,
    events: Vec<ContractEvent>,
}

impl ExecutionContext {
    /// Creates a context with `gas` available for execution.
    pub fn new(caller: Address, contract: Address, timestamp: u64, gas: u64) -> Self {
        Self {
            caller,
            contract,
            timestamp,
            meter: GasMeter::new(gas),
            events: Vec::new(),
        }
    }

    /// Charges for and records an event.
    pub fn emit(&mut self, event: ContractEvent) -> Result<()> {
        let cost = event.to_log(self.contract).gas_cost();
        self.meter.charge(cost)?;
        self.events.push(event);
        Ok(())
    }

    /// Events emitted so far.
    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    /// Consumes the context, returning its events.
    pub fn into_events(self) -> Vec<ContractEvent> {
        self.events
    }
}

/// Registry contract state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRegistry {
    owner: Address,
    gas_limit: u64,
    next_id: CertificateId,
    certificates: BTreeMap<CertificateId, Certificate>,
}

fn check_gas_limit(limit: u64) -> Result<()> {
    if limit == 0 || limit > BLOCK_GAS_LIMIT {
        return Err(CertchainError::InvalidGasLimit(limit));
    }
    Ok(())
}

impl CertificateRegistry {
    /// Deploys a registry owned by `owner` with the default gas threshold.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            gas_limit: DEFAULT_GAS_LIMIT,
            next_id: FIRST_CERTIFICATE_ID,
            certificates: BTreeMap::new(),
        }
    }

    /// Deploys a registry with a custom gas threshold.
    pub fn with_gas_limit(owner: Address, gas_limit: u64) -> Result<Self> {
        check_gas_limit(gas_limit)?;
        Ok(Self {
            gas_limit,
            ..Self::new(owner)
        })
    }

    /// Current owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Current gas threshold.
    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// Number of certificates ever issued.
    pub fn certificate_count(&self) -> u64 {
        self.next_id - FIRST_CERTIFICATE_ID
    }

    /// Reads a certificate without executing a call.
    pub fn certificate(&self, id: CertificateId) -> Option<&Certificate> {
        self.certificates.get(&id)
    }

    /// All certificates in id order.
    pub fn certificates(&self) -> impl Iterator<Item = &Certificate> {
        self.certificates.values()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MODIFIERS
    // ═══════════════════════════════════════════════════════════════════════════

    fn only_owner(&self, ctx: &mut ExecutionContext) -> Result<()> {
        ctx.meter.charge(GAS_SLOAD)?;
        if ctx.caller != self.owner {
            return Err(CertchainError::Unauthorized);
        }
        Ok(())
    }

    fn require_gas(&self, ctx: &mut ExecutionContext) -> Result<()> {
        ctx.meter.charge(GAS_SLOAD)?;
        let remaining = ctx.meter.remaining();
        if remaining < self.gas_limit {
            return Err(CertchainError::InsufficientGas {
                remaining,
                required: self.gas_limit,
            });
        }
        Ok(())
    }

    fn load(&self, ctx: &mut ExecutionContext, id: CertificateId) -> Result<&Certificate> {
        ctx.meter.charge(GAS_SLOAD)?;
        self.certificates
            .get(&id)
            .ok_or(CertchainError::CertificateNotFound(id))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE-CHANGING FUNCTIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Issues a certificate to `recipient_name`. Owner only, gas-guarded.
    pub fn issue_certificate(
        &mut self,
        ctx: &mut ExecutionContext,
        recipient_name: &str,
        metadata_uri: Option<&str>,
    ) -> Result<CertificateId> {
        self.only_owner(ctx)?;
        self.require_gas(ctx)?;
        validate_recipient_name(recipient_name)?;
        if let Some(uri) = metadata_uri {
            validate_metadata_uri(uri)?;
        }

        ctx.meter.charge(GAS_SLOAD)?;
        let id = self.next_id;

        // issue date and validity slots, the strings, then the counter
        let storage = 2 * GAS_SSTORE_SET
            + string_storage_gas(recipient_name.len())
            + metadata_uri.map_or(0, |uri| string_storage_gas(uri.len()))
            + GAS_SSTORE_RESET;
        ctx.meter.charge(storage)?;

        let issue_date = ctx.timestamp;
        ctx.emit(ContractEvent::CertificateIssued {
            id,
            recipient_name: recipient_name.to_string(),
            issue_date,
        })?;

        let mut certificate = Certificate::new(id, recipient_name, issue_date);
        certificate.metadata_uri = metadata_uri.map(str::to_string);
        self.certificates.insert(id, certificate);
        self.next_id += 1;

        debug!(id, "Certificate issued");
        Ok(id)
    }

    /// Checks validity and records the check as an event. Gas-guarded.
    pub fn verify_certificate(&mut self, ctx: &mut ExecutionContext, id: CertificateId) -> Result<bool> {
        self.require_gas(ctx)?;
        let is_valid = self.load(ctx, id)?.is_valid;
        ctx.emit(ContractEvent::CertificateVerified { id, is_valid })?;

        debug!(id, is_valid, "Certificate verified");
        Ok(is_valid)
    }

    /// Revokes a certificate. Owner only, gas-guarded, final.
    pub fn revoke_certificate(&mut self, ctx: &mut ExecutionContext, id: CertificateId) -> Result<()> {
        self.only_owner(ctx)?;
        self.require_gas(ctx)?;
        if !self.load(ctx, id)?.is_valid {
            return Err(CertchainError::CertificateAlreadyRevoked(id));
        }

        ctx.meter.charge(GAS_SSTORE_RESET)?;
        ctx.emit(ContractEvent::CertificateRevoked { id })?;

        if let Some(cert) = self.certificates.get_mut(&id) {
            cert.is_valid = false;
        }
        debug!(id, "Certificate revoked");
        Ok(())
    }

    /// Reassigns a valid certificate to a new recipient. Owner only, gas-guarded.
    pub fn transfer_certificate(
        &mut self,
        ctx: &mut ExecutionContext,
        id: CertificateId,
        new_recipient_name: &str,
    ) -> Result<()> {
        self.only_owner(ctx)?;
        self.require_gas(ctx)?;
        validate_recipient_name(new_recipient_name)?;

        let current = self.load(ctx, id)?;
        if !current.is_valid {
            return Err(CertchainError::CertificateNotValid(id));
        }
        let previous_recipient = current.recipient_name.clone();

        ctx.meter.charge(string_storage_gas(new_recipient_name.len()))?;
        ctx.emit(ContractEvent::CertificateTransferred {
            id,
            previous_recipient,
            new_recipient: new_recipient_name.to_string(),
        })?;

        if let Some(cert) = self.certificates.get_mut(&id) {
            cert.recipient_name = new_recipient_name.to_string();
        }
        debug!(id, "Certificate transferred");
        Ok(())
    }

    /// Changes the gas threshold. Owner only; not itself gas-guarded so a
    /// threshold set too high can always be lowered again.
    pub fn set_gas_limit(&mut self, ctx: &mut ExecutionContext, new_limit: u64) -> Result<()> {
        self.only_owner(ctx)?;
        check_gas_limit(new_limit)?;

        ctx.meter.charge(GAS_SSTORE_RESET)?;
        let old_limit = self.gas_limit;
        ctx.emit(ContractEvent::GasLimitUpdated {
            old_limit,
            new_limit,
        })?;

        self.gas_limit = new_limit;
        debug!(old_limit, new_limit, "Gas limit updated");
        Ok(())
    }

    /// Hands ownership to `new_owner`. Owner only.
    pub fn transfer_ownership(&mut self, ctx: &mut ExecutionContext, new_owner: Address) -> Result<()> {
        self.only_owner(ctx)?;
        if new_owner.is_zero() {
            return Err(CertchainError::InvalidOwner);
        }

        ctx.meter.charge(GAS_SSTORE_RESET)?;
        let previous_owner = self.owner;
        ctx.emit(ContractEvent::OwnershipTransferred {
            previous_owner,
            new_owner,
        })?;

        self.owner = new_owner;
        debug!(%previous_owner, %new_owner, "Ownership transferred");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DISPATCH
    // ═══════════════════════════════════════════════════════════════════════════

    /// Decodes calldata, runs the function and returns its ABI output.
    #[instrument(skip(self, ctx, calldata), fields(caller = %ctx.caller))]
    pub fn execute(&mut self, ctx: &mut ExecutionContext, calldata: &[u8]) -> Result<Vec<u8>> {
        let call = RegistryCall::decode(calldata)?;
        trace!(function = call.name(), "Dispatching call");

        let output = match call {
            RegistryCall::IssueCertificate { recipient_name } => {
                calls::encode_uint(self.issue_certificate(ctx, &recipient_name, None)?)
            }
            RegistryCall::IssueCertificateWithMetadata {
                recipient_name,
                metadata_uri,
            } => calls::encode_uint(self.issue_certificate(
                ctx,
                &recipient_name,
                Some(&metadata_uri),
            )?),
            RegistryCall::VerifyCertificate { id } => {
                calls::encode_bool(self.verify_certificate(ctx, id)?)
            }
            RegistryCall::RevokeCertificate { id } => {
                self.revoke_certificate(ctx, id)?;
                Vec::new()
            }
            RegistryCall::TransferCertificate {
                id,
                new_recipient_name,
            } => {
                self.transfer_certificate(ctx, id, &new_recipient_name)?;
                Vec::new()
            }
            RegistryCall::GetCertificate { id } => calls::encode_certificate(self.load(ctx, id)?),
            RegistryCall::SetGasLimit { limit } => {
                self.set_gas_limit(ctx, limit)?;
                Vec::new()
            }
            RegistryCall::GasLimit => {
                ctx.meter.charge(GAS_SLOAD)?;
                calls::encode_uint(self.gas_limit)
            }
            RegistryCall::Owner => {
                ctx.meter.charge(GAS_SLOAD)?;
                calls::encode_address(&self.owner)
            }
            RegistryCall::CertificateCount => {
                ctx.meter.charge(GAS_SLOAD)?;
                calls::encode_uint(self.certificate_count())
            }
            RegistryCall::TransferOwnership { new_owner } => {
                self.transfer_ownership(ctx, new_owner)?;
                Vec::new()
            }
        };

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLENTY: u64 = 1_000_000;

    fn owner() -> Address {
        Address::dev_account(0)
    }

    fn stranger() -> Address {
        Address::dev_account(1)
    }

    fn ctx_for(caller: Address, gas: u64) -> ExecutionContext {
        ExecutionContext::new(caller, Address::from_array([0xcc; 20]), 1_700_000_000, gas)
    }

    fn registry_with_one() -> CertificateRegistry {
        let mut registry = CertificateRegistry::new(owner());
        registry
            .issue_certificate(&mut ctx_for(owner(), PLENTY), "Alice", None)
            .unwrap();
        registry
    }

    #[test]
    fn test_issue_assigns_sequential_ids() {
        let mut registry = CertificateRegistry::new(owner());
        let mut ctx = ctx_for(owner(), PLENTY);
        assert_eq!(registry.issue_certificate(&mut ctx, "Alice", None).unwrap(), 1);
        assert_eq!(registry.issue_certificate(&mut ctx, "Bob", None).unwrap(), 2);
        assert_eq!(registry.certificate_count(), 2);

        let cert = registry.certificate(1).unwrap();
        assert_eq!(cert.recipient_name, "Alice");
        assert_eq!(cert.issue_date, 1_700_000_000);
        assert!(cert.is_valid);

        assert_eq!(ctx.events().len(), 2);
        assert!(matches!(
            ctx.events()[0],
            ContractEvent::CertificateIssued { id: 1, .. }
        ));
    }

    #[test]
    fn test_issue_with_metadata() {
        let mut registry = CertificateRegistry::new(owner());
        let id = registry
            .issue_certificate(&mut ctx_for(owner(), PLENTY), "Alice", Some("ipfs://bafyabc"))
            .unwrap();
        assert_eq!(
            registry.certificate(id).unwrap().metadata_uri.as_deref(),
            Some("ipfs://bafyabc")
        );

        let err = registry
            .issue_certificate(&mut ctx_for(owner(), PLENTY), "Alice", Some(""))
            .unwrap_err();
        assert!(matches!(err, CertchainError::InvalidMetadataUri(_)));
    }

    #[test]
    fn test_issue_requires_owner() {
        let mut registry = CertificateRegistry::new(owner());
        let mut ctx = ctx_for(stranger(), PLENTY);
        let err = registry.issue_certificate(&mut ctx, "Mallory", None).unwrap_err();
        assert!(matches!(err, CertchainError::Unauthorized));
        assert_eq!(registry.certificate_count(), 0);
        assert!(ctx.events().is_empty());
    }

    #[test]
    fn test_issue_rejects_bad_names() {
        let mut registry = CertificateRegistry::new(owner());
        for name in ["", "   "] {
            let err = registry
                .issue_certificate(&mut ctx_for(owner(), PLENTY), name, None)
                .unwrap_err();
            assert!(matches!(err, CertchainError::InvalidRecipientName(_)));
        }
        assert_eq!(registry.certificate_count(), 0);
    }

    #[test]
    fn test_gas_guard_reverts_without_state_change() {
        let mut registry = CertificateRegistry::new(owner());
        let mut ctx = ctx_for(owner(), 40_000);
        let err = registry.issue_certificate(&mut ctx, "Alice", None).unwrap_err();
        match err {
            CertchainError::InsufficientGas { remaining, required } => {
                assert_eq!(required, DEFAULT_GAS_LIMIT);
                assert_eq!(remaining, 40_000 - 2 * GAS_SLOAD);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(registry.certificate_count(), 0);
    }

    #[test]
    fn test_owner_check_runs_before_gas_guard() {
        let mut registry = CertificateRegistry::new(owner());
        let err = registry
            .issue_certificate(&mut ctx_for(stranger(), 10_000), "Alice", None)
            .unwrap_err();
        assert!(matches!(err, CertchainError::Unauthorized));
    }

    #[test]
    fn test_out_of_gas_after_guard_leaves_state_untouched() {
        let mut registry = CertificateRegistry::new(owner());
        // passes the guard but cannot pay for storage
        let mut ctx = ctx_for(owner(), DEFAULT_GAS_LIMIT + 2 * GAS_SLOAD);
        let err = registry.issue_certificate(&mut ctx, "Alice", None).unwrap_err();
        assert!(matches!(err, CertchainError::OutOfGas));
        assert_eq!(registry.certificate_count(), 0);
        assert!(registry.certificate(1).is_none());
    }

    #[test]
    fn test_verify_is_open_to_anyone() {
        let mut registry = registry_with_one();
        let mut ctx = ctx_for(stranger(), PLENTY);
        assert!(registry.verify_certificate(&mut ctx, 1).unwrap());
        assert_eq!(
            ctx.events(),
            &[ContractEvent::CertificateVerified { id: 1, is_valid: true }]
        );
    }

    #[test]
    fn test_verify_unknown_id_reverts() {
        let mut registry = registry_with_one();
        let err = registry
            .verify_certificate(&mut ctx_for(stranger(), PLENTY), 99)
            .unwrap_err();
        assert!(matches!(err, CertchainError::CertificateNotFound(99)));
    }

    #[test]
    fn test_verify_is_gas_guarded() {
        let mut registry = registry_with_one();
        let err = registry
            .verify_certificate(&mut ctx_for(stranger(), 30_000), 1)
            .unwrap_err();
        assert!(matches!(err, CertchainError::InsufficientGas { .. }));
    }

    #[test]
    fn test_revoke_lifecycle() {
        let mut registry = registry_with_one();
        registry.revoke_certificate(&mut ctx_for(owner(), PLENTY), 1).unwrap();
        assert!(!registry.certificate(1).unwrap().is_valid);
        assert!(!registry
            .verify_certificate(&mut ctx_for(stranger(), PLENTY), 1)
            .unwrap());

        let err = registry
            .revoke_certificate(&mut ctx_for(owner(), PLENTY), 1)
            .unwrap_err();
        assert!(matches!(err, CertchainError::CertificateAlreadyRevoked(1)));

        let err = registry
            .revoke_certificate(&mut ctx_for(owner(), PLENTY), 5)
            .unwrap_err();
        assert!(matches!(err, CertchainError::CertificateNotFound(5)));
    }

    #[test]
    fn test_revoke_requires_owner() {
        let mut registry = registry_with_one();
        let err = registry
            .revoke_certificate(&mut ctx_for(stranger(), PLENTY), 1)
            .unwrap_err();
        assert!(matches!(err, CertchainError::Unauthorized));
        assert!(registry.certificate(1).unwrap().is_valid);
    }

    #[test]
    fn test_transfer_certificate() {
        let mut registry = registry_with_one();
        let mut ctx = ctx_for(owner(), PLENTY);
        registry.transfer_certificate(&mut ctx, 1, "Bob").unwrap();
        assert_eq!(registry.certificate(1).unwrap().recipient_name, "Bob");
        assert_eq!(
            ctx.events(),
            &[ContractEvent::CertificateTransferred {
                id: 1,
                previous_recipient: "Alice".into(),
                new_recipient: "Bob".into(),
            }]
        );
    }

    #[test]
    fn test_transfer_rejects_revoked_certificate() {
        let mut registry = registry_with_one();
        registry.revoke_certificate(&mut ctx_for(owner(), PLENTY), 1).unwrap();
        let err = registry
            .transfer_certificate(&mut ctx_for(owner(), PLENTY), 1, "Bob")
            .unwrap_err();
        assert!(matches!(err, CertchainError::CertificateNotValid(1)));
        assert_eq!(registry.certificate(1).unwrap().recipient_name, "Alice");
    }

    #[test]
    fn test_set_gas_limit() {
        let mut registry = CertificateRegistry::new(owner());
        // not guarded: works with less gas than the current threshold
        let mut ctx = ctx_for(owner(), 20_000);
        registry.set_gas_limit(&mut ctx, 80_000).unwrap();
        assert_eq!(registry.gas_limit(), 80_000);
        assert_eq!(
            ctx.events(),
            &[ContractEvent::GasLimitUpdated {
                old_limit: DEFAULT_GAS_LIMIT,
                new_limit: 80_000,
            }]
        );

        for bad in [0, BLOCK_GAS_LIMIT + 1] {
            let err = registry
                .set_gas_limit(&mut ctx_for(owner(), PLENTY), bad)
                .unwrap_err();
            assert!(matches!(err, CertchainError::InvalidGasLimit(v) if v == bad));
        }

        let err = registry
            .set_gas_limit(&mut ctx_for(stranger(), PLENTY), 60_000)
            .unwrap_err();
        assert!(matches!(err, CertchainError::Unauthorized));
        assert_eq!(registry.gas_limit(), 80_000);
    }

    #[test]
    fn test_transfer_ownership() {
        let mut registry = CertificateRegistry::new(owner());
        let err = registry
            .transfer_ownership(&mut ctx_for(owner(), PLENTY), Address::zero())
            .unwrap_err();
        assert!(matches!(err, CertchainError::InvalidOwner));

        registry
            .transfer_ownership(&mut ctx_for(owner(), PLENTY), stranger())
            .unwrap();
        assert_eq!(registry.owner(), stranger());
        assert!(registry
            .issue_certificate(&mut ctx_for(owner(), PLENTY), "Alice", None)
            .is_err());
        assert!(registry
            .issue_certificate(&mut ctx_for(stranger(), PLENTY), "Alice", None)
            .is_ok());
    }

    #[test]
    fn test_execute_dispatches_calldata() {
        let mut registry = CertificateRegistry::new(owner());
        let issue = RegistryCall::IssueCertificate {
            recipient_name: "Carol".into(),
        };
        let out = registry
            .execute(&mut ctx_for(owner(), PLENTY), &issue.encode())
            .unwrap();
        assert_eq!(calls::decode_uint(&out).unwrap(), 1);

        let get = RegistryCall::GetCertificate { id: 1 };
        let out = registry
            .execute(&mut ctx_for(stranger(), PLENTY), &get.encode())
            .unwrap();
        let cert = calls::decode_certificate(&out).unwrap();
        assert_eq!(cert.recipient_name, "Carol");

        let out = registry
            .execute(&mut ctx_for(stranger(), PLENTY), &RegistryCall::Owner.encode())
            .unwrap();
        assert_eq!(calls::decode_address(&out).unwrap(), owner());

        assert!(registry
            .execute(&mut ctx_for(owner(), PLENTY), &[1, 2, 3, 4])
            .is_err());
    }

    #[test]
    fn test_get_certificate_is_not_guarded() {
        let mut registry = registry_with_one();
        let out = registry
            .execute(
                &mut ctx_for(stranger(), 5_000),
                &RegistryCall::GetCertificate { id: 1 }.encode(),
            )
            .unwrap();
        assert!(calls::decode_certificate(&out).unwrap().is_valid);
    }

    #[test]
    fn test_with_gas_limit_validates() {
        assert!(CertificateRegistry::with_gas_limit(owner(), 0).is_err());
        assert_eq!(
            CertificateRegistry::with_gas_limit(owner(), 70_000)
                .unwrap()
                .gas_limit(),
            70_000
        );
    }

    #[test]
    fn test_state_serializes() {
        let registry = registry_with_one();
        let json = serde_json::to_string(&registry).unwrap();
        let back: CertificateRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, registry);
    }
}
