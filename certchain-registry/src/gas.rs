//! Gas metering.
//!
//! A simplified version of the EVM schedule, enough to make the registry's
//! gas threshold meaningful: intrinsic transaction cost, storage reads and
//! writes, string storage per word, and log emission.

use certchain_core::constants::{
    ABI_WORD_SIZE, GAS_CALLDATA_NONZERO_BYTE, GAS_CALLDATA_ZERO_BYTE, GAS_STRING_WORD, GAS_TX_BASE,
};
use certchain_core::error::{CertchainError, Result};

/// Tracks gas consumed during one execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GasMeter {
    supplied: u64,
    used: u64,
}

impl GasMeter {
    /// Creates a meter with `supplied` gas available for execution.
    pub fn new(supplied: u64) -> Self {
        Self { supplied, used: 0 }
    }

    /// Consumes `amount` gas.
    ///
    /// On exhaustion the meter is drained and `OutOfGas` is returned, the
    /// way the EVM consumes all gas on an out-of-gas fault.
    pub fn charge(&mut self, amount: u64) -> Result<()> {
        match self.used.checked_add(amount) {
            Some(total) if total <= self.supplied => {
                self.used = total;
                Ok(())
            }
            _ => {
                self.used = self.supplied;
                Err(CertchainError::OutOfGas)
            }
        }
    }

    /// Gas left (`gasleft()`).
    pub fn remaining(&self) -> u64 {
        self.supplied - self.used
    }

    /// Gas consumed so far.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Gas made available for execution.
    pub fn supplied(&self) -> u64 {
        self.supplied
    }
}

/// Intrinsic cost of a transaction carrying `calldata`.
pub fn intrinsic_gas(calldata: &[u8]) -> u64 {
    calldata.iter().fold(GAS_TX_BASE, |acc, &b| {
        acc + if b == 0 {
            GAS_CALLDATA_ZERO_BYTE
        } else {
            GAS_CALLDATA_NONZERO_BYTE
        }
    })
}

/// Cost of storing a string of `len` bytes (one slot per 32-byte word).
pub fn string_storage_gas(len: usize) -> u64 {
    len.div_ceil(ABI_WORD_SIZE) as u64 * GAS_STRING_WORD
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_charge_and_remaining() {
        let mut meter = GasMeter::new(10_000);
        meter.charge(2_100).unwrap();
        assert_eq!(meter.used(), 2_100);
        assert_eq!(meter.remaining(), 7_900);
    }

    #[test]
    fn test_out_of_gas_drains_meter() {
        let mut meter = GasMeter::new(1_000);
        assert!(matches!(meter.charge(1_001), Err(CertchainError::OutOfGas)));
        assert_eq!(meter.remaining(), 0);
        assert_eq!(meter.used(), 1_000);
    }

    #[test]
    fn test_charge_overflow_is_out_of_gas() {
        let mut meter = GasMeter::new(u64::MAX);
        meter.charge(10).unwrap();
        assert!(meter.charge(u64::MAX).is_err());
    }

    #[test]
    fn test_intrinsic_gas() {
        assert_eq!(intrinsic_gas(&[]), 21_000);
        assert_eq!(intrinsic_gas(&[0, 0, 1]), 21_000 + 4 + 4 + 16);
    }

    #[test]
    fn test_string_storage_gas() {
        assert_eq!(string_storage_gas(0), 0);
        assert_eq!(string_storage_gas(1), 5_000);
        assert_eq!(string_storage_gas(32), 5_000);
        assert_eq!(string_storage_gas(33), 10_000);
    }

    proptest! {
        #[test]
        fn prop_used_never_exceeds_supplied(supplied in 0u64..1_000_000, charges in proptest::collection::vec(0u64..200_000, 0..20)) {
            let mut meter = GasMeter::new(supplied);
            for c in charges {
                let _ = meter.charge(c);
                prop_assert!(meter.used() <= meter.supplied());
            }
        }
    }
}
