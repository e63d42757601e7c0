use alloy::{primitives::Address, signers::local::PrivateKeySigner};

use crate::{ledger::LedgerError, seed::Seed};

/// A signing identity derived from `(seed, index)`.
#[derive(Clone, Debug)]
pub struct Account {
    index: u64,
    signer: PrivateKeySigner,
}

impl Account {
    /// Wraps an externally supplied key (e.g. the funding account).
    /// Such accounts carry index `u64::MAX`; they are never part of a derived pool.
    pub fn from_signer(signer: PrivateKeySigner) -> Self {
        Self {
            index: u64::MAX,
            signer,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

/// Derives sub-accounts from a master seed. Stateless: deriving the same index
/// twice yields the same account.
#[derive(Clone, Debug)]
pub struct AccountDeriver {
    seed: Seed,
}

impl AccountDeriver {
    pub fn new(seed: Seed) -> Self {
        Self { seed }
    }

    pub fn derive(&self, index: u64) -> Result<Account, LedgerError> {
        let key = self.seed.key_material(index);
        let signer = PrivateKeySigner::from_bytes(&key)
            .map_err(|e| LedgerError::invalid_key(index, e.into()))?;
        Ok(Account { index, signer })
    }

    pub fn derive_many(&self, indexes: &[u64]) -> Result<Vec<Account>, LedgerError> {
        indexes.iter().map(|idx| self.derive(*idx)).collect()
    }

    pub fn address(&self, index: u64) -> Result<Address, LedgerError> {
        self.derive(index).map(|a| a.address())
    }
}
