//! The capability interface through which funding and dispatch talk to a
//! concrete workload. The core never depends on a specific workload type.

use alloy::{
    consensus::TxType,
    primitives::{Address, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use thiserror::Error;

use crate::{
    fees::{apply_fees, FeeSnapshot},
    ledger::{sign_for_senders, SenderAccount},
    types::SignedTxsBySender,
    Result,
};

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("workload '{workload}' used before estimate_base_operation_cost was called")]
    NotInitialized { workload: String },

    #[error("workload '{workload}' cannot fund accounts with tokens")]
    TokenFundingUnsupported { workload: String },

    #[error("token supplier {supplier} is not the funding account {funder}")]
    SupplierMismatch { supplier: Address, funder: Address },

    #[error("unexpected node response: {0}")]
    InvalidResponse(String),
}

/// What the distributor tops accounts up with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FundingResource {
    #[default]
    Native,
    Token,
}

impl std::fmt::Display for FundingResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FundingResource::Native => write!(f, "native currency"),
            FundingResource::Token => write!(f, "token"),
        }
    }
}

/// Cached result of [`Workload::estimate_base_operation_cost`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationEstimate {
    pub gas_limit: u64,
    pub chain_id: u64,
    pub fees: FeeSnapshot,
}

#[async_trait]
pub trait Workload: Send + Sync {
    fn name(&self) -> &str;

    /// One line describing what a run of this workload will do.
    fn start_message(&self) -> String;

    /// Value moved by one operation (zero for calls that only cost gas).
    fn resource_value(&self) -> U256;

    /// Queries gas and fee data once and caches it, together with the chain id.
    /// Must be called before any cost or construction method.
    async fn estimate_base_operation_cost(&mut self) -> Result<OperationEstimate>;

    /// The estimate cached by [`Workload::estimate_base_operation_cost`].
    fn cached_estimate(&self) -> Option<&OperationEstimate>;

    /// Unsigned request for operation `op_index` of `sender`. Gas limit, chain
    /// id, fees and nonce are filled in by [`Workload::construct_transactions`].
    fn operation_request(
        &self,
        sender: &SenderAccount,
        op_index: u64,
    ) -> Result<TransactionRequest>;

    fn estimate(&self) -> Result<&OperationEstimate> {
        self.cached_estimate().ok_or_else(|| {
            WorkloadError::NotInitialized {
                workload: self.name().to_owned(),
            }
            .into()
        })
    }

    /// Current gas price snapshot.
    fn fee_level(&self) -> Result<u128> {
        Ok(self.estimate()?.fees.fee_level())
    }

    /// Builds and signs `operations_per_account` transactions for each sender,
    /// advancing each sender's nonce once per transaction.
    async fn construct_transactions(
        &self,
        senders: &mut [SenderAccount],
        operations_per_account: u64,
        tx_type: TxType,
    ) -> Result<SignedTxsBySender> {
        let estimate = *self.estimate()?;
        // surface missing fee data before anything is signed
        apply_fees(&mut TransactionRequest::default(), tx_type, &estimate.fees)?;

        sign_for_senders(senders, operations_per_account, |sender, op_index| {
            let mut tx = self.operation_request(sender, op_index)?;
            tx.gas = Some(estimate.gas_limit);
            tx.chain_id = Some(estimate.chain_id);
            apply_fees(&mut tx, tx_type, &estimate.fees)?;
            Ok(tx)
        })
        .await
    }

    /// Token capabilities, for workloads whose accounts need tokens.
    fn as_token(&self) -> Option<&dyn TokenWorkload> {
        None
    }
}

/// Extra capabilities of workloads that move a fungible token.
#[async_trait]
pub trait TokenWorkload: Send + Sync {
    /// Tokens moved by one operation.
    fn transfer_amount(&self) -> U256;

    /// The account holding the token supply used for funding.
    fn supplier(&self) -> Address;

    async fn token_balance(&self, address: Address) -> Result<U256>;

    async fn supplier_balance(&self) -> Result<U256> {
        self.token_balance(self.supplier()).await
    }

    /// Unsigned token transfer of `amount` from the supplier to `to`.
    fn create_funding_transaction(&self, to: Address, amount: U256) -> Result<TransactionRequest>;
}
