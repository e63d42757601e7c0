use alloy::{consensus::TxType, rpc::types::TransactionRequest};
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerError;

/// Fee parameters observed on the node at one point in time.
///
/// `gas_price` is always present; the dynamic fields are only populated when the
/// node supports EIP-1559 fee estimation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSnapshot {
    pub gas_price: u128,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

impl FeeSnapshot {
    pub fn legacy(gas_price: u128) -> Self {
        Self {
            gas_price,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        }
    }

    pub fn with_dynamic_fees(
        mut self,
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    ) -> Self {
        self.max_fee_per_gas = Some(max_fee_per_gas);
        self.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
        self
    }

    /// Highest per-gas price a transaction priced from this snapshot may pay.
    pub fn fee_level(&self) -> u128 {
        self.gas_price.max(self.max_fee_per_gas.unwrap_or_default())
    }
}

/// Writes the fee fields for `tx_type` into `tx`.
///
/// Legacy transactions get `gasPrice`; EIP-1559 transactions get
/// `maxFeePerGas`/`maxPriorityFeePerGas` and fail fast when the snapshot has none.
pub fn apply_fees(
    tx: &mut TransactionRequest,
    tx_type: TxType,
    fees: &FeeSnapshot,
) -> Result<(), LedgerError> {
    match tx_type {
        TxType::Legacy => {
            tx.gas_price = Some(fees.gas_price);
            tx.max_fee_per_gas = None;
            tx.max_priority_fee_per_gas = None;
            tx.transaction_type = Some(TxType::Legacy as u8);
        }
        TxType::Eip1559 => {
            let (Some(max_fee), Some(priority_fee)) =
                (fees.max_fee_per_gas, fees.max_priority_fee_per_gas)
            else {
                return Err(LedgerError::MissingDynamicFees);
            };
            tx.gas_price = None;
            tx.max_fee_per_gas = Some(max_fee);
            tx.max_priority_fee_per_gas = Some(priority_fee);
            tx.transaction_type = Some(TxType::Eip1559 as u8);
        }
        other => return Err(LedgerError::UnsupportedTxType(other)),
    }
    Ok(())
}
