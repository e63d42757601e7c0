use alloy::primitives::U256;

/// Gas used by a plain value transfer, which is what a native funding tx is.
pub const TRANSFER_GAS: u64 = 21_000;

/// Funding requirement for one account over one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeCost {
    pub per_operation: U256,
    /// `per_operation * operations_per_account`; the balance each account must hold.
    pub per_account_total: U256,
}

/// Native cost: the moved value plus the gas bill, with the gas bill inflated
/// by `safety_multiplier` so a base-fee rise between estimation and execution
/// does not strand the account.
pub fn native_cost(
    value: U256,
    gas_limit: u64,
    fee_level: u128,
    safety_multiplier: u64,
    operations_per_account: u64,
) -> RuntimeCost {
    let gas_cost = U256::from(gas_limit)
        .saturating_mul(U256::from(fee_level))
        .saturating_mul(U256::from(safety_multiplier));
    let per_operation = value.saturating_add(gas_cost);
    RuntimeCost {
        per_operation,
        per_account_total: per_operation.saturating_mul(U256::from(operations_per_account)),
    }
}

/// Token cost: the run's total token volume (`amount` per operation over
/// `total_operations`) split evenly over `num_accounts`, rounded up.
pub fn token_cost(amount: U256, total_operations: u64, num_accounts: usize) -> RuntimeCost {
    let total = amount.saturating_mul(U256::from(total_operations));
    RuntimeCost {
        per_operation: amount,
        per_account_total: total.div_ceil(U256::from(num_accounts.max(1))),
    }
}

/// What one native funding transfer costs the funder in gas, with 10% headroom.
pub fn funding_transfer_cost(fee_level: u128) -> U256 {
    U256::from(TRANSFER_GAS).saturating_mul(U256::from(fee_level.saturating_add(fee_level / 10)))
}
