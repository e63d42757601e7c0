//! Concrete workloads offered by the CLI.

mod erc20;
mod nft_mint;
mod transfers;

pub use erc20::{Erc20CliArgs, Erc20Workload};
pub use nft_mint::{NftMintCliArgs, NftMintWorkload};
pub use transfers::{TransferCliArgs, TransferWorkload};

use alloy::primitives::{Address, U256};
use clap::Subcommand;
use floodgate_core::{
    node::{AnyProvider, NodeClient},
    workload::{OperationEstimate, Workload, WorkloadError},
    Result,
};

#[derive(Clone, Debug, Subcommand)]
pub enum WorkloadCli {
    /// Native value transfers.
    Transfers(TransferCliArgs),

    /// ERC-20 token transfers. Sub-accounts are also funded with tokens.
    Erc20(Erc20CliArgs),

    /// Calls `mint(address)` on an NFT contract.
    #[command(name = "nft-mint")]
    NftMint(NftMintCliArgs),
}

impl WorkloadCli {
    /// Builds the workload. `funder` is the funding account; token workloads
    /// treat it as the token supplier.
    pub fn build(self, provider: AnyProvider, funder: Address) -> Box<dyn Workload> {
        match self {
            WorkloadCli::Transfers(args) => Box::new(TransferWorkload::new(provider, args)),
            WorkloadCli::Erc20(args) => Box::new(Erc20Workload::new(provider, funder, args)),
            WorkloadCli::NftMint(args) => Box::new(NftMintWorkload::new(provider, funder, args)),
        }
    }
}

/// Chain id and fee snapshot for a workload whose gas limit is already known.
async fn base_estimate(provider: &AnyProvider, gas_limit: u64) -> Result<OperationEstimate> {
    Ok(OperationEstimate {
        gas_limit,
        chain_id: provider.chain_id().await?,
        fees: provider.fee_snapshot().await?,
    })
}

/// Gas estimates are taken against the funder's state; sub-accounts get 30% headroom.
fn with_headroom(gas: u64) -> u64 {
    gas.saturating_add(gas * 3 / 10)
}

/// Reads the first 32-byte word of an `eth_call` result as a uint256.
fn decode_uint(data: &[u8]) -> Result<U256> {
    if data.len() < 32 {
        return Err(WorkloadError::InvalidResponse(format!(
            "expected a 32-byte uint256, got {} byte(s)",
            data.len()
        ))
        .into());
    }
    Ok(U256::from_be_slice(&data[..32]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_uint_words() {
        let mut word = [0u8; 32];
        word[31] = 42;
        assert_eq!(decode_uint(&word).unwrap(), U256::from(42));
        assert!(decode_uint(&word[..8]).is_err());
    }

    #[test]
    fn headroom_rounds_down() {
        assert_eq!(with_headroom(100_000), 130_000);
        assert_eq!(with_headroom(0), 0);
    }
}
