mod common;
mod fund;
mod spam;

use clap::{Parser, Subcommand};

pub use common::{SendTxsCliArgs, TxTypeCli};
pub use fund::fund;
pub use spam::spam;

use crate::workloads::WorkloadCli;

#[derive(Parser, Debug)]
#[command(
    name = "floodgate",
    version,
    about = "Funds derived sub-accounts and floods a JSON-RPC node with signed transactions"
)]
pub struct FloodgateCli {
    #[command(subcommand)]
    pub command: FloodgateSubcommand,
}

impl FloodgateCli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Debug, Subcommand)]
pub enum FloodgateSubcommand {
    #[command(
        name = "spam",
        long_about = "Fund sub-accounts for a workload, then send its txs from every ready sub-account."
    )]
    Spam {
        #[command(flatten)]
        args: Box<SendTxsCliArgs>,

        #[command(subcommand)]
        workload: WorkloadCli,
    },

    #[command(
        name = "fund",
        long_about = "Fund sub-accounts for a workload without sending any workload txs."
    )]
    Fund {
        #[command(flatten)]
        args: Box<SendTxsCliArgs>,

        #[command(subcommand)]
        workload: WorkloadCli,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spam_with_workload_args() {
        let cli = FloodgateCli::parse_from([
            "floodgate",
            "spam",
            "--accounts",
            "4",
            "-n",
            "25",
            "--tx-type",
            "legacy",
            "transfers",
            "--amount",
            "1 gwei",
        ]);
        let FloodgateSubcommand::Spam { args, workload } = cli.command else {
            panic!("expected spam command");
        };
        assert_eq!(args.accounts, 4);
        assert_eq!(args.txs_per_account, 25);
        assert!(matches!(args.tx_type, TxTypeCli::Legacy));
        let WorkloadCli::Transfers(transfer) = workload else {
            panic!("expected transfers workload");
        };
        assert_eq!(transfer.amount, alloy::primitives::U256::from(1_000_000_000u64));
    }

    #[test]
    fn parses_nft_mint() {
        let cli = FloodgateCli::parse_from([
            "floodgate",
            "fund",
            "nft-mint",
            "--contract",
            "0x4242424242424242424242424242424242424242",
        ]);
        assert!(matches!(
            cli.command,
            FloodgateSubcommand::Fund {
                workload: WorkloadCli::NftMint(_),
                ..
            }
        ));
    }
}
