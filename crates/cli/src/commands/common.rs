//! Arguments shared by the `spam` and `fund` commands.

use std::{path::PathBuf, str::FromStr, sync::Arc};

use alloy::{consensus::TxType, signers::local::PrivateKeySigner, transports::http::reqwest::Url};
use floodgate_core::{
    account::Account, config::EngineConfig, dispatch::OnTxSent, orchestrator::FloodgateCtx,
    seed::Seed,
};
use tracing::info;

use crate::error::CliError;

/// The first default anvil account.
pub const DEFAULT_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

#[derive(Clone, Debug, clap::Args)]
pub struct SendTxsCliArgs {
    /// RPC URL to send requests.
    #[arg(
        env = "RPC_URL",
        short,
        long,
        default_value = "http://localhost:8545",
        visible_aliases = ["el-rpc", "el-rpc-url"]
    )]
    pub rpc_url: Url,

    /// Private key of the funding account.
    #[arg(
        env = "FLOODGATE_PRIVATE_KEY",
        short,
        long = "private-key",
        visible_aliases = ["priv-key"],
        long_help = "Private key of the account that funds the sub-accounts. Token workloads also use it as the token supplier.",
        default_value = DEFAULT_PRIVATE_KEY,
        hide_default_value = true
    )]
    pub private_key: String,

    /// Seed for sub-account derivation.
    #[arg(
        env = "FLOODGATE_SEED",
        short,
        long,
        long_help = "Seed (hex or decimal) used to derive sub-accounts. The same seed always yields the same accounts. Random if omitted."
    )]
    pub seed: Option<String>,

    /// Number of sub-accounts to fund and send from.
    #[arg(short = 'a', long, default_value_t = 10)]
    pub accounts: usize,

    /// Index of the first sub-account.
    #[arg(long, default_value_t = 0)]
    pub first_index: u64,

    /// Transactions each sub-account sends.
    #[arg(short = 'n', long, default_value_t = 10, visible_aliases = ["tpa"])]
    pub txs_per_account: u64,

    /// Transaction type
    #[arg(
        short = 't',
        long,
        long_help = "Transaction type for generated transactions.",
        value_enum,
        default_value_t = TxTypeCli::Eip1559,
    )]
    pub tx_type: TxTypeCli,

    /// Overrides `batch_size` from the config file.
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Path to a TOML engine config.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl SendTxsCliArgs {
    pub fn engine_config(&self) -> Result<EngineConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => {
                info!("loading engine config from {}", path.display());
                EngineConfig::from_file(path)?
            }
            None => EngineConfig::default(),
        };
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn funder(&self) -> Result<Account, CliError> {
        let signer = PrivateKeySigner::from_str(self.private_key.trim())
            .map_err(|e| CliError::InvalidPrivateKey(e.to_string()))?;
        Ok(Account::from_signer(signer))
    }

    pub fn seed(&self) -> Result<Seed, CliError> {
        match &self.seed {
            Some(seed) => Ok(Seed::from_str(seed)?),
            None => {
                let seed = Seed::random();
                info!("using random seed {}", seed.as_u256());
                Ok(seed)
            }
        }
    }

    /// Builds the run context and the funding account from these args.
    pub fn init(&self, callback: Arc<dyn OnTxSent>) -> Result<(FloodgateCtx, Account), CliError> {
        let ctx = FloodgateCtx::builder(self.seed()?, self.rpc_url.clone())
            .config(self.engine_config()?)
            .callback(callback)
            .build()?;
        Ok((ctx, self.funder()?))
    }

    pub fn candidate_indexes(&self) -> Vec<u64> {
        (self.first_index..self.first_index.saturating_add(self.accounts as u64)).collect()
    }
}

#[derive(Copy, Debug, Clone, clap::ValueEnum)]
pub enum TxTypeCli {
    /// Legacy transaction (type `0x0`)
    Legacy,
    /// A transaction with a priority fee ([EIP-1559](https://eips.ethereum.org/EIPS/eip-1559)), type `0x2`
    Eip1559,
}

impl std::fmt::Display for TxTypeCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxTypeCli::Legacy => write!(f, "legacy"),
            TxTypeCli::Eip1559 => write!(f, "eip1559"),
        }
    }
}

impl From<TxTypeCli> for TxType {
    fn from(value: TxTypeCli) -> Self {
        match value {
            TxTypeCli::Legacy => TxType::Legacy,
            TxTypeCli::Eip1559 => TxType::Eip1559,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SendTxsCliArgs,
    }

    #[test]
    fn batch_size_flag_overrides_config() {
        let cli = TestCli::parse_from([
            "test",
            "--batch-size",
            "7",
            "--accounts",
            "3",
            "--first-index",
            "5",
        ]);
        let config = cli.args.engine_config().unwrap();
        assert_eq!(config.batch_size, 7);
        assert_eq!(cli.args.candidate_indexes(), vec![5, 6, 7]);
    }

    #[test]
    fn parses_default_funder() {
        let cli = TestCli::parse_from(["test"]);
        let funder = cli.args.funder().unwrap();
        assert_eq!(
            funder.address().to_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn rejects_bad_private_key() {
        let cli = TestCli::parse_from(["test", "--private-key", "0x1234"]);
        assert!(matches!(cli.args.funder(), Err(CliError::InvalidPrivateKey(_))));
    }

    #[test]
    fn same_seed_same_accounts() {
        let cli = TestCli::parse_from(["test", "--seed", "0xabcdef"]);
        assert_eq!(cli.args.seed().unwrap().as_u256(), cli.args.seed().unwrap().as_u256());
    }
}
