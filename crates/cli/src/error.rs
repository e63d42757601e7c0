use floodgate_core::{config::ConfigError, seed::SeedParseError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("core error")]
    Core(#[from] floodgate_core::Error),

    #[error("invalid engine config")]
    Config(#[from] ConfigError),

    #[error("invalid private key: {0}")]
    #[diagnostic(help("pass a 32-byte hex key with --private-key or FLOODGATE_PRIVATE_KEY"))]
    InvalidPrivateKey(String),

    #[error("invalid seed")]
    Seed(#[from] SeedParseError),

    #[error("no accounts are ready to send, nothing to do")]
    #[diagnostic(help("check the funding account's balance, or lower --accounts / --txs-per-account"))]
    NoReadyAccounts,
}
