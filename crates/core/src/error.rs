use crate::{
    config::ConfigError, dispatch::DispatchError, funding::FundingError, ledger::LedgerError,
    workload::WorkloadError,
};
use alloy::transports::{RpcError, TransportErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("funding failed: {0}")]
    Funding(#[from] FundingError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError<TransportErrorKind>),

    #[error("workload error: {0}")]
    Workload(#[from] WorkloadError),
}

