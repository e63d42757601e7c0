use std::time::Duration;

use alloy::{
    network::{AnyNetwork, ReceiptResponse},
    primitives::{Address, TxHash, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    transports::http::reqwest::Url,
};
use async_trait::async_trait;
use tracing::debug;

use crate::{fees::FeeSnapshot, Result};

pub type AnyProvider = DynProvider<AnyNetwork>;

/// Connects an HTTP provider for the given RPC URL.
pub fn connect_http(rpc_url: Url) -> AnyProvider {
    DynProvider::new(
        ProviderBuilder::new()
            .network::<AnyNetwork>()
            .connect_http(rpc_url),
    )
}

/// Chain state queries used by account preparation and funding.
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    async fn balance(&self, address: Address) -> Result<U256>;

    /// Number of transactions sent from `address`; the next nonce it must use.
    async fn transaction_count(&self, address: Address) -> Result<u64>;

    async fn fee_snapshot(&self) -> Result<FeeSnapshot>;

    /// Waits for a receipt. Returns `Some(status)` when one is observed and
    /// `None` if `timeout` elapses first.
    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Option<bool>>;
}

#[async_trait]
impl NodeClient for AnyProvider {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.get_chain_id().await?)
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self.get_balance(address).await?)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64> {
        Ok(self.get_transaction_count(address).await?)
    }

    async fn fee_snapshot(&self) -> Result<FeeSnapshot> {
        let gas_price = self.get_gas_price().await?;
        let snapshot = FeeSnapshot::legacy(gas_price);
        // legacy-only chains reject fee history queries
        match self.estimate_eip1559_fees().await {
            Ok(est) => Ok(snapshot
                .with_dynamic_fees(est.max_fee_per_gas, est.max_priority_fee_per_gas)),
            Err(e) => {
                debug!("no dynamic fee data available: {e}");
                Ok(snapshot)
            }
        }
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Option<bool>> {
        let poll = async {
            loop {
                match self.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt.status(),
                    Ok(None) => {}
                    Err(e) => debug!("receipt query for {tx_hash} failed, retrying: {e}"),
                }
                tokio::time::sleep(poll_interval).await;
            }
        };
        Ok(tokio::time::timeout(timeout, poll).await.ok())
    }
}
