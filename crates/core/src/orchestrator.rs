//! Builder that wires config, node access and transport into the funding and
//! run components, with sane defaults for everything but the seed and RPC URL.
use std::sync::Arc;

use alloy::transports::http::reqwest::Url;

use crate::{
    account::AccountDeriver,
    config::EngineConfig,
    dispatch::{Dispatcher, HttpTransport, NilCallback, OnTxSent, RpcTransport},
    engine::Engine,
    funding::Distributor,
    ledger::Ledger,
    node::{connect_http, NodeClient},
    seed::Seed,
    Result,
};

/// Everything needed to fund accounts and run a workload against one node.
#[derive(Clone)]
pub struct FloodgateCtx {
    pub config: EngineConfig,
    pub deriver: AccountDeriver,
    pub node: Arc<dyn NodeClient>,
    pub transport: Arc<dyn RpcTransport>,
    pub callback: Arc<dyn OnTxSent>,
}

impl FloodgateCtx {
    pub fn builder(seed: Seed, rpc_url: Url) -> FloodgateCtxBuilder {
        FloodgateCtxBuilder {
            seed,
            rpc_url,
            config: EngineConfig::default(),
            node: None,
            transport: None,
            callback: Arc::new(NilCallback),
        }
    }

    /// A fresh dispatcher with its own progress counter.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.transport.clone(), &self.config).with_callback(self.callback.clone())
    }

    pub fn distributor(&self) -> Distributor {
        Distributor::new(
            self.node.clone(),
            self.dispatcher(),
            self.deriver.clone(),
            self.config.clone(),
        )
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::new(
            self.deriver.clone(),
            self.node.clone(),
            self.config.query_concurrency,
        )
    }

    pub fn engine(&self) -> Engine {
        Engine::new(self.ledger(), self.dispatcher())
    }
}

/// Builder with sane defaults; only the seed and RPC URL are required.
pub struct FloodgateCtxBuilder {
    seed: Seed,
    rpc_url: Url,
    config: EngineConfig,
    node: Option<Arc<dyn NodeClient>>,
    transport: Option<Arc<dyn RpcTransport>>,
    callback: Arc<dyn OnTxSent>,
}

impl FloodgateCtxBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }
    /// Replaces the HTTP provider used for balance, nonce and receipt queries.
    pub fn node(mut self, node: Arc<dyn NodeClient>) -> Self {
        self.node = Some(node);
        self
    }
    /// Replaces the HTTP transport used for raw-transaction submission.
    pub fn transport(mut self, transport: Arc<dyn RpcTransport>) -> Self {
        self.transport = Some(transport);
        self
    }
    pub fn callback(mut self, callback: Arc<dyn OnTxSent>) -> Self {
        self.callback = callback;
        self
    }

    pub fn build(self) -> Result<FloodgateCtx> {
        self.config.validate()?;
        let node = self
            .node
            .unwrap_or_else(|| Arc::new(connect_http(self.rpc_url.clone())));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new(self.rpc_url)));
        Ok(FloodgateCtx {
            config: self.config,
            deriver: AccountDeriver::new(self.seed),
            node,
            transport,
            callback: self.callback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ConfigError,
        engine::RunContext,
        fees::FeeSnapshot,
        funding::FundingPlan,
        mock::{MockNode, MockTransport, MockWorkload},
        workload::{FundingResource, Workload},
        Error,
    };
    use alloy::{consensus::TxType, primitives::U256};

    fn url() -> Url {
        "http://localhost:8545".parse().unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            native_safety_multiplier: 2,
            ..Default::default()
        };
        let res = FloodgateCtx::builder(Seed::from_u256(U256::from(1)), url())
            .config(config)
            .build();
        assert!(matches!(
            res,
            Err(Error::Config(ConfigError::SafetyMultiplierTooLow(2)))
        ));
    }

    #[tokio::test]
    async fn funds_then_runs() {
        let node = Arc::new(MockNode::new());
        let transport = Arc::new(MockTransport::new());
        let ctx = FloodgateCtx::builder(Seed::from_u256(U256::from(5)), url())
            .node(node.clone())
            .transport(transport.clone())
            .build()
            .unwrap();
        let funder = AccountDeriver::new(Seed::from_u256(U256::from(6)))
            .derive(0)
            .unwrap();
        node.set_balance(funder.address(), U256::from(10).pow(U256::from(20)));

        let mut workload = MockWorkload::native(U256::from(1), FeeSnapshot::legacy(1));
        workload.estimate_base_operation_cost().await.unwrap();

        let plan = FundingPlan {
            candidate_indexes: vec![0, 1, 2],
            operations_per_account: 5,
            resource: FundingResource::Native,
            tx_type: TxType::Legacy,
        };
        let report = ctx.distributor().distribute(&funder, &plan, &workload).await.unwrap();
        assert_eq!(report.ready, vec![0, 1, 2]);

        let run = RunContext {
            account_indexes: report.ready.clone(),
            target_accounts: 3,
            operations_per_account: 5,
            tx_type: TxType::Legacy,
        };
        let output = ctx.engine().run(&workload, &run).await.unwrap();
        assert_eq!(output.totals(), (15, 0));
        // 3 funding txs in one batch, then 15 singleton sends
        assert_eq!(transport.packet_sizes().len(), 16);
    }
}
