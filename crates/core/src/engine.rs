use alloy::consensus::TxType;
use tracing::{info, warn};

use crate::{
    dispatch::Dispatcher,
    ledger::Ledger,
    types::{totals, IdentifiersBySender},
    workload::Workload,
    Result,
};

/// Parameters of a single load run.
#[derive(Clone, Debug)]
pub struct RunContext {
    /// Indexes of accounts allowed to send, typically the ready set of a funding pass.
    pub account_indexes: Vec<u64>,
    /// Maximum number of senders to use.
    pub target_accounts: usize,
    pub operations_per_account: u64,
    pub tx_type: TxType,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOutput {
    /// Identifiers and errors per sender, each in that sender's nonce order.
    pub by_sender: IdentifiersBySender,
    /// Number of signed transactions handed to the dispatcher.
    pub submitted: usize,
}

impl RunOutput {
    /// `(identifiers, errors)` across all senders.
    pub fn totals(&self) -> (usize, usize) {
        totals(&self.by_sender)
    }
}

/// Runs a workload: prepare senders, construct and sign, dispatch per sender.
pub struct Engine {
    ledger: Ledger,
    dispatcher: Dispatcher,
}

impl Engine {
    pub fn new(ledger: Ledger, dispatcher: Dispatcher) -> Self {
        Self { ledger, dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn run<W>(&self, workload: &W, ctx: &RunContext) -> Result<RunOutput>
    where
        W: Workload + ?Sized,
    {
        let mut senders = self
            .ledger
            .prepare(&ctx.account_indexes, ctx.target_accounts)
            .await?;
        if senders.is_empty() {
            warn!("no sender accounts available, nothing to send");
            return Ok(RunOutput::default());
        }

        info!("{}", workload.start_message());
        let signed = workload
            .construct_transactions(&mut senders, ctx.operations_per_account, ctx.tx_type)
            .await?;
        let submitted = signed.values().map(|txs| txs.len()).sum();

        let by_sender = self.dispatcher.send_parallel_by_sender(signed).await;
        let output = RunOutput {
            by_sender,
            submitted,
        };
        let (identifiers, errors) = output.totals();
        if errors > 0 {
            warn!("{errors} of {submitted} tx(s) were not accepted by the node");
        }
        info!(
            "run complete: {identifiers} tx(s) submitted by {} sender(s)",
            output.by_sender.len()
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::AccountDeriver,
        config::EngineConfig,
        dispatch::RetryPolicy,
        fees::FeeSnapshot,
        ledger::LedgerError,
        mock::{MockNode, MockTransport, MockWorkload},
        seed::Seed,
        Error,
    };
    use alloy::{
        consensus::{Transaction, TxEnvelope},
        eips::eip2718::Decodable2718,
        primitives::U256,
    };
    use std::{sync::Arc, time::Duration};

    fn engine(node: Arc<MockNode>, transport: Arc<MockTransport>) -> (Engine, AccountDeriver) {
        let deriver = AccountDeriver::new(Seed::from_u256(U256::from(99)));
        let retry =
            RetryPolicy::new(3).with_delays(Duration::from_millis(1), Duration::from_millis(1));
        let config = EngineConfig {
            send_retry: retry,
            ..Default::default()
        };
        let ledger = Ledger::new(deriver.clone(), node, 4);
        (Engine::new(ledger, Dispatcher::new(transport, &config)), deriver)
    }

    async fn workload(fees: FeeSnapshot) -> MockWorkload {
        let mut workload = MockWorkload::native(U256::from(1), fees);
        workload.estimate_base_operation_cost().await.unwrap();
        workload
    }

    fn ctx(indexes: Vec<u64>, target: usize, ops: u64) -> RunContext {
        RunContext {
            account_indexes: indexes,
            target_accounts: target,
            operations_per_account: ops,
            tx_type: TxType::Legacy,
        }
    }

    #[tokio::test]
    async fn sends_every_operation_in_nonce_order() {
        let node = Arc::new(MockNode::new());
        let transport = Arc::new(MockTransport::new());
        let (engine, deriver) = engine(node.clone(), transport.clone());
        node.set_nonce(deriver.address(3).unwrap(), 40);

        let workload = workload(FeeSnapshot::legacy(10)).await;
        let output = engine.run(&workload, &ctx(vec![3, 5, 8], 2, 6)).await.unwrap();

        assert_eq!(output.submitted, 12);
        assert_eq!(output.totals(), (12, 0));
        assert_eq!(output.by_sender.len(), 2);
        assert!(!output.by_sender.contains_key(&deriver.address(8).unwrap()));
        assert_eq!(engine.dispatcher().progress(), 12);

        // each sender's txs reached the node in nonce order, starting at its count
        let sender = deriver.address(3).unwrap();
        let ids = &output.by_sender[&sender].identifiers;
        assert_eq!(ids.len(), 6);
        let seen = transport
            .sent_hashes()
            .into_iter()
            .filter(|h| ids.contains(h))
            .collect::<Vec<_>>();
        assert_eq!(&seen, ids);
        assert_eq!(node.nonce_queries(), 2);
    }

    #[tokio::test]
    async fn dynamic_fees_missing_fails_before_sending() {
        let node = Arc::new(MockNode::new());
        let transport = Arc::new(MockTransport::new());
        let (engine, _) = engine(node, transport.clone());

        let workload = workload(FeeSnapshot::legacy(10)).await;
        let mut ctx = ctx(vec![0, 1], 2, 3);
        ctx.tx_type = TxType::Eip1559;
        let err = engine.run(&workload, &ctx).await.unwrap_err();
        assert!(matches!(err, Error::Ledger(LedgerError::MissingDynamicFees)));
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test]
    async fn signs_dynamic_fee_transactions() {
        let node = Arc::new(MockNode::new());
        let transport = Arc::new(MockTransport::new());
        let (engine, deriver) = engine(node, transport);

        let workload = workload(FeeSnapshot::legacy(10).with_dynamic_fees(30, 2)).await;
        let mut senders = engine.ledger.prepare(&[0], 1).await.unwrap();
        let signed = workload
            .construct_transactions(&mut senders, 2, TxType::Eip1559)
            .await
            .unwrap();
        let txs = &signed[&deriver.address(0).unwrap()];
        for (nonce, tx) in txs.iter().enumerate() {
            let envelope = TxEnvelope::decode_2718(&mut tx.raw.as_ref()).unwrap();
            assert!(envelope.is_eip1559());
            assert_eq!(envelope.max_fee_per_gas(), 30);
            assert_eq!(envelope.nonce(), nonce as u64);
        }
    }

    #[tokio::test]
    async fn accounts_for_partial_failures() {
        let node = Arc::new(MockNode::new());
        let transport = Arc::new(MockTransport::new());
        let (engine, _) = engine(node, transport.clone());
        transport.fail_next(3);

        let workload = workload(FeeSnapshot::legacy(10)).await;
        let output = engine.run(&workload, &ctx(vec![0, 1, 2], 3, 4)).await.unwrap();
        let (identifiers, errors) = output.totals();
        assert_eq!(identifiers + errors, output.submitted);
        assert_eq!(output.submitted, 12);
    }

    #[tokio::test]
    async fn uninitialized_workload_is_fatal() {
        let node = Arc::new(MockNode::new());
        let transport = Arc::new(MockTransport::new());
        let (engine, _) = engine(node, transport);
        let workload = MockWorkload::native(U256::from(1), FeeSnapshot::legacy(1));
        let err = engine.run(&workload, &ctx(vec![0], 1, 1)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Workload(crate::workload::WorkloadError::NotInitialized { .. })
        ));
    }
}
