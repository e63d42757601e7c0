//! Delivery of signed transactions to the node over JSON-RPC.
//!
//! Two modes are offered:
//! - [`Dispatcher::send_batched`] groups transactions into batch calls sent one
//!   group after another. [`Dispatcher::send_batched_in_nonce_order`] does the
//!   same for one sender's nonce chain and stops at the first gap.
//! - [`Dispatcher::send_parallel_by_sender`] runs one task per sender; each task
//!   sends its transactions one at a time, in nonce order.
//!
//! Neither mode guarantees an identifier for every input. Each input ends up
//! either in `identifiers` or in `errors` of the returned outcome.

pub mod batch;
mod callback;
mod retry;
pub mod transport;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use alloy::{
    primitives::{Address, TxHash},
    transports::TransportErrorKind,
};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use batch::generate_batches;
pub use callback::{LogCallback, NilCallback, OnTxSent, SendEvent};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, RpcTransport};

use crate::{
    config::EngineConfig,
    types::{DispatchOutcome, IdentifiersBySender, SignedTransaction, SignedTxsBySender},
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Pushes signed transactions to the node, retrying transport failures.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn RpcTransport>,
    batch_retry: RetryPolicy,
    send_retry: RetryPolicy,
    progress: Arc<AtomicU64>,
    callback: Arc<dyn OnTxSent>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn RpcTransport>, config: &EngineConfig) -> Self {
        Self {
            transport,
            batch_retry: config.batch_retry,
            send_retry: config.send_retry,
            progress: Arc::new(AtomicU64::new(0)),
            callback: Arc::new(NilCallback),
        }
    }

    pub fn with_callback(mut self, callback: Arc<dyn OnTxSent>) -> Self {
        self.callback = callback;
        self
    }

    /// Number of sends completed (identifier or error) since creation.
    pub fn progress(&self) -> u64 {
        self.progress.load(Ordering::Relaxed)
    }

    fn record(&self, sender: Address, tx_hash: TxHash, error: Option<&str>) {
        let completed = self.progress.fetch_add(1, Ordering::Relaxed) + 1;
        self.callback.on_tx_sent(&SendEvent {
            sender,
            tx_hash,
            error,
            completed,
        });
    }

    fn push_result(
        &self,
        outcome: &mut DispatchOutcome,
        tx: &SignedTransaction,
        result: Result<TxHash, String>,
    ) {
        match result {
            Ok(id) => {
                self.record(tx.sender, tx.tx_hash, None);
                outcome.identifiers.push(id);
            }
            Err(e) => {
                self.record(tx.sender, tx.tx_hash, Some(&e));
                outcome.errors.push(e);
            }
        }
    }

    /// Sends `txs` as JSON-RPC batch calls of `batch_size` elements, one group at
    /// a time.
    ///
    /// Errors reported by the node for single elements are recorded and not
    /// retried. A transport failure retries the whole group under the batch
    /// retry policy; once that is spent, every element of the group is recorded
    /// as an error and the next group is sent.
    pub async fn send_batched(
        &self,
        txs: &[SignedTransaction],
        batch_size: usize,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.send_groups(txs, batch_size, false).await
    }

    /// Like [`Dispatcher::send_batched`], for transactions of one sender given in
    /// nonce order.
    ///
    /// Once a transaction is not accepted, every later one sits behind a nonce
    /// gap. Those are recorded as errors: the ones already sent in the same
    /// group lose their identifier, and later groups are not sent at all.
    pub async fn send_batched_in_nonce_order(
        &self,
        txs: &[SignedTransaction],
        batch_size: usize,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.send_groups(txs, batch_size, true).await
    }

    async fn send_groups(
        &self,
        txs: &[SignedTransaction],
        batch_size: usize,
        stop_at_gap: bool,
    ) -> Result<DispatchOutcome, DispatchError> {
        let mut outcome = DispatchOutcome::default();
        let batches = generate_batches(txs, batch_size);
        let num_batches = batches.len();
        let mut next_id = 1;
        // nonce of the first tx that was not accepted
        let mut gap: Option<u64> = None;

        for (batch_num, batch) in batches.into_iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            if let Some(nonce) = gap {
                for tx in batch {
                    self.push_result(&mut outcome, tx, Err(behind_gap(tx, nonce)));
                }
                continue;
            }
            let tagged = batch::tag_batch(batch, next_id);
            next_id += batch.len() as u64;
            let packet = batch::build_packet(&tagged)?;
            debug!(
                "sending batch {}/{num_batches} ({} txs)",
                batch_num + 1,
                batch.len()
            );

            let label = format!("batch {}/{num_batches}", batch_num + 1);
            let response = self
                .batch_retry
                .run(&label, |_| self.transport.send_packet(packet.clone()))
                .await;

            match response {
                Ok(response) => {
                    let results = batch::correlate(&tagged, response);
                    for (item, result) in tagged.iter().zip(results) {
                        let result = match (gap, result) {
                            (Some(nonce), Ok(_)) => Err(behind_gap(item.tx, nonce)),
                            (_, result) => result,
                        };
                        if stop_at_gap && gap.is_none() && result.is_err() {
                            gap = Some(item.tx.nonce);
                        }
                        self.push_result(&mut outcome, item.tx, result);
                    }
                }
                Err(e) => {
                    for tx in batch {
                        let err = format!("{}: {label} abandoned: {e}", tx.tx_hash);
                        self.push_result(&mut outcome, tx, Err(err));
                    }
                    if stop_at_gap {
                        gap = Some(batch[0].nonce);
                    }
                }
            }
        }

        if !outcome.errors.is_empty() {
            warn!(
                "{} of {} batched tx(s) were not accepted",
                outcome.errors.len(),
                txs.len()
            );
        }
        Ok(outcome)
    }

    /// Sends each sender's transactions sequentially in a task of its own; senders
    /// run concurrently with no ordering between them.
    ///
    /// Each send is a singleton batch call retried under the send retry policy.
    /// Once a send is abandoned, the sender's later transactions cannot be
    /// included (their nonces follow the abandoned one), so they are recorded as
    /// skipped instead of being sent. A sender task that dies is recorded as one
    /// error per transaction of that sender; other senders are unaffected.
    pub async fn send_parallel_by_sender(&self, txs: SignedTxsBySender) -> IdentifiersBySender {
        let total = txs.values().map(|t| t.len()).sum::<usize>();
        info!("sending {total} tx(s) from {} sender(s)...", txs.len());

        let handles = txs
            .into_iter()
            .map(|(sender, sender_txs)| {
                let dispatcher = self.clone();
                let hashes = sender_txs.iter().map(|tx| tx.tx_hash).collect::<Vec<_>>();
                let handle = tokio::task::spawn(async move {
                    dispatcher.send_sequence(sender, &sender_txs).await
                });
                (sender, hashes, handle)
            })
            .collect::<Vec<_>>();

        let mut by_sender = IdentifiersBySender::new();
        for (sender, hashes, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("send task for {sender} failed: {e}");
                    let mut outcome = DispatchOutcome::default();
                    for tx_hash in hashes {
                        let err = format!("{tx_hash}: send task for {sender} failed: {e}");
                        self.record(sender, tx_hash, Some(&err));
                        outcome.errors.push(err);
                    }
                    outcome
                }
            };
            by_sender.insert(sender, outcome);
        }
        by_sender
    }

    async fn send_sequence(&self, sender: Address, txs: &[SignedTransaction]) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for (i, tx) in txs.iter().enumerate() {
            let tagged = batch::tag_batch(std::slice::from_ref(tx), i as u64 + 1);
            let label = format!("send of tx {} (nonce {}) from {sender}", tx.tx_hash, tx.nonce);
            let response = match batch::build_packet(&tagged) {
                Ok(packet) => {
                    self.send_retry
                        .run(&label, |_| self.transport.send_packet(packet.clone()))
                        .await
                }
                Err(e) => Err(TransportErrorKind::custom(e)),
            };

            match response {
                Ok(response) => {
                    let result = batch::correlate(&tagged, response)
                        .pop()
                        .unwrap_or_else(|| Err(format!("{}: empty response", tx.tx_hash)));
                    self.push_result(&mut outcome, tx, result);
                }
                Err(e) => {
                    let err = format!("{}: abandoned: {e}", tx.tx_hash);
                    self.push_result(&mut outcome, tx, Err(err));
                    let skipped = &txs[i + 1..];
                    if !skipped.is_empty() {
                        warn!(
                            "skipping {} remaining tx(s) from {sender} after abandoned send",
                            skipped.len()
                        );
                    }
                    for later in skipped {
                        let err = format!(
                            "{}: skipped, earlier nonce {} from {sender} was abandoned",
                            later.tx_hash, tx.nonce
                        );
                        self.push_result(&mut outcome, later, Err(err));
                    }
                    break;
                }
            }
        }
        outcome
    }
}

fn behind_gap(tx: &SignedTransaction, nonce: u64) -> String {
    format!(
        "{}: dropped, nonce {} from {} follows unaccepted nonce {nonce}",
        tx.tx_hash, tx.nonce, tx.sender
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use alloy::primitives::{keccak256, Bytes};
    use std::time::Duration;

    fn fake_tx(sender: u8, nonce: u64) -> SignedTransaction {
        let mut raw = vec![sender];
        raw.extend_from_slice(&nonce.to_be_bytes());
        let raw = Bytes::from(raw);
        SignedTransaction {
            sender: Address::repeat_byte(sender),
            nonce,
            tx_hash: keccak256(&raw),
            raw,
        }
    }

    fn dispatcher(transport: Arc<MockTransport>) -> Dispatcher {
        let fast = |n| {
            RetryPolicy::new(n).with_delays(Duration::from_millis(1), Duration::from_millis(2))
        };
        let config = EngineConfig {
            batch_retry: fast(3),
            send_retry: fast(3),
            ..Default::default()
        };
        Dispatcher::new(transport, &config)
    }

    #[tokio::test]
    async fn batched_send_splits_into_groups() {
        let transport = Arc::new(MockTransport::new());
        let txs = (0..45).map(|n| fake_tx(1, n)).collect::<Vec<_>>();
        let d = dispatcher(transport.clone());

        let outcome = d.send_batched(&txs, 20).await.unwrap();
        assert_eq!(transport.packet_sizes(), vec![20, 20, 5]);
        assert_eq!(
            outcome.identifiers,
            txs.iter().map(|t| t.tx_hash).collect::<Vec<_>>()
        );
        assert!(outcome.errors.is_empty());
        assert_eq!(d.progress(), 45);
    }

    #[tokio::test]
    async fn batched_send_records_element_errors() {
        let transport = Arc::new(MockTransport::new().reversed());
        let txs = (0..10).map(|n| fake_tx(1, n)).collect::<Vec<_>>();
        transport.reject(txs[3].tx_hash, "already known");
        transport.reject(txs[7].tx_hash, "nonce too low");

        let outcome = dispatcher(transport.clone())
            .send_batched(&txs, 4)
            .await
            .unwrap();
        assert_eq!(outcome.identifiers.len(), 8);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[0].contains("already known"));
        assert!(outcome.errors[1].contains("nonce too low"));
        assert!(!outcome.identifiers.contains(&txs[3].tx_hash));
        // rejections are not retried
        assert_eq!(transport.packet_sizes(), vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn batched_send_retries_transport_failures() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_next(2);
        let txs = (0..5).map(|n| fake_tx(1, n)).collect::<Vec<_>>();

        let outcome = dispatcher(transport.clone())
            .send_batched(&txs, 5)
            .await
            .unwrap();
        assert_eq!(outcome.identifiers.len(), 5);
        assert_eq!(transport.attempts(), 3);
    }

    #[tokio::test]
    async fn batched_send_gives_up_after_retry_cap() {
        let transport = Arc::new(MockTransport::new());
        // first group exhausts its 3 attempts, second group succeeds
        transport.fail_next(3);
        let txs = (0..6).map(|n| fake_tx(1, n)).collect::<Vec<_>>();

        let outcome = dispatcher(transport.clone())
            .send_batched(&txs, 4)
            .await
            .unwrap();
        assert_eq!(outcome.errors.len(), 4);
        assert!(outcome.errors.iter().all(|e| e.contains("abandoned")));
        assert_eq!(outcome.identifiers, vec![txs[4].tx_hash, txs[5].tx_hash]);
        assert_eq!(outcome.len(), txs.len());
    }

    #[tokio::test]
    async fn empty_batched_send_is_a_noop() {
        let transport = Arc::new(MockTransport::new());
        let outcome = dispatcher(transport.clone())
            .send_batched(&[], 20)
            .await
            .unwrap();
        assert!(outcome.is_empty());
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test]
    async fn parallel_send_preserves_per_sender_order() {
        let transport = Arc::new(MockTransport::new());
        let mut txs = SignedTxsBySender::new();
        for sender in 1..=4u8 {
            txs.insert(
                Address::repeat_byte(sender),
                (0..10).map(|n| fake_tx(sender, n)).collect::<Vec<_>>(),
            );
        }
        let expected = txs.clone();

        let d = dispatcher(transport.clone());
        let by_sender = d.send_parallel_by_sender(txs).await;
        assert_eq!(by_sender.len(), 4);
        for (sender, sent) in expected {
            let outcome = &by_sender[&sender];
            assert_eq!(
                outcome.identifiers,
                sent.iter().map(|t| t.tx_hash).collect::<Vec<_>>()
            );
            // the node saw this sender's txs in nonce order
            let seen = transport
                .sent_hashes()
                .into_iter()
                .filter(|h| sent.iter().any(|t| t.tx_hash == *h))
                .collect::<Vec<_>>();
            assert_eq!(seen, outcome.identifiers);
        }
        assert!(transport.packet_sizes().iter().all(|n| *n == 1));
        assert_eq!(d.progress(), 40);
    }

    #[tokio::test]
    async fn parallel_send_skips_after_abandoned_send() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_next(3);
        let sender = Address::repeat_byte(9);
        let sent = (0..4).map(|n| fake_tx(9, n)).collect::<Vec<_>>();
        let txs = SignedTxsBySender::from([(sender, sent)]);

        let by_sender = dispatcher(transport.clone())
            .send_parallel_by_sender(txs)
            .await;
        let outcome = &by_sender[&sender];
        assert!(outcome.identifiers.is_empty());
        assert_eq!(outcome.errors.len(), 4);
        assert!(outcome.errors[0].contains("abandoned"));
        assert!(outcome.errors[1..].iter().all(|e| e.contains("skipped")));
        assert_eq!(transport.attempts(), 3);
    }

    #[tokio::test]
    async fn parallel_send_continues_after_node_rejection() {
        let transport = Arc::new(MockTransport::new());
        let sender = Address::repeat_byte(2);
        let sent = (0..3).map(|n| fake_tx(2, n)).collect::<Vec<_>>();
        transport.reject(sent[1].tx_hash, "already known");
        let txs = SignedTxsBySender::from([(sender, sent.clone())]);

        let by_sender = dispatcher(transport).send_parallel_by_sender(txs).await;
        let outcome = &by_sender[&sender];
        assert_eq!(outcome.identifiers, vec![sent[0].tx_hash, sent[2].tx_hash]);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn nonce_ordered_send_stops_after_abandoned_group() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_next(3);
        let txs = (0..25).map(|n| fake_tx(1, n)).collect::<Vec<_>>();

        let outcome = dispatcher(transport.clone())
            .send_batched_in_nonce_order(&txs, 20)
            .await
            .unwrap();
        assert!(outcome.identifiers.is_empty());
        assert_eq!(outcome.errors.len(), 25);
        assert!(outcome.errors[..20].iter().all(|e| e.contains("abandoned")));
        assert!(outcome.errors[20..].iter().all(|e| e.contains("follows unaccepted nonce 0")));
        // the group behind the gap never reached the node
        assert!(transport.sent_hashes().is_empty());
        assert_eq!(transport.attempts(), 3);
    }

    #[tokio::test]
    async fn nonce_ordered_send_drops_txs_behind_rejection() {
        let transport = Arc::new(MockTransport::new());
        let txs = (0..6).map(|n| fake_tx(1, n)).collect::<Vec<_>>();
        transport.reject(txs[1].tx_hash, "insufficient funds for gas * price + value");

        let outcome = dispatcher(transport.clone())
            .send_batched_in_nonce_order(&txs, 4)
            .await
            .unwrap();
        assert_eq!(outcome.identifiers, vec![txs[0].tx_hash]);
        assert_eq!(outcome.errors.len(), 5);
        assert!(outcome.errors[0].contains("insufficient funds"));
        assert!(outcome.errors[1..].iter().all(|e| e.contains("unaccepted nonce 1")));
        assert_eq!(transport.packet_sizes(), vec![4]);
    }

    #[tokio::test]
    async fn failed_sender_task_keeps_other_outcomes() {
        let transport = Arc::new(MockTransport::new());
        let healthy = (0..3).map(|n| fake_tx(1, n)).collect::<Vec<_>>();
        let doomed = (0..3).map(|n| fake_tx(2, n)).collect::<Vec<_>>();
        transport.panic_on(doomed[1].tx_hash);
        let txs = SignedTxsBySender::from([
            (Address::repeat_byte(1), healthy.clone()),
            (Address::repeat_byte(2), doomed),
        ]);

        let d = dispatcher(transport);
        let by_sender = d.send_parallel_by_sender(txs).await;
        let ok = &by_sender[&Address::repeat_byte(1)];
        assert_eq!(
            ok.identifiers,
            healthy.iter().map(|t| t.tx_hash).collect::<Vec<_>>()
        );
        let failed = &by_sender[&Address::repeat_byte(2)];
        assert!(failed.identifiers.is_empty());
        assert_eq!(failed.errors.len(), 3);
        assert!(failed.errors.iter().all(|e| e.contains("send task")));
    }
}
