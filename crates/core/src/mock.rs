//! In-memory stand-ins for the node, the transport and a workload, so funding
//! and dispatch can be exercised without a live chain.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use alloy::{
    primitives::{keccak256, Address, Bytes, TxHash, TxKind, U256},
    rpc::{
        json_rpc::{RequestPacket, ResponsePacket},
        types::TransactionRequest,
    },
    transports::{TransportError, TransportErrorKind},
};
use async_trait::async_trait;
use serde_json::json;

use crate::{
    dispatch::{batch::raw_transactions, RpcTransport},
    fees::FeeSnapshot,
    ledger::SenderAccount,
    node::NodeClient,
    workload::{OperationEstimate, TokenWorkload, Workload},
    Result,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MockNode {
    chain_id: u64,
    fees: FeeSnapshot,
    balances: Mutex<HashMap<Address, U256>>,
    nonces: Mutex<HashMap<Address, u64>>,
    /// Scripted receipt outcomes, consumed one per wait; `Some(true)` once empty.
    receipts: Mutex<VecDeque<Option<bool>>>,
    receipt_waits: Mutex<Vec<TxHash>>,
    nonce_queries: AtomicUsize,
}

impl Default for MockNode {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNode {
    pub fn new() -> Self {
        Self {
            chain_id: 1,
            fees: FeeSnapshot::legacy(1_000_000_000),
            balances: Default::default(),
            nonces: Default::default(),
            receipts: Default::default(),
            receipt_waits: Default::default(),
            nonce_queries: AtomicUsize::new(0),
        }
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        lock(&self.balances).insert(address, balance);
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        lock(&self.nonces).insert(address, nonce);
    }

    /// Queues the outcome of the next receipt wait: `Some(status)`, or `None`
    /// for a timeout.
    pub fn push_receipt(&self, status: Option<bool>) {
        lock(&self.receipts).push_back(status);
    }

    pub fn nonce_queries(&self) -> usize {
        self.nonce_queries.load(Ordering::SeqCst)
    }

    /// Hashes waited on, in wait order.
    pub fn receipt_waits(&self) -> Vec<TxHash> {
        lock(&self.receipt_waits).clone()
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(lock(&self.balances).get(&address).copied().unwrap_or_default())
    }

    async fn transaction_count(&self, address: Address) -> Result<u64> {
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.nonces).get(&address).copied().unwrap_or_default())
    }

    async fn fee_snapshot(&self) -> Result<FeeSnapshot> {
        Ok(self.fees)
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        _timeout: Duration,
        _poll_interval: Duration,
    ) -> Result<Option<bool>> {
        lock(&self.receipt_waits).push(tx_hash);
        Ok(lock(&self.receipts).pop_front().unwrap_or(Some(true)))
    }
}

/// Answers `eth_sendRawTransaction` batches with `keccak256(raw)` as the
/// identifier, unless told to fail or reject.
#[derive(Default)]
pub struct MockTransport {
    fail_next: AtomicU32,
    reversed: bool,
    rejections: Mutex<HashMap<TxHash, String>>,
    panic_on: Mutex<Option<TxHash>>,
    packet_sizes: Mutex<Vec<usize>>,
    sent: Mutex<Vec<TxHash>>,
    attempts: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers batch elements in reverse order.
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    /// Fails the next `n` packets with a transport error.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Makes the node reject the transaction with `tx_hash`.
    pub fn reject(&self, tx_hash: TxHash, message: &str) {
        lock(&self.rejections).insert(tx_hash, message.to_owned());
    }

    /// Panics the calling task when a packet carries `tx_hash`.
    pub fn panic_on(&self, tx_hash: TxHash) {
        *lock(&self.panic_on) = Some(tx_hash);
    }

    /// Element count of each packet that reached the node.
    pub fn packet_sizes(&self) -> Vec<usize> {
        lock(&self.packet_sizes).clone()
    }

    /// Hashes of transactions that reached the node, in arrival order.
    pub fn sent_hashes(&self) -> Vec<TxHash> {
        lock(&self.sent).clone()
    }

    /// Packets handed to the transport, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn send_packet(
        &self,
        packet: RequestPacket,
    ) -> std::result::Result<ResponsePacket, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportErrorKind::custom_str("connection refused"));
        }

        let raws = raw_transactions(&packet);
        let panic_on = *lock(&self.panic_on);
        if let Some(target) = panic_on {
            if raws.iter().any(|(_, raw)| keccak256(raw) == target) {
                panic!("transport crashed while sending {target}");
            }
        }
        lock(&self.packet_sizes).push(raws.len());
        let rejections = lock(&self.rejections).clone();
        let mut responses = Vec::with_capacity(raws.len());
        for (id, raw) in raws {
            let hash = keccak256(&raw);
            lock(&self.sent).push(hash);
            responses.push(match rejections.get(&hash) {
                Some(message) => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32000, "message": message },
                }),
                None => json!({ "jsonrpc": "2.0", "id": id, "result": hash }),
            });
        }
        if self.reversed {
            responses.reverse();
        }
        serde_json::from_str(&serde_json::Value::Array(responses).to_string())
            .map_err(TransportErrorKind::custom)
    }
}

struct MockToken {
    contract: Address,
    supplier: Address,
    amount: U256,
    balances: Mutex<HashMap<Address, U256>>,
}

/// Self-transfers of a fixed value, optionally with token capabilities.
pub struct MockWorkload {
    value: U256,
    gas_limit: u64,
    chain_id: u64,
    fees: FeeSnapshot,
    estimate: Option<OperationEstimate>,
    token: Option<MockToken>,
}

impl MockWorkload {
    pub fn native(value: U256, fees: FeeSnapshot) -> Self {
        Self {
            value,
            gas_limit: 21_000,
            chain_id: 1,
            fees,
            estimate: None,
            token: None,
        }
    }

    pub fn with_token(mut self, contract: Address, supplier: Address, amount: U256) -> Self {
        self.token = Some(MockToken {
            contract,
            supplier,
            amount,
            balances: Default::default(),
        });
        self
    }

    pub fn set_token_balance(&self, address: Address, balance: U256) {
        if let Some(token) = &self.token {
            lock(&token.balances).insert(address, balance);
        }
    }
}

#[async_trait]
impl Workload for MockWorkload {
    fn name(&self) -> &str {
        "mock"
    }

    fn start_message(&self) -> String {
        format!("sending mock transfers of {} wei", self.value)
    }

    fn resource_value(&self) -> U256 {
        self.value
    }

    async fn estimate_base_operation_cost(&mut self) -> Result<OperationEstimate> {
        let estimate = OperationEstimate {
            gas_limit: self.gas_limit,
            chain_id: self.chain_id,
            fees: self.fees,
        };
        self.estimate = Some(estimate);
        Ok(estimate)
    }

    fn cached_estimate(&self) -> Option<&OperationEstimate> {
        self.estimate.as_ref()
    }

    fn operation_request(
        &self,
        sender: &SenderAccount,
        _op_index: u64,
    ) -> Result<TransactionRequest> {
        Ok(TransactionRequest {
            to: Some(TxKind::Call(sender.address())),
            value: Some(self.value),
            ..Default::default()
        })
    }

    fn as_token(&self) -> Option<&dyn TokenWorkload> {
        self.token.as_ref().map(|_| self as &dyn TokenWorkload)
    }
}

#[async_trait]
impl TokenWorkload for MockWorkload {
    fn transfer_amount(&self) -> U256 {
        self.token.as_ref().map(|t| t.amount).unwrap_or_default()
    }

    fn supplier(&self) -> Address {
        self.token.as_ref().map(|t| t.supplier).unwrap_or_default()
    }

    async fn token_balance(&self, address: Address) -> Result<U256> {
        Ok(self
            .token
            .as_ref()
            .and_then(|t| lock(&t.balances).get(&address).copied())
            .unwrap_or_default())
    }

    fn create_funding_transaction(&self, to: Address, amount: U256) -> Result<TransactionRequest> {
        let contract = self.token.as_ref().map(|t| t.contract).unwrap_or_default();
        let mut input = to.to_vec();
        input.extend_from_slice(&amount.to_be_bytes::<32>());
        Ok(TransactionRequest {
            to: Some(TxKind::Call(contract)),
            input: Bytes::from(input).into(),
            ..Default::default()
        })
    }
}
