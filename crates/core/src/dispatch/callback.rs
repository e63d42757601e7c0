use alloy::primitives::{Address, TxHash};
use tracing::{debug, info};

/// Outcome of one completed send, after retries.
#[derive(Clone, Copy, Debug)]
pub struct SendEvent<'a> {
    pub sender: Address,
    /// Locally computed hash of the transaction that was sent.
    pub tx_hash: TxHash,
    pub error: Option<&'a str>,
    /// Sends completed so far by this dispatcher, including this one.
    pub completed: u64,
}

pub trait OnTxSent: Send + Sync {
    fn on_tx_sent(&self, event: &SendEvent<'_>);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NilCallback;

impl OnTxSent for NilCallback {
    fn on_tx_sent(&self, _event: &SendEvent<'_>) {
        // do nothing
    }
}

/// Logs each send, plus a progress line every `every` sends.
#[derive(Clone, Copy, Debug)]
pub struct LogCallback {
    pub every: u64,
}

impl Default for LogCallback {
    fn default() -> Self {
        Self { every: 1000 }
    }
}

impl OnTxSent for LogCallback {
    fn on_tx_sent(&self, event: &SendEvent<'_>) {
        match event.error {
            Some(err) => debug!("send from {} failed: {err}", event.sender),
            None => debug!("tx delivered. hash: {}, from: {}", event.tx_hash, event.sender),
        }
        if self.every > 0 && event.completed % self.every == 0 {
            info!("{} sends completed", event.completed);
        }
    }
}
