use alloy::{
    consensus::TxEnvelope,
    eips::eip2718::Encodable2718,
    primitives::{Address, Bytes, TxHash},
};
use std::collections::BTreeMap;

/// A wire-ready signed transaction grouped under its sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub sender: Address,
    pub nonce: u64,
    pub tx_hash: TxHash,
    /// EIP-2718 encoded envelope, as passed to `eth_sendRawTransaction`.
    pub raw: Bytes,
}

impl SignedTransaction {
    pub fn from_envelope(sender: Address, nonce: u64, envelope: &TxEnvelope) -> Self {
        Self {
            sender,
            nonce,
            tx_hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
        }
    }
}

pub type SignedTxsBySender = BTreeMap<Address, Vec<SignedTransaction>>;

/// Identifiers and errors collected for one group of submitted transactions.
///
/// After retries are exhausted, `identifiers.len() + errors.len()` equals the
/// number of transactions that were handed to the dispatcher.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub identifiers: Vec<TxHash>,
    pub errors: Vec<String>,
}

impl DispatchOutcome {
    pub fn len(&self) -> usize {
        self.identifiers.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type IdentifiersBySender = BTreeMap<Address, DispatchOutcome>;

/// Total identifiers and errors across all senders.
pub fn totals(by_sender: &IdentifiersBySender) -> (usize, usize) {
    by_sender.values().fold((0, 0), |(ids, errs), outcome| {
        (ids + outcome.identifiers.len(), errs + outcome.errors.len())
    })
}
