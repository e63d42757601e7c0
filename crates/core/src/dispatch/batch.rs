use std::collections::HashMap;

use alloy::{
    primitives::{Bytes, TxHash},
    rpc::json_rpc::{Id, Request, RequestPacket, ResponsePacket, ResponsePayload},
};

use crate::types::SignedTransaction;

pub const SEND_RAW_TRANSACTION: &str = "eth_sendRawTransaction";

/// Splits `items` into groups of `batch_size`; only the last group may be shorter.
///
/// An empty input yields exactly one empty group, and a `batch_size` of zero
/// yields one group holding everything.
pub fn generate_batches<T>(items: &[T], batch_size: usize) -> Vec<&[T]> {
    if items.is_empty() || batch_size == 0 {
        return vec![items];
    }
    items.chunks(batch_size).collect()
}

/// One element of a batch call, tagged with its request id.
#[derive(Clone, Copy, Debug)]
pub struct TaggedTx<'a> {
    pub id: u64,
    pub tx: &'a SignedTransaction,
}

/// Tags `txs` with consecutive request ids starting at `first_id`.
pub fn tag_batch(txs: &[SignedTransaction], first_id: u64) -> Vec<TaggedTx<'_>> {
    txs.iter()
        .enumerate()
        .map(|(i, tx)| TaggedTx {
            id: first_id + i as u64,
            tx,
        })
        .collect()
}

/// Composes a JSON-RPC batch with one `eth_sendRawTransaction` per element.
pub fn build_packet(batch: &[TaggedTx<'_>]) -> Result<RequestPacket, serde_json::Error> {
    let requests = batch
        .iter()
        .map(|tagged| {
            Request::new(
                SEND_RAW_TRANSACTION,
                Id::Number(tagged.id),
                [tagged.tx.raw.clone()],
            )
            .serialize()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RequestPacket::Batch(requests))
}

/// Matches a node reply to the requests that produced it.
///
/// Correlation is by request id; nodes may answer batch elements in any order.
/// The result is in request order, one entry per request: the identifier
/// reported by the node, or a description of why there is none.
pub fn correlate(
    batch: &[TaggedTx<'_>],
    response: ResponsePacket,
) -> Vec<Result<TxHash, String>> {
    let responses = match response {
        ResponsePacket::Single(res) => vec![res],
        ResponsePacket::Batch(res) => res,
    };
    let mut by_id = responses
        .into_iter()
        .filter_map(|res| res.id.as_number().map(|id| (id, res.payload)))
        .collect::<HashMap<_, _>>();

    batch
        .iter()
        .map(|tagged| {
            let tx_hash = tagged.tx.tx_hash;
            match by_id.remove(&tagged.id) {
                Some(ResponsePayload::Success(raw)) => serde_json::from_str::<TxHash>(raw.get())
                    .map_err(|e| format!("{tx_hash}: unreadable result '{}': {e}", raw.get())),
                Some(ResponsePayload::Failure(err)) => Err(format!(
                    "{tx_hash}: node rejected tx (code {}): {}",
                    err.code, err.message
                )),
                None => Err(format!(
                    "{tx_hash}: no response for request id {}",
                    tagged.id
                )),
            }
        })
        .collect()
}

/// Raw payloads of a packet, in packet order. Used by test transports.
pub fn raw_transactions(packet: &RequestPacket) -> Vec<(u64, Bytes)> {
    let requests = match packet {
        RequestPacket::Single(req) => std::slice::from_ref(req),
        RequestPacket::Batch(reqs) => reqs.as_slice(),
    };
    requests
        .iter()
        .filter_map(|req| {
            let id = req.id().as_number()?;
            let params = req.params()?;
            let [raw] = serde_json::from_str::<[Bytes; 1]>(params.get()).ok()?;
            Some((id, raw))
        })
        .collect()
}
