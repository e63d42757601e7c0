use std::{
    fmt::Debug,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use alloy::{
    rpc::json_rpc::{RequestPacket, ResponsePacket},
    transports::{
        http::{reqwest::Url, Client, Http},
        TransportError,
    },
};
use async_trait::async_trait;
use tower::{Layer, Service, ServiceExt};
use tracing::debug;

/// Sends one JSON-RPC packet (single call or batch) and returns the node's reply.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send_packet(&self, packet: RequestPacket) -> Result<ResponsePacket, TransportError>;
}

/// A tower layer that logs method, batch size and latency of every packet.
pub struct LoggingLayer;

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingService<S> {
    inner: S,
}

fn describe(req: &RequestPacket) -> String {
    match req {
        RequestPacket::Single(inner) => inner.method().to_owned(),
        RequestPacket::Batch(reqs) => {
            let method = reqs.first().map(|r| r.method()).unwrap_or("empty");
            format!("batch of {} ({method})", reqs.len())
        }
    }
}

impl<S> Service<RequestPacket> for LoggingService<S>
where
    S: Service<RequestPacket, Response = ResponsePacket, Error = TransportError>,
    S::Future: Send + 'static,
    S::Response: Send + 'static + Debug,
    S::Error: Send + 'static + Debug,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: RequestPacket) -> Self::Future {
        let label = describe(&req);
        let start_time = tokio::time::Instant::now();
        let fut = self.inner.call(req);

        Box::pin(async move {
            let res = fut.await;
            let elapsed = start_time.elapsed().as_millis() as u64;
            match &res {
                Ok(_) => debug!("{label}: {elapsed}ms"),
                Err(e) => debug!("{label}: failed after {elapsed}ms: {e:?}"),
            }
            res
        })
    }
}

/// HTTP transport for raw-transaction submission.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    service: LoggingService<Http<Client>>,
}

impl HttpTransport {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            service: LoggingLayer.layer(Http::new(rpc_url)),
        }
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send_packet(&self, packet: RequestPacket) -> Result<ResponsePacket, TransportError> {
        self.service.clone().oneshot(packet).await
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use alloy::{
        consensus::TxType,
        primitives::{TxKind, U256},
        rpc::types::TransactionRequest,
    };

    use super::*;
    use crate::{
        config::EngineConfig,
        dispatch::Dispatcher,
        fees::apply_fees,
        funding::TRANSFER_GAS,
        node::{test::*, NodeClient},
    };

    #[tokio::test]
    async fn delivers_batches_over_http() {
        let anvil = spawn_anvil();
        let provider = anvil_provider(&anvil);
        let mut sender = anvil_sender(&anvil, 1).await;
        let start_nonce = sender.nonce();
        let fees = provider.fee_snapshot().await.unwrap();

        let mut txs = vec![];
        for _ in 0..5 {
            let mut tx = TransactionRequest {
                to: Some(TxKind::Call(anvil.addresses()[2])),
                value: Some(U256::from(1)),
                gas: Some(TRANSFER_GAS),
                chain_id: Some(anvil.chain_id()),
                ..Default::default()
            };
            apply_fees(&mut tx, TxType::Legacy, &fees).unwrap();
            txs.push(sender.sign(tx).await.unwrap());
        }
        // a resent tx is answered with an element error, not a transport failure
        txs.push(txs[0].clone());

        let transport = Arc::new(HttpTransport::new(anvil.endpoint_url()));
        let dispatcher = Dispatcher::new(transport, &EngineConfig::default());
        let outcome = dispatcher.send_batched(&txs, 2).await.unwrap();

        assert_eq!(
            outcome.identifiers,
            txs[..5].iter().map(|t| t.tx_hash).collect::<Vec<_>>()
        );
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(dispatcher.progress(), 6);

        let last = provider
            .wait_for_receipt(
                txs[4].tx_hash,
                Duration::from_secs(30),
                Duration::from_millis(100),
            )
            .await
            .unwrap();
        assert_eq!(last, Some(true));
        let nonce = provider
            .transaction_count(sender.address())
            .await
            .unwrap();
        assert_eq!(nonce, start_nonce + 5);
    }
}
