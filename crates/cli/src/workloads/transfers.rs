use alloy::{
    primitives::{Address, TxKind, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use floodgate_core::{
    funding::TRANSFER_GAS,
    ledger::SenderAccount,
    node::AnyProvider,
    workload::{OperationEstimate, Workload},
    Result,
};

use super::base_estimate;
use crate::util::parse_amount;

#[derive(clap::Args, Clone, Debug)]
pub struct TransferCliArgs {
    #[arg(
        short = 'v',
        long = "amount",
        default_value = "0.001 eth",
        value_parser = parse_amount,
        help = "Amount of ether to transfer in each transaction."
    )]
    pub amount: U256,

    #[arg(
        long,
        help = "Address to receive ether sent from sub-accounts. Each sub-account sends to itself by default."
    )]
    pub recipient: Option<Address>,
}

pub struct TransferWorkload {
    provider: AnyProvider,
    amount: U256,
    recipient: Option<Address>,
    estimate: Option<OperationEstimate>,
}

impl TransferWorkload {
    pub fn new(provider: AnyProvider, args: TransferCliArgs) -> Self {
        Self {
            provider,
            amount: args.amount,
            recipient: args.recipient,
            estimate: None,
        }
    }
}

#[async_trait]
impl Workload for TransferWorkload {
    fn name(&self) -> &str {
        "transfers"
    }

    fn start_message(&self) -> String {
        match self.recipient {
            Some(to) => format!("sending {} wei per tx to {to}", self.amount),
            None => format!("sending {} wei per tx back to each sender", self.amount),
        }
    }

    fn resource_value(&self) -> U256 {
        self.amount
    }

    async fn estimate_base_operation_cost(&mut self) -> Result<OperationEstimate> {
        let estimate = base_estimate(&self.provider, TRANSFER_GAS).await?;
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
            to: Some(TxKind::Call(self.recipient.unwrap_or(sender.address()))),
            value: Some(self.amount),
            ..Default::default()
        })
    }
}
