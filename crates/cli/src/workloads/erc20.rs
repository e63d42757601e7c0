use alloy::{
    primitives::{Address, TxKind, U256},
    providers::Provider,
    rpc::types::{TransactionInput, TransactionRequest},
    serde::WithOtherFields,
    sol,
    sol_types::SolCall,
};
use async_trait::async_trait;
use floodgate_core::{
    ledger::SenderAccount,
    node::AnyProvider,
    workload::{OperationEstimate, TokenWorkload, Workload},
    Result,
};

use super::{base_estimate, decode_uint, with_headroom};
use crate::util::parse_amount;

pub static DEFAULT_TOKENS_SENT: &str = "0.00001 ether";

sol! {
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
    }
}

#[derive(clap::Args, Clone, Debug)]
pub struct Erc20CliArgs {
    /// Token contract. The funding account must hold the supply used for funding.
    #[arg(long)]
    pub token: Address,

    #[arg(
        short,
        long,
        long_help = "The amount of tokens to send in each tx.",
        default_value = DEFAULT_TOKENS_SENT,
        value_parser = parse_amount,
    )]
    pub send_amount: U256,

    #[arg(
        short = 'r',
        long = "recipient",
        long_help = "The address to receive tokens sent by spam txs. Each sub-account sends to itself by default."
    )]
    pub token_recipient: Option<Address>,

    /// Gas limit per transfer; estimated against the node when omitted.
    #[arg(long)]
    pub gas_limit: Option<u64>,
}

pub struct Erc20Workload {
    provider: AnyProvider,
    supplier: Address,
    token: Address,
    send_amount: U256,
    recipient: Option<Address>,
    gas_limit: Option<u64>,
    estimate: Option<OperationEstimate>,
}

impl Erc20Workload {
    pub fn new(provider: AnyProvider, supplier: Address, args: Erc20CliArgs) -> Self {
        Self {
            provider,
            supplier,
            token: args.token,
            send_amount: args.send_amount,
            recipient: args.token_recipient,
            gas_limit: args.gas_limit,
            estimate: None,
        }
    }

    fn transfer_request(&self, to: Address, amount: U256) -> TransactionRequest {
        let data = IERC20::transferCall { to, amount }.abi_encode();
        TransactionRequest {
            to: Some(TxKind::Call(self.token)),
            input: TransactionInput::both(data.into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Workload for Erc20Workload {
    fn name(&self) -> &str {
        "erc20"
    }

    fn start_message(&self) -> String {
        format!(
            "sending {} units of token {} per tx",
            self.send_amount, self.token
        )
    }

    fn resource_value(&self) -> U256 {
        U256::ZERO
    }

    async fn estimate_base_operation_cost(&mut self) -> Result<OperationEstimate> {
        let gas_limit = match self.gas_limit {
            Some(gas) => gas,
            None => {
                let mut tx = self.transfer_request(self.supplier, self.send_amount);
                tx.from = Some(self.supplier);
                with_headroom(self.provider.estimate_gas(WithOtherFields::new(tx)).await?)
            }
        };
        let estimate = base_estimate(&self.provider, gas_limit).await?;
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
        let to = self.recipient.unwrap_or(sender.address());
        Ok(self.transfer_request(to, self.send_amount))
    }

    fn as_token(&self) -> Option<&dyn TokenWorkload> {
        Some(self as &dyn TokenWorkload)
    }
}

#[async_trait]
impl TokenWorkload for Erc20Workload {
    fn transfer_amount(&self) -> U256 {
        self.send_amount
    }

    fn supplier(&self) -> Address {
        self.supplier
    }

    async fn token_balance(&self, address: Address) -> Result<U256> {
        let data = IERC20::balanceOfCall { owner: address }.abi_encode();
        let tx = TransactionRequest {
            to: Some(TxKind::Call(self.token)),
            input: TransactionInput::both(data.into()),
            ..Default::default()
        };
        let res = self.provider.call(WithOtherFields::new(tx)).await?;
        decode_uint(&res)
    }

    fn create_funding_transaction(&self, to: Address, amount: U256) -> Result<TransactionRequest> {
        Ok(self.transfer_request(to, amount))
    }
}
