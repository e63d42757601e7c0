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
    workload::{OperationEstimate, Workload},
    Result,
};

use super::{base_estimate, with_headroom};
use crate::util::parse_amount;

sol! {
    interface IMintable {
        function mint(address to) external payable;
    }
}

#[derive(clap::Args, Clone, Debug)]
pub struct NftMintCliArgs {
    /// NFT contract exposing `mint(address)`.
    #[arg(long)]
    pub contract: Address,

    #[arg(
        long,
        default_value = "0",
        value_parser = parse_amount,
        help = "Ether sent with each mint call."
    )]
    pub price: U256,

    /// Gas limit per mint; estimated against the node when omitted.
    #[arg(long)]
    pub gas_limit: Option<u64>,
}

pub struct NftMintWorkload {
    provider: AnyProvider,
    funder: Address,
    contract: Address,
    price: U256,
    gas_limit: Option<u64>,
    estimate: Option<OperationEstimate>,
}

impl NftMintWorkload {
    pub fn new(provider: AnyProvider, funder: Address, args: NftMintCliArgs) -> Self {
        Self {
            provider,
            funder,
            contract: args.contract,
            price: args.price,
            gas_limit: args.gas_limit,
            estimate: None,
        }
    }

    fn mint_request(&self, to: Address) -> TransactionRequest {
        TransactionRequest {
            to: Some(TxKind::Call(self.contract)),
            value: Some(self.price),
            input: TransactionInput::both(IMintable::mintCall { to }.abi_encode().into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Workload for NftMintWorkload {
    fn name(&self) -> &str {
        "nft-mint"
    }

    fn start_message(&self) -> String {
        format!("minting from {} (price {} wei)", self.contract, self.price)
    }

    fn resource_value(&self) -> U256 {
        self.price
    }

    async fn estimate_base_operation_cost(&mut self) -> Result<OperationEstimate> {
        let gas_limit = match self.gas_limit {
            Some(gas) => gas,
            None => {
                let mut tx = self.mint_request(self.funder);
                tx.from = Some(self.funder);
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
        Ok(self.mint_request(sender.address()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use floodgate_core::{account::AccountDeriver, node::connect_http, seed::Seed};

    #[test]
    fn mints_to_sender() {
        let workload = NftMintWorkload::new(
            connect_http("http://localhost:8545".parse().unwrap()),
            Address::ZERO,
            NftMintCliArgs {
                contract: Address::repeat_byte(0x42),
                price: U256::from(3),
                gas_limit: None,
            },
        );
        let sender = SenderAccount::new(
            AccountDeriver::new(Seed::from_u256(U256::from(8))).derive(1).unwrap(),
            0,
        );
        let tx = workload.operation_request(&sender, 0).unwrap();
        assert_eq!(tx.to, Some(TxKind::Call(Address::repeat_byte(0x42))));
        assert_eq!(tx.value, Some(U256::from(3)));
        let call = IMintable::mintCall::abi_decode(tx.input.input().unwrap()).unwrap();
        assert_eq!(call.to, sender.address());
        assert_eq!(workload.resource_value(), U256::from(3));
    }
}
