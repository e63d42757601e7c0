use std::sync::Arc;

use alloy::{
    consensus::TxType,
    network::{Ethereum, EthereumWallet, TransactionBuilder, TransactionBuilderError},
    primitives::Address,
    rpc::types::TransactionRequest,
    signers::local::LocalSignerError,
};
use futures::{future::try_join_all, StreamExt, TryStreamExt};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    account::{Account, AccountDeriver},
    node::NodeClient,
    types::{SignedTransaction, SignedTxsBySender},
    Result,
};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to build signed transaction: {0}")]
    Build(#[from] TransactionBuilderError<Ethereum>),

    #[error("seed produced an invalid private key for account index {index}: {error}")]
    InvalidKey {
        index: u64,
        error: LocalSignerError,
    },

    #[error("dynamic-fee transaction requested, but the fee snapshot lacks maxFeePerGas/maxPriorityFeePerGas")]
    MissingDynamicFees,

    #[error("nonce mismatch for {address}: account is at {expected}, transaction carries {found}")]
    NonceMismatch {
        address: Address,
        expected: u64,
        found: u64,
    },

    #[error("unsupported transaction type: {0:?}")]
    UnsupportedTxType(TxType),
}

impl LedgerError {
    pub fn invalid_key(index: u64, error: LocalSignerError) -> Self {
        Self::InvalidKey { index, error }
    }
}

/// A funded account taking part in a run, with the next nonce it will sign with.
///
/// The nonce is owned by this value. It only advances inside [`SenderAccount::sign`],
/// and only after a transaction was successfully signed.
#[derive(Clone, Debug)]
pub struct SenderAccount {
    account: Account,
    nonce: u64,
}

impl SenderAccount {
    pub fn new(account: Account, nonce: u64) -> Self {
        Self { account, nonce }
    }

    pub fn index(&self) -> u64 {
        self.account.index()
    }

    pub fn address(&self) -> Address {
        self.account.address()
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Signs `tx` with this account's key, consuming the current nonce.
    ///
    /// A `tx` without a nonce gets the current one. A `tx` carrying a different
    /// nonce is rejected and the account is left untouched.
    pub async fn sign(
        &mut self,
        mut tx: TransactionRequest,
    ) -> std::result::Result<SignedTransaction, LedgerError> {
        match tx.nonce {
            Some(found) if found != self.nonce => {
                return Err(LedgerError::NonceMismatch {
                    address: self.address(),
                    expected: self.nonce,
                    found,
                });
            }
            _ => tx.nonce = Some(self.nonce),
        }
        tx.from = Some(self.address());

        let wallet = EthereumWallet::from(self.account.signer().to_owned());
        let envelope = tx.build(&wallet).await?;
        let signed = SignedTransaction::from_envelope(self.address(), self.nonce, &envelope);
        self.nonce += 1;
        Ok(signed)
    }
}

/// Signs `operations` transactions for every sender.
///
/// Each sender's transactions are built and signed in a sequential loop, so its
/// nonces come out contiguous and in order. Different senders proceed concurrently.
/// `template` receives the sender and the operation number and returns an unsigned
/// request; it must not set a nonce other than the sender's current one.
pub async fn sign_for_senders<F>(
    senders: &mut [SenderAccount],
    operations: u64,
    template: F,
) -> Result<SignedTxsBySender>
where
    F: Fn(&SenderAccount, u64) -> Result<TransactionRequest> + Sync,
{
    let template = &template;
    let signed = try_join_all(senders.iter_mut().map(|sender| async move {
        let mut txs = Vec::with_capacity(operations as usize);
        for op in 0..operations {
            let tx = template(sender, op)?;
            txs.push(sender.sign(tx).await?);
        }
        Ok::<_, crate::Error>((sender.address(), txs))
    }))
    .await?;
    Ok(signed.into_iter().collect())
}

/// Turns account indexes into [`SenderAccount`]s with nonces read from the node.
#[derive(Clone)]
pub struct Ledger {
    deriver: AccountDeriver,
    node: Arc<dyn NodeClient>,
    concurrency: usize,
}

impl Ledger {
    pub fn new(deriver: AccountDeriver, node: Arc<dyn NodeClient>, concurrency: usize) -> Self {
        Self {
            deriver,
            node,
            concurrency: concurrency.max(1),
        }
    }

    /// Prepares up to `target_count` senders from `indexes`, in the given order.
    /// Each account's transaction count is queried exactly once.
    pub async fn prepare(
        &self,
        indexes: &[u64],
        target_count: usize,
    ) -> Result<Vec<SenderAccount>> {
        let count = indexes.len().min(target_count);
        info!("preparing {count} sender account(s)...");
        let accounts = self.deriver.derive_many(&indexes[..count])?;
        futures::stream::iter(accounts)
            .map(|account| async move {
                let nonce = self.node.transaction_count(account.address()).await?;
                debug!(
                    "account #{} ({}) starts at nonce {nonce}",
                    account.index(),
                    account.address()
                );
                Ok::<_, crate::Error>(SenderAccount::new(account, nonce))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}
