//! Tops up sub-accounts from a single funding account.
//!
//! A distribution pass scans candidate balances, decides up front which
//! shortfalls the funder can cover (see [`allocate`]), sends one funding
//! transfer per chosen account and only reports an account as ready once its
//! funding receipt confirmed success.

mod allocator;
mod cost;

pub use allocator::{allocate, Allocation, AllocationPolicy, Shortfall};
pub use cost::{funding_transfer_cost, native_cost, token_cost, RuntimeCost, TRANSFER_GAS};

use std::{collections::HashMap, sync::Arc};

use alloy::{
    consensus::TxType,
    primitives::{utils::format_ether, Address, TxKind, U256},
    rpc::types::TransactionRequest,
};
use futures::{StreamExt, TryStreamExt};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    account::{Account, AccountDeriver},
    config::EngineConfig,
    dispatch::Dispatcher,
    fees::apply_fees,
    ledger::SenderAccount,
    node::NodeClient,
    workload::{FundingResource, OperationEstimate, TokenWorkload, Workload, WorkloadError},
    Result,
};

#[derive(Debug, Error)]
pub enum FundingError {
    #[error("funding account {funder} cannot fund a single account with {resource}: has {have}, cheapest top-up needs {need}")]
    InsufficientFunds {
        funder: Address,
        have: U256,
        need: U256,
        resource: FundingResource,
    },
}

/// Inputs of one distribution pass.
#[derive(Clone, Debug)]
pub struct FundingPlan {
    pub candidate_indexes: Vec<u64>,
    pub operations_per_account: u64,
    pub resource: FundingResource,
    pub tx_type: TxType,
}

/// What a distribution pass did. All index lists follow candidate order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundingReport {
    pub resource: FundingResource,
    pub requested: usize,
    pub cost: RuntimeCost,
    /// Accounts usable for the run: already funded or confirmed funded.
    pub ready: Vec<u64>,
    pub already_funded: Vec<u64>,
    pub funded: Vec<u64>,
    /// Allocated, but the funding transfer did not confirm successfully.
    pub failed: Vec<u64>,
    /// Left out by the allocator.
    pub unfunded: Vec<u64>,
    pub errors: Vec<String>,
}

impl FundingReport {
    fn new(plan: &FundingPlan, cost: RuntimeCost) -> Self {
        Self {
            resource: plan.resource,
            requested: plan.candidate_indexes.len(),
            cost,
            ready: vec![],
            already_funded: vec![],
            funded: vec![],
            failed: vec![],
            unfunded: vec![],
            errors: vec![],
        }
    }

    /// Fills `ready` from the already-funded and funded sets, in `candidates` order.
    fn settle(&mut self, candidates: &[u64]) {
        self.ready = candidates
            .iter()
            .copied()
            .filter(|idx| self.already_funded.contains(idx) || self.funded.contains(idx))
            .collect();
    }
}

/// Resolved resource for one pass: either the node's native balance or a
/// token reached through the workload.
#[derive(Clone, Copy)]
enum Resource<'a> {
    Native,
    Token(&'a dyn TokenWorkload),
}

pub struct Distributor {
    node: Arc<dyn NodeClient>,
    dispatcher: Dispatcher,
    deriver: AccountDeriver,
    config: EngineConfig,
}

impl Distributor {
    pub fn new(
        node: Arc<dyn NodeClient>,
        dispatcher: Dispatcher,
        deriver: AccountDeriver,
        config: EngineConfig,
    ) -> Self {
        Self {
            node,
            dispatcher,
            deriver,
            config,
        }
    }

    /// Runs one distribution pass for `plan`, funding shortfalls from `funder`.
    ///
    /// Fails if the workload has no cached estimate, if token funding is asked
    /// of a workload without token capabilities, or if the funder cannot cover
    /// even one shortfall. Failed funding transfers only drop their account.
    pub async fn distribute<W>(
        &self,
        funder: &Account,
        plan: &FundingPlan,
        workload: &W,
    ) -> Result<FundingReport>
    where
        W: Workload + ?Sized,
    {
        let estimate = *workload.estimate()?;
        let resource = self.resolve_resource(funder, plan.resource, workload)?;
        let cost = match resource {
            Resource::Native => native_cost(
                workload.resource_value(),
                estimate.gas_limit,
                workload.fee_level()?,
                self.config.native_safety_multiplier,
                plan.operations_per_account,
            ),
            Resource::Token(token) => {
                let num_accounts = plan.candidate_indexes.len();
                token_cost(
                    token.transfer_amount(),
                    plan.operations_per_account.saturating_mul(num_accounts as u64),
                    num_accounts,
                )
            }
        };
        // surface missing fee data before any query or send
        apply_fees(&mut TransactionRequest::default(), plan.tx_type, &estimate.fees)?;

        let mut report = FundingReport::new(plan, cost);
        info!(
            "checking {} balance of {} account(s); each needs {}",
            plan.resource,
            plan.candidate_indexes.len(),
            cost.per_account_total
        );
        let shortfalls = self
            .scan(&plan.candidate_indexes, cost.per_account_total, resource, &mut report)
            .await?;
        if shortfalls.is_empty() {
            info!("all {} account(s) already funded", report.requested);
            report.settle(&plan.candidate_indexes);
            return Ok(report);
        }

        let (budget, reserve) = match resource {
            Resource::Native => (
                self.node.balance(funder.address()).await?,
                funding_transfer_cost(estimate.fees.fee_level()),
            ),
            Resource::Token(token) => (token.supplier_balance().await?, U256::ZERO),
        };
        let allocation = allocate(&shortfalls, budget, reserve, self.config.allocation_policy);
        if allocation.funded.is_empty() {
            let need = shortfalls
                .iter()
                .map(|s| s.missing.saturating_add(reserve))
                .min()
                .unwrap_or_default();
            error!("funding account {} has insufficient funds", funder.address());
            return Err(FundingError::InsufficientFunds {
                funder: funder.address(),
                have: budget,
                need,
                resource: plan.resource,
            }
            .into());
        }
        if !allocation.unfunded.is_empty() {
            warn!(
                "{} of {} requested account(s) could not be funded with the available budget",
                allocation.unfunded.len(),
                shortfalls.len()
            );
        }
        report.unfunded = allocation.unfunded.iter().map(|s| s.index).collect();
        let total = match resource {
            Resource::Native => format!("{} ETH", format_ether(allocation.spent)),
            Resource::Token(_) => format!("{} tokens", allocation.spent),
        };
        info!("funding {} account(s) with {total} total", allocation.funded.len());

        self.fund(funder, plan.tx_type, &estimate, resource, &allocation.funded, &mut report)
            .await?;

        report.settle(&plan.candidate_indexes);
        if report.ready.len() < report.requested {
            warn!(
                "only {} of {} requested account(s) are ready",
                report.ready.len(),
                report.requested
            );
        }
        Ok(report)
    }

    fn resolve_resource<'a, W>(
        &self,
        funder: &Account,
        resource: FundingResource,
        workload: &'a W,
    ) -> Result<Resource<'a>>
    where
        W: Workload + ?Sized,
    {
        match resource {
            FundingResource::Native => Ok(Resource::Native),
            FundingResource::Token => {
                let token =
                    workload
                        .as_token()
                        .ok_or_else(|| WorkloadError::TokenFundingUnsupported {
                            workload: workload.name().to_owned(),
                        })?;
                if token.supplier() != funder.address() {
                    return Err(WorkloadError::SupplierMismatch {
                        supplier: token.supplier(),
                        funder: funder.address(),
                    }
                    .into());
                }
                Ok(Resource::Token(token))
            }
        }
    }

    /// Queries every candidate's balance and returns the shortfalls in candidate
    /// order. Candidates holding enough are recorded as already funded.
    async fn scan(
        &self,
        candidates: &[u64],
        required: U256,
        resource: Resource<'_>,
        report: &mut FundingReport,
    ) -> Result<Vec<Shortfall>> {
        let accounts = self.deriver.derive_many(candidates)?;
        let balances: Vec<(Account, U256)> = futures::stream::iter(accounts)
            .map(|account| async move {
                let balance = match resource {
                    Resource::Native => self.node.balance(account.address()).await?,
                    Resource::Token(token) => token.token_balance(account.address()).await?,
                };
                Ok::<_, crate::Error>((account, balance))
            })
            .buffered(self.config.query_concurrency.max(1))
            .try_collect()
            .await?;

        let mut shortfalls = vec![];
        for (account, balance) in balances {
            if balance >= required {
                debug!("account #{} holds {balance}, no funding needed", account.index());
                report.already_funded.push(account.index());
            } else {
                shortfalls.push(Shortfall {
                    index: account.index(),
                    address: account.address(),
                    missing: required - balance,
                });
            }
        }
        info!(
            "{} account(s) funded, {} short",
            report.already_funded.len(),
            shortfalls.len()
        );
        Ok(shortfalls)
    }

    /// Signs and sends one transfer per entry, then waits for each receipt in
    /// submission order.
    ///
    /// The transfers share the funder's nonce sequence, so once one is not
    /// accepted the later ones are neither sent nor waited on.
    async fn fund(
        &self,
        funder: &Account,
        tx_type: TxType,
        estimate: &OperationEstimate,
        resource: Resource<'_>,
        entries: &[Shortfall],
        report: &mut FundingReport,
    ) -> Result<()> {
        let nonce = self.node.transaction_count(funder.address()).await?;
        let mut funder = SenderAccount::new(funder.clone(), nonce);

        let mut txs = Vec::with_capacity(entries.len());
        let mut index_by_hash = HashMap::with_capacity(entries.len());
        for entry in entries {
            let mut tx = match resource {
                Resource::Native => TransactionRequest {
                    to: Some(TxKind::Call(entry.address)),
                    value: Some(entry.missing),
                    gas: Some(TRANSFER_GAS),
                    ..Default::default()
                },
                Resource::Token(token) => {
                    let mut tx = token.create_funding_transaction(entry.address, entry.missing)?;
                    tx.gas = tx.gas.or(Some(estimate.gas_limit));
                    tx
                }
            };
            tx.chain_id = Some(estimate.chain_id);
            apply_fees(&mut tx, tx_type, &estimate.fees)?;
            let signed = funder.sign(tx).await?;
            debug!(
                "funding account #{} ({}) with {}. tx: {}",
                entry.index, entry.address, entry.missing, signed.tx_hash
            );
            index_by_hash.insert(signed.tx_hash, entry.index);
            txs.push(signed);
        }

        let outcome = self
            .dispatcher
            .send_batched_in_nonce_order(&txs, self.config.batch_size)
            .await?;
        let confirmed_or_pending = outcome.identifiers.len();
        report.errors.extend(outcome.errors);

        info!("waiting for {confirmed_or_pending} funding receipt(s)...");
        for id in outcome.identifiers {
            let Some(&index) = index_by_hash.get(&id) else {
                report
                    .errors
                    .push(format!("node returned unknown identifier {id} for a funding tx"));
                continue;
            };
            let status = self
                .node
                .wait_for_receipt(
                    id,
                    self.config.receipt_timeout(),
                    self.config.receipt_poll_interval(),
                )
                .await;
            match status {
                Ok(Some(true)) => {
                    debug!("funding tx confirmed ({id})");
                    report.funded.push(index);
                }
                Ok(Some(false)) => report
                    .errors
                    .push(format!("funding tx {id} for account #{index} failed on-chain")),
                Ok(None) => report.errors.push(format!(
                    "funding tx {id} for account #{index} not confirmed within {}s",
                    self.config.receipt_timeout_secs
                )),
                Err(e) => report
                    .errors
                    .push(format!("receipt for funding tx {id} (account #{index}): {e}")),
            }
        }

        let funded = &report.funded;
        report.failed = entries
            .iter()
            .map(|e| e.index)
            .filter(|idx| !funded.contains(idx))
            .collect();
        if !report.errors.is_empty() {
            warn!(
                "{} funding transfer(s) failed: {}",
                report.failed.len(),
                report.errors.join("; ")
            );
        }
        Ok(())
    }
}
