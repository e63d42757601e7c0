use std::sync::Arc;

use floodgate_core::{
    account::Account,
    dispatch::NilCallback,
    funding::FundingPlan,
    node::connect_http,
    orchestrator::FloodgateCtx,
    workload::{FundingResource, Workload},
};
use tracing::info;

use super::SendTxsCliArgs;
use crate::{error::CliError, util::print_funding_report, workloads::WorkloadCli};

pub async fn fund(args: SendTxsCliArgs, workload: WorkloadCli) -> Result<Vec<u64>, CliError> {
    let (ctx, funder) = args.init(Arc::new(NilCallback))?;
    let mut workload = workload.build(connect_http(args.rpc_url.clone()), funder.address());
    workload.estimate_base_operation_cost().await?;
    let ready = fund_accounts(&ctx, &funder, &args, workload.as_ref()).await?;
    info!("{} account(s) ready", ready.len());
    Ok(ready)
}

/// Runs the native funding pass, then a token pass over the natively ready
/// accounts if the workload moves tokens. Returns the indexes ready for both.
pub async fn fund_accounts(
    ctx: &FloodgateCtx,
    funder: &Account,
    args: &SendTxsCliArgs,
    workload: &dyn Workload,
) -> Result<Vec<u64>, CliError> {
    let distributor = ctx.distributor();
    let mut plan = FundingPlan {
        candidate_indexes: args.candidate_indexes(),
        operations_per_account: args.txs_per_account,
        resource: FundingResource::Native,
        tx_type: args.tx_type.into(),
    };
    let report = distributor.distribute(funder, &plan, workload).await?;
    print_funding_report(&report);

    if workload.as_token().is_none() || report.ready.is_empty() {
        return Ok(report.ready);
    }
    plan.candidate_indexes = report.ready;
    plan.resource = FundingResource::Token;
    let report = distributor.distribute(funder, &plan, workload).await?;
    print_funding_report(&report);
    Ok(report.ready)
}
