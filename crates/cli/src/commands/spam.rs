use std::sync::Arc;

use floodgate_core::{
    dispatch::LogCallback,
    engine::{RunContext, RunOutput},
    node::connect_http,
};

use super::{fund::fund_accounts, SendTxsCliArgs};
use crate::{error::CliError, util::print_run_summary, workloads::WorkloadCli};

pub async fn spam(args: SendTxsCliArgs, workload: WorkloadCli) -> Result<RunOutput, CliError> {
    let (ctx, funder) = args.init(Arc::new(LogCallback::default()))?;
    let mut workload = workload.build(connect_http(args.rpc_url.clone()), funder.address());
    workload.estimate_base_operation_cost().await?;

    let ready = fund_accounts(&ctx, &funder, &args, workload.as_ref()).await?;
    if ready.is_empty() {
        return Err(CliError::NoReadyAccounts);
    }

    let run = RunContext {
        account_indexes: ready,
        target_accounts: args.accounts,
        operations_per_account: args.txs_per_account,
        tx_type: args.tx_type.into(),
    };
    let output = ctx.engine().run(workload.as_ref(), &run).await?;
    print_run_summary(&output, args.accounts);
    Ok(output)
}
