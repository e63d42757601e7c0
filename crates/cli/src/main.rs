mod commands;
mod error;
mod util;
mod workloads;

use commands::{FloodgateCli, FloodgateSubcommand};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_tracing();
    let args = FloodgateCli::parse_args();

    match args.command {
        FloodgateSubcommand::Spam { args, workload } => {
            commands::spam(*args, workload).await?;
        }
        FloodgateSubcommand::Fund { args, workload } => {
            commands::fund(*args, workload).await?;
        }
    }
    Ok(())
}

/// Reads the filter from `RUST_LOG`, defaulting to `info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
