use anyhow::{Context, Result};
use clap::Parser;
use flowpair::config::CollectorArgs;
use flowpair::{collector, logging};
use tracing::info;

fn main() -> Result<()> {
    let args = CollectorArgs::parse();
    let _guard = logging::init_logging(args.log_file.as_deref(), args.log_level())?;

    let config = args.into_config();
    info!(
        host = %config.host,
        port = config.port,
        store = ?config.store,
        "Starting NetFlow collector"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(collector::run(config))
}
