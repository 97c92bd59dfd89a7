//! ledgerlink-server binary
//!
//! ```bash
//! ledgerlink-server --config ledgerlink.json --port 3000
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ledgerlink_client::OnChainQueryFacade;
use ledgerlink_core::LedgerLinkConfig;
use ledgerlink_rpc::{JsonRpcLedger, ResilientLedger};
use ledgerlink_server::metrics::init_prometheus_recorder;
use ledgerlink_server::ServerBuilder;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ledgerlink-server")]
#[command(about = "Serve raffle and payment-link lookups by public id")]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "ledgerlink.json")]
    config: PathBuf,

    /// Port to listen on
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Maximum ids accepted by one batch request
    #[arg(long, default_value = "100")]
    max_batch_ids: usize,

    /// Maximum HTTP requests handled at once
    #[arg(long, default_value = "256")]
    max_concurrent_requests: usize,

    /// Do not install the Prometheus recorder
    #[arg(long)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ledgerlink=info".parse()?))
        .init();

    let args = Args::parse();
    let config = LedgerLinkConfig::load(&args.config)?;
    tracing::info!(config = %args.config.display(), classes = config.classes.len(), "Loaded configuration");

    let remote = JsonRpcLedger::connect(&config.rpc_url, &config.classes).await?;
    let ledger = Arc::new(ResilientLedger::new(remote, &config.resilience)?);
    let facade = OnChainQueryFacade::connect(&config, ledger).await?;

    let mut builder = ServerBuilder::new(facade)
        .port(args.port)
        .max_batch_ids(args.max_batch_ids)
        .max_concurrent_requests(args.max_concurrent_requests);
    if !args.no_metrics {
        builder = builder.prometheus(init_prometheus_recorder()?);
    }

    let server = builder.build()?;
    tracing::info!("Server ready on port {}", args.port);
    server.run().await?;

    Ok(())
}
