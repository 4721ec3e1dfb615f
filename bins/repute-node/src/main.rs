//! Repute service binary.
//!
//! Opens the RocksDB store, schedules the blacklist and score aggregation
//! jobs, and serves the JSON-RPC read API until Ctrl+C.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use repute_node_lib::{start_rpc_server, Node, NodeConfig};
use tracing::{error, info};

/// Provider reputation scoring service.
#[derive(Parser, Debug)]
#[command(
    name = "repute-node",
    version,
    about = "Provider reputation scoring and blacklisting service"
)]
struct Args {
    /// Config file (TOML). `REPUTE__*` environment variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for the reputation database
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// RPC server bind address
    #[arg(long)]
    rpc_bind: Option<String>,

    /// RPC server port
    #[arg(long)]
    rpc_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    /// Apply CLI overrides on top of the layered file and environment config.
    fn into_config(self, mut config: NodeConfig) -> (NodeConfig, String) {
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(rpc_bind) = self.rpc_bind {
            config.rpc_bind = rpc_bind;
        }
        if let Some(rpc_port) = self.rpc_port {
            config.rpc_port = rpc_port;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        (config, self.log_format)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let base = NodeConfig::load(args.config.as_deref()).context("failed to load config")?;
    let (config, log_format) = args.into_config(base);

    init_logging(&config.log_level, &log_format);

    info!("Repute node v{}", env!("CARGO_PKG_VERSION"));
    info!("data_dir: {:?}", config.data_dir);
    info!("rpc_addr: {}", config.rpc_addr());
    info!(
        min_tasks = config.anomaly.min_tasks,
        z_threshold = config.anomaly.z_score_threshold,
        backoff_base_hours = config.backoff.base_hours,
        "scoring parameters"
    );

    std::fs::create_dir_all(&config.data_dir).context("failed to create data_dir")?;

    let node = Node::open(config.clone()).context("failed to open store")?;
    info!("Node initialized");

    let rpc_handle = start_rpc_server(&config.rpc_addr(), node.clone())
        .await
        .context("failed to start RPC server")?;
    info!("RPC server listening on {}", config.rpc_addr());

    info!("Repute node running (Ctrl+C to stop)");

    let shutdown_signal = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down..."),
            Err(e) => error!("failed to listen for Ctrl+C: {}", e),
        }
    };

    tokio::select! {
        _ = node.run() => {
            info!("job loops exited");
        }
        _ = shutdown_signal => {
            info!("shutdown signal received");
        }
    }

    rpc_handle.stop().ok();
    info!("RPC server stopped");
    info!("Repute node shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
