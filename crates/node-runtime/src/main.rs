//! # Braidnet Node
//!
//! Entry point for the braidnet node binary. Responsibilities, in order:
//!
//! 1. Install the `tracing` subscriber (`RUST_LOG`, default `info`).
//! 2. Read configuration from defaults and `BN_*` environment overrides.
//! 3. Size the worker pool from the configured multiplier/constant and the
//!    core count, then build the async runtime with exactly that many
//!    workers. The formula runs before the runtime exists.
//! 4. Bootstrap the node and run until an interrupt or a fatal report.
//! 5. Shut the stage graph down in order and exit non-zero on error.
//!
//! Everything interesting lives in the library modules; this file only
//! sequences them.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use node_runtime::config::NodeConfig;
use node_runtime::coordinator::NodeBootstrapCoordinator;
use node_runtime::ports::LoggingSink;

fn main() -> Result<()> {
    init_logging()?;

    let config = NodeConfig::from_env();
    let cores = num_cpus::get();
    let workers = config.pool.worker_threads(cores);
    info!(cores, workers, "[bn-06] sizing worker pool");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .enable_all()
        .build()
        .context("async runtime construction")?;
    runtime.block_on(run(config))
}

async fn run(config: NodeConfig) -> Result<()> {
    let mut node = match NodeBootstrapCoordinator::new(config)
        .bootstrap(Arc::new(LoggingSink::new()))
        .await
    {
        Ok(node) => node,
        Err(e) => {
            error!(error = format!("{e:#}"), "[bn-06] bootstrap failed");
            return Err(e);
        }
    };

    info!("[bn-06] node is running, interrupt to stop");
    let outcome = tokio::select! {
        fatal = node.wait_for_fatal() => match fatal {
            Some(report) => {
                error!(
                    component = %report.component,
                    error = format!("{:#}", report.error),
                    "[bn-06] fatal condition reported, shutting down"
                );
                Err(report
                    .error
                    .context(format!("fatal condition in {}", report.component)))
            }
            None => Ok(()),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("[bn-06] interrupt received, shutting down");
            Ok(())
        }
    };

    node.shutdown().await;
    outcome
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing init: {e}"))
}
