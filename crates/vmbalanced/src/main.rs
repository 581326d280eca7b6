//! vmbalanced — the vmbalance daemon.
//!
//! Reads `vmbalance.toml`, connects to the Proxmox VE API, and runs a
//! balancing cycle: fetch inventory, measure imbalance, plan migrations,
//! apply them.
//!
//! # Usage
//!
//! ```text
//! vmbalanced --config /etc/vmbalance.toml            # one cycle
//! vmbalanced --dry                                    # plan and log only
//! vmbalanced --interval 300                           # every 5 minutes
//! ```
//!
//! Exit codes: `0` success, `1` configuration failure, `2` failed cycle.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use vmbalance_core::BalanceConfig;
use vmbalance_inventory::ProxmoxClient;
use vmbalance_scheduler::{BalanceOptions, Balancer};

#[derive(Parser)]
#[command(name = "vmbalanced", about = "Balance VM load across a Proxmox VE cluster", version)]
struct Cli {
    /// Plan and log migrations without performing them.
    #[arg(short, long)]
    dry: bool,

    /// Configuration file.
    #[arg(short, long, env = "VMBALANCE_CONFIG", default_value = "vmbalance.toml")]
    config: PathBuf,

    /// Run a cycle every N seconds until interrupted instead of once.
    #[arg(long)]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let balancer = match setup(&cli) {
        Ok(b) => b,
        Err(e) => {
            error!(error = format!("{e:#}"), config = ?cli.config, "configuration failed");
            return ExitCode::from(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    match cli.interval {
        Some(secs) => {
            balancer.run(Duration::from_secs(secs.max(1)), shutdown_rx).await;
            ExitCode::SUCCESS
        }
        None => match balancer.run_cycle(&shutdown_rx).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "balancing cycle failed");
                ExitCode::from(2)
            }
        },
    }
}

fn setup(cli: &Cli) -> anyhow::Result<Balancer> {
    let config = BalanceConfig::from_file(&cli.config)?;
    let client = ProxmoxClient::new(&config.proxmox)?;
    info!(
        api = client.base_url(),
        method = %config.balance.method,
        allowed_disparity = config.balance.allowed_disparity,
        rules = config.rules.separate.len(),
        dry_run = cli.dry,
        "vmbalance starting"
    );
    Ok(Balancer::new(
        Arc::new(client),
        BalanceOptions::from_config(&config, cli.dry),
    ))
}
