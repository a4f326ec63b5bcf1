//! PeerPrint node helper
//!
//! Resolves the local P2P server address and reclaims fileshare space.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pp_core::config::{self, DirRemovalPolicy, NodeConfig};
use pp_core::types::HealthStatus;
use pp_node::bootstrap::{plan_server, wait_for_server, TcpPing};
use pp_node::fileshare::{run_periodic_reclaim, FileshareJanitor, Reclaimer};
use pp_node::queue_dump::{QueueDump, QueueDumpFile};
use pp_node::resolve_local_address;

#[derive(Parser)]
#[command(name = "pp-node")]
#[command(about = "PeerPrint node helper - address discovery and fileshare reclamation")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the local address the P2P server should bind to
    Resolve {
        /// Connectivity check timeout in seconds (overrides config)
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Delete fileshare entries no queue needs any more
    Reclaim {
        /// JSON queue dump to compute retention from
        #[arg(short, long)]
        queues: PathBuf,

        /// Fileshare directory (overrides config)
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Fail if a stale directory cannot be fully removed
        #[arg(long)]
        strict_dirs: bool,
    },

    /// Write a configuration file populated with defaults
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Plan the P2P server and reclaim the fileshare periodically
    Run {
        /// JSON queue dump, re-read before every pass
        #[arg(short, long)]
        queues: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let node_config = || load_node_config(args.config.as_ref());

    match args.command {
        Commands::Resolve { timeout } => {
            let config = node_config()?;
            let timeout = timeout
                .map(Duration::from_secs)
                .unwrap_or(config.resolve_timeout);
            let check = config.online_check.clone();
            let addr = tokio::task::spawn_blocking(move || resolve_local_address(&check, timeout))
                .await
                .context("Address resolution task failed")??;
            println!("{}", addr);
        }

        Commands::Reclaim {
            queues,
            store,
            strict_dirs,
        } => {
            let config = node_config()?;
            let store = store.unwrap_or_else(|| config.fileshare_dir.clone());
            let mut reclaimer_config = config.reclaim.clone();
            if strict_dirs {
                reclaimer_config.directory_removal = DirRemovalPolicy::Strict;
            }

            let observed = QueueDump::load(&queues)?.into_observed();
            let report = Reclaimer::from_config(&reclaimer_config)
                .run(&store, &observed.queues, &observed.local)
                .with_context(|| format!("Failed to reclaim {:?}", store))?;
            println!("Reclaimed {} fileshare entries", report.deleted);
        }

        Commands::InitConfig { force } => {
            let path = args
                .config
                .clone()
                .unwrap_or_else(config::default_config_path);
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file {:?} already exists (use --force to overwrite)",
                    path
                );
            }
            config::save_config(&path, &NodeConfig::default())
                .with_context(|| format!("Failed to write config to {:?}", path))?;
            println!("Wrote default configuration to {}", path.display());
        }

        Commands::Run { queues } => run(node_config()?, queues).await?,
    }

    Ok(())
}

fn load_node_config(path: Option<&PathBuf>) -> Result<NodeConfig> {
    if let Some(path) = path {
        return config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        Ok(config::load_config(&default_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
            NodeConfig::default()
        }))
    } else {
        tracing::debug!("Using default configuration");
        Ok(NodeConfig::default())
    }
}

async fn run(config: NodeConfig, queues: PathBuf) -> Result<()> {
    let plan_config = config.clone();
    let plan = tokio::task::spawn_blocking(move || plan_server(&plan_config, resolve_local_address))
        .await
        .context("Server planning task failed")?;

    let server_status = match &plan.addr {
        Some(addr) => {
            tracing::info!("P2P server address: {} (start_proc={})", addr, plan.start_process);
            let ping = TcpPing::new(addr.to_string(), config.resolve_timeout);
            if wait_for_server(&ping, config.connect_attempts, config.connect_delay).await {
                HealthStatus::Ready
            } else {
                plan.status.clone()
            }
        }
        None => plan.status.clone(),
    };
    tracing::info!("P2P server status: {}", server_status);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        cancel_clone.cancel();
    });

    let janitor = Arc::new(FileshareJanitor::new(
        config.fileshare_dir.clone(),
        Reclaimer::from_config(&config.reclaim),
    ));
    run_periodic_reclaim(
        janitor,
        Arc::new(QueueDumpFile::new(queues)),
        config.reclaim.interval,
        cancel,
    )
    .await;

    tracing::info!("PeerPrint node shutdown complete");
    Ok(())
}
