use anyhow::Result;
use clap::Parser;
use dv_router::config::RouterConfig;
use dv_router::protocol::RoutingEngine;
use std::net::Ipv4Addr;
use tokio::runtime::Builder;

/// Timer callbacks and the receive loop share this fixed pool.
const WORKER_THREADS: usize = 4;

#[derive(Parser)]
#[command(name = "dv-router", about = "Distance-vector routing node over UDP broadcast")]
struct Cli {
    /// JSON configuration file; flags below override its values.
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    router_id: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Keepalive re-broadcast interval in milliseconds.
    #[arg(long)]
    keepalive_interval: Option<u64>,

    /// Neighbor inactivity timeout in milliseconds.
    #[arg(long)]
    inactivity_interval: Option<u64>,

    /// Explicit broadcast addresses instead of interface enumeration.
    #[arg(long, num_args = 1..)]
    broadcast: Vec<Ipv4Addr>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RouterConfig::load(path)?,
        None => RouterConfig::default(),
    };
    if let Some(id) = cli.router_id {
        config.router_id = id;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(ms) = cli.keepalive_interval {
        config.keepalive_interval_ms = ms;
    }
    if let Some(ms) = cli.inactivity_interval {
        config.inactivity_interval_ms = ms;
    }
    if !cli.broadcast.is_empty() {
        config.broadcast_addrs = cli.broadcast;
    }
    if config.router_id.is_empty() {
        anyhow::bail!("a router id is required (--router-id or config file)");
    }

    let rt = Builder::new_multi_thread()
        .worker_threads(WORKER_THREADS)
        .enable_all()
        .build()?;

    rt.block_on(async {
        let engine = RoutingEngine::new(config).await?;

        let ctrl = engine.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl.shutdown();
            }
        });

        engine.start().await
    })
}
