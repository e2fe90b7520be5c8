mod server;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use torch_cluster::{ChangeWatcher, KubeExecutor, PeerCoordinator, StatefulSetSource};
use torch_core::{
    bootstrap::{load_peers, load_settings},
    cache::IdentityCache,
    logging,
    metrics::PrometheusSink,
};

use server::TorchServer;

#[derive(Parser, Debug)]
#[command(name = "torch")]
#[command(about = "Trusted peer mesh coordinator for DA nodes", long_about = None)]
struct Args {
    /// Mutual peers topology file
    #[arg(long, env = "TORCH_CONFIG_FILE", default_value = "./config/peers.yaml")]
    config_file: String,

    /// Service settings file
    #[arg(long, env = "TORCH_SETTINGS_PATH")]
    settings: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Settings and logging
    let config = load_settings(args.settings.as_deref())?;
    logging::init_logging(&config.logging)?;
    info!("Torch starting...");
    info!("HTTP address: {}", config.http_address());

    // 2. Topology
    let peers = Arc::new(load_peers(&args.config_file)?);
    let namespace = config.namespace();
    info!(namespace = %namespace, "Coordinating DA nodes");

    // 3. Cluster access and identity store
    let executor = KubeExecutor::try_default()
        .await
        .context("failed to create Kubernetes client")?;
    let client = executor.client();
    let cache = IdentityCache::from_config(&config.redis, namespace.as_str())?;
    if cache.has_l2() {
        info!("Redis identity store enabled");
    } else {
        info!("Redis identity store disabled, identities are kept in memory only");
    }

    // 4. Coordinator and background components
    let (coordinator, worker) = PeerCoordinator::new(
        &config,
        peers.clone(),
        Arc::new(executor),
        cache,
        Arc::new(PrometheusSink::global()),
    )?;
    let coordinator = Arc::new(coordinator);

    let watcher = config.watcher.enabled.then(|| {
        ChangeWatcher::new(
            Arc::new(StatefulSetSource::new(client, &namespace)),
            coordinator.queue(),
            peers,
            &config.watcher,
        )
    });

    TorchServer::new(config, coordinator, worker, watcher)
        .run()
        .await
}
