//! Entry point for everything that asks for identities
//!
//! Wires the resolver, mesh propagator, retry queue, metric registry and
//! consensus env push behind one handle shared by the HTTP layer and the
//! watcher.

use std::collections::BTreeMap;
use std::sync::Arc;

use torch_core::cache::IdentityCache;
use torch_core::config::Config;
use torch_core::metrics::MetricSink;
use torch_core::{Error, MutualPeersConfig, ResolutionStatus, Result};

use super::consensus::ConsensusEnvPusher;
use super::mesh::{MeshOutcome, MeshPropagator};
use super::metric_registry::MetricRegistry;
use super::queue::{RetryQueue, RetryWorker};
use super::resolver::IdentityResolver;
use crate::exec::RemoteExecutor;

pub struct PeerCoordinator {
    peers: Arc<MutualPeersConfig>,
    resolver: Arc<IdentityResolver>,
    mesh: MeshPropagator,
    queue: Arc<RetryQueue>,
    registry: Arc<MetricRegistry>,
    env_pusher: ConsensusEnvPusher,
}

impl PeerCoordinator {
    /// Build every component from settings
    ///
    /// Returns the coordinator and the retry worker that drains its queue;
    /// the caller decides when to start the worker.
    pub fn new(
        config: &Config,
        peers: Arc<MutualPeersConfig>,
        executor: Arc<dyn RemoteExecutor>,
        cache: IdentityCache,
        sink: Arc<dyn MetricSink>,
    ) -> Result<(Self, RetryWorker)> {
        let exec_timeout = config.kube.exec_timeout();
        let namespace = cache.namespace().to_string();

        let resolver = Arc::new(IdentityResolver::new(
            executor.clone(),
            cache,
            peers.clone(),
            exec_timeout,
        ));
        let registry = Arc::new(MetricRegistry::new(
            sink,
            config.metrics.service_name.as_str(),
            namespace.as_str(),
        ));
        let mesh = MeshPropagator::new(
            resolver.clone(),
            executor.clone(),
            registry.clone(),
            peers.clone(),
            config.mesh.max_concurrent_resolutions,
            exec_timeout,
        );
        let queue = Arc::new(RetryQueue::from_config(&config.queue));
        let worker = RetryWorker::new(
            queue.clone(),
            resolver.clone(),
            registry.clone(),
            &config.queue,
        )?;
        let env_pusher = ConsensusEnvPusher::new(executor, namespace, exec_timeout);

        Ok((
            Self {
                peers,
                resolver,
                mesh,
                queue,
                registry,
                env_pusher,
            },
            worker,
        ))
    }

    #[must_use]
    pub fn peers(&self) -> &MutualPeersConfig {
        &self.peers
    }

    #[must_use]
    pub fn queue(&self) -> Arc<RetryQueue> {
        self.queue.clone()
    }

    #[must_use]
    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Resolve one node, then hand its address to opted-in peers of every
    /// group it leads as consensus node
    pub async fn generate(&self, node_name: &str) -> Result<String> {
        let (_, peer) = self
            .peers
            .find(node_name)
            .ok_or_else(|| Error::NotFound(format!("node {node_name} is not configured")))?;

        let address = self.resolver.resolve(peer).await?;
        self.registry.record(node_name, &address);
        self.queue.mark_resolved(node_name, &address);

        for group in self.peers.groups_led_by(node_name) {
            self.env_pusher.push(group, &address).await;
        }

        Ok(address)
    }

    /// Resolve `node_names` and mesh them within their groups
    pub async fn generate_all(&self, node_names: &[String]) -> MeshOutcome {
        let outcome = self.mesh.propagate(node_names).await;
        for (node, address) in &outcome.identities {
            self.queue.mark_resolved(node, address);
        }
        outcome
    }

    /// Run a batch over every configured node
    pub async fn register_all(&self) -> MeshOutcome {
        tracing::info!("Generating initial metrics for all configured nodes");
        self.generate_all(&self.peers.node_names()).await
    }

    /// Queue a configured node for background resolution
    pub async fn enqueue(&self, node_name: &str) -> Result<()> {
        let (_, peer) = self
            .peers
            .find(node_name)
            .ok_or_else(|| Error::NotFound(format!("node {node_name} is not configured")))?;
        self.queue.enqueue(peer.clone()).await
    }

    /// Every known identity of a configured node
    pub async fn identities(&self) -> BTreeMap<String, String> {
        self.resolver
            .cache()
            .snapshot(&self.peers.node_names())
            .await
    }

    /// Known address of one node
    ///
    /// A node that spent its retry budget reports [`Error::Exhausted`].
    pub async fn identity(&self, node_name: &str) -> Result<String> {
        if let Some(address) = self.resolver.cache().get(node_name).await {
            return Ok(address);
        }
        match self.queue.status(node_name) {
            Some(ResolutionStatus::Exhausted { attempts }) => Err(Error::Exhausted {
                node: node_name.to_string(),
                attempts,
            }),
            _ => Err(Error::NotFound(format!(
                "no identity known for node {node_name}"
            ))),
        }
    }

    #[must_use]
    pub fn statuses(&self) -> BTreeMap<String, ResolutionStatus> {
        self.queue.statuses()
    }
}
