//! Node identity resolution
//!
//! Cache first; on a miss the identity command runs inside the node and the
//! printed multiaddress is checked against the node's name and persisted.
//! Concurrent lookups of one node share a
//! single remote call. The resolver never retries on its own.

use std::sync::Arc;
use std::time::{Duration, Instant};

use torch_core::cache::{IdentityCache, SingleFlight, SingleFlightError};
use torch_core::metrics::resolution::{RESOLUTIONS_TOTAL, RESOLUTION_DURATION};
use torch_core::models::DEFAULT_TRUSTED_PEERS_PATH;
use torch_core::{Error, MutualPeersConfig, Peer, Result};

use crate::exec::{multiaddress, run_command, ExecTarget, RemoteCommand, RemoteExecutor};

pub struct IdentityResolver {
    executor: Arc<dyn RemoteExecutor>,
    cache: IdentityCache,
    peers: Arc<MutualPeersConfig>,
    exec_timeout: Duration,
    inflight: SingleFlight<String, String, Error>,
}

impl IdentityResolver {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        cache: IdentityCache,
        peers: Arc<MutualPeersConfig>,
        exec_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            cache,
            peers,
            exec_timeout,
            inflight: SingleFlight::new(),
        }
    }

    #[must_use]
    pub const fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Resolve a configured node by name
    pub async fn resolve_name(&self, node_name: &str) -> Result<String> {
        let (_, peer) = self
            .peers
            .find(node_name)
            .ok_or_else(|| Error::NotFound(format!("node {node_name} is not configured")))?;
        self.resolve(peer).await
    }

    /// Resolve `peer`'s multiaddress
    pub async fn resolve(&self, peer: &Peer) -> Result<String> {
        if let Some(address) = self.cache.get(&peer.node_name).await {
            RESOLUTIONS_TOTAL.with_label_values(&["cache", "ok"]).inc();
            return Ok(address);
        }

        let result = self
            .inflight
            .run(peer.node_name.clone(), self.resolve_remote(peer))
            .await
            .map_err(|e| match e {
                SingleFlightError::Inner(err) => err,
                SingleFlightError::LeaderDropped => {
                    Error::Internal(format!("resolution of {} was abandoned", peer.node_name))
                }
            });

        let outcome = if result.is_ok() { "ok" } else { "error" };
        RESOLUTIONS_TOTAL
            .with_label_values(&["remote", outcome])
            .inc();
        result
    }

    async fn resolve_remote(&self, peer: &Peer) -> Result<String> {
        // Another caller may have finished between our cache check and now.
        if let Some(address) = self.cache.get(&peer.node_name).await {
            return Ok(address);
        }

        let trusted_peers_path = self
            .peers
            .group_of(&peer.node_name)
            .map_or(DEFAULT_TRUSTED_PEERS_PATH, |g| g.trusted_peers_path());
        let target = ExecTarget::for_peer(peer, self.cache.namespace());
        let command = RemoteCommand::Identity {
            node_name: peer.node_name.clone(),
            trusted_peers_path: trusted_peers_path.to_string(),
        };

        let started = Instant::now();
        let output = run_command(self.executor.as_ref(), &target, &command, self.exec_timeout).await;
        let outcome = if output.is_ok() { "ok" } else { "error" };
        RESOLUTION_DURATION
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());

        let address = parse_identity(&peer.node_name, &output?)?;

        if let Err(e) = self.cache.set(&peer.node_name, &address).await {
            tracing::warn!(
                node_name = %peer.node_name,
                error = %e,
                "Failed to persist identity to L2, keeping in-memory copy"
            );
        }
        tracing::info!(node_name = %peer.node_name, multiaddress = %address, "Node identity resolved");

        Ok(address)
    }
}

/// The address is the last line the identity command prints
fn parse_identity(node_name: &str, output: &str) -> Result<String> {
    let Some(address) = output.lines().map(str::trim).rev().find(|l| !l.is_empty()) else {
        return Err(Error::Exec(format!(
            "identity command on {node_name} printed no address"
        )));
    };
    match address.strip_prefix(&multiaddress(node_name, "")) {
        Some(peer_id) if !peer_id.is_empty() => Ok(address.to_string()),
        _ => Err(Error::Exec(format!(
            "identity command on {node_name} printed unexpected address {address}"
        ))),
    }
}
