//! Trusted-peer mesh propagation
//!
//! A batch is resolved as a whole (bounded fan-out, then a barrier) before
//! any address is pushed, so every node in a group sees the complete set of
//! its resolved peers. Group members resolved earlier, outside the batch,
//! are meshed in as well. Pushes use an append-if-absent command, which makes
//! re-running a batch safe.

use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use torch_core::metrics::mesh::PUSHES_TOTAL;
use torch_core::{Error, MutualPeer, MutualPeersConfig, Peer, Result};

use super::metric_registry::MetricRegistry;
use super::resolver::IdentityResolver;
use crate::exec::{run_command, ExecTarget, RemoteCommand, RemoteExecutor};

/// A push of `from`'s address into `to` that did not go through
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairFailure {
    pub from: String,
    pub to: String,
    pub error: String,
}

/// Result of one propagation run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MeshOutcome {
    /// Node name to address, only non-empty addresses
    pub identities: BTreeMap<String, String>,
    /// Nodes whose resolution failed, with the reason
    pub unresolved: BTreeMap<String, String>,
    pub pushed: usize,
    pub failed: Vec<PairFailure>,
}

pub struct MeshPropagator {
    resolver: Arc<IdentityResolver>,
    executor: Arc<dyn RemoteExecutor>,
    registry: Arc<MetricRegistry>,
    peers: Arc<MutualPeersConfig>,
    semaphore: Arc<Semaphore>,
    namespace: String,
    exec_timeout: Duration,
}

impl MeshPropagator {
    pub fn new(
        resolver: Arc<IdentityResolver>,
        executor: Arc<dyn RemoteExecutor>,
        registry: Arc<MetricRegistry>,
        peers: Arc<MutualPeersConfig>,
        max_concurrent_resolutions: usize,
        exec_timeout: Duration,
    ) -> Self {
        let namespace = resolver.cache().namespace().to_string();
        Self {
            resolver,
            executor,
            registry,
            peers,
            semaphore: Arc::new(Semaphore::new(max_concurrent_resolutions.max(1))),
            namespace,
            exec_timeout,
        }
    }

    /// Resolve every node of `batch` and mesh each group's resolved nodes
    pub async fn propagate(&self, batch: &[String]) -> MeshOutcome {
        let groups = self.partition(batch);
        let mut outcome = MeshOutcome::default();

        // Resolve everything before pushing anything.
        let members: Vec<&Peer> = groups.iter().flat_map(|(_, peers)| peers.iter().copied()).collect();
        let results = join_all(members.iter().map(|peer| self.resolve_bounded(peer))).await;
        for (peer, result) in members.iter().zip(results) {
            match result {
                Ok(address) if !address.is_empty() => {
                    self.registry.record(&peer.node_name, &address);
                    outcome.identities.insert(peer.node_name.clone(), address);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(node_name = %peer.node_name, error = %e, "Failed to resolve node");
                    outcome
                        .unresolved
                        .insert(peer.node_name.clone(), e.to_string());
                }
            }
        }

        let known = self.with_known_members(&groups, &outcome).await;
        let known = &known;
        let group_results = join_all(groups.iter().map(|(group, _)| {
            let resolved: Vec<(&Peer, &str)> = group
                .peers
                .iter()
                .filter_map(|p| known.get(&p.node_name).map(|a| (p, a.as_str())))
                .collect();
            async move { self.push_group(group, resolved).await }
        }))
        .await;

        for (pushed, failed) in group_results {
            outcome.pushed += pushed;
            outcome.failed.extend(failed);
        }

        tracing::info!(
            resolved = outcome.identities.len(),
            unresolved = outcome.unresolved.len(),
            pushed = outcome.pushed,
            failed = outcome.failed.len(),
            "Mesh propagation finished"
        );
        outcome
    }

    /// Batch members grouped by the group they belong to, in configuration order
    fn partition<'a>(&'a self, batch: &[String]) -> Vec<(&'a MutualPeer, Vec<&'a Peer>)> {
        let requested: HashSet<&str> = batch.iter().map(String::as_str).collect();

        for name in &requested {
            if self.peers.find(name).is_none() {
                tracing::warn!(node_name = %name, "Node is not part of any mutual peer group, skipping");
            }
        }

        self.peers
            .mutual_peers
            .iter()
            .filter_map(|group| {
                let members: Vec<&Peer> = group
                    .peers
                    .iter()
                    .filter(|p| requested.contains(p.node_name.as_str()))
                    .collect();
                (!members.is_empty()).then_some((group, members))
            })
            .collect()
    }

    /// Batch identities plus cached addresses of the other members of every
    /// touched group, which take part in the push as senders and receivers
    async fn with_known_members(
        &self,
        groups: &[(&MutualPeer, Vec<&Peer>)],
        outcome: &MeshOutcome,
    ) -> BTreeMap<String, String> {
        let mut known = outcome.identities.clone();
        for (group, _) in groups {
            for peer in &group.peers {
                let name = &peer.node_name;
                if known.contains_key(name) || outcome.unresolved.contains_key(name) {
                    continue;
                }
                if let Some(address) = self.resolver.cache().get(name).await {
                    if !address.is_empty() {
                        tracing::debug!(node_name = %name, "Including previously resolved group member");
                        known.insert(name.clone(), address);
                    }
                }
            }
        }
        known
    }

    async fn resolve_bounded(&self, peer: &Peer) -> Result<String> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| Error::Internal("resolution semaphore closed".to_string()))?;
        self.resolver.resolve(peer).await
    }

    /// Push every resolved address into every other resolved member
    ///
    /// Pairs run one after another; a failed pair is logged and skipped.
    async fn push_group(
        &self,
        group: &MutualPeer,
        resolved: Vec<(&Peer, &str)>,
    ) -> (usize, Vec<PairFailure>) {
        let mut pushed = 0;
        let mut failed = Vec::new();
        let path = group.trusted_peers_path();

        for (receiver, _) in &resolved {
            let target = ExecTarget::for_peer(receiver, &self.namespace);
            for (sender, address) in &resolved {
                if sender.node_name == receiver.node_name || !receiver.accepts(&sender.node_name) {
                    continue;
                }
                let command = RemoteCommand::AppendTrustedPeer {
                    address: (*address).to_string(),
                    trusted_peers_path: path.to_string(),
                };
                match run_command(self.executor.as_ref(), &target, &command, self.exec_timeout).await {
                    Ok(_) => {
                        PUSHES_TOTAL.with_label_values(&["ok"]).inc();
                        tracing::debug!(
                            from = %sender.node_name,
                            to = %receiver.node_name,
                            "Trusted peer pushed"
                        );
                        pushed += 1;
                    }
                    Err(e) => {
                        PUSHES_TOTAL.with_label_values(&["error"]).inc();
                        tracing::warn!(
                            from = %sender.node_name,
                            to = %receiver.node_name,
                            error = %e,
                            "Failed to push trusted peer"
                        );
                        failed.push(PairFailure {
                            from: sender.node_name.clone(),
                            to: receiver.node_name.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        (pushed, failed)
    }
}
