//! Consensus node address as an environment file in opted-in peers

use std::sync::Arc;
use std::time::Duration;

use torch_core::MutualPeer;

use crate::exec::{run_command, ExecTarget, RemoteCommand, RemoteExecutor};

/// Outcome of pushing the consensus address into a group
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnvPushReport {
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

pub struct ConsensusEnvPusher {
    executor: Arc<dyn RemoteExecutor>,
    namespace: String,
    exec_timeout: Duration,
}

impl ConsensusEnvPusher {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        namespace: impl Into<String>,
        exec_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            namespace: namespace.into(),
            exec_timeout,
        }
    }

    /// Write `CONSENSUS_NODE_ADDR=<address>` into every `exposeEnv` peer of
    /// `group`, skipping the consensus node itself
    pub async fn push(&self, group: &MutualPeer, address: &str) -> EnvPushReport {
        let mut report = EnvPushReport::default();
        let command = RemoteCommand::ConsensusEnv {
            address: address.to_string(),
            trusted_peers_path: group.trusted_peers_path().to_string(),
        };

        for peer in group
            .peers
            .iter()
            .filter(|p| p.expose_env && !group.is_consensus_node(&p.node_name))
        {
            let target = ExecTarget::for_peer(peer, &self.namespace);
            match run_command(self.executor.as_ref(), &target, &command, self.exec_timeout).await {
                Ok(_) => {
                    tracing::info!(node_name = %peer.node_name, "Consensus address exposed as env");
                    report.updated.push(peer.node_name.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        node_name = %peer.node_name,
                        error = %e,
                        "Failed to write consensus env file"
                    );
                    report.failed.push(peer.node_name.clone());
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{addr, sample_peers, FakeExecutor};

    #[tokio::test]
    async fn test_only_expose_env_peers_receive_address() {
        let executor = FakeExecutor::new();
        let pusher = ConsensusEnvPusher::new(executor.clone(), "celestia", Duration::from_secs(30));
        let peers = sample_peers();
        let group = &peers.mutual_peers[0];

        let report = pusher.push(group, &addr("da-0")).await;

        assert_eq!(report.updated, vec!["da-1"]);
        assert!(report.failed.is_empty());
        assert_eq!(
            executor.env_file("da-1"),
            Some(format!("CONSENSUS_NODE_ADDR={}", addr("da-0")))
        );
        assert!(executor.env_file("da-2").is_none());
    }

    #[tokio::test]
    async fn test_group_without_opt_in_is_untouched() {
        let executor = FakeExecutor::new();
        let pusher = ConsensusEnvPusher::new(executor.clone(), "celestia", Duration::from_secs(30));
        let peers = sample_peers();

        let report = pusher.push(&peers.mutual_peers[1], "addr").await;
        assert_eq!(report, EnvPushReport::default());
        assert_eq!(executor.calls_named("consensus_env"), 0);
    }
}
