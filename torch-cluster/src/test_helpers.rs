//! In-memory stand-ins for the cluster used by unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use torch_core::metrics::MetricSink;
use torch_core::{Error, MultiAddrEntry, MutualPeersConfig, Result};

use crate::exec::{multiaddress, ExecTarget, RemoteCommand, RemoteExecutor};

/// Simulated DA nodes
///
/// Identity commands answer with the scripted address (or fail), append
/// commands maintain a per-node trusted-peers list with the same
/// append-if-absent rule as the real script.
#[derive(Default)]
pub struct FakeExecutor {
    identities: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    failing_pushes: Mutex<HashSet<String>>,
    trusted_peers: Mutex<HashMap<String, Vec<String>>>,
    env_files: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<(String, RemoteCommand)>>,
    identity_calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl FakeExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_identity(&self, node: &str, address: &str) -> &Self {
        self.identities
            .lock()
            .insert(node.to_string(), address.to_string());
        self
    }

    pub fn fail_identity(&self, node: &str) -> &Self {
        self.failing.lock().insert(node.to_string());
        self
    }

    pub fn heal(&self, node: &str) {
        self.failing.lock().remove(node);
    }

    pub fn fail_pushes_into(&self, node: &str) {
        self.failing_pushes.lock().insert(node.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn identity_calls(&self) -> usize {
        self.identity_calls.load(Ordering::SeqCst)
    }

    pub fn calls_named(&self, name: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(_, cmd)| cmd.name() == name)
            .count()
    }

    pub fn trusted_peers(&self, node: &str) -> Vec<String> {
        self.trusted_peers
            .lock()
            .get(node)
            .cloned()
            .unwrap_or_default()
    }

    pub fn env_file(&self, node: &str) -> Option<String> {
        self.env_files.lock().get(node).cloned()
    }
}

#[async_trait]
impl RemoteExecutor for FakeExecutor {
    async fn exec(&self, target: &ExecTarget, command: &[String]) -> Result<String> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let cmd = RemoteCommand::from_argv(command)
            .ok_or_else(|| Error::Exec(format!("unknown command {command:?}")))?;
        self.calls.lock().push((target.node.clone(), cmd.clone()));

        match cmd {
            RemoteCommand::Identity { .. } => {
                self.identity_calls.fetch_add(1, Ordering::SeqCst);
                if self.failing.lock().contains(&target.node) {
                    return Err(Error::Exec(format!("{} is not ready", target.node)));
                }
                Ok(self
                    .identities
                    .lock()
                    .get(&target.node)
                    .map(|addr| format!("{addr}\n"))
                    .unwrap_or_default())
            }
            RemoteCommand::AppendTrustedPeer { address, .. } => {
                if self.failing_pushes.lock().contains(&target.node) {
                    return Err(Error::Exec(format!("{} rejected the push", target.node)));
                }
                let mut files = self.trusted_peers.lock();
                let lines = files.entry(target.node.clone()).or_default();
                if !lines.contains(&address) {
                    lines.push(address);
                }
                Ok(lines.join("\n"))
            }
            RemoteCommand::ConsensusEnv { address, .. } => {
                let line = format!("CONSENSUS_NODE_ADDR={address}");
                self.env_files
                    .lock()
                    .insert(target.node.clone(), line.clone());
                Ok(line)
            }
        }
    }
}

/// Records every emission instead of touching Prometheus
#[derive(Default)]
pub struct RecordingSink {
    emissions: Mutex<Vec<Vec<MultiAddrEntry>>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn emissions(&self) -> usize {
        self.emissions.lock().len()
    }

    pub fn last(&self) -> Vec<MultiAddrEntry> {
        self.emissions.lock().last().cloned().unwrap_or_default()
    }
}

impl MetricSink for RecordingSink {
    fn emit(&self, entries: &[MultiAddrEntry]) {
        self.emissions.lock().push(entries.to_vec());
    }
}

/// Two groups: `da-0..da-2` mesh together; in the second `da-light-0` only trusts `da-3`
pub fn sample_peers() -> Arc<MutualPeersConfig> {
    let raw = r#"
mutualPeers:
  - consensusNode: "da-0"
    peers:
      - nodeName: "da-0"
        containerName: "da"
      - nodeName: "da-1"
        containerName: "da"
        exposeEnv: true
      - nodeName: "da-2"
        containerName: "da"
  - trustedPeersPath: "/home/celestia"
    peers:
      - nodeName: "da-light-0"
        containerName: "light"
        connectsTo: ["da-3"]
      - nodeName: "da-3"
        containerName: "da"
      - nodeName: "da-4"
        containerName: "da"
"#;
    Arc::new(MutualPeersConfig::from_yaml(raw).expect("sample config is valid"))
}

pub fn addr(node: &str) -> String {
    multiaddress(node, &format!("ID-{node}"))
}
