//! Remote command execution inside node containers

pub mod commands;
pub mod pod_exec;

use async_trait::async_trait;
use std::time::Duration;

use torch_core::resilience::timeout::with_timeout;
use torch_core::{Peer, Result};

pub use commands::{multiaddress, RemoteCommand};
pub use pod_exec::KubeExecutor;

/// Container a command runs in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecTarget {
    pub node: String,
    pub container: String,
    pub namespace: String,
}

impl ExecTarget {
    #[must_use]
    pub fn for_peer(peer: &Peer, namespace: &str) -> Self {
        Self {
            node: peer.node_name.clone(),
            container: peer.container_name.clone(),
            namespace: namespace.to_string(),
        }
    }
}

/// Runs a command inside a node's container and returns its stdout
///
/// No TTY and no stdin. A non-zero exit or transport failure is an
/// [`torch_core::Error::Exec`].
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn exec(&self, target: &ExecTarget, command: &[String]) -> Result<String>;
}

/// Run `command` on `target`, failing with a timeout error after `timeout`
pub async fn run_command(
    executor: &dyn RemoteExecutor,
    target: &ExecTarget,
    command: &RemoteCommand,
    timeout: Duration,
) -> Result<String> {
    let argv = command.argv();
    let what = format!("{} on {}/{}", command.name(), target.node, target.container);
    tracing::debug!(
        node = %target.node,
        container = %target.container,
        command = command.name(),
        "Executing remote command"
    );
    with_timeout(timeout, &what, executor.exec(target, &argv)).await
}
