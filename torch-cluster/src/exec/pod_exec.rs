//! Pod `exec` through the Kubernetes API

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, AttachParams};
use kube::Client;
use tokio::io::{AsyncRead, AsyncReadExt};

use torch_core::{Error, Result};

use super::{ExecTarget, RemoteExecutor};

#[derive(Clone)]
pub struct KubeExecutor {
    client: Client,
}

impl KubeExecutor {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// In-cluster service account, or the local kubeconfig outside a cluster
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| Error::Cluster(format!("failed to build Kubernetes client: {e}")))?;
        Ok(Self::new(client))
    }

    #[must_use]
    pub fn client(&self) -> Client {
        self.client.clone()
    }
}

async fn read_all(reader: Option<impl AsyncRead + Unpin>) -> Result<String> {
    let Some(mut reader) = reader else {
        return Ok(String::new());
    };
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .await
        .map_err(|e| Error::Exec(format!("failed to read exec stream: {e}")))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[async_trait]
impl RemoteExecutor for KubeExecutor {
    async fn exec(&self, target: &ExecTarget, command: &[String]) -> Result<String> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
        let params = AttachParams::default()
            .container(target.container.as_str())
            .stdin(false)
            .stdout(true)
            .stderr(true);

        let mut attached = pods
            .exec(&target.node, command.iter().cloned(), &params)
            .await
            .map_err(|e| Error::Exec(format!("exec into {} failed: {e}", target.node)))?;

        let stdout = attached.stdout();
        let stderr = attached.stderr();
        let status = attached.take_status();

        let (stdout, stderr) = tokio::try_join!(read_all(stdout), read_all(stderr))?;

        let status = match status {
            Some(status) => status.await,
            None => None,
        };
        attached
            .join()
            .await
            .map_err(|e| Error::Exec(format!("exec session on {} failed: {e}", target.node)))?;

        if let Some(status) = status {
            if status.status.as_deref() == Some("Failure") {
                let reason = status.message.unwrap_or_default();
                return Err(Error::Exec(format!(
                    "command failed on {}/{}: {reason} {}",
                    target.node,
                    target.container,
                    stderr.trim()
                )));
            }
        }

        if !stderr.trim().is_empty() {
            tracing::debug!(node = %target.node, stderr = %stderr.trim(), "Remote command wrote to stderr");
        }

        Ok(stdout)
    }
}
