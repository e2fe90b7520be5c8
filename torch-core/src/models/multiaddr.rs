use serde::{Deserialize, Serialize};

/// Presence value written for every known multiaddress
pub const PRESENT: f64 = 1.0;

/// One sample of the `multiaddr` gauge
///
/// Two entries are the same record when their `multiaddress` matches,
/// whatever node reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiAddrEntry {
    pub service_name: String,
    pub node_name: String,
    pub multiaddress: String,
    pub namespace: String,
    pub value: f64,
}

impl MultiAddrEntry {
    #[must_use]
    pub fn present(
        service_name: impl Into<String>,
        node_name: impl Into<String>,
        multiaddress: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            node_name: node_name.into(),
            multiaddress: multiaddress.into(),
            namespace: namespace.into(),
            value: PRESENT,
        }
    }

    /// Label values in `multiaddr` gauge order
    #[must_use]
    pub fn label_values(&self) -> [&str; 4] {
        [
            &self.service_name,
            &self.node_name,
            &self.multiaddress,
            &self.namespace,
        ]
    }
}
