//! Mutual-peer configuration model
//!
//! Mirrors the YAML file handed to the service with `--config-file`:
//!
//! ```yaml
//! mutualPeers:
//!   - consensusNode: "consensus-validator-0"
//!     trustedPeersPath: "/tmp"
//!     peers:
//!       - nodeName: "da-bridge-0"
//!         containerName: "da"
//!       - nodeName: "da-full-0"
//!         containerName: "da"
//!         exposeEnv: true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::{Error, Result};

/// Output directory used when a group does not set `trustedPeersPath`
pub const DEFAULT_TRUSTED_PEERS_PATH: &str = "/tmp";

/// A single node that takes part in a mutual-peer group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    /// Pod name, unique across all groups
    pub node_name: String,
    /// Container the remote commands run in
    pub container_name: String,
    /// Receive the group's consensus address as an environment file
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub expose_env: bool,
    /// Restrict the trusted peers pushed into this node to these names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connects_to: Vec<String>,
}

impl Peer {
    #[must_use]
    pub fn new(node_name: impl Into<String>, container_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            container_name: container_name.into(),
            expose_env: false,
            connects_to: Vec::new(),
        }
    }

    /// Whether this node should receive `other`'s address during propagation
    #[must_use]
    pub fn accepts(&self, other: &str) -> bool {
        self.connects_to.is_empty() || self.connects_to.iter().any(|n| n == other)
    }
}

/// A group of nodes that must all trust one another
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutualPeer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_node: Option<String>,
    pub peers: Vec<Peer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_peers_path: Option<String>,
}

impl MutualPeer {
    /// Directory the trusted-peer files are written to inside each node
    #[must_use]
    pub fn trusted_peers_path(&self) -> &str {
        self.trusted_peers_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_TRUSTED_PEERS_PATH)
    }

    #[must_use]
    pub fn peer(&self, node_name: &str) -> Option<&Peer> {
        self.peers.iter().find(|p| p.node_name == node_name)
    }

    #[must_use]
    pub fn contains(&self, node_name: &str) -> bool {
        self.peer(node_name).is_some()
    }

    #[must_use]
    pub fn is_consensus_node(&self, node_name: &str) -> bool {
        self.consensus_node.as_deref() == Some(node_name)
    }
}

/// Top-level mutual-peers configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutualPeersConfig {
    pub mutual_peers: Vec<MutualPeer>,
}

impl MutualPeersConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&raw)
    }

    /// Check structural invariants, reporting every problem at once
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        if self.mutual_peers.is_empty() {
            errors.push("mutualPeers must contain at least one group".to_string());
        }

        for (idx, group) in self.mutual_peers.iter().enumerate() {
            if group.peers.is_empty() {
                errors.push(format!("mutualPeers[{idx}] has no peers"));
            }
            for peer in &group.peers {
                if peer.node_name.trim().is_empty() {
                    errors.push(format!("mutualPeers[{idx}] has a peer without nodeName"));
                    continue;
                }
                if peer.container_name.trim().is_empty() {
                    errors.push(format!(
                        "peer {} in mutualPeers[{idx}] has no containerName",
                        peer.node_name
                    ));
                }
                if !seen.insert(peer.node_name.as_str()) {
                    errors.push(format!("duplicate nodeName {}", peer.node_name));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Configuration(errors.join("; ")))
        }
    }

    /// Find a node and the group it belongs to
    #[must_use]
    pub fn find(&self, node_name: &str) -> Option<(&MutualPeer, &Peer)> {
        self.mutual_peers
            .iter()
            .find_map(|group| group.peer(node_name).map(|peer| (group, peer)))
    }

    #[must_use]
    pub fn group_of(&self, node_name: &str) -> Option<&MutualPeer> {
        self.find(node_name).map(|(group, _)| group)
    }

    /// Groups that name `node_name` as their consensus node
    pub fn groups_led_by<'a>(&'a self, node_name: &'a str) -> impl Iterator<Item = &'a MutualPeer> {
        self.mutual_peers
            .iter()
            .filter(move |group| group.is_consensus_node(node_name))
    }

    /// Every configured node name, in configuration order
    #[must_use]
    pub fn node_names(&self) -> Vec<String> {
        self.mutual_peers
            .iter()
            .flat_map(|group| group.peers.iter().map(|p| p.node_name.clone()))
            .collect()
    }
}
