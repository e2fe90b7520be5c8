//! Shell commands run inside DA node containers
//!
//! Every command is `sh -c <script> sh <arg1> <arg2>` so values are passed as
//! positional parameters instead of being spliced into the script text.

/// Port the DA node's p2p stack listens on
pub const P2P_PORT: u16 = 2121;

/// File holding a node's own multiaddress
pub const TP_ADDR_FILE: &str = "TP-ADDR";

/// File holding one trusted peer multiaddress per line
pub const TRUSTED_PEERS_FILE: &str = "TRUSTED_PEERS";

/// Environment file holding the consensus node address
pub const ENV_FILE: &str = "env";

/// `$1` node name, `$2` output directory
const IDENTITY_SCRIPT: &str = r#"set -e
TOKEN="${CELESTIA_NODE_AUTH_TOKEN:-$(celestia "${NODE_TYPE:-bridge}" auth admin --node.store "${CELESTIA_HOME:-/home/celestia}")}"
PEER_ID=$(curl -s -X POST \
  -H "Authorization: Bearer $TOKEN" \
  -H "Content-Type: application/json" \
  -d '{"jsonrpc":"2.0","id":0,"method":"p2p.Info","params":[]}' \
  "http://localhost:26658" | sed -n 's/.*"ID":"\([^"]*\)".*/\1/p')
[ -n "$PEER_ID" ] || { echo "p2p.Info returned no peer ID" >&2; exit 1; }
ADDR="/dns/$1/tcp/2121/p2p/$PEER_ID"
mkdir -p "$2"
echo "$ADDR" > "$2/TP-ADDR"
echo "$ADDR""#;

/// `$1` address, `$2` output directory
const APPEND_TRUSTED_PEER_SCRIPT: &str = r#"set -e
mkdir -p "$2"
touch "$2/TRUSTED_PEERS"
grep -qxF "$1" "$2/TRUSTED_PEERS" || echo "$1" >> "$2/TRUSTED_PEERS"
cat "$2/TRUSTED_PEERS""#;

/// `$1` address, `$2` output directory
const CONSENSUS_ENV_SCRIPT: &str = r#"set -e
mkdir -p "$2"
echo "CONSENSUS_NODE_ADDR=$1" > "$2/env"
cat "$2/env""#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Print the node's multiaddress and store it in `TP-ADDR`
    Identity {
        node_name: String,
        trusted_peers_path: String,
    },
    /// Append `address` to `TRUSTED_PEERS` unless already present
    AppendTrustedPeer {
        address: String,
        trusted_peers_path: String,
    },
    /// Write `CONSENSUS_NODE_ADDR=<address>` to the env file
    ConsensusEnv {
        address: String,
        trusted_peers_path: String,
    },
}

impl RemoteCommand {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Identity { .. } => "identity",
            Self::AppendTrustedPeer { .. } => "append_trusted_peer",
            Self::ConsensusEnv { .. } => "consensus_env",
        }
    }

    const fn script(&self) -> &'static str {
        match self {
            Self::Identity { .. } => IDENTITY_SCRIPT,
            Self::AppendTrustedPeer { .. } => APPEND_TRUSTED_PEER_SCRIPT,
            Self::ConsensusEnv { .. } => CONSENSUS_ENV_SCRIPT,
        }
    }

    fn args(&self) -> (&str, &str) {
        match self {
            Self::Identity {
                node_name,
                trusted_peers_path,
            } => (node_name, trusted_peers_path),
            Self::AppendTrustedPeer {
                address,
                trusted_peers_path,
            }
            | Self::ConsensusEnv {
                address,
                trusted_peers_path,
            } => (address, trusted_peers_path),
        }
    }

    /// argv handed to the container runtime
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let (first, second) = self.args();
        vec![
            "sh".to_string(),
            "-c".to_string(),
            self.script().to_string(),
            "sh".to_string(),
            first.to_string(),
            second.to_string(),
        ]
    }

    /// Recognise an argv built by [`RemoteCommand::argv`]
    #[must_use]
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let [sh, flag, script, _, first, second] = argv else {
            return None;
        };
        if sh != "sh" || flag != "-c" {
            return None;
        }
        let (first, second) = (first.clone(), second.clone());
        match script.as_str() {
            IDENTITY_SCRIPT => Some(Self::Identity {
                node_name: first,
                trusted_peers_path: second,
            }),
            APPEND_TRUSTED_PEER_SCRIPT => Some(Self::AppendTrustedPeer {
                address: first,
                trusted_peers_path: second,
            }),
            CONSENSUS_ENV_SCRIPT => Some(Self::ConsensusEnv {
                address: first,
                trusted_peers_path: second,
            }),
            _ => None,
        }
    }
}

/// Multiaddress a node with `peer_id` advertises
#[must_use]
pub fn multiaddress(node_name: &str, peer_id: &str) -> String {
    format!("/dns/{node_name}/tcp/{P2P_PORT}/p2p/{peer_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argv_shape() {
        let cmd = RemoteCommand::AppendTrustedPeer {
            address: "/dns/da-0/tcp/2121/p2p/A".to_string(),
            trusted_peers_path: "/tmp".to_string(),
        };
        let argv = cmd.argv();
        assert_eq!(argv.len(), 6);
        assert_eq!(&argv[..2], &["sh".to_string(), "-c".to_string()]);
        assert_eq!(argv[4], "/dns/da-0/tcp/2121/p2p/A");
        assert_eq!(argv[5], "/tmp");
    }

    #[test]
    fn test_from_argv_recognises_each_command() {
        let commands = [
            RemoteCommand::Identity {
                node_name: "da-0".to_string(),
                trusted_peers_path: "/tmp".to_string(),
            },
            RemoteCommand::AppendTrustedPeer {
                address: "addr".to_string(),
                trusted_peers_path: "/data".to_string(),
            },
            RemoteCommand::ConsensusEnv {
                address: "addr".to_string(),
                trusted_peers_path: "/data".to_string(),
            },
        ];
        for cmd in commands {
            assert_eq!(RemoteCommand::from_argv(&cmd.argv()), Some(cmd));
        }
        assert_eq!(RemoteCommand::from_argv(&["ls".to_string()]), None);
    }

    #[test]
    fn test_scripts_reference_expected_files() {
        assert!(IDENTITY_SCRIPT.contains(TP_ADDR_FILE));
        assert!(IDENTITY_SCRIPT.contains("p2p.Info"));
        assert!(IDENTITY_SCRIPT.contains(&format!("/tcp/{P2P_PORT}/p2p/")));
        assert!(APPEND_TRUSTED_PEER_SCRIPT.contains(TRUSTED_PEERS_FILE));
        assert!(APPEND_TRUSTED_PEER_SCRIPT.contains("grep -qxF"));
        assert!(CONSENSUS_ENV_SCRIPT.contains("CONSENSUS_NODE_ADDR="));
        assert!(CONSENSUS_ENV_SCRIPT.contains(&format!("\"$2/{ENV_FILE}\"")));
    }

    #[test]
    fn test_multiaddress() {
        assert_eq!(
            multiaddress("da-bridge-0", "12D3KooW"),
            "/dns/da-bridge-0/tcp/2121/p2p/12D3KooW"
        );
    }
}
