//! Domain models

pub mod multiaddr;
pub mod peer;
pub mod status;

pub use multiaddr::MultiAddrEntry;
pub use peer::{MutualPeer, MutualPeersConfig, Peer, DEFAULT_TRUSTED_PEERS_PATH};
pub use status::ResolutionStatus;
