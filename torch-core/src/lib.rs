pub mod models;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod bootstrap;
pub mod metrics;
pub mod resilience;

pub use config::Config;
pub use error::{Error, Result};
pub use models::{MultiAddrEntry, MutualPeer, MutualPeersConfig, Peer, ResolutionStatus};
