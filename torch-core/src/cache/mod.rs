//! Identity caching
//!
//! - L1: Moka in-memory cache
//! - L2: Redis, shared and durable across restarts
//! - Single-flight collapsing of concurrent lookups

pub mod identity_cache;
pub mod singleflight;

pub use identity_cache::IdentityCache;
pub use singleflight::{SingleFlight, SingleFlightError};
