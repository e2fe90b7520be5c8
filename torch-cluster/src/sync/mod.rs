//! Resolution, retry and mesh propagation

pub mod consensus;
pub mod coordinator;
pub mod mesh;
pub mod metric_registry;
pub mod queue;
pub mod resolver;

pub use consensus::{ConsensusEnvPusher, EnvPushReport};
pub use coordinator::PeerCoordinator;
pub use mesh::{MeshOutcome, MeshPropagator, PairFailure};
pub use metric_registry::MetricRegistry;
pub use queue::{PendingTask, RetryQueue, RetryWorker, TickReport};
pub use resolver::IdentityResolver;
