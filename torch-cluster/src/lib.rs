pub mod discovery;
pub mod exec;
pub mod sync;

#[cfg(test)]
pub mod test_helpers;

pub use discovery::{ChangeWatcher, StatefulSetSource, WorkloadEvent, WorkloadEventSource};
pub use exec::{multiaddress, ExecTarget, KubeExecutor, RemoteCommand, RemoteExecutor};
pub use sync::{MeshOutcome, PeerCoordinator, RetryQueue, RetryWorker};
