//! Discovery of DA node workloads

pub mod statefulsets;
pub mod watcher;

pub use statefulsets::StatefulSetSource;
pub use watcher::{ChangeWatcher, WorkloadEvent, WorkloadEventSource, WorkloadStream};
