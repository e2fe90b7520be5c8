use serde::{Deserialize, Serialize};

/// Where a node stands in the resolution pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ResolutionStatus {
    /// Queued; `attempt` failed resolutions so far
    Pending { attempt: u32 },
    Resolved { address: String },
    /// Retry budget spent, waits for a fresh enqueue
    Exhausted { attempts: u32 },
}

impl ResolutionStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved { .. } | Self::Exhausted { .. })
    }
}
