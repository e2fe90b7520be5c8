//! Error types shared by every torch crate

use thiserror::Error;

/// Torch error types
///
/// Payloads are plain strings so the error is `Clone`, which lets concurrent
/// waiters on the same resolution share one result.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed or missing configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A remote command failed inside a node's container.
    #[error("Remote execution error: {0}")]
    Exec(String),

    /// A remote call or store operation did not finish in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A node exhausted its retry budget.
    #[error("Resolution exhausted for node {node} after {attempts} attempt(s)")]
    Exhausted { node: String, attempts: u32 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cluster API error: {0}")]
    Cluster(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the failure is worth another attempt on a later tick.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Exec(_) | Self::Timeout(_) | Self::Redis(_) | Self::Cluster(_)
        )
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Self::Redis(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Self::Serialization(format!("metrics: {err}"))
    }
}

/// Result type for torch operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Exec("boom".to_string()).is_transient());
        assert!(Error::Timeout("slow".to_string()).is_transient());
        assert!(!Error::Configuration("bad".to_string()).is_transient());
        assert!(!Error::NotFound("da-0".to_string()).is_transient());
    }

    #[test]
    fn test_exhausted_message() {
        let err = Error::Exhausted {
            node: "da-bridge-0".to_string(),
            attempts: 5,
        };
        assert_eq!(
            err.to_string(),
            "Resolution exhausted for node da-bridge-0 after 5 attempt(s)"
        );
    }
}
