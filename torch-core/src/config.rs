use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::resilience::timeout::{REDIS_OPERATION_TIMEOUT, REMOTE_EXEC_TIMEOUT};

/// Namespace used when `POD_NAMESPACE` is not set
pub const DEFAULT_NAMESPACE: &str = "default";

/// Service settings
///
/// The mutual-peers topology lives in its own YAML file (see
/// [`crate::models::MutualPeersConfig`]); this struct only carries runtime knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub logging: LoggingConfig,
    pub kube: KubeConfig,
    pub queue: QueueConfig,
    pub mesh: MeshConfig,
    pub watcher: WatcherConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

/// Redis-backed L2 identity store. An empty URL keeps identities in memory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    /// Applies to connecting and to each command
    pub connect_timeout_seconds: u64,
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout_seconds: REDIS_OPERATION_TIMEOUT.as_secs(),
            key_prefix: "torch:".to_string(),
        }
    }
}

impl RedisConfig {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.url.trim().is_empty()
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubeConfig {
    /// Overrides `POD_NAMESPACE` when set
    pub namespace: Option<String>,
    pub exec_timeout_seconds: u64,
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            exec_timeout_seconds: REMOTE_EXEC_TIMEOUT.as_secs(),
        }
    }
}

impl KubeConfig {
    #[must_use]
    pub const fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub tick_interval_ms: u64,
    pub jitter_ms: u64,
    pub max_retries: u32,
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            jitter_ms: 1_000,
            max_retries: 5,
            capacity: 1024,
        }
    }
}

impl QueueConfig {
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[must_use]
    pub const fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub max_concurrent_resolutions: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            max_concurrent_resolutions: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub enabled: bool,
    pub name_prefix: String,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name_prefix: "da".to_string(),
            initial_backoff_secs: 1,
            max_backoff_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Value of the `service_name` label on every multiaddr sample
    pub service_name: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            service_name: "torch".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    ///
    /// Priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file
    /// 3. Default values (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // TORCH_QUEUE__MAX_RETRIES=3 -> queue.max_retries
        builder = builder.add_source(
            Environment::with_prefix("TORCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Namespace the service operates in
    ///
    /// Explicit setting first, then `POD_NAMESPACE`, then `default`.
    #[must_use]
    pub fn namespace(&self) -> String {
        if let Some(ns) = self.kube.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            return ns.to_string();
        }
        match std::env::var("POD_NAMESPACE") {
            Ok(ns) if !ns.is_empty() => ns,
            _ => {
                tracing::warn!(
                    "POD_NAMESPACE not set, falling back to namespace '{}'",
                    DEFAULT_NAMESPACE
                );
                DEFAULT_NAMESPACE.to_string()
            }
        }
    }

    /// Validate settings, collecting every problem
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.kube.exec_timeout_seconds == 0 {
            errors.push("kube.exec_timeout_seconds must be greater than zero".to_string());
        }
        if self.redis.is_enabled() && self.redis.connect_timeout_seconds == 0 {
            errors.push("redis.connect_timeout_seconds must be greater than zero".to_string());
        }
        if self.queue.tick_interval_ms == 0 {
            errors.push("queue.tick_interval_ms must be greater than zero".to_string());
        }
        if self.queue.max_retries == 0 {
            errors.push("queue.max_retries must be at least 1".to_string());
        }
        if self.queue.capacity == 0 {
            errors.push("queue.capacity must be at least 1".to_string());
        }
        if self.mesh.max_concurrent_resolutions == 0 {
            errors.push("mesh.max_concurrent_resolutions must be at least 1".to_string());
        }
        if self.watcher.initial_backoff_secs == 0
            || self.watcher.initial_backoff_secs > self.watcher.max_backoff_secs
        {
            errors.push(
                "watcher backoff must satisfy 0 < initial_backoff_secs <= max_backoff_secs"
                    .to_string(),
            );
        }
        if self.redis.is_enabled()
            && !(self.redis.url.starts_with("redis://") || self.redis.url.starts_with("rediss://"))
        {
            errors.push(format!("redis.url has an unsupported scheme: {}", self.redis.url));
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be 'json' or 'pretty', got '{}'",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.queue.tick_interval(), Duration::from_secs(5));
        assert_eq!(config.queue.jitter(), Duration::from_secs(1));
        assert_eq!(config.queue.max_retries, 5);
        assert_eq!(config.mesh.max_concurrent_resolutions, 16);
        assert_eq!(config.watcher.name_prefix, "da");
        assert_eq!(config.kube.exec_timeout(), Duration::from_secs(30));
        assert!(!config.redis.is_enabled());
        assert_eq!(config.redis.connect_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_address() {
        let config = Config::default();
        assert_eq!(config.http_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_explicit_namespace_wins() {
        let mut config = Config::default();
        config.kube.namespace = Some("celestia".to_string());
        assert_eq!(config.namespace(), "celestia");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.queue.max_retries = 0;
        config.mesh.max_concurrent_resolutions = 0;
        config.logging.format = "xml".to_string();
        config.redis.url = "http://localhost".to_string();

        config.redis.connect_timeout_seconds = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(
            &path,
            "queue:\n  max_retries: 3\nmesh:\n  max_concurrent_resolutions: 4\n",
        )
        .unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.queue.max_retries, 3);
        assert_eq!(config.mesh.max_concurrent_resolutions, 4);
        assert_eq!(config.queue.tick_interval_ms, 5_000);
    }
}
