//! Node identity cache (L1: Moka in-memory, L2: Redis)
//!
//! Maps a node name to its resolved multiaddress. L1 answers repeat lookups
//! inside the process; L2 keeps identities across restarts when Redis is
//! configured. Keys are scoped by namespace: `<prefix><namespace>:<node>`.

use redis::{AsyncCommands, Client};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RedisConfig;
use crate::resilience::timeout::{with_timeout, REDIS_OPERATION_TIMEOUT};
use crate::{Error, Result};

const L1_MAX_CAPACITY: u64 = 10_000;

#[derive(Clone)]
pub struct IdentityCache {
    redis_client: Option<Client>,
    l1_cache: Arc<moka::future::Cache<String, String>>,
    namespace: String,
    key_prefix: String,
    /// Bounds connecting to Redis plus the command itself
    operation_timeout: Duration,
}

impl IdentityCache {
    /// Create a new cache
    ///
    /// With `redis_client = None` only the in-memory layer is used.
    pub fn new(
        redis_client: Option<Client>,
        namespace: impl Into<String>,
        key_prefix: impl Into<String>,
    ) -> Self {
        let l1_cache = moka::future::CacheBuilder::new(L1_MAX_CAPACITY).build();
        Self {
            redis_client,
            l1_cache: Arc::new(l1_cache),
            namespace: namespace.into(),
            key_prefix: key_prefix.into(),
            operation_timeout: REDIS_OPERATION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self::new(None, namespace, "torch:")
    }

    /// Build from settings, opening a Redis client when a URL is configured
    pub fn from_config(config: &RedisConfig, namespace: impl Into<String>) -> Result<Self> {
        let client = if config.is_enabled() {
            Some(Client::open(config.url.as_str())?)
        } else {
            None
        };
        Ok(Self::new(client, namespace, config.key_prefix.clone())
            .with_operation_timeout(config.connect_timeout()))
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    #[must_use]
    pub fn has_l2(&self) -> bool {
        self.redis_client.is_some()
    }

    fn l2_key(&self, node_name: &str) -> String {
        format!("{}{}:{}", self.key_prefix, self.namespace, node_name)
    }

    /// Look up a node's address
    ///
    /// L1 first, then L2. An L2 failure is logged and treated as a miss.
    pub async fn get(&self, node_name: &str) -> Option<String> {
        if let Some(address) = self.l1_cache.get(node_name).await {
            tracing::debug!(node_name, "Identity cache hit (L1)");
            return Some(address);
        }

        match self.l2_get(node_name).await {
            Ok(Some(address)) => {
                tracing::debug!(node_name, "Identity cache hit (L2)");
                self.l1_cache
                    .insert(node_name.to_string(), address.clone())
                    .await;
                Some(address)
            }
            Ok(None) => {
                tracing::debug!(node_name, "Identity cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(node_name, error = %e, "Identity L2 read failed, treating as miss");
                None
            }
        }
    }

    /// Record a node's address
    ///
    /// L1 is always updated. An L2 write failure is returned so callers can
    /// log it, but the L1 record stays.
    pub async fn set(&self, node_name: &str, address: &str) -> Result<()> {
        self.l1_cache
            .insert(node_name.to_string(), address.to_string())
            .await;

        if let Some(ref client) = self.redis_client {
            let key = self.l2_key(node_name);
            with_timeout(self.operation_timeout, "redis SET", async {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let _: () = conn.set(&key, address).await?;
                Ok(())
            })
            .await?;
            tracing::debug!(node_name, key = %key, "Identity persisted to L2");
        }

        Ok(())
    }

    /// Addresses for the given nodes, skipping unknown ones
    pub async fn snapshot(&self, node_names: &[String]) -> BTreeMap<String, String> {
        let mut identities = BTreeMap::new();
        for name in node_names {
            if let Some(address) = self.get(name).await {
                identities.insert(name.clone(), address);
            }
        }
        identities
    }

    async fn l2_get(&self, node_name: &str) -> Result<Option<String>> {
        let Some(ref client) = self.redis_client else {
            return Ok(None);
        };
        let key = self.l2_key(node_name);
        with_timeout(self.operation_timeout, "redis GET", async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            let value: Option<String> = conn.get(&key).await?;
            Ok(value.filter(|v| !v.is_empty()))
        })
        .await
        .map_err(|e| match e {
            Error::Timeout(msg) => Error::Redis(msg),
            other => other,
        })
    }
}
