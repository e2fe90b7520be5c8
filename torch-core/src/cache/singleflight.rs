//! Request collapsing for concurrent lookups of the same key
//!
//! Backed by `async_singleflight`: while one caller runs the work for a key,
//! every other caller for that key waits and receives a clone of its result.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SingleFlightError<E> {
    /// The leading caller was dropped before producing a result
    #[error("singleflight leader dropped before completing")]
    LeaderDropped,
    #[error("{0}")]
    Inner(E),
}

#[derive(Clone)]
pub struct SingleFlight<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    group: Arc<async_singleflight::Group<K, V, E>>,
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            group: Arc::new(async_singleflight::Group::new()),
        }
    }

    /// Run `fut` unless work for `key` is already in flight, in which case
    /// wait for that result instead
    pub async fn run<Fut>(&self, key: K, fut: Fut) -> Result<V, SingleFlightError<E>>
    where
        Fut: Future<Output = Result<V, E>> + Send,
    {
        // Err(None) from the group means the leader went away.
        self.group.work(&key, fut).await.map_err(|err| match err {
            Some(inner) => SingleFlightError::Inner(inner),
            None => SingleFlightError::LeaderDropped,
        })
    }
}

impl<K, V, E> Default for SingleFlight<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
