//! Memoizing gateway wrapper.
//!
//! Results are keyed by the exact prompt text plus generation options and
//! kept in a bounded least-recently-used map. Failures are never stored, so
//! a later identical request reaches the model again.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::gateway::{Generation, GenerationOptions, InferenceGateway};

/// Memoization key: the full prompt plus every generation parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    prompt: String,
    options: GenerationOptions,
}

/// Bounded map that evicts the least recently used entry.
///
/// Insertion order doubles as recency order: a hit moves the entry to the
/// back, eviction removes the front.
#[derive(Debug)]
struct LruMap {
    entries: IndexMap<CacheKey, Vec<Generation>>,
    capacity: usize,
}

impl LruMap {
    fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
            capacity,
        }
    }

    fn get(&mut self, key: &CacheKey) -> Option<Vec<Generation>> {
        let value = self.entries.shift_remove(key)?;
        self.entries.insert(key.clone(), value.clone());
        Some(value)
    }

    fn insert(&mut self, key: CacheKey, value: Vec<Generation>) {
        if self.capacity == 0 {
            return;
        }
        self.entries.shift_remove(&key);
        while self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Hit and miss counters for a [`CachedGateway`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from the cache.
    pub hits: u64,
    /// Requests forwarded to the inner gateway.
    pub misses: u64,
    /// Entries currently held.
    pub entries: usize,
}

/// Gateway that memoizes successful generations of an inner gateway.
///
/// Two concurrent misses for the same key may both reach the inner gateway;
/// the later result overwrites the earlier one.
#[derive(Debug)]
pub struct CachedGateway<G> {
    inner: G,
    entries: Mutex<LruMap>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<G: InferenceGateway> CachedGateway<G> {
    /// Wraps `inner` with a cache holding at most `capacity` results.
    ///
    /// A capacity of zero disables caching.
    #[must_use]
    pub fn new(inner: G, capacity: usize) -> Self {
        Self {
            inner,
            entries: Mutex::new(LruMap::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Current counters.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().await.len(),
        }
    }
}

#[async_trait]
impl<G: InferenceGateway> InferenceGateway for CachedGateway<G> {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Vec<Generation>> {
        let key = CacheKey {
            prompt: prompt.to_string(),
            options: *options,
        };

        let cached = self.entries.lock().await.get(&key);
        if let Some(cached) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(prompt_len = prompt.len(), "Generation cache hit");
            return Ok(cached);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(prompt_len = prompt.len(), "Generation cache miss");

        // The lock is not held across the inner call.
        let generations = self.inner.generate(prompt, options).await?;
        self.entries.lock().await.insert(key, generations.clone());

        Ok(generations)
    }
}
