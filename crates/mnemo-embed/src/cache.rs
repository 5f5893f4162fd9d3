//! LRU + TTL cache for embedding vectors, keyed by `(role, text)` via a
//! SHA-256 digest prefix so cache keys stay short and never retain the raw
//! text (spec §4.1, §9). A 24-hex-char digest prefix has a non-zero but
//! acceptable collision probability for a cache bounded to a few hundred
//! entries (spec §9, open question).

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::CacheConfig;
use crate::types::Role;

const DIGEST_PREFIX_LEN: usize = 24;

fn cache_key(role: Role, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let hex = format!("{digest:x}");
    let role_tag = match role {
        Role::Query => 'q',
        Role::Passage => 'p',
    };
    let prefix = hex.get(..DIGEST_PREFIX_LEN).unwrap_or(&hex);
    format!("{role_tag}:{prefix}")
}

struct Entry {
    vector: Vec<f32>,
    inserted_at: Instant,
}

pub struct EmbeddingCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
    stats: Mutex<CacheStats>,
}

impl EmbeddingCache {
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: config.ttl,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn get(&self, role: Role, text: &str) -> Option<Vec<f32>> {
        let key = cache_key(role, text);
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                let vector = entry.vector.clone();
                drop(entries);
                self.stats.lock().record_hit();
                debug!(key = %key, "embedding cache hit");
                Some(vector)
            }
            Some(_) => {
                entries.pop(&key);
                drop(entries);
                self.stats.lock().record_miss();
                debug!(key = %key, "embedding cache entry expired");
                None
            }
            None => {
                drop(entries);
                self.stats.lock().record_miss();
                None
            }
        }
    }

    pub fn put(&self, role: Role, text: &str, vector: Vec<f32>) {
        let key = cache_key(role, text);
        self.entries.lock().put(
            key,
            Entry {
                vector,
                inserted_at: Instant::now(),
            },
        );
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    const fn record_hit(&mut self) {
        self.hits += 1;
    }

    const fn record_miss(&mut self) {
        self.misses += 1;
    }

    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
