//! Time-expiring key/value cache.
//!
//! Entries expire lazily: a lookup past `expires_at` evicts the entry and
//! reports a miss. There is no size bound, so a long-lived process that
//! searches many distinct names will hold every entry until it is next
//! looked up. That is acceptable for a soft cache that is safe to lose.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::types::{AvailabilityResult, PricingRecord};

/// Default TTL used when `set` is called without one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// A stored value with its lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub data: V,
    pub stored_at: Instant,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Valid iff `now <= expires_at`.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now <= self.expires_at
    }
}

/// Generic TTL cache. Values are cloned out, never handed out by reference.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self::with_default_ttl(DEFAULT_TTL)
    }

    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    // A poisoned lock only means another thread panicked mid-insert; the map
    // itself is still structurally sound.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store `value` under `key`, expiring after `ttl` (or the default TTL).
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let now = Instant::now();
        let entry = CacheEntry {
            data: value,
            stored_at: now,
            expires_at: now + ttl.unwrap_or(self.default_ttl),
        };
        self.lock().insert(key.into(), entry);
    }

    /// Fetch an unexpired value. A stale entry is evicted and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();

        match entries.get(key) {
            Some(entry) if entry.is_valid_at(now) => Some(entry.data.clone()),
            Some(_) => {
                entries.remove(key);
                tracing::debug!(key, "cache entry expired");
                None
            }
            None => None,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.lock().remove(key).map(|e| e.data)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Values the pipeline keeps in its shared cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Pricing(PricingRecord),
    Availability(AvailabilityResult),
}

/// Cache key for an extension's price table.
pub fn pricing_key(extension: &str) -> String {
    format!("pricing:{}", extension)
}

/// Cache key for a domain's availability.
pub fn availability_key(domain: &str) -> String {
    format!("availability:{}", domain)
}
