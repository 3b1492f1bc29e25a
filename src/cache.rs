//! Bounded in-memory store of redacted originals for copy-without-render.
//!
//! Entries live only in process memory, expire `ttl` after creation, and are
//! evicted least-recently-accessed beyond `max_entries` (access = put or any
//! get). The cache is shared between the redaction stream and the IPC server,
//! so every public operation takes the internal lock.
//!
//! # Invariants
//! - A zero TTL disables storage entirely: every `put` is a no-op.
//! - A `put` with empty original bytes is a no-op.
//! - Expired entries are invisible to every read path.

use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use ahash::AHashMap;

use crate::types::SecretType;

pub const DEFAULT_MAX_ENTRIES: usize = 64;

/// A cached original, keyed by its redaction event id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretRecord {
    pub id: u64,
    pub secret_type: SecretType,
    pub rule_name: String,
    /// Inferred `KEY=` / `KEY:` prefix preceding the secret; may be empty.
    pub label: String,
    pub original: Vec<u8>,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

struct Inner {
    /// Most-recently-accessed first.
    order: Vec<u64>,
    by_id: AHashMap<u64, SecretRecord>,
    max_entries: usize,
    ttl: Duration,
}

/// Thread-safe TTL+LRU secret store.
pub struct Cache {
    inner: Mutex<Inner>,
    now: fn() -> SystemTime,
}

impl Cache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let max_entries = if max_entries == 0 {
            DEFAULT_MAX_ENTRIES
        } else {
            max_entries
        };
        Self {
            inner: Mutex::new(Inner {
                order: Vec::new(),
                by_id: AHashMap::new(),
                max_entries,
                ttl,
            }),
            now: SystemTime::now,
        }
    }

    #[cfg(test)]
    fn with_clock(max_entries: usize, ttl: Duration, now: fn() -> SystemTime) -> Self {
        let mut cache = Self::new(max_entries, ttl);
        cache.now = now;
        cache
    }

    /// Stores `record`, stamping creation and expiry times.
    ///
    /// No-op when the TTL is zero or the original is empty. Re-putting an
    /// existing id replaces the record and refreshes its position.
    pub fn put(&self, mut record: SecretRecord) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if inner.ttl.is_zero() || record.original.is_empty() {
            return;
        }
        let now = (self.now)();
        record.created_at = now;
        record.expires_at = now + inner.ttl;
        let id = record.id;
        if inner.by_id.insert(id, record).is_some() {
            inner.order.retain(|&other| other != id);
        }
        inner.order.insert(0, id);
        inner.evict_expired(now);
        inner.evict_excess();
    }

    /// Returns the record with `id` if present and unexpired, refreshing its
    /// LRU position.
    pub fn get(&self, id: u64) -> Option<SecretRecord> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let now = (self.now)();
        let record = inner.by_id.get(&id)?.clone();
        if record.expires_at <= now {
            inner.remove(id);
            return None;
        }
        inner.touch(id);
        Some(record)
    }

    /// Returns the most recent unexpired record, refreshing its LRU position.
    pub fn get_last(&self) -> Option<SecretRecord> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let now = (self.now)();
        inner.evict_expired(now);
        let id = *inner.order.first()?;
        inner.touch(id);
        inner.by_id.get(&id).cloned()
    }

    /// All unexpired records, most recent first.
    pub fn list(&self) -> Vec<SecretRecord> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.evict_expired((self.now)());
        inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect()
    }

    /// Updates the TTL applied to future entries.
    pub fn set_ttl(&self, ttl: Duration) {
        self.inner.lock().expect("cache lock poisoned").ttl = ttl;
    }

    /// Updates the entry bound and evicts beyond it immediately.
    pub fn set_max_entries(&self, max_entries: usize) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.max_entries = if max_entries == 0 {
            DEFAULT_MAX_ENTRIES
        } else {
            max_entries
        };
        inner.evict_excess();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").order.len()
    }
}

impl Inner {
    fn touch(&mut self, id: u64) {
        if let Some(pos) = self.order.iter().position(|&other| other == id) {
            self.order.remove(pos);
            self.order.insert(0, id);
        }
    }

    fn remove(&mut self, id: u64) {
        self.by_id.remove(&id);
        self.order.retain(|&other| other != id);
    }

    fn evict_expired(&mut self, now: SystemTime) {
        let by_id = &mut self.by_id;
        self.order.retain(|id| {
            let live = by_id
                .get(id)
                .map(|rec| rec.expires_at > now)
                .unwrap_or(false);
            if !live {
                by_id.remove(id);
            }
            live
        });
    }

    fn evict_excess(&mut self) {
        while self.order.len() > self.max_entries {
            if let Some(id) = self.order.pop() {
                self.by_id.remove(&id);
            }
        }
    }
}
