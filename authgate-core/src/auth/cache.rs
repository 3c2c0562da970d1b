//! Liveness cache for issued tokens
//!
//! Bounded map with a uniform entry lifetime. Expired entries are dropped
//! first; if the cache is still full, the oldest insertion is evicted. An
//! entry that is gone, for either reason, is no longer live.

use crate::clock::Clock;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: u64,
    seq: u64,
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Insertion order as (seq, key). May hold stale pairs for keys that
    /// were overwritten or removed; those are skipped.
    order: VecDeque<(u64, String)>,
    next_seq: u64,
}

impl<V> Inner<V> {
    fn is_current(&self, seq: u64, key: &str) -> bool {
        self.entries.get(key).is_some_and(|e| e.seq == seq)
    }

    fn purge_expired(&mut self, now: u64) -> usize {
        let mut purged = 0;
        while let Some((seq, key)) = self.order.front() {
            let expired = match self.entries.get(key.as_str()) {
                Some(entry) if entry.seq == *seq => entry.expires_at <= now,
                _ => true,
            };
            if !expired {
                break;
            }
            if let Some((seq, key)) = self.order.pop_front() {
                if self.is_current(seq, &key) {
                    self.entries.remove(&key);
                    purged += 1;
                }
            }
        }
        purged
    }

    fn evict_oldest(&mut self) -> Option<String> {
        while let Some((seq, key)) = self.order.pop_front() {
            if self.is_current(seq, &key) {
                self.entries.remove(&key);
                return Some(key);
            }
        }
        None
    }

    fn compact(&mut self, capacity: usize) {
        if self.order.len() > capacity.saturating_mul(2) {
            let entries = &self.entries;
            self.order
                .retain(|(seq, key)| entries.get(key).is_some_and(|e| e.seq == *seq));
        }
    }
}

/// Thread-safe, bounded, time-expiring set of live tokens
#[derive(Debug)]
pub struct LivenessCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> LivenessCache<V> {
    /// `capacity` is clamped to at least one entry
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        LivenessCache {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next_seq: 0,
            }),
            capacity: capacity.max(1),
            ttl,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace an entry, restarting its lifetime
    pub fn put(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = self.clock.now_unix();
        let mut inner = self.lock();

        let purged = inner.purge_expired(now);
        if purged > 0 {
            debug!("Purged {} expired liveness entries", purged);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key.clone(),
            Entry {
                value,
                expires_at: now.saturating_add(self.ttl.as_secs()),
                seq,
            },
        );
        inner.order.push_back((seq, key));

        while inner.entries.len() > self.capacity {
            match inner.evict_oldest() {
                Some(_) => debug!("Liveness cache full, evicted oldest entry"),
                None => break,
            }
        }
        inner.compact(self.capacity);
    }

    /// Whether `key` is present and not expired
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Value stored under `key`, if live
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_unix();
        let mut inner = self.lock();

        let expired = match inner.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
        }
        None
    }

    /// Drop an entry before its time
    pub fn remove(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Number of stored entries, including any not yet purged after expiry
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
