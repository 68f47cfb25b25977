//! Short-lived key/value associations with per-entry deadlines.
//!
//! Replaces ad-hoc in-process maps for ephemeral state such as password
//! reset codes. Hosts inject an instance where they need one; nothing here
//! is a module-level singleton. Expiry is checked lazily on access, with an
//! explicit purge for hosts that want to reclaim memory on a timer.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::Mutex,
    time::{Duration, SystemTime},
};

struct Entry<V> {
    value: V,
    expires_at: SystemTime,
}

/// Thread-safe expiring map.
pub struct ExpiringMap<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Associate `value` with `key` for `ttl` from now. Replaces any
    /// existing entry, live or expired.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        self.insert_at(key, value, ttl, SystemTime::now());
    }

    /// Current value for `key`, if it has not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, SystemTime::now())
    }

    /// Remove and return the value for `key`, if it has not expired.
    ///
    /// Single-use tokens go through here so a code cannot be redeemed twice.
    pub fn take(&self, key: &K) -> Option<V> {
        self.take_at(key, SystemTime::now())
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.lock().unwrap().remove(key).map(|e| e.value)
    }

    /// Drop every entry whose deadline has passed; returns how many were
    /// dropped.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(SystemTime::now())
    }

    /// Entry count including not-yet-purged expired entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    fn insert_at(&self, key: K, value: V, ttl: Duration, now: SystemTime) {
        let entry = Entry {
            value,
            expires_at: now + ttl,
        };
        self.entries.lock().unwrap().insert(key, entry);
    }

    fn get_at(&self, key: &K, now: SystemTime) -> Option<V> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(key)?;
        if now >= entry.expires_at {
            return None;
        }
        Some(entry.value.clone())
    }

    fn take_at(&self, key: &K, now: SystemTime) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.remove(key)?;
        if now >= entry.expires_at {
            return None;
        }
        Some(entry.value)
    }

    fn purge_expired_at(&self, now: SystemTime) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }
}

impl<K, V> Default for ExpiringMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
