use crate::keys::{KeyPrefix, QueryKey};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    updated_at: DateTime<Utc>,
    last_read_at: DateTime<Utc>,
    stale: bool,
}

#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub key: QueryKey,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Fresh(Value),
    Stale(Value),
    Miss,
}

#[derive(Debug)]
pub struct CacheStore {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    staleness_window: Duration,
    eviction_window: Duration,
}

impl CacheStore {
    pub fn new(staleness_window: std::time::Duration, eviction_window: std::time::Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            staleness_window: Duration::from_std(staleness_window)
                .unwrap_or_else(|_| Duration::seconds(i64::MAX / 1_000)),
            eviction_window: Duration::from_std(eviction_window)
                .unwrap_or_else(|_| Duration::seconds(i64::MAX / 1_000)),
        }
    }

    pub fn lookup(&self, key: &QueryKey) -> Lookup {
        let now = Utc::now();
        let mut entries = self.entries.lock().expect("cache store lock");
        match entries.get_mut(key) {
            None => Lookup::Miss,
            Some(entry) => {
                entry.last_read_at = now;
                if entry.stale || now - entry.updated_at > self.staleness_window {
                    Lookup::Stale(entry.value.clone())
                } else {
                    Lookup::Fresh(entry.value.clone())
                }
            }
        }
    }

    pub fn store(&self, key: QueryKey, value: Value) {
        let now = Utc::now();
        let mut entries = self.entries.lock().expect("cache store lock");
        entries.insert(
            key,
            CacheEntry {
                value,
                updated_at: now,
                last_read_at: now,
                stale: false,
            },
        );
    }

    pub fn peek(&self, key: &QueryKey) -> Option<Value> {
        let entries = self.entries.lock().expect("cache store lock");
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        let entries = self.entries.lock().expect("cache store lock");
        entries.contains_key(key)
    }

    pub fn mark_stale(&self, key: &QueryKey) -> bool {
        let mut entries = self.entries.lock().expect("cache store lock");
        match entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_stale_matching(&self, prefix: &KeyPrefix) -> usize {
        let mut entries = self.entries.lock().expect("cache store lock");
        let mut marked = 0;
        for (key, entry) in entries.iter_mut() {
            if key.matches(prefix) {
                entry.stale = true;
                marked += 1;
            }
        }
        marked
    }

    pub fn remove(&self, key: &QueryKey) -> bool {
        let mut entries = self.entries.lock().expect("cache store lock");
        entries.remove(key).is_some()
    }

    pub fn keys_matching(&self, prefix: &KeyPrefix) -> Vec<QueryKey> {
        let entries = self.entries.lock().expect("cache store lock");
        entries
            .keys()
            .filter(|key| key.matches(prefix))
            .cloned()
            .collect()
    }

    // Snapshot and speculative write happen under one lock acquisition, so a
    // later intent always snapshots state that already carries this one's
    // speculative edits.
    pub fn snapshot_and_apply(
        &self,
        prefixes: &[KeyPrefix],
        mut apply: impl FnMut(&QueryKey, &mut Value),
    ) -> Vec<ViewSnapshot> {
        let mut entries = self.entries.lock().expect("cache store lock");
        let mut snapshots = Vec::new();
        for (key, entry) in entries.iter_mut() {
            if !prefixes.iter().any(|prefix| key.matches(prefix)) {
                continue;
            }
            snapshots.push(ViewSnapshot {
                key: key.clone(),
                value: entry.value.clone(),
            });
            apply(key, &mut entry.value);
        }
        snapshots
    }

    // Restoration overwrites rather than patches; applying it twice leaves
    // the view unchanged after the first application.
    pub fn restore(&self, snapshots: &[ViewSnapshot]) {
        let mut entries = self.entries.lock().expect("cache store lock");
        for snapshot in snapshots {
            match entries.get_mut(&snapshot.key) {
                Some(entry) => entry.value = snapshot.value.clone(),
                None => {
                    tracing::debug!(key = %snapshot.key, "view evicted before rollback; skipping");
                }
            }
        }
    }

    pub fn evict_idle(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.lock().expect("cache store lock");
        let before = entries.len();
        entries.retain(|_, entry| now - entry.last_read_at <= self.eviction_window);
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted idle cache views");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().expect("cache store lock");
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
