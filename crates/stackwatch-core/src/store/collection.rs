// ── Generic reactive entity collection ──
//
// Concurrent keyed storage with O(1) lookups and push-based change
// notification via `watch` channels.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tokio::sync::watch;

/// A reactive collection for a single entity type, keyed by string.
///
/// Uses `DashMap` for O(1) concurrent lookups and a `watch` channel
/// carrying the full snapshot. Every mutation rebuilds the snapshot once,
/// so a bulk replace is observed as a single step.
pub(crate) struct EntityCollection<T: Send + Sync + 'static> {
    /// Primary storage: key string -> entity.
    by_key: DashMap<String, Arc<T>>,

    /// Serializes writers so each snapshot reflects whole operations.
    write: Mutex<()>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            write: Mutex::new(()),
            snapshot,
        }
    }

    /// Insert or overwrite an entity. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: String, entity: T) -> bool {
        let _write = self.lock_writes();
        let is_new = self.by_key.insert(key, Arc::new(entity)).is_none();
        self.rebuild_snapshot();
        is_new
    }

    /// Remove an entity by key. Returns the removed entity if it existed.
    ///
    /// Removing an absent key leaves the snapshot untouched.
    pub(crate) fn remove(&self, key: &str) -> Option<Arc<T>> {
        let _write = self.lock_writes();
        let removed = self.by_key.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_snapshot();
        }
        removed
    }

    /// Make the collection exactly `items`.
    ///
    /// Upserts every incoming entity, then prunes keys not in the incoming
    /// set. This avoids the brief empty state a clear-then-insert would
    /// leave for concurrent point lookups. Duplicate keys resolve to the
    /// last occurrence.
    pub(crate) fn replace_all(&self, items: Vec<(String, T)>) {
        let _write = self.lock_writes();
        let incoming: HashSet<String> = items.iter().map(|(k, _)| k.clone()).collect();
        for (key, entity) in items {
            self.by_key.insert(key, Arc::new(entity));
        }
        self.by_key.retain(|key, _| incoming.contains(key));
        self.rebuild_snapshot();
    }

    /// Look up an entity by its primary key string.
    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    #[cfg(test)]
    fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Return all current primary keys in the collection.
    pub(crate) fn keys(&self) -> Vec<String> {
        self.by_key.iter().map(|r| r.key().clone()).collect()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock_writes(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Collect all values into a snapshot vec and broadcast to subscribers.
    fn rebuild_snapshot(&self) {
        let values: Vec<Arc<T>> = self.by_key.iter().map(|r| Arc::clone(r.value())).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
