// ── Generic reactive entity cache ──
//
// Ordered keyed storage with wait-free reads and push-based change
// notification via `watch` channels. Entries are `Arc`s that are replaced,
// never mutated in place.

use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use tokio::sync::watch;

/// A reactive, insertion-ordered cache for a single entity type.
///
/// Reads go through an `ArcSwap` of the whole map. Every write builds a
/// complete new map, swaps it in, bumps the version counter, and publishes
/// a fresh snapshot, so readers never observe a half-applied change.
/// Writers serialize on `writer` so concurrent read-modify-writes never
/// lose an update; readers never take it.
pub(crate) struct EntityCache<K, T> {
    entries: ArcSwap<IndexMap<K, Arc<T>>>,

    /// Held from reading the current map until the new one is published.
    writer: Mutex<()>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Values in key order, rebuilt on mutation for subscribers.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<K, T> EntityCache<K, T>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            entries: ArcSwap::from_pointee(IndexMap::new()),
            writer: Mutex::new(()),
            version,
            snapshot,
        }
    }

    /// Replace the whole content in one publish. Order follows `items`;
    /// a repeated key keeps its first position and its last value.
    pub(crate) fn replace_all(&self, items: impl IntoIterator<Item = (K, T)>) {
        let map: IndexMap<K, Arc<T>> = items
            .into_iter()
            .map(|(key, entity)| (key, Arc::new(entity)))
            .collect();
        let _guard = self.lock_writer();
        self.publish(map);
    }

    /// Replace one entry with `f(current)`, keeping its position.
    ///
    /// Returns the new entry, or `None` (and publishes nothing) when the
    /// key is absent.
    pub(crate) fn replace_with(&self, key: &K, f: impl FnOnce(&T) -> T) -> Option<Arc<T>> {
        let _guard = self.lock_writer();
        let current = self.entries.load_full();
        let existing = current.get(key)?;
        let replacement = Arc::new(f(existing));

        let mut next = IndexMap::clone(&current);
        next.insert(key.clone(), Arc::clone(&replacement));
        self.publish(next);

        Some(replacement)
    }

    pub(crate) fn get(&self, key: &K) -> Option<Arc<T>> {
        self.entries.load().get(key).cloned()
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    // The guarded state lives in `entries`; a panicked writer left it whole.
    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, map: IndexMap<K, Arc<T>>) {
        let values: Vec<Arc<T>> = map.values().cloned().collect();
        self.entries.store(Arc::new(map));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}
