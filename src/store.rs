//! Keyed store with per-key locking
//!
//! The outer map lock is held only long enough to find or create a slot.
//! Each slot has its own mutex, so operations on one key are strictly
//! ordered while different keys proceed independently.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

type Slot<V> = Arc<Mutex<V>>;

pub struct KeyedStore<K, V> {
    slots: RwLock<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for KeyedStore<K, V> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> KeyedStore<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, key: &K) -> Option<Slot<V>> {
        self.slots.read().await.get(key).cloned()
    }

    async fn slot_or_insert_with(&self, key: &K, init: &impl Fn() -> V) -> Slot<V> {
        if let Some(slot) = self.slot(key).await {
            return slot;
        }
        let mut slots = self.slots.write().await;
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(init())))
            .clone()
    }

    /// True while `slot` is still the one mapped to `key`. Checked after
    /// locking, since `retain` may drop an idle slot between lookup and lock.
    async fn is_current(&self, key: &K, slot: &Slot<V>) -> bool {
        self.slots
            .read()
            .await
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    async fn lock_existing(&self, key: &K) -> Option<OwnedMutexGuard<V>> {
        loop {
            let slot = self.slot(key).await?;
            let guard = Arc::clone(&slot).lock_owned().await;
            if self.is_current(key, &slot).await {
                return Some(guard);
            }
        }
    }

    async fn lock_or_insert(&self, key: &K, init: &impl Fn() -> V) -> OwnedMutexGuard<V> {
        loop {
            let slot = self.slot_or_insert_with(key, init).await;
            let guard = Arc::clone(&slot).lock_owned().await;
            if self.is_current(key, &slot).await {
                return guard;
            }
        }
    }

    /// Run `f` on the value for `key`, if present.
    pub async fn with<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let mut value = self.lock_existing(key).await?;
        Some(f(&mut value))
    }

    /// Run `f` on the value for `key`, creating it with `init` first if absent.
    pub async fn with_or_insert<R>(
        &self,
        key: &K,
        init: impl Fn() -> V,
        f: impl FnOnce(&mut V) -> R,
    ) -> R {
        let mut value = self.lock_or_insert(key, &init).await;
        f(&mut value)
    }

    /// Replace the value for `key`, ordered after any in-flight operation on it.
    pub async fn insert(&self, key: K, value: V) {
        loop {
            if let Some(mut current) = self.lock_existing(&key).await {
                *current = value;
                return;
            }
            if let Entry::Vacant(entry) = self.slots.write().await.entry(key.clone()) {
                entry.insert(Arc::new(Mutex::new(value)));
                return;
            }
        }
    }

    pub async fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.with(key, |value| value.clone()).await
    }

    pub async fn remove(&self, key: &K) -> bool {
        self.slots.write().await.remove(key).is_some()
    }

    /// Hold the slot for `key` across awaits. Used to serialize whole
    /// multi-step operations per key.
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<V>
    where
        V: Default,
    {
        self.lock_or_insert(key, &V::default).await
    }

    /// Keep only entries for which `keep` returns true. Slots that are
    /// locked by someone else are skipped and kept. Returns the number
    /// of removed entries.
    pub async fn retain(&self, mut keep: impl FnMut(&K, &mut V) -> bool) -> usize {
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|key, slot| match slot.try_lock() {
            Ok(mut value) => keep(key, &mut value),
            Err(_) => true,
        });
        before - slots.len()
    }

    pub async fn keys(&self) -> Vec<K> {
        self.slots.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}
