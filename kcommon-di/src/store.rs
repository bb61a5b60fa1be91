//! Freezable keyed entry store
//!
//! The map shared by the service container and the logger registry. Every
//! mutation is checked against the freeze guard before the write lock is
//! taken, then again under it, so nothing can slip in after `freeze`
//! returns.

use kcommon_core::FreezeGuard;
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

/// Mutation rejected because the store is frozen
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Registry is frozen")]
pub struct RegistryFrozen;

/// Map from keys to shared entries behind a one-way freeze guard
pub struct EntryStore<K, V> {
    entries: RwLock<HashMap<K, V>>,
    guard: FreezeGuard,
}

impl<K, V> EntryStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            guard: FreezeGuard::new(),
        }
    }

    /// Clone the entry for `key` out of the map
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.read().get(key).cloned()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of every entry
    pub fn entries(&self) -> Vec<(K, V)>
    where
        K: Clone,
    {
        self.entries
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Run `mutate` under the write lock, unless the store is frozen
    pub fn modify<R, E, F>(&self, mutate: F) -> Result<R, E>
    where
        E: From<RegistryFrozen>,
        F: FnOnce(&mut HashMap<K, V>) -> Result<R, E>,
    {
        if self.guard.is_frozen() {
            return Err(RegistryFrozen.into());
        }
        let mut entries = self.entries.write();
        if self.guard.is_frozen() {
            return Err(RegistryFrozen.into());
        }
        mutate(&mut entries)
    }

    /// Remove every entry, handing them back so they drop outside the lock
    pub fn drain(&self) -> Result<HashMap<K, V>, RegistryFrozen> {
        self.modify(|entries| Ok(std::mem::take(entries)))
    }

    /// Freeze the store. Returns `true` only for the transitioning call.
    pub fn freeze(&self) -> bool {
        let _entries = self.entries.write();
        self.guard.freeze()
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.guard.is_frozen()
    }
}

impl<K, V> Default for EntryStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
