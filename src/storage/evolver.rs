//! Mutable buffering façade over a snapshot.

use crate::error::Result;
use crate::keys::Key;
use std::collections::HashMap;
use std::fmt;

use super::snapshot::Snapshot;
use super::ReadStorage;

/// Buffers updates over a base [`Snapshot`].
///
/// Pending updates live in an overlay that is consulted before the base.
/// Keys in the overlay are held strongly until the overlay is committed or
/// reset; once committed, the base only holds them weakly.
pub struct Evolver<T, V> {
    base: Snapshot<T, V>,
    overlay: im::HashMap<Key<T>, V>,
}

impl<T, V> Evolver<T, V>
where
    T: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an evolver with no pending updates.
    pub fn new(base: Snapshot<T, V>) -> Self {
        Self {
            base,
            overlay: im::HashMap::new(),
        }
    }

    /// Buffer `updates`. Later values win over earlier pending ones.
    pub fn update<I>(&mut self, updates: I) -> &mut Self
    where
        I: IntoIterator<Item = (Key<T>, V)>,
    {
        for (key, value) in updates {
            self.overlay.insert(key, value);
        }
        self
    }

    /// Query the pending value for `key`, falling back to the base.
    pub fn query(&self, key: &Key<T>) -> Result<V> {
        match self.overlay.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.base.query(key),
        }
    }

    /// Query the value for `key`, or return `fallback`.
    pub fn get(&self, key: &Key<T>, fallback: V) -> V {
        self.query(key).unwrap_or(fallback)
    }

    /// Whether a pending or committed live entry exists for `key`.
    pub fn contains(&self, key: &Key<T>) -> bool {
        self.overlay.contains_key(key) || self.base.contains(key)
    }

    /// Materialize the live entries, pending updates included.
    ///
    /// Same result as `self.storage().to_dict()` without deriving a
    /// snapshot.
    pub fn to_dict(&self) -> HashMap<Key<T>, V> {
        let mut dict = self.base.to_dict();
        dict.extend(
            self.overlay
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        dict
    }

    /// Snapshot with the pending updates applied. Does not commit.
    pub fn storage(&self) -> Snapshot<T, V> {
        self.base.update(
            self.overlay
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        )
    }

    /// Apply the pending updates to the base and clear them.
    pub fn commit(&mut self) {
        if self.overlay.is_empty() {
            return;
        }
        let base = self.storage();
        tracing::debug!(
            from = %self.base.id(),
            to = %base.id(),
            updates = self.overlay.len(),
            "committed evolver"
        );
        self.base = base;
        self.overlay = im::HashMap::new();
    }

    /// Discard the pending updates.
    pub fn reset(&mut self) {
        self.overlay = im::HashMap::new();
    }

    /// Independent evolver with the same base and pending updates.
    pub fn fork(&self) -> Self {
        Self {
            base: self.base.clone(),
            overlay: self.overlay.clone(),
        }
    }

    /// Whether there are pending updates.
    pub fn is_dirty(&self) -> bool {
        !self.overlay.is_empty()
    }

    /// The pending updates.
    pub fn updates(&self) -> &im::HashMap<Key<T>, V> {
        &self.overlay
    }

    /// The committed base snapshot.
    pub fn base(&self) -> &Snapshot<T, V> {
        &self.base
    }
}

impl<T, V> Clone for Evolver<T, V>
where
    T: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        self.fork()
    }
}

impl<T, V> Default for Evolver<T, V>
where
    T: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(Snapshot::empty())
    }
}

impl<T, V> fmt::Debug for Evolver<T, V>
where
    T: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evolver")
            .field("base", &self.base)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

impl<T, V> ReadStorage<T, V> for Evolver<T, V>
where
    T: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn query(&self, key: &Key<T>) -> Result<V> {
        Evolver::query(self, key)
    }

    fn to_dict(&self) -> HashMap<Key<T>, V> {
        Evolver::to_dict(self)
    }
}
