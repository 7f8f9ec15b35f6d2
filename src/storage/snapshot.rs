//! Immutable weak-keyed snapshots.

use crate::error::{Result, StoreError};
use crate::keys::{Key, Purge, WeakKey};
use crate::types::{KeyId, SnapshotId};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use super::evolver::Evolver;
use super::ReadStorage;

/// A stored value together with the weak handle to its key.
struct Entry<T, V> {
    key: WeakKey<T>,
    value: V,
    /// Family that registered this entry's cleanup. Kept alive for as long as
    /// any snapshot still shares the entry.
    _family: Arc<Family<T, V>>,
}

impl<T, V: Clone> Clone for Entry<T, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            _family: Arc::clone(&self._family),
        }
    }
}

type EntryMap<T, V> = im::HashMap<KeyId, Entry<T, V>>;

/// Live snapshots of one lineage: a root created by [`Snapshot::empty`] or
/// [`Snapshot::from_entries`] and everything derived from it.
///
/// A family stays alive while any of its snapshots or any entry it
/// registered is reachable. Members are held weakly.
struct Family<T, V> {
    members: Mutex<Members<T, V>>,
}

struct Members<T, V> {
    nodes: Vec<Weak<Node<T, V>>>,
    /// Length at which dead handles are next swept.
    sweep_at: usize,
}

const MIN_SWEEP: usize = 16;

impl<T, V> Family<T, V> {
    fn new() -> Self {
        Self {
            members: Mutex::new(Members {
                nodes: Vec::new(),
                sweep_at: MIN_SWEEP,
            }),
        }
    }

    fn adopt(&self, node: Weak<Node<T, V>>) {
        let mut members = self.members.lock();
        members.nodes.push(node);
        if members.nodes.len() >= members.sweep_at {
            members.nodes.retain(|m| m.strong_count() > 0);
            members.sweep_at = (members.nodes.len() * 2).max(MIN_SWEEP);
        }
    }

    fn live_members(&self) -> Vec<Arc<Node<T, V>>> {
        self.members
            .lock()
            .nodes
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Handles tracked, dead or alive.
    fn tracked(&self) -> usize {
        self.members.lock().nodes.len()
    }
}

impl<T, V> Purge for Family<T, V>
where
    T: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn purge(&self, key: KeyId) {
        // Members are collected first so no node lock is taken while the
        // family lock is held. A snapshot adopted after a pass may have
        // copied its parent's map before the key was removed from it, so
        // passes repeat until no new member shows up.
        let mut seen = HashSet::new();
        let mut touched = 0usize;
        loop {
            let fresh: Vec<_> = self
                .live_members()
                .into_iter()
                .filter(|node| seen.insert(node.id))
                .collect();
            if fresh.is_empty() {
                break;
            }
            for node in &fresh {
                let removed = node.entries.write().remove(&key);
                if removed.is_some() {
                    touched += 1;
                }
            }
        }
        tracing::trace!(key = %key, touched, "purged dead key");
    }
}

struct Node<T, V> {
    id: SnapshotId,
    parent: Option<Weak<Node<T, V>>>,
    family: Arc<Family<T, V>>,
    entries: RwLock<EntryMap<T, V>>,
}

/// Immutable mapping from key identity to value.
///
/// An entry is present only while its key is alive. Deriving a snapshot with
/// [`Snapshot::update`] never changes the original; the only change a
/// snapshot ever observes is the removal of entries whose key died.
pub struct Snapshot<T, V> {
    node: Arc<Node<T, V>>,
}

impl<T, V> Snapshot<T, V>
where
    T: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty snapshot whose family is only itself.
    pub fn empty() -> Self {
        Self::derive(None, HashMap::new())
    }

    /// Create a new lineage root holding `initial`.
    pub fn from_entries<I>(initial: I) -> Self
    where
        I: IntoIterator<Item = (Key<T>, V)>,
    {
        Self::derive(None, initial.into_iter().collect())
    }

    /// Get a new snapshot with `updates` applied.
    ///
    /// Returns `self` (same identity) when `updates` is empty. Later pairs
    /// win when a key appears more than once.
    pub fn update<I>(&self, updates: I) -> Self
    where
        I: IntoIterator<Item = (Key<T>, V)>,
    {
        let updates: HashMap<Key<T>, V> = updates.into_iter().collect();
        if updates.is_empty() {
            return self.clone();
        }
        Self::derive(Some(self), updates)
    }

    fn derive(parent: Option<&Self>, updates: HashMap<Key<T>, V>) -> Self {
        let family = match parent {
            Some(p) => Arc::clone(&p.node.family),
            None => Arc::new(Family::new()),
        };
        let node = Arc::new(Node {
            id: SnapshotId::next(),
            parent: parent.map(|p| Arc::downgrade(&p.node)),
            family: Arc::clone(&family),
            entries: RwLock::new(EntryMap::new()),
        });

        // Strong handles and displaced entries are dropped only after the
        // entry lock is released, since either may run a purge on this node.
        let mut held = Vec::with_capacity(updates.len());
        let mut displaced = Vec::new();
        let count = updates.len();
        {
            // A purge racing with this call blocks here until the map is
            // filled, then removes the dead key from it.
            let mut entries = node.entries.write();

            // Adopted before the parent map is read, so a purge that misses
            // the parent's copy of a dying key still reaches this node.
            family.adopt(Arc::downgrade(&node));

            let mut map = match parent {
                Some(p) => p.node.entries.read().clone(),
                None => EntryMap::new(),
            };
            let target: Weak<dyn Purge> = Arc::downgrade(&family) as Weak<dyn Purge>;
            for (key, value) in updates {
                key.register(Weak::clone(&target));
                let entry = Entry {
                    key: key.downgrade(),
                    value,
                    _family: Arc::clone(&family),
                };
                if let Some(old) = map.insert(key.id(), entry) {
                    displaced.push(old);
                }
                held.push(key);
            }
            *entries = map;
        }

        tracing::debug!(
            snapshot = %node.id,
            parent = ?parent.map(|p| p.id()),
            entries = count,
            "created snapshot"
        );

        drop(displaced);
        drop(held);
        Self { node }
    }

    /// Query the value stored for `key`.
    pub fn query(&self, key: &Key<T>) -> Result<V> {
        let entries = self.node.entries.read();
        match entries.get(&key.id()) {
            Some(entry) if entry.key.is_alive() => Ok(entry.value.clone()),
            _ => Err(StoreError::NotFound(key.id())),
        }
    }

    /// Query the value stored for `key`, or return `fallback`.
    pub fn get(&self, key: &Key<T>, fallback: V) -> V {
        self.query(key).unwrap_or(fallback)
    }

    /// Whether a live entry exists for `key`.
    pub fn contains(&self, key: &Key<T>) -> bool {
        self.node
            .entries
            .read()
            .get(&key.id())
            .map_or(false, |entry| entry.key.is_alive())
    }

    /// Materialize the live entries.
    ///
    /// Entries whose key died are skipped whether or not they have been
    /// purged yet.
    pub fn to_dict(&self) -> HashMap<Key<T>, V> {
        // Iterate a structural copy so no strong key handle is created or
        // dropped under the entry lock.
        let entries = self.node.entries.read().clone();
        entries
            .values()
            .filter_map(|entry| {
                entry
                    .key
                    .upgrade()
                    .map(|key| (key, entry.value.clone()))
            })
            .collect()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.node
            .entries
            .read()
            .values()
            .filter(|entry| entry.key.is_alive())
            .count()
    }

    /// Whether there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get an evolver over this snapshot.
    pub fn evolver(&self) -> Evolver<T, V> {
        Evolver::new(self.clone())
    }
}

impl<T, V> Snapshot<T, V> {
    /// Identity of this snapshot.
    pub fn id(&self) -> SnapshotId {
        self.node.id
    }

    /// Whether two handles refer to the same snapshot.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.node, &b.node)
    }

    /// The snapshot this one was derived from, if it is still alive.
    pub fn parent(&self) -> Option<Self> {
        self.node
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|node| Self { node })
    }

    /// Number of live snapshots in this snapshot's lineage, itself included.
    pub fn family_len(&self) -> usize {
        self.node.family.live_members().len()
    }

    /// Number of member handles the lineage bookkeeping currently holds,
    /// including ones whose snapshot has been dropped but not yet swept.
    pub fn family_tracked(&self) -> usize {
        self.node.family.tracked()
    }
}

impl<T, V> Clone for Snapshot<T, V> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<T, V> Default for Snapshot<T, V>
where
    T: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::empty()
    }
}

impl<T, V> fmt::Debug for Snapshot<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("id", &self.node.id)
            .finish_non_exhaustive()
    }
}

impl<T, V> ReadStorage<T, V> for Snapshot<T, V>
where
    T: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn query(&self, key: &Key<T>) -> Result<V> {
        Snapshot::query(self, key)
    }

    fn to_dict(&self) -> HashMap<Key<T>, V> {
        Snapshot::to_dict(self)
    }
}
