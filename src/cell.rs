//! Shared state cell tying a snapshot store to a context lock.

use crate::error::Result;
use crate::lock::{ContextLock, ThreadedLock};
use crate::storage::{Evolver, Snapshot};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;

/// State cell configuration.
#[derive(Clone, Debug)]
pub struct CellConfig {
    /// Name used in log output.
    pub name: String,

    /// Number of committed snapshots retained by [`StateCell::history`].
    pub history_limit: usize,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            name: "state".to_string(),
            history_limit: 16,
        }
    }
}

/// Current snapshot of per-object state, read and written under a lock.
///
/// Provides:
/// - Read sections over the committed snapshot
/// - Write sections that batch updates in an evolver and commit on success
/// - Stable snapshots of past states
pub struct StateCell<T, V, L = ThreadedLock> {
    config: CellConfig,

    lock: L,

    /// Committed snapshot.
    current: RwLock<Snapshot<T, V>>,

    /// Recently committed snapshots, oldest first.
    history: Mutex<VecDeque<Snapshot<T, V>>>,
}

impl<T, V> StateCell<T, V, ThreadedLock>
where
    T: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cell guarded by a [`ThreadedLock`].
    pub fn new(config: CellConfig) -> Self {
        Self::with_lock(config, ThreadedLock::new())
    }
}

impl<T, V, L> StateCell<T, V, L>
where
    T: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    L: ContextLock,
{
    /// Create an empty cell guarded by `lock`.
    pub fn with_lock(config: CellConfig, lock: L) -> Self {
        Self::with_snapshot(config, lock, Snapshot::empty())
    }

    /// Create a cell whose committed state starts at `snapshot`.
    pub fn with_snapshot(config: CellConfig, lock: L, snapshot: Snapshot<T, V>) -> Self {
        Self {
            config,
            lock,
            current: RwLock::new(snapshot),
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Run `f` inside a read section with the committed snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&Snapshot<T, V>) -> R) -> R {
        let _section = self.lock.read_context();
        let snapshot = self.current.read().clone();
        f(&snapshot)
    }

    /// Run `f` inside a write section with an evolver over the committed
    /// snapshot.
    ///
    /// Buffered updates are committed if `f` succeeds and discarded if it
    /// fails. They are applied on top of whatever is committed when `f`
    /// returns, so writes from a nested write section on the same thread
    /// are kept unless `f` overwrites the same keys.
    ///
    /// Fails with `InvalidContext` if the calling thread is inside a read
    /// section.
    pub fn write<R>(&self, f: impl FnOnce(&mut Evolver<T, V>) -> Result<R>) -> Result<R> {
        let _section = self.lock.write_context()?;
        let mut evolver = Evolver::new(self.current.read().clone());
        let output = f(&mut evolver)?;

        if evolver.is_dirty() {
            let base = self.current.read().clone();
            let next = base.update(
                evolver
                    .updates()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            );
            tracing::debug!(
                cell = %self.config.name,
                snapshot = %next.id(),
                updates = evolver.updates().len(),
                "committed write"
            );
            let previous = std::mem::replace(&mut *self.current.write(), next.clone());
            drop(previous);
            self.remember(next);
        }

        Ok(output)
    }

    fn remember(&self, snapshot: Snapshot<T, V>) {
        if self.config.history_limit == 0 {
            return;
        }
        let mut evicted = Vec::new();
        {
            let mut history = self.history.lock();
            history.push_back(snapshot);
            while history.len() > self.config.history_limit {
                evicted.extend(history.pop_front());
            }
        }
        drop(evicted);
    }

    /// The committed snapshot. Later writes never change it; only entries
    /// of keys that die are removed.
    pub fn take_snapshot(&self) -> Snapshot<T, V> {
        self.current.read().clone()
    }

    /// Retained committed snapshots, oldest first.
    pub fn history(&self) -> Vec<Snapshot<T, V>> {
        self.history.lock().iter().cloned().collect()
    }

    /// The lock guarding this cell.
    pub fn lock(&self) -> &L {
        &self.lock
    }

    /// Cell configuration.
    pub fn config(&self) -> &CellConfig {
        &self.config
    }
}
