//! Weak-keyed persistent storage.
//!
//! A [`Snapshot`] maps key identity to a strongly held value. Snapshots are
//! immutable and share structure with the snapshot they were derived from.
//! When a key dies, its entry is removed from every live snapshot that could
//! still expose it: the snapshot whose update inserted it and all of that
//! snapshot's descendants (its *family*).
//!
//! An [`Evolver`] batches updates over a base snapshot so a transaction pays
//! for one derived snapshot at commit time instead of one per write.
//!
//! # Example
//!
//! ```
//! use weakstore::{Evolver, Key, Snapshot};
//!
//! let widget = Key::new("widget");
//! let base = Snapshot::from_entries([(widget.clone(), 1)]);
//!
//! let mut evolver = Evolver::new(base.clone());
//! evolver.update([(widget.clone(), 2)]);
//! assert_eq!(evolver.query(&widget).unwrap(), 2);
//! assert_eq!(base.query(&widget).unwrap(), 1);
//!
//! drop(evolver);
//! drop(widget);
//! assert!(base.to_dict().is_empty());
//! ```

mod evolver;
mod snapshot;

pub use evolver::Evolver;
pub use snapshot::Snapshot;

use crate::error::Result;
use crate::keys::Key;
use std::collections::HashMap;

/// Read access shared by snapshots and evolvers.
pub trait ReadStorage<T, V> {
    /// Query the value for `key`; fails with `NotFound` if absent or dead.
    fn query(&self, key: &Key<T>) -> Result<V>;

    /// Materialize the live entries.
    fn to_dict(&self) -> HashMap<Key<T>, V>;

    /// Query the value for `key`, or return `fallback`.
    fn get(&self, key: &Key<T>, fallback: V) -> V {
        self.query(key).unwrap_or(fallback)
    }

    /// Whether a live entry exists for `key`.
    fn contains(&self, key: &Key<T>) -> bool {
        self.query(key).is_ok()
    }
}
