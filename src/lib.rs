//! # Weak Store
//!
//! Auxiliary per-object state that never extends the lifetime of the objects
//! it describes, plus the read/write locks that make a shared object graph
//! safe to mutate.
//!
//! ## Core Concepts
//!
//! - **Keys**: Identity-compared handles to caller-owned objects; the store
//!   only holds them weakly
//! - **Snapshots**: Immutable, structurally shared mappings; entries vanish
//!   from every related snapshot when their key dies
//! - **Evolvers**: Buffered updates over a snapshot, committed in one step
//! - **Locks**: Scoped read/write sections, single-threaded or threaded
//!
//! ## Example
//!
//! ```
//! use weakstore::{CellConfig, Key, StateCell};
//!
//! let cell = StateCell::new(CellConfig::default());
//! let node = Key::new("node");
//!
//! cell.write(|evolver| {
//!     evolver.update([(node.clone(), 42)]);
//!     Ok(())
//! })?;
//!
//! let before = cell.take_snapshot();
//! assert_eq!(cell.read(|snapshot| snapshot.get(&node, 0)), 42);
//!
//! // Dropping the last handle removes the entry everywhere.
//! drop(node);
//! assert!(before.is_empty());
//! # Ok::<(), weakstore::StoreError>(())
//! ```

pub mod cell;
pub mod error;
pub mod keys;
pub mod lock;
pub mod storage;
pub mod types;

// Re-exports
pub use cell::{CellConfig, StateCell};
pub use error::{Result, StoreError};
pub use keys::{Key, WeakKey};
pub use lock::{
    ContextLock, LockContext, LockKind, ThreadedLock, ThreadedReadGuard, ThreadedWriteGuard,
    UnsyncLock, UnsyncReadGuard, UnsyncWriteGuard,
};
pub use storage::{Evolver, ReadStorage, Snapshot};
pub use types::{KeyId, SnapshotId};
