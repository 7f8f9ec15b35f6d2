//! Key handle implementation.

use crate::types::KeyId;
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// Receiver of key-death notifications.
pub(crate) trait Purge: Send + Sync {
    /// Called exactly once per registration, on the thread that dropped the
    /// last strong handle to `key`.
    fn purge(&self, key: KeyId);
}

/// Shared allocation behind a key.
struct KeyCell<T> {
    id: KeyId,
    value: T,
    /// Non-owning cleanup registrations.
    finalizers: Mutex<Vec<Weak<dyn Purge>>>,
}

impl<T> Drop for KeyCell<T> {
    fn drop(&mut self) {
        let finalizers = std::mem::take(self.finalizers.get_mut());
        let mut fired = 0usize;
        for finalizer in finalizers {
            if let Some(target) = finalizer.upgrade() {
                target.purge(self.id);
                fired += 1;
            }
        }
        tracing::trace!(key = %self.id, fired, "key dropped");
    }
}

/// Strong handle to a key object, compared by identity.
///
/// Cloning a `Key` shares the same object. Two keys built from equal values
/// are still different keys.
pub struct Key<T> {
    cell: Arc<KeyCell<T>>,
}

impl<T> Key<T> {
    /// Wrap a value in a fresh key identity.
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(KeyCell {
                id: KeyId::next(),
                value,
                finalizers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Identity of this key.
    pub fn id(&self) -> KeyId {
        self.cell.id
    }

    /// Create a non-owning handle.
    pub fn downgrade(&self) -> WeakKey<T> {
        WeakKey {
            id: self.cell.id,
            cell: Arc::downgrade(&self.cell),
        }
    }

    /// Number of strong handles to this key.
    pub fn strong_count(this: &Self) -> usize {
        Arc::strong_count(&this.cell)
    }

    /// Number of cleanup registrations whose target is still alive.
    pub fn live_registrations(this: &Self) -> usize {
        this.cell
            .finalizers
            .lock()
            .iter()
            .filter(|f| f.strong_count() > 0)
            .count()
    }

    /// Register a cleanup target to be notified when this key dies.
    ///
    /// Registrations whose target has already been collected are pruned. A
    /// target is registered at most once.
    pub(crate) fn register(&self, target: Weak<dyn Purge>) {
        let mut finalizers = self.cell.finalizers.lock();
        finalizers.retain(|f| f.strong_count() > 0);
        if !finalizers.iter().any(|f| Weak::ptr_eq(f, &target)) {
            finalizers.push(target);
        }
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> Deref for Key<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.cell.value
    }
}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cell.id == other.cell.id
    }
}

impl<T> Eq for Key<T> {}

impl<T> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.id.hash(state);
    }
}

impl<T> Borrow<KeyId> for Key<T> {
    fn borrow(&self) -> &KeyId {
        &self.cell.id
    }
}

impl<T: fmt::Debug> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.cell.id)
            .field("value", &self.cell.value)
            .finish()
    }
}

/// Non-owning handle to a key object.
pub struct WeakKey<T> {
    id: KeyId,
    cell: Weak<KeyCell<T>>,
}

impl<T> WeakKey<T> {
    /// Identity of the referenced key. Available even after the key died.
    pub fn id(&self) -> KeyId {
        self.id
    }

    /// Get a strong handle if the key is still alive.
    pub fn upgrade(&self) -> Option<Key<T>> {
        self.cell.upgrade().map(|cell| Key { cell })
    }

    /// Whether the key object is still alive.
    pub fn is_alive(&self) -> bool {
        self.cell.strong_count() > 0
    }
}

impl<T> Clone for WeakKey<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cell: Weak::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for WeakKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakKey")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}
