//! Identity-compared key handles with drop-time cleanup.
//!
//! A [`Key`] is a strong handle to an object owned by the caller. The store
//! only ever holds [`WeakKey`]s, and learns about a key's death through the
//! cleanup registrations the key runs when its last strong handle goes away.

mod key;

pub use key::{Key, WeakKey};
pub(crate) use key::Purge;
