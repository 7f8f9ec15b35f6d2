//! Read/write context locks guarding shared graph state.
//!
//! Two variants share the [`ContextLock`] interface:
//!
//! - [`UnsyncLock`]: two flags, never blocks, for callers that guarantee
//!   single-threaded or cooperative execution.
//! - [`ThreadedLock`]: many concurrent readers or one writer across OS
//!   threads, tracked per thread.
//!
//! Sections are scoped guards released on drop, including during unwinding.
//! Acquiring a write section while the same thread holds a read section
//! fails with [`StoreError::InvalidContext`](crate::StoreError) instead of
//! deadlocking.

mod threaded;
mod unsync;

pub use threaded::{ThreadedLock, ThreadedReadGuard, ThreadedWriteGuard};
pub use unsync::{UnsyncLock, UnsyncReadGuard, UnsyncWriteGuard};

use crate::error::{Result, StoreError};
use std::fmt;

/// Section currently held by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockContext {
    Read,
    Write,
}

impl fmt::Display for LockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockContext::Read => write!(f, "read"),
            LockContext::Write => write!(f, "write"),
        }
    }
}

/// Lock implementation variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockKind {
    Unsync,
    Threaded,
}

/// Scoped read/write sections with context assertions.
pub trait ContextLock {
    type ReadGuard<'a>
    where
        Self: 'a;
    type WriteGuard<'a>
    where
        Self: 'a;

    /// Which implementation this is.
    fn kind(&self) -> LockKind;

    /// Section held by the caller, if any. A read section nested inside a
    /// write section reports `Read`.
    fn current_context(&self) -> Option<LockContext>;

    /// Enter a read section.
    fn read_context(&self) -> Self::ReadGuard<'_>;

    /// Enter a write section.
    ///
    /// Fails immediately if the caller already holds a read section.
    fn write_context(&self) -> Result<Self::WriteGuard<'_>>;

    /// Assert the caller holds a read or write section.
    fn require_context(&self) -> Result<LockContext> {
        self.current_context()
            .ok_or_else(|| StoreError::invalid_context("not in a read/write context"))
    }

    /// Assert the caller holds a read section.
    fn require_read_context(&self) -> Result<()> {
        match self.current_context() {
            Some(LockContext::Read) => Ok(()),
            _ => Err(StoreError::invalid_context("not in a read context")),
        }
    }

    /// Assert the caller holds a write section.
    fn require_write_context(&self) -> Result<()> {
        match self.current_context() {
            Some(LockContext::Write) => Ok(()),
            _ => Err(StoreError::invalid_context("not in a write context")),
        }
    }
}
