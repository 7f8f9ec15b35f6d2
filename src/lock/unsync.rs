//! Non-thread-safe context lock.

use crate::error::{Result, StoreError};
use std::cell::Cell;

use super::{ContextLock, LockContext, LockKind};

/// Context lock for single-threaded use. Never blocks.
#[derive(Debug, Default)]
pub struct UnsyncLock {
    reading: Cell<bool>,
    writing: Cell<bool>,
}

impl UnsyncLock {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Read section of an [`UnsyncLock`].
#[must_use = "the read section ends when the guard is dropped"]
pub struct UnsyncReadGuard<'a> {
    lock: &'a UnsyncLock,
    previous: bool,
}

impl Drop for UnsyncReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.reading.set(self.previous);
    }
}

/// Write section of an [`UnsyncLock`].
#[must_use = "the write section ends when the guard is dropped"]
pub struct UnsyncWriteGuard<'a> {
    lock: &'a UnsyncLock,
    previous: bool,
}

impl Drop for UnsyncWriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.writing.set(self.previous);
    }
}

impl ContextLock for UnsyncLock {
    type ReadGuard<'a> = UnsyncReadGuard<'a>;
    type WriteGuard<'a> = UnsyncWriteGuard<'a>;

    fn kind(&self) -> LockKind {
        LockKind::Unsync
    }

    fn current_context(&self) -> Option<LockContext> {
        if self.reading.get() {
            Some(LockContext::Read)
        } else if self.writing.get() {
            Some(LockContext::Write)
        } else {
            None
        }
    }

    fn read_context(&self) -> UnsyncReadGuard<'_> {
        let previous = self.reading.replace(true);
        UnsyncReadGuard {
            lock: self,
            previous,
        }
    }

    fn write_context(&self) -> Result<UnsyncWriteGuard<'_>> {
        if self.reading.get() {
            return Err(StoreError::invalid_context("can't write while reading"));
        }
        let previous = self.writing.replace(true);
        Ok(UnsyncWriteGuard {
            lock: self,
            previous,
        })
    }
}
