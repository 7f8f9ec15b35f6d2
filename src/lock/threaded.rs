//! Thread-safe context lock: many readers or one writer.

use crate::error::{Result, StoreError};
use parking_lot::{Condvar, Mutex};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use super::{ContextLock, LockContext, LockKind};

#[derive(Debug, Default)]
struct LockState {
    /// Read sections held, per thread.
    readers: HashMap<ThreadId, usize>,
    /// Thread holding the write section.
    writer: Option<ThreadId>,
    /// Nesting depth of the writer's sections.
    write_depth: usize,
}

impl LockState {
    fn blocks_reader(&self, thread: ThreadId) -> bool {
        self.writer.map_or(false, |writer| writer != thread)
    }

    fn admits_writer(&self, thread: ThreadId) -> bool {
        self.readers.is_empty() && self.writer.map_or(true, |writer| writer == thread)
    }
}

/// Context lock shared across threads.
///
/// Readers on different threads proceed concurrently. A writer waits until
/// no reader is active and then excludes readers and writers on all other
/// threads. The writer's own thread may nest read and write sections inside
/// its write section. Waiters are not ordered.
#[derive(Debug, Default)]
pub struct ThreadedLock {
    state: Mutex<LockState>,
    changed: Condvar,
}

impl ThreadedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads currently holding a read section.
    pub fn reader_threads(&self) -> usize {
        self.state.lock().readers.len()
    }

    /// Whether any thread currently holds the write section.
    pub fn is_writing(&self) -> bool {
        self.state.lock().writer.is_some()
    }
}

/// Read section of a [`ThreadedLock`].
///
/// Sections belong to the thread that opened them, so guards cannot be sent
/// to another thread:
///
/// ```compile_fail
/// use weakstore::{ContextLock, ThreadedLock};
///
/// fn assert_send<S: Send>(_: S) {}
///
/// let lock = ThreadedLock::new();
/// assert_send(lock.read_context());
/// ```
#[must_use = "the read section ends when the guard is dropped"]
pub struct ThreadedReadGuard<'a> {
    lock: &'a ThreadedLock,
    thread: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ThreadedReadGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock();
        if let Entry::Occupied(mut count) = state.readers.entry(self.thread) {
            *count.get_mut() -= 1;
            if *count.get() == 0 {
                count.remove();
            }
        }
        if state.readers.is_empty() {
            self.lock.changed.notify_all();
        }
    }
}

/// Write section of a [`ThreadedLock`]. Like [`ThreadedReadGuard`], it
/// stays on the thread that opened it:
///
/// ```compile_fail
/// use weakstore::{ContextLock, ThreadedLock};
///
/// fn assert_send<S: Send>(_: S) {}
///
/// let lock = ThreadedLock::new();
/// assert_send(lock.write_context().unwrap());
/// ```
#[must_use = "the write section ends when the guard is dropped"]
pub struct ThreadedWriteGuard<'a> {
    lock: &'a ThreadedLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ThreadedWriteGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock();
        state.write_depth -= 1;
        if state.write_depth == 0 {
            state.writer = None;
            self.lock.changed.notify_all();
        }
    }
}

impl ContextLock for ThreadedLock {
    type ReadGuard<'a> = ThreadedReadGuard<'a>;
    type WriteGuard<'a> = ThreadedWriteGuard<'a>;

    fn kind(&self) -> LockKind {
        LockKind::Threaded
    }

    fn current_context(&self) -> Option<LockContext> {
        let thread = thread::current().id();
        let state = self.state.lock();
        if state.readers.contains_key(&thread) {
            Some(LockContext::Read)
        } else if state.writer == Some(thread) {
            Some(LockContext::Write)
        } else {
            None
        }
    }

    fn read_context(&self) -> ThreadedReadGuard<'_> {
        let thread = thread::current().id();
        let mut state = self.state.lock();
        while state.blocks_reader(thread) {
            self.changed.wait(&mut state);
        }
        *state.readers.entry(thread).or_insert(0) += 1;
        ThreadedReadGuard {
            lock: self,
            thread,
            _not_send: PhantomData,
        }
    }

    fn write_context(&self) -> Result<ThreadedWriteGuard<'_>> {
        let thread = thread::current().id();
        let mut state = self.state.lock();
        let mut waited = false;
        loop {
            if state.readers.contains_key(&thread) {
                tracing::debug!(?thread, "rejected write while reading");
                return Err(StoreError::invalid_context("can't write while reading"));
            }
            if state.admits_writer(thread) {
                break;
            }
            if !waited {
                tracing::trace!(
                    ?thread,
                    readers = state.readers.len(),
                    "writer waiting"
                );
                waited = true;
            }
            self.changed.wait(&mut state);
        }
        state.writer = Some(thread);
        state.write_depth += 1;
        Ok(ThreadedWriteGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }
}
