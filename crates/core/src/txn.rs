//! Boundary to the transaction engine
//!
//! The engine owns transactions and their read/write sets. The lock layer
//! only needs a narrow view of each: who is running it, whether it is a
//! restart, and where its commit timestamp lives ([`TxnView`]); plus the
//! per-object record a transaction keeps for each object it touches
//! ([`TransItem`]).

use crate::types::ThreadId;
use crate::word::Word;

/// What the lock layer and contention manager need from a transaction
pub trait TxnView {
    /// Worker running the transaction
    fn thread_id(&self) -> ThreadId;

    /// True when this attempt retries an aborted attempt of the same transaction
    fn is_restarted(&self) -> bool;

    /// Commit timestamp assigned to this attempt
    fn commit_tid(&self) -> u64;

    /// Mutable slot holding the commit timestamp
    fn commit_tid_slot(&mut self) -> &mut u64;
}

/// Minimal concrete [`TxnView`]
///
/// Carries identity and commit timestamp only. Drivers that do not need a
/// full engine (tests, benchmarks) use it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnDescriptor {
    thread_id: ThreadId,
    restarted: bool,
    commit_tid: u64,
}

impl TxnDescriptor {
    /// A fresh (non-restarted) attempt on `thread_id`
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            restarted: false,
            commit_tid: 0,
        }
    }

    /// Mark the next attempt as a restart of this one
    pub fn restart(&mut self) {
        self.restarted = true;
        self.commit_tid = 0;
    }

    /// Begin an unrelated transaction on the same thread
    pub fn renew(&mut self) {
        self.restarted = false;
        self.commit_tid = 0;
    }
}

impl TxnView for TxnDescriptor {
    fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    fn is_restarted(&self) -> bool {
        self.restarted
    }

    fn commit_tid(&self) -> u64 {
        self.commit_tid
    }

    fn commit_tid_slot(&mut self) -> &mut u64 {
        &mut self.commit_tid
    }
}

const READ: u8 = 1 << 0;
const WRITE: u8 = 1 << 1;
const NEEDS_UNLOCK: u8 = 1 << 2;

/// A transaction's record of one object
///
/// Tracks the kind of access (read, write or both), whether a lock is still
/// held on the object, the word observed at read time, and an optional
/// pending write value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransItem<T = ()> {
    flags: u8,
    read_word: Word,
    write_value: Option<T>,
}

impl<T> Default for TransItem<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TransItem<T> {
    /// Empty record
    pub const fn new() -> Self {
        Self {
            flags: 0,
            read_word: Word::from_raw(0),
            write_value: None,
        }
    }

    /// A read was recorded
    #[inline]
    pub fn has_read(&self) -> bool {
        self.flags & READ != 0
    }

    /// A write was recorded
    #[inline]
    pub fn has_write(&self) -> bool {
        self.flags & WRITE != 0
    }

    /// A lock on the object must be released at commit end
    #[inline]
    pub fn needs_unlock(&self) -> bool {
        self.flags & NEEDS_UNLOCK != 0
    }

    /// Word observed by the first recorded read
    #[inline]
    pub fn read_word(&self) -> Word {
        self.read_word
    }

    /// Pending write value, if one was stored
    pub fn write_value(&self) -> Option<&T> {
        self.write_value.as_ref()
    }

    /// Take the pending write value for publication
    pub fn take_write_value(&mut self) -> Option<T> {
        self.write_value.take()
    }

    /// Record a read of `observed`. Only the first read's snapshot is kept.
    pub fn add_read(&mut self, observed: Word) {
        if !self.has_read() {
            self.read_word = observed;
            self.flags |= READ;
        }
    }

    /// Record a write
    pub fn add_write(&mut self) {
        self.flags |= WRITE;
    }

    /// Store the value to publish at commit
    pub fn set_write_value(&mut self, value: T) {
        self.write_value = Some(value);
    }

    /// Set or clear the needs-unlock mark
    pub fn set_needs_unlock(&mut self, needs_unlock: bool) {
        if needs_unlock {
            self.flags |= NEEDS_UNLOCK;
        } else {
            self.flags &= !NEEDS_UNLOCK;
        }
    }

    /// Forget everything (abort path)
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
