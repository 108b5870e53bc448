//! Optimistic lock-at-commit version word
//!
//! [`SwissVersion`] lets readers run without locking. A writer claims the
//! word with a single CAS that sets the lock bit and its thread id; readers
//! snapshot the version and revalidate at commit.
//!
//! ```text
//! Unlocked(v) ──acquire_write──▶ Locked(owner, v)
//!             ──try_lock_for_commit──▶ CommitPending(owner, v, dirty)
//!             ──unlock_after_commit──▶ Unlocked(v + 1)
//!
//! Locked(owner, v) ──unlock_after_commit (abort)──▶ Unlocked(v)
//! ```
//!
//! The dirty bit tells concurrent readers that new data is being published.
//! Unlock only advances the version when the dirty bit was set, so an aborted
//! writer leaves no trace.
//!
//! Under the [`Opaque`] policy every word carries the opacity marker and
//! readers refuse any word locked by another thread; non-opaque readers only
//! refuse words whose commit is in progress and catch the rest at
//! [`check_version`](CommitProtocol::check_version).

use crate::protocol::CommitProtocol;
use crate::registry::Worker;
use std::fmt;
use std::marker::PhantomData;
use stmcore_core::word::{DIRTY_BIT, OPACITY_BIT};
use stmcore_core::{Backoff, SpinBackoff, Step, ThreadId, TransItem, TxnView, VersionWord, Word};

/// Read discipline of a [`SwissVersion`]
pub trait OpacityPolicy: Send + Sync + 'static {
    /// Words carry the opacity marker
    const OPAQUE: bool;
}

/// Always-consistent reads
#[derive(Debug, Clone, Copy, Default)]
pub struct Opaque;

impl OpacityPolicy for Opaque {
    const OPAQUE: bool = true;
}

/// Reads validated at commit only
#[derive(Debug, Clone, Copy, Default)]
pub struct NonOpaque;

impl OpacityPolicy for NonOpaque {
    const OPAQUE: bool = false;
}

/// Optimistic version word for one transactional object
pub struct SwissVersion<O: OpacityPolicy = NonOpaque> {
    word: VersionWord,
    _policy: PhantomData<O>,
}

impl<O: OpacityPolicy> SwissVersion<O> {
    /// Unlocked at version zero
    pub const fn new() -> Self {
        Self::with_version(0)
    }

    /// Unlocked at `version`
    pub const fn with_version(version: u64) -> Self {
        Self {
            word: VersionWord::new(Self::marked(Word::with_version(version))),
            _policy: PhantomData,
        }
    }

    /// A freshly inserted object, locked by its creator.
    ///
    /// Other transactions cannot validate a read of it until the creator
    /// commits and unlocks.
    pub fn new_inserted(creator: ThreadId) -> Self {
        Self {
            word: VersionWord::new(Self::marked(Word::default()).with_owner_lock(creator)),
            _policy: PhantomData,
        }
    }

    /// Current word
    #[inline]
    pub fn load(&self) -> Word {
        self.word.load()
    }

    /// A writer holds the word
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.load().is_locked()
    }

    /// `thread` holds the word
    #[inline]
    pub fn is_locked_by(&self, thread: ThreadId) -> bool {
        self.load().is_locked_by(thread)
    }

    /// A commit is publishing new data
    #[inline]
    pub fn is_commit_pending(&self) -> bool {
        self.load().is_dirty()
    }

    /// Current version number
    #[inline]
    pub fn version(&self) -> u64 {
        self.load().version()
    }

    /// Single-owner lock attempt for `thread`.
    ///
    /// Retries only when the word changed under a lost CAS; an existing
    /// foreign owner fails immediately. Re-locking by the owner succeeds.
    pub fn try_lock(&self, thread: ThreadId) -> bool {
        self.try_lock_using(thread, &SpinBackoff)
    }

    /// [`try_lock`](Self::try_lock), relaxing through `backoff` after a lost CAS
    pub fn try_lock_using<B: Backoff + ?Sized>(&self, thread: ThreadId, backoff: &B) -> bool {
        let attempt = self.word.transition(backoff, |w| {
            if w.is_locked_by(thread) {
                return Step::Bail(true);
            }
            if w.is_locked() {
                return Step::Bail(false);
            }
            Step::Store(w.with_owner_lock(thread))
        });
        attempt.map_or_else(|owned| owned, |_| true)
    }

    /// Release `thread`'s lock, publishing a new version if the commit bit is set.
    ///
    /// Returns `false` without touching the word if `thread` is not the owner.
    pub fn unlock(&self, thread: ThreadId) -> bool {
        let w = self.load();
        if !w.is_locked_by(thread) {
            return false;
        }
        let released = if w.is_dirty() {
            w.without_lock().bumped()
        } else {
            w.without_lock()
        };
        self.word.store_release(released);
        true
    }

    const fn marked(w: Word) -> Word {
        if O::OPAQUE {
            w.with_flags(OPACITY_BIT)
        } else {
            w
        }
    }
}

impl<O: OpacityPolicy> Default for SwissVersion<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: OpacityPolicy> fmt::Debug for SwissVersion<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwissVersion")
            .field("word", &self.load())
            .field("opaque", &O::OPAQUE)
            .finish()
    }
}

impl<O: OpacityPolicy> CommitProtocol for SwissVersion<O> {
    /// Mark the commit as in progress.
    ///
    /// # Panics
    ///
    /// If `thread` did not acquire the word with `acquire_write` first.
    fn try_lock_for_commit(&self, thread: ThreadId) -> bool {
        let w = self.load();
        assert!(w.is_locked_by(thread), "commit lock by non-owner {}: {}", thread, w);
        self.word.fetch_or(DIRTY_BIT);
        true
    }

    fn unlock_after_commit<T>(&self, item: &mut TransItem<T>, worker: &Worker<'_>) {
        assert!(item.needs_unlock(), "unlock of an item that holds no lock");
        self.unlock(worker.id());
        item.set_needs_unlock(false);
    }

    fn acquire_write<T>(&self, item: &mut TransItem<T>, worker: &Worker<'_>) -> bool {
        if item.has_write() {
            debug_assert!(self.is_locked_by(worker.id()));
            return true;
        }
        if !self.try_lock_using(worker.id(), worker.backoff()) {
            return false;
        }
        item.add_write();
        item.set_needs_unlock(true);
        true
    }

    fn observe_read<T>(&self, item: &mut TransItem<T>, worker: &Worker<'_>, add_read: bool) -> bool {
        let w = self.load();
        if w.is_locked_elsewhere(worker.id()) && (w.is_dirty() || w.is_opaque()) {
            return false;
        }
        if add_read {
            item.add_read(w);
        }
        true
    }

    fn check_version<T>(&self, item: &TransItem<T>, worker: &Worker<'_>) -> bool {
        let current = self.load();
        current.same_version(item.read_word()) && !current.is_locked_elsewhere(worker.id())
    }

    fn cp_commit_tid<X: TxnView>(&self, txn: &X) -> u64 {
        Self::marked(Word::with_version(txn.commit_tid())).raw()
    }
}
