//! Pessimistic reader/writer lock on a version word
//!
//! [`LockVersion`] blocks conflicting access before it happens:
//!
//! ```text
//! Unlocked ──try_lock_read──▶ ReadLocked(n) ──unlock_read (n = 1)──▶ Unlocked
//! Unlocked ──try_lock_write─▶ WriteLocked   ──unlock_write─────────▶ Unlocked (version + 1)
//! ```
//!
//! Read- and write-locked are mutually exclusive. The reader count lives in
//! the word's low field and is capped at [`MAX_READERS`]; past the cap a
//! reader is told to fall back to version validation ([`LockResponse::Optimistic`]).
//!
//! With the [`Adaptive`] policy, unlocks occasionally set an optimistic hint
//! so later readers can skip the read lock and validate by version instead.

use crate::protocol::CommitProtocol;
use crate::registry::Worker;
use crate::response::LockResponse;
use std::fmt;
use std::marker::PhantomData;
use stmcore_core::word::{LOCK_BIT, OPT_BIT};
use stmcore_core::{
    Backoff, SpinBackoff, Step, ThreadId, TransItem, TxnView, VersionWord, Word, MAX_READERS,
};

/// Hint behaviour of a [`LockVersion`]
pub trait HintPolicy: Send + Sync + 'static {
    /// Unlocks may set, and write locks clear, the optimistic hint
    const ADAPTIVE: bool;
}

/// Never touch the hint bit
#[derive(Debug, Clone, Copy, Default)]
pub struct Plain;

impl HintPolicy for Plain {
    const ADAPTIVE: bool = false;
}

/// Set the hint on unlock with the worker's configured chance
#[derive(Debug, Clone, Copy, Default)]
pub struct Adaptive;

impl HintPolicy for Adaptive {
    const ADAPTIVE: bool = true;
}

/// Reader/writer lock over one [`VersionWord`]
pub struct LockVersion<P: HintPolicy = Plain> {
    word: VersionWord,
    _policy: PhantomData<P>,
}

impl<P: HintPolicy> LockVersion<P> {
    /// Unlocked at version zero
    pub const fn new() -> Self {
        Self::with_version(0)
    }

    /// Unlocked at `version`
    pub const fn with_version(version: u64) -> Self {
        Self {
            word: VersionWord::new(Word::with_version(version)),
            _policy: PhantomData,
        }
    }

    /// Current word
    #[inline]
    pub fn load(&self) -> Word {
        self.word.load()
    }

    /// Write lock is held
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.load().is_locked()
    }

    /// Current reader count
    #[inline]
    pub fn reader_count(&self) -> u64 {
        self.load().reader_count()
    }

    /// Optimistic hint is set
    #[inline]
    pub fn hint_optimistic(&self) -> bool {
        self.load().hint_optimistic()
    }

    /// One read-lock attempt.
    ///
    /// Returns the response with the word it was decided on: `Spin` while
    /// write-locked, `Optimistic` when the reader table is full (the word is
    /// the snapshot to validate against later), `Locked` otherwise.
    pub fn try_lock_read(&self) -> (LockResponse, Word) {
        self.try_lock_read_using(&SpinBackoff)
    }

    /// [`try_lock_read`](Self::try_lock_read), relaxing through `backoff`
    /// after a lost CAS
    pub fn try_lock_read_using<B: Backoff + ?Sized>(&self, backoff: &B) -> (LockResponse, Word) {
        let attempt = self.word.transition(backoff, |w| {
            if w.is_locked() {
                return Step::Bail((LockResponse::Spin, w));
            }
            let readers = w.reader_count();
            if readers >= MAX_READERS {
                return Step::Bail((LockResponse::Optimistic, w));
            }
            Step::Store(w.with_readers(readers + 1))
        });
        match attempt {
            Ok(w) => (LockResponse::Locked, w),
            Err(bail) => bail,
        }
    }

    /// One write-lock attempt. `Spin` if a writer or any reader is present.
    pub fn try_lock_write(&self) -> LockResponse {
        self.try_lock_write_using(&SpinBackoff)
    }

    /// [`try_lock_write`](Self::try_lock_write), relaxing through `backoff`
    /// after a lost CAS
    pub fn try_lock_write_using<B: Backoff + ?Sized>(&self, backoff: &B) -> LockResponse {
        let attempt = self.word.transition(backoff, |w| {
            if w.is_locked() || w.reader_count() != 0 {
                return Step::Bail(LockResponse::Spin);
            }
            Step::Store(Self::locked(w))
        });
        match attempt {
            Ok(_) => LockResponse::Locked,
            Err(response) => response,
        }
    }

    /// Convert the caller's read lock into the write lock in one CAS.
    ///
    /// Succeeds only when the caller is the sole reader. Reserved: the commit
    /// path never calls it; [`acquire_write`](CommitProtocol::acquire_write)
    /// uses it for read-then-write items.
    ///
    /// # Panics
    ///
    /// If the caller does not hold a read lock.
    pub fn try_upgrade(&self) -> LockResponse {
        let w = self.load();
        assert!(!w.is_locked(), "upgrade while write-locked: {}", w);
        assert!(w.reader_count() >= 1, "upgrade without a read lock: {}", w);
        if w.reader_count() == 1
            && self
                .word
                .compare_exchange(w, Self::locked(w.with_readers(0)))
                .is_ok()
        {
            LockResponse::Locked
        } else {
            LockResponse::Spin
        }
    }

    /// Release one read lock
    ///
    /// # Panics
    ///
    /// If no reader is registered.
    pub fn unlock_read(&self, worker: &Worker<'_>) {
        if !P::ADAPTIVE {
            let prev = self.word.fetch_sub(1);
            assert!(prev.reader_count() >= 1, "unlock_read without readers: {}", prev);
            return;
        }
        let hint = worker.chance(worker.unlock_opt_chance());
        let _ = self.word.transition(worker.backoff(), |w| {
            assert!(w.reader_count() >= 1, "unlock_read without readers: {}", w);
            let released = w.with_readers(w.reader_count() - 1);
            Step::<()>::Store(if hint {
                released.with_flags(OPT_BIT)
            } else {
                released
            })
        });
    }

    /// Release the write lock, advancing the version.
    ///
    /// The release store publishes every write made while the lock was held.
    ///
    /// # Panics
    ///
    /// If the write lock is not held.
    pub fn unlock_write(&self, worker: &Worker<'_>) {
        let w = self.load();
        assert!(w.is_locked(), "unlock_write while unlocked: {}", w);
        let released = w.without_flags(LOCK_BIT).bumped();
        let released = if P::ADAPTIVE && worker.chance(worker.unlock_opt_chance()) {
            released.with_flags(OPT_BIT)
        } else {
            released
        };
        self.word.store_release(released);
    }

    /// Retry [`try_lock_read`](Self::try_lock_read) while it answers `Spin`,
    /// at most `limit` times
    pub fn try_lock_read_with_spin<B: Backoff + ?Sized>(
        &self,
        limit: u32,
        backoff: &B,
    ) -> (LockResponse, Word) {
        let mut last = (LockResponse::Spin, self.load());
        for _ in 0..limit {
            last = self.try_lock_read_using(backoff);
            if last.0 != LockResponse::Spin {
                break;
            }
            backoff.relax();
        }
        last
    }

    /// Retry [`try_lock_write`](Self::try_lock_write) at most `limit` times
    pub fn try_lock_write_with_spin<B: Backoff + ?Sized>(&self, limit: u32, backoff: &B) -> bool {
        for _ in 0..limit {
            if self.try_lock_write_using(backoff).is_locked() {
                return true;
            }
            backoff.relax();
        }
        false
    }

    /// Retry [`try_upgrade`](Self::try_upgrade) at most `limit` times
    pub fn try_upgrade_with_spin<B: Backoff + ?Sized>(&self, limit: u32, backoff: &B) -> bool {
        for _ in 0..limit {
            if self.try_upgrade().is_locked() {
                return true;
            }
            backoff.relax();
        }
        false
    }

    fn locked(w: Word) -> Word {
        if P::ADAPTIVE {
            w.with_lock_bit().without_flags(OPT_BIT)
        } else {
            w.with_lock_bit()
        }
    }
}

impl<P: HintPolicy> Default for LockVersion<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: HintPolicy> fmt::Debug for LockVersion<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockVersion")
            .field("word", &self.load())
            .field("adaptive", &P::ADAPTIVE)
            .finish()
    }
}

impl<P: HintPolicy> CommitProtocol for LockVersion<P> {
    fn try_lock_for_commit(&self, _thread: ThreadId) -> bool {
        self.try_lock_write().is_locked()
    }

    fn lock_for_commit<T>(&self, item: &mut TransItem<T>, worker: &Worker<'_>) -> bool {
        (item.has_write() && item.needs_unlock()) || self.acquire_write(item, worker)
    }

    fn unlock_after_commit<T>(&self, item: &mut TransItem<T>, worker: &Worker<'_>) {
        assert!(item.needs_unlock(), "unlock of an item that holds no lock");
        if item.has_write() {
            self.unlock_write(worker);
        } else {
            assert!(item.has_read(), "locked item recorded neither read nor write");
            self.unlock_read(worker);
        }
        item.set_needs_unlock(false);
    }

    fn acquire_write<T>(&self, item: &mut TransItem<T>, worker: &Worker<'_>) -> bool {
        if item.has_write() {
            return true;
        }
        let locked = if item.needs_unlock() {
            self.try_upgrade_with_spin(worker.spin_limit(), worker.backoff())
        } else {
            self.try_lock_write_with_spin(worker.spin_limit(), worker.backoff())
        };
        if locked {
            item.add_write();
            item.set_needs_unlock(true);
        }
        locked
    }

    fn observe_read<T>(&self, item: &mut TransItem<T>, worker: &Worker<'_>, add_read: bool) -> bool {
        if item.has_write() || item.needs_unlock() {
            return true;
        }
        if !add_read {
            return !self.is_locked();
        }
        if P::ADAPTIVE {
            let w = self.load();
            if w.hint_optimistic() && !w.is_locked() {
                item.add_read(w);
                return true;
            }
        }
        match self.try_lock_read_with_spin(worker.spin_limit(), worker.backoff()) {
            (LockResponse::Locked, w) => {
                item.add_read(w);
                item.set_needs_unlock(true);
                true
            }
            (LockResponse::Optimistic, w) => {
                item.add_read(w);
                true
            }
            (LockResponse::Spin | LockResponse::Failed, _) => false,
        }
    }

    fn check_version<T>(&self, item: &TransItem<T>, _worker: &Worker<'_>) -> bool {
        if !item.has_read() {
            return true;
        }
        // A held lock pins the version, so only reads taken without one can
        // have gone stale; those are caught by the version compare.
        let current = self.load();
        (item.needs_unlock() || !current.is_locked()) && current.same_version(item.read_word())
    }

    fn cp_commit_tid<X: TxnView>(&self, txn: &X) -> u64 {
        Word::with_version(txn.commit_tid()).raw()
    }
}
