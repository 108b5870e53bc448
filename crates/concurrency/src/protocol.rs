//! The interface the commit engine drives
//!
//! Both lock variants implement [`CommitProtocol`], so the engine can run the
//! same lock → validate → publish → unlock sequence regardless of whether an
//! object is protected pessimistically or optimistically.

use crate::registry::Worker;
use stmcore_core::{ThreadId, TransItem, TxnView};

/// Per-object hooks used during execution and commit
pub trait CommitProtocol {
    /// Take whatever lock commit requires. `false` means abort.
    fn try_lock_for_commit(&self, thread: ThreadId) -> bool;

    /// Commit-time lock step for a written `item`.
    ///
    /// Variants that lock eagerly on write have nothing left to do when the
    /// item already holds its lock; the rest defer to
    /// [`try_lock_for_commit`](Self::try_lock_for_commit).
    fn lock_for_commit<T>(&self, _item: &mut TransItem<T>, worker: &Worker<'_>) -> bool {
        self.try_lock_for_commit(worker.id())
    }

    /// Release the lock recorded in `item`.
    ///
    /// Called after commit and on abort alike; an aborted write is never
    /// published.
    fn unlock_after_commit<T>(&self, item: &mut TransItem<T>, worker: &Worker<'_>);

    /// Gain write ownership and record the write in `item`
    fn acquire_write<T>(&self, item: &mut TransItem<T>, worker: &Worker<'_>) -> bool;

    /// [`acquire_write`](Self::acquire_write), then store `data` as the pending value
    fn acquire_write_with<T>(&self, item: &mut TransItem<T>, worker: &Worker<'_>, data: T) -> bool {
        if self.acquire_write(item, worker) {
            item.set_write_value(data);
            true
        } else {
            false
        }
    }

    /// Observe the object for reading.
    ///
    /// With `add_read` the observed word is recorded in `item` for
    /// commit-time validation; without it the call only reports whether a
    /// read would currently succeed. Never blocks indefinitely.
    fn observe_read<T>(&self, item: &mut TransItem<T>, worker: &Worker<'_>, add_read: bool) -> bool;

    /// Commit-time revalidation of a recorded read
    fn check_version<T>(&self, item: &TransItem<T>, worker: &Worker<'_>) -> bool;

    /// The transaction's commit-timestamp slot
    fn cp_access_tid<X: TxnView>(txn: &mut X) -> &mut u64 {
        txn.commit_tid_slot()
    }

    /// The transaction's commit timestamp as this variant would store it in a word
    fn cp_commit_tid<X: TxnView>(&self, txn: &X) -> u64;
}
