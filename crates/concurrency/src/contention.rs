//! Contention manager: priority and backoff for conflicting transactions
//!
//! Keeps one padded slot per worker plus a global logical clock.
//!
//! - [`start`](ContentionManager::start) resets the attempt's bookkeeping.
//!   A restart keeps its abort count so repeated collisions back off longer.
//! - [`on_write`](ContentionManager::on_write) counts writes. The write that
//!   reaches `ts_threshold` mints a priority timestamp from the clock, so
//!   transactions that have done real work win conflicts while small ones
//!   stay cheap to abort.
//! - [`on_rollback`](ContentionManager::on_rollback) bumps the abort count
//!   (saturating at `succ_aborts_max`) and busy-waits a random number of
//!   cycles below `abort_count * wait_cycles_multiplier`.
//!
//! Slots are only written by their owning thread (apart from
//! [`mark_aborted`](ContentionManager::mark_aborted)), so plain relaxed
//! atomics suffice. The clock is the only shared counter.

use crate::cache_aligned::CacheAligned;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use stmcore_core::{Backoff, ContentionConfig, SpinBackoff, ThreadId, TxnView};
use tracing::{debug, trace, warn};

/// Timestamp value meaning "no priority assigned"
pub const NO_TIMESTAMP: u64 = u64::MAX;

/// Per-worker bookkeeping
struct ContentionSlot {
    aborted: AtomicBool,
    timestamp: AtomicU64,
    write_set_size: AtomicU64,
    abort_count: AtomicU32,
    rng: Mutex<StdRng>,
}

impl ContentionSlot {
    fn new(seed: u64) -> Self {
        Self {
            aborted: AtomicBool::new(false),
            timestamp: AtomicU64::new(NO_TIMESTAMP),
            write_set_size: AtomicU64::new(0),
            abort_count: AtomicU32::new(0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

/// Priority and backoff arbitration across workers
pub struct ContentionManager<B: Backoff = SpinBackoff> {
    slots: Box<[CacheAligned<ContentionSlot>]>,
    clock: AtomicU64,
    config: ContentionConfig,
    backoff: B,
}

impl ContentionManager<SpinBackoff> {
    /// Manager for `max_threads` workers that waits with CPU pause hints
    pub fn new(max_threads: usize, config: ContentionConfig) -> Self {
        Self::with_backoff(max_threads, config, SpinBackoff)
    }
}

impl<B: Backoff> ContentionManager<B> {
    /// Manager that waits through `backoff`
    pub fn with_backoff(max_threads: usize, config: ContentionConfig, backoff: B) -> Self {
        let slots = (0..max_threads)
            .map(|i| CacheAligned::new(ContentionSlot::new(config.seed.wrapping_add(i as u64))))
            .collect();
        Self {
            slots,
            clock: AtomicU64::new(0),
            config,
            backoff,
        }
    }

    /// Reset bookkeeping at transaction begin.
    ///
    /// A restarted transaction keeps its abort count; a new one starts from zero.
    pub fn start<X: TxnView + ?Sized>(&self, tx: &X) {
        let slot = self.slot(tx.thread_id());
        slot.timestamp.store(NO_TIMESTAMP, Ordering::Relaxed);
        slot.aborted.store(false, Ordering::Relaxed);
        slot.write_set_size.store(0, Ordering::Relaxed);
        if !tx.is_restarted() {
            slot.abort_count.store(0, Ordering::Relaxed);
        }
    }

    /// Count one write; mint a priority timestamp on reaching the threshold
    pub fn on_write<X: TxnView + ?Sized>(&self, tx: &X) {
        let thread = tx.thread_id();
        let slot = self.slot(thread);
        let writes = slot.write_set_size.load(Ordering::Relaxed) + 1;
        slot.write_set_size.store(writes, Ordering::Relaxed);

        if writes == self.config.ts_threshold
            && slot.timestamp.load(Ordering::Relaxed) == NO_TIMESTAMP
        {
            let ts = self.clock.fetch_add(1, Ordering::AcqRel);
            slot.timestamp.store(ts, Ordering::Relaxed);
            trace!(thread = %thread, ts, writes, "priority timestamp assigned");
        }
    }

    /// Record an abort and wait a randomized, abort-scaled number of cycles.
    ///
    /// Returns the number of cycles waited.
    pub fn on_rollback<X: TxnView + ?Sized>(&self, tx: &X) -> u64 {
        let thread = tx.thread_id();
        let slot = self.slot(thread);

        let mut aborts = slot.abort_count.load(Ordering::Relaxed);
        if aborts < self.config.succ_aborts_max {
            aborts += 1;
            slot.abort_count.store(aborts, Ordering::Relaxed);
            if aborts == self.config.succ_aborts_max {
                warn!(thread = %thread, aborts, "abort count saturated");
            }
        }

        let bound = u64::from(aborts).saturating_mul(self.config.wait_cycles_multiplier);
        let cycles = if bound == 0 {
            0
        } else {
            slot.rng.lock().gen_range(0..bound)
        };
        debug!(thread = %thread, aborts, cycles, "rollback backoff");

        self.backoff.wait_cycles(cycles);
        cycles
    }

    /// Flag `thread`'s current attempt as doomed by a higher-priority rival
    pub fn mark_aborted(&self, thread: ThreadId) {
        self.slot(thread).aborted.store(true, Ordering::Release);
    }

    /// `thread`'s current attempt has been flagged
    pub fn is_aborted(&self, thread: ThreadId) -> bool {
        self.slot(thread).aborted.load(Ordering::Acquire)
    }

    /// `thread`'s priority timestamp, if one was assigned this attempt
    pub fn priority(&self, thread: ThreadId) -> Option<u64> {
        match self.slot(thread).timestamp.load(Ordering::Relaxed) {
            NO_TIMESTAMP => None,
            ts => Some(ts),
        }
    }

    /// Whether `me` should win a conflict with `rival`.
    ///
    /// Older timestamps win; a timestamped attempt beats one without;
    /// between two without, neither wins and both back off.
    pub fn wins_against(&self, me: ThreadId, rival: ThreadId) -> bool {
        match (self.priority(me), self.priority(rival)) {
            (Some(mine), Some(theirs)) => mine < theirs,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Aborts recorded since the last fresh start
    pub fn abort_count(&self, thread: ThreadId) -> u32 {
        self.slot(thread).abort_count.load(Ordering::Relaxed)
    }

    /// Writes recorded this attempt
    pub fn write_set_size(&self, thread: ThreadId) -> u64 {
        self.slot(thread).write_set_size.load(Ordering::Relaxed)
    }

    /// Next value the clock will hand out
    pub fn clock(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }

    /// Tuning in effect
    pub fn config(&self) -> &ContentionConfig {
        &self.config
    }

    /// Slot for `thread`. Ids beyond the table are a caller bug and panic.
    fn slot(&self, thread: ThreadId) -> &ContentionSlot {
        &self.slots[thread.index()]
    }
}

impl<B: Backoff> fmt::Debug for ContentionManager<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentionManager")
            .field("threads", &self.slots.len())
            .field("clock", &self.clock())
            .field("config", &self.config)
            .finish()
    }
}
