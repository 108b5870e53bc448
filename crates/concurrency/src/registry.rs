//! Worker registration
//!
//! A [`ThreadRegistry`] owns a fixed table of worker slots. Each OS thread
//! that runs transactions claims one with [`ThreadRegistry::register`] and
//! gets back a [`Worker`]: its [`ThreadId`], the registry's [`Backoff`] for
//! lock retry loops, and a private pseudo-random generator used by the
//! adaptive lock hint. Dropping the worker returns the slot.

use crate::cache_aligned::CacheAligned;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use stmcore_core::{Backoff, Error, Result, SpinBackoff, StmConfig, ThreadId};
use tracing::{debug, warn};

/// Mixing constant for deriving per-slot seeds (golden ratio)
const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

struct WorkerSlot {
    claimed: AtomicBool,
    /// Only the owning worker locks this, so it is never contended
    rng: Mutex<StdRng>,
}

/// Fixed-size table of worker slots
pub struct ThreadRegistry {
    slots: Box<[CacheAligned<WorkerSlot>]>,
    spin_limit: u32,
    unlock_opt_chance: u8,
    backoff: Box<dyn Backoff + Send + Sync>,
}

impl ThreadRegistry {
    /// Build a registry sized and seeded from `config` whose workers relax
    /// with CPU pause hints
    pub fn new(config: &StmConfig) -> Result<Self> {
        Self::with_backoff(config, SpinBackoff)
    }

    /// Build a registry whose workers relax through `backoff` in every lock
    /// retry loop
    pub fn with_backoff<B>(config: &StmConfig, backoff: B) -> Result<Self>
    where
        B: Backoff + Send + Sync + 'static,
    {
        config.validate()?;
        let slots = (0..config.max_threads)
            .map(|i| {
                let seed = config.contention.seed ^ (i as u64 + 1).wrapping_mul(SEED_MIX);
                CacheAligned::new(WorkerSlot {
                    claimed: AtomicBool::new(false),
                    rng: Mutex::new(StdRng::seed_from_u64(seed)),
                })
            })
            .collect();
        Ok(Self {
            slots,
            spin_limit: config.spin_limit,
            unlock_opt_chance: config.unlock_opt_chance,
            backoff: Box::new(backoff),
        })
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of claimed slots
    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.claimed.load(Ordering::Acquire))
            .count()
    }

    /// Claim the lowest free slot
    pub fn register(&self) -> Result<Worker<'_>> {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot
                .claimed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let id = ThreadId::new(index)?;
                debug!(thread = %id, "worker registered");
                return Ok(Worker { id, registry: self });
            }
        }
        warn!(capacity = self.capacity(), "thread registry exhausted");
        Err(Error::RegistryFull {
            capacity: self.capacity(),
        })
    }

    /// Claim a specific slot
    pub fn register_as(&self, id: ThreadId) -> Result<Worker<'_>> {
        let slot = self.slots.get(id.index()).ok_or(Error::ThreadIdOutOfRange {
            id: id.index(),
            max: self.capacity(),
        })?;
        slot.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::SlotClaimed(id.index()))?;
        debug!(thread = %id, "worker registered");
        Ok(Worker { id, registry: self })
    }

    fn release(&self, id: ThreadId) {
        self.slots[id.index()].claimed.store(false, Ordering::Release);
        debug!(thread = %id, "worker released");
    }
}

impl fmt::Debug for ThreadRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadRegistry")
            .field("capacity", &self.capacity())
            .field("active", &self.active_count())
            .field("spin_limit", &self.spin_limit)
            .field("unlock_opt_chance", &self.unlock_opt_chance)
            .finish()
    }
}

/// A registered worker thread
///
/// Lock operations that need the caller's identity or its generator take a
/// `&Worker`. The slot is released on drop.
pub struct Worker<'r> {
    id: ThreadId,
    registry: &'r ThreadRegistry,
}

impl Worker<'_> {
    /// This worker's id
    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Attempts made by bounded-spin lock helpers
    #[inline]
    pub fn spin_limit(&self) -> u32 {
        self.registry.spin_limit
    }

    /// Percent chance an adaptive unlock sets the optimistic hint
    #[inline]
    pub fn unlock_opt_chance(&self) -> u8 {
        self.registry.unlock_opt_chance
    }

    /// Relaxation used between lock attempts
    #[inline]
    pub fn backoff(&self) -> &(dyn Backoff + Send + Sync) {
        &*self.registry.backoff
    }

    /// True with probability `percent`/100
    pub fn chance(&self, percent: u8) -> bool {
        match percent {
            0 => false,
            p if p >= 100 => true,
            p => self.rng().gen_range(0..100u8) < p,
        }
    }

    fn rng(&self) -> parking_lot::MutexGuard<'_, StdRng> {
        self.registry.slots[self.id.index()].rng.lock()
    }
}

impl Drop for Worker<'_> {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

impl fmt::Debug for Worker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").field("id", &self.id).finish()
    }
}
