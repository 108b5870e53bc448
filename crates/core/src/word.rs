//! Version word: the atomic, bit-packed state of one transactional object
//!
//! Every lock variant stores exactly one [`VersionWord`]. Its value is a
//! 64-bit integer split into disjoint fields:
//!
//! ```text
//!  63                                  12  11   10   9    8    7        0
//! +--------------------------------------+----+----+----+----+----------+
//! |         sequence / version           | OP | HI | DY | LK |  owner / |
//! |              (52 bits)               |    |    |    |    |  readers |
//! +--------------------------------------+----+----+----+----+----------+
//!
//! LK  lock bit            writer holds the object
//! DY  dirty bit           commit in progress (optimistic variant)
//! HI  optimistic hint     recently unlocked cleanly (adaptive pessimistic variant)
//! OP  opacity marker      readers must validate fully (opaque optimistic variant)
//! ```
//!
//! The low byte is shared: the optimistic variant stores the owner's
//! [`ThreadId`] there while the lock bit is set, the pessimistic variant
//! stores its reader count. The two uses never meet in one word.
//!
//! Mutation goes through compare-and-swap ([`VersionWord::transition`]),
//! loads use `Acquire`, and stores that publish data use `Release`.

use crate::backoff::Backoff;
use crate::types::ThreadId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Bit Layout
// ============================================================================

/// Width of the owner / reader-count field
pub const OWNER_BITS: u32 = 8;

/// Owner thread id (optimistic) or reader count (pessimistic)
pub const OWNER_MASK: u64 = (1 << OWNER_BITS) - 1;

/// Set iff a writer holds the object
pub const LOCK_BIT: u64 = 1 << 8;

/// Commit in progress: new data is about to be published
pub const DIRTY_BIT: u64 = 1 << 9;

/// Adaptive hint: readers may skip the read-lock protocol
pub const OPT_BIT: u64 = 1 << 10;

/// Object belongs to an opaque optimistic lock
pub const OPACITY_BIT: u64 = 1 << 11;

/// Position of the lowest sequence bit
pub const VERSION_SHIFT: u32 = 12;

/// Amount added to the raw word to advance the sequence by one
pub const VERSION_INCREMENT: u64 = 1 << VERSION_SHIFT;

/// Sequence bits
pub const VERSION_MASK: u64 = !(VERSION_INCREMENT - 1);

/// Largest sequence number; the counter wraps to zero past it
pub const MAX_VERSION: u64 = VERSION_MASK >> VERSION_SHIFT;

/// Cleared by unlock: lock, dirty and owner
const UNLOCK_CLEAR: u64 = LOCK_BIT | DIRTY_BIT | OWNER_MASK;

/// Maximum number of registered workers.
///
/// Kept below the owner field's capacity so every id round-trips.
pub const MAX_THREADS: usize = 128;

/// Maximum concurrent readers of a pessimistic lock
pub const MAX_READERS: u64 = 16;

// ============================================================================
// Word (snapshot)
// ============================================================================

/// An immutable snapshot of a version word.
///
/// All field extraction and construction lives here; callers never shift or
/// mask raw integers themselves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Word(u64);

impl Word {
    /// Wrap a raw value
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Word(raw)
    }

    /// Unlocked word carrying `version` in the sequence field.
    ///
    /// The sequence is 52 bits wide; larger values are reduced modulo
    /// `MAX_VERSION + 1`, the same wrap [`bumped`](Self::bumped) applies.
    #[inline]
    pub const fn with_version(version: u64) -> Self {
        Word((version & MAX_VERSION) << VERSION_SHIFT)
    }

    /// Raw integer value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Lock bit is set
    #[inline]
    pub const fn is_locked(self) -> bool {
        self.0 & LOCK_BIT != 0
    }

    /// Lock bit is set and the owner field names `thread`
    #[inline]
    pub const fn is_locked_by(self, thread: ThreadId) -> bool {
        self.is_locked() && (self.0 & OWNER_MASK) == thread.as_bits()
    }

    /// Lock bit is set and some other thread owns it
    #[inline]
    pub const fn is_locked_elsewhere(self, thread: ThreadId) -> bool {
        self.is_locked() && (self.0 & OWNER_MASK) != thread.as_bits()
    }

    /// Owning thread, if locked.
    ///
    /// Only optimistic words record an owner. A write-locked pessimistic
    /// word keeps its (zero) reader count in the low field, so it reports
    /// thread 0 here.
    #[inline]
    pub const fn owner(self) -> Option<ThreadId> {
        if self.is_locked() {
            Some(ThreadId::from_bits(self.0 & OWNER_MASK))
        } else {
            None
        }
    }

    /// Reader count (pessimistic variant)
    #[inline]
    pub const fn reader_count(self) -> u64 {
        self.0 & OWNER_MASK
    }

    /// Sequence number
    #[inline]
    pub const fn version(self) -> u64 {
        self.0 >> VERSION_SHIFT
    }

    /// Dirty (commit-in-progress) bit is set
    #[inline]
    pub const fn is_dirty(self) -> bool {
        self.0 & DIRTY_BIT != 0
    }

    /// Optimistic-hint bit is set
    #[inline]
    pub const fn hint_optimistic(self) -> bool {
        self.0 & OPT_BIT != 0
    }

    /// Opacity marker is set
    #[inline]
    pub const fn is_opaque(self) -> bool {
        self.0 & OPACITY_BIT != 0
    }

    /// Same sequence number as `other`, ignoring every flag
    #[inline]
    pub const fn same_version(self, other: Word) -> bool {
        (self.0 & VERSION_MASK) == (other.0 & VERSION_MASK)
    }

    /// Locked by `thread`; replaces the owner field
    #[inline]
    pub const fn with_owner_lock(self, thread: ThreadId) -> Self {
        Word((self.0 & !OWNER_MASK) | LOCK_BIT | thread.as_bits())
    }

    /// Lock bit set without touching the low field
    #[inline]
    pub const fn with_lock_bit(self) -> Self {
        Word(self.0 | LOCK_BIT)
    }

    /// Lock, dirty and owner cleared; sequence and markers kept
    #[inline]
    pub const fn without_lock(self) -> Self {
        Word(self.0 & !UNLOCK_CLEAR)
    }

    /// Reader count replaced by `readers`
    #[inline]
    pub const fn with_readers(self, readers: u64) -> Self {
        Word((self.0 & !OWNER_MASK) | (readers & OWNER_MASK))
    }

    /// Flag bits set
    #[inline]
    pub const fn with_flags(self, bits: u64) -> Self {
        Word(self.0 | bits)
    }

    /// Flag bits cleared
    #[inline]
    pub const fn without_flags(self, bits: u64) -> Self {
        Word(self.0 & !bits)
    }

    /// Sequence advanced by one (wrapping), flags untouched
    #[inline]
    pub const fn bumped(self) -> Self {
        Word(self.0.wrapping_add(VERSION_INCREMENT))
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Word")
            .field("version", &self.version())
            .field("locked", &self.is_locked())
            .field("low", &self.reader_count())
            .field("dirty", &self.is_dirty())
            .field("hint", &self.hint_optimistic())
            .field("opaque", &self.is_opaque())
            .finish()
    }
}

/// `v<seq>` followed by lock state and flags. The `locked(..)` owner follows
/// [`Word::owner`], so pessimistic words always print `T0`.
impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.version())?;
        if let Some(owner) = self.owner() {
            write!(f, " locked({})", owner)?;
        } else if self.reader_count() > 0 {
            write!(f, " readers({})", self.reader_count())?;
        }
        if self.is_dirty() {
            f.write_str(" dirty")?;
        }
        if self.hint_optimistic() {
            f.write_str(" hint")?;
        }
        if self.is_opaque() {
            f.write_str(" opaque")?;
        }
        Ok(())
    }
}

// ============================================================================
// VersionWord (atomic cell)
// ============================================================================

/// Decision returned by a [`VersionWord::transition`] closure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<R> {
    /// Attempt to CAS the observed word to this value
    Store(Word),
    /// Stop without writing and hand `R` back to the caller
    Bail(R),
}

/// The atomic word owned by one transactional object
#[derive(Default)]
pub struct VersionWord {
    value: AtomicU64,
}

impl VersionWord {
    /// Create a word holding `initial`
    pub const fn new(initial: Word) -> Self {
        Self {
            value: AtomicU64::new(initial.0),
        }
    }

    /// Acquire load
    #[inline]
    pub fn load(&self) -> Word {
        Word(self.value.load(Ordering::Acquire))
    }

    /// Single compare-and-swap of the whole word.
    ///
    /// `Ok` carries the previous value, `Err` the value that was found.
    #[inline]
    pub fn compare_exchange(&self, current: Word, new: Word) -> Result<Word, Word> {
        self.value
            .compare_exchange(current.0, new.0, Ordering::AcqRel, Ordering::Acquire)
            .map(Word)
            .map_err(Word)
    }

    /// Release store. Only valid while the caller owns the word.
    #[inline]
    pub fn store_release(&self, new: Word) {
        self.value.store(new.0, Ordering::Release);
    }

    /// Atomically set `bits`, returning the previous word
    #[inline]
    pub fn fetch_or(&self, bits: u64) -> Word {
        Word(self.value.fetch_or(bits, Ordering::AcqRel))
    }

    /// Atomically subtract `delta` from the raw value, returning the previous word
    #[inline]
    pub fn fetch_sub(&self, delta: u64) -> Word {
        Word(self.value.fetch_sub(delta, Ordering::AcqRel))
    }

    /// The compare-and-swap retry loop.
    ///
    /// Loads the word, asks `decide` what to do with it, and either bails
    /// or tries to install the returned value. A lost race relaxes through
    /// `backoff` and starts over with a fresh load.
    ///
    /// Returns `Ok(new)` once a store lands, or `Err(r)` when `decide` bails.
    pub fn transition<R, B, F>(&self, backoff: &B, mut decide: F) -> Result<Word, R>
    where
        B: Backoff + ?Sized,
        F: FnMut(Word) -> Step<R>,
    {
        loop {
            let current = self.load();
            match decide(current) {
                Step::Bail(r) => return Err(r),
                Step::Store(new) => {
                    if self.compare_exchange(current, new).is_ok() {
                        return Ok(new);
                    }
                    backoff.relax();
                }
            }
        }
    }
}

impl fmt::Debug for VersionWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VersionWord").field(&self.load()).finish()
    }
}
