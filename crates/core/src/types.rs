//! Worker identity
//!
//! A [`ThreadId`] is the index of a worker's slot in the runtime's tables and
//! the value a writer stores in the owner field of a locked [`Word`](crate::Word).

use crate::error::{Error, Result};
use crate::word::MAX_THREADS;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a registered worker thread
///
/// Always below [`MAX_THREADS`], so it fits the owner field of a word.
///
/// # Examples
///
/// ```
/// use stmcore_core::ThreadId;
///
/// let id = ThreadId::new(3).unwrap();
/// assert_eq!(id.index(), 3);
/// assert!(ThreadId::new(1_000).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize")]
pub struct ThreadId(u8);

impl ThreadId {
    /// Create a thread id, rejecting values the owner field cannot hold
    pub fn new(id: usize) -> Result<Self> {
        if id >= MAX_THREADS {
            return Err(Error::ThreadIdOutOfRange {
                id,
                max: MAX_THREADS,
            });
        }
        Ok(ThreadId(id as u8))
    }

    /// Slot index in per-thread tables
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Owner-field encoding
    #[inline]
    pub const fn as_bits(self) -> u64 {
        self.0 as u64
    }

    /// Decode an owner field. Values are masked by the caller.
    #[inline]
    pub(crate) const fn from_bits(bits: u64) -> Self {
        ThreadId(bits as u8)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl TryFrom<usize> for ThreadId {
    type Error = Error;

    fn try_from(id: usize) -> Result<Self> {
        ThreadId::new(id)
    }
}
