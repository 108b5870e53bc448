//! Lock attempt outcomes

use std::fmt;

/// Result of a single lock attempt
///
/// None of these block. The caller either retries (bounded) or aborts the
/// whole transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockResponse {
    /// The lock is held by the caller
    Locked,
    /// The attempt failed outright
    Failed,
    /// The reader table is full; validate by version instead of locking
    Optimistic,
    /// A conflicting holder is present; retry or abort
    Spin,
}

impl LockResponse {
    /// The caller now holds the lock
    #[inline]
    pub fn is_locked(self) -> bool {
        matches!(self, LockResponse::Locked)
    }
}

impl fmt::Display for LockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockResponse::Locked => write!(f, "locked"),
            LockResponse::Failed => write!(f, "failed"),
            LockResponse::Optimistic => write!(f, "optimistic"),
            LockResponse::Spin => write!(f, "spin"),
        }
    }
}
