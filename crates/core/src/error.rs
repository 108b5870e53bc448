//! Error types for the STM core
//!
//! Lock conflicts are not errors: they are reported as lock responses or
//! booleans and handled by the retry loop. The variants here cover setup
//! problems only (bad configuration, exhausted thread table).

use thiserror::Error;

/// Errors raised while configuring or registering with the runtime
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Thread id does not fit the owner field or the configured table
    #[error("thread id {id} out of range (max {max})")]
    ThreadIdOutOfRange {
        /// Requested id
        id: usize,
        /// Exclusive upper bound
        max: usize,
    },

    /// Every worker slot is claimed
    #[error("thread registry full: all {capacity} slots in use")]
    RegistryFull {
        /// Number of slots in the registry
        capacity: usize,
    },

    /// A specific slot was requested but is already claimed
    #[error("thread slot {0} already claimed")]
    SlotClaimed(usize),

    /// Configuration value rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
