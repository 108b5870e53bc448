//! Unified error types for stmcore.
//!
//! Lock conflicts and transaction aborts are expected outcomes and never
//! surface here; this type covers runtime setup and registration only.

use thiserror::Error;

/// All stmcore errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Configuration rejected (bad range, inconsistent values)
    #[error("configuration error: {0}")]
    Config(String),

    /// No worker slot available, or the requested one is taken
    #[error("capacity error: {0}")]
    Capacity(String),
}

/// Result type for stmcore operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// A full registry may free up once other workers exit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Capacity(_))
    }

    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

// Convert from internal core errors
impl From<stmcore_core::Error> for Error {
    fn from(e: stmcore_core::Error) -> Self {
        use stmcore_core::Error as CoreError;
        match e {
            CoreError::InvalidConfig(msg) => Error::Config(msg),
            CoreError::ThreadIdOutOfRange { id, max } => {
                Error::Capacity(format!("thread id {} out of range (max {})", id, max))
            }
            CoreError::RegistryFull { capacity } => {
                Error::Capacity(format!("all {} worker slots in use", capacity))
            }
            CoreError::SlotClaimed(slot) => {
                Error::Capacity(format!("worker slot {} already claimed", slot))
            }
        }
    }
}
