//! Convenient imports for stmcore.
//!
//! ```
//! use stmcore::prelude::*;
//!
//! let stm = Stm::new()?;
//! let worker = stm.register()?;
//! let lock: LockVersion = LockVersion::new();
//! assert_eq!(lock.try_lock_write(), LockResponse::Locked);
//! lock.unlock_write(&worker);
//! # Ok::<(), stmcore::Error>(())
//! ```

// Main entry point
pub use crate::runtime::{Stm, StmBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Lock variants and the commit interface
pub use crate::types::{
    Adaptive, CommitProtocol, DefaultLockVersion, DefaultSwissVersion, LockResponse, LockVersion,
    NonOpaque, Opaque, Plain, SwissVersion,
};

// Transaction boundary
pub use crate::types::{ThreadId, TransItem, TxnDescriptor, TxnView, Worker};

// Configuration
pub use crate::types::{ContentionConfig, StmConfig};
