//! # stmcore
//!
//! Concurrency-control core for a software transactional memory library.
//!
//! stmcore provides the per-object version words that transactional data
//! structures are built on, and the contention manager that decides who
//! backs off when two transactions collide.
//!
//! ## Quick Start
//!
//! ```
//! use stmcore::prelude::*;
//!
//! let stm = Stm::builder().max_threads(4).build()?;
//! let worker = stm.register()?;
//!
//! let object: SwissVersion = SwissVersion::new();
//! let mut item: TransItem<u64> = TransItem::new();
//!
//! let mut txn = TxnDescriptor::new(worker.id());
//! stm.contention().start(&txn);
//! assert!(object.acquire_write_with(&mut item, &worker, 42));
//! stm.contention().on_write(&txn);
//!
//! assert!(object.try_lock_for_commit(worker.id()));
//! *SwissVersion::<NonOpaque>::cp_access_tid(&mut txn) = 1;
//! object.unlock_after_commit(&mut item, &worker);
//! assert_eq!(object.version(), 1);
//! # Ok::<(), stmcore::Error>(())
//! ```
//!
//! ## Lock Variants
//!
//! - [`LockVersion`] - pessimistic reader/writer lock, optionally adaptive
//! - [`SwissVersion`] - optimistic lock-at-commit word, optionally opaque
//!
//! Both implement [`CommitProtocol`], the interface a commit engine drives.
//!
//! ## Build-time Policies
//!
//! - `adaptive-rwlock`: [`DefaultLockVersion`] sets an optimistic-read hint on unlock
//! - `opacity`: [`DefaultSwissVersion`] enforces always-consistent reads

#![warn(missing_docs)]

mod error;
mod runtime;
mod types;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use runtime::{Stm, StmBuilder};

// Re-export types
pub use types::*;
