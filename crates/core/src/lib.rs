//! Core types for the STM concurrency layer
//!
//! This crate defines the building blocks shared by every lock variant:
//! - [`VersionWord`] / [`Word`]: the atomic, bit-packed per-object word
//! - [`ThreadId`]: worker identity as stored in the owner field
//! - [`TxnView`] / [`TransItem`]: the boundary to the transaction engine
//! - [`Backoff`]: injectable relaxation strategy for spin loops
//! - [`StmConfig`]: runtime configuration
//!
//! Raw bit manipulation happens only in [`word`]; everything above it goes
//! through named accessors.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod config;
pub mod error;
pub mod txn;
pub mod types;
pub mod word;

pub use backoff::{Backoff, NoBackoff, SpinBackoff};
pub use config::{ContentionConfig, StmConfig};
pub use error::{Error, Result};
pub use txn::{TransItem, TxnDescriptor, TxnView};
pub use types::ThreadId;
pub use word::{Step, VersionWord, Word, MAX_READERS, MAX_THREADS};
