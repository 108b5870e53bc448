//! Concurrency layer for the STM core
//!
//! This crate implements the per-object lock protocols and conflict
//! arbitration on top of [`stmcore_core::VersionWord`]:
//! - [`LockVersion`]: pessimistic reader/writer lock with an optional adaptive hint
//! - [`SwissVersion`]: optimistic lock-at-commit word with owner tracking
//! - [`CommitProtocol`]: the interface the commit engine drives for both
//! - [`ThreadRegistry`] / [`Worker`]: worker identity and per-thread generators
//! - [`ContentionManager`]: priority timestamps and randomized abort backoff
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. acquire_write() on every write target     (optimistic: owner CAS)
//! 2. lock_for_commit() on every write target   (optimistic: set dirty)
//! 3. check_version() on every read target
//! 4. IF any step fails: unlock_after_commit() everything, on_rollback(), retry
//! 5. publish data, unlock_after_commit() everything
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache_aligned;
pub mod contention;
pub mod optimistic;
pub mod pessimistic;
pub mod protocol;
pub mod registry;
pub mod response;

pub use cache_aligned::CacheAligned;
pub use contention::{ContentionManager, NO_TIMESTAMP};
pub use optimistic::{NonOpaque, Opaque, OpacityPolicy, SwissVersion};
pub use pessimistic::{Adaptive, HintPolicy, LockVersion, Plain};
pub use protocol::CommitProtocol;
pub use registry::{ThreadRegistry, Worker};
pub use response::LockResponse;

/// Hint policy selected by the `adaptive-rwlock` feature
#[cfg(feature = "adaptive-rwlock")]
pub type DefaultHint = Adaptive;
/// Hint policy selected by the `adaptive-rwlock` feature
#[cfg(not(feature = "adaptive-rwlock"))]
pub type DefaultHint = Plain;

/// Opacity policy selected by the `opacity` feature
#[cfg(feature = "opacity")]
pub type DefaultOpacity = Opaque;
/// Opacity policy selected by the `opacity` feature
#[cfg(not(feature = "opacity"))]
pub type DefaultOpacity = NonOpaque;

/// Pessimistic lock with the build's default hint policy
pub type DefaultLockVersion = LockVersion<DefaultHint>;

/// Optimistic lock with the build's default opacity policy
pub type DefaultSwissVersion = SwissVersion<DefaultOpacity>;
