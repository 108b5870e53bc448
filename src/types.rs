//! Public types re-exported from the workspace crates.

pub use stmcore_core::{
    Backoff, ContentionConfig, NoBackoff, SpinBackoff, StmConfig, ThreadId,
    TransItem, TxnDescriptor, TxnView, VersionWord, Word, MAX_READERS, MAX_THREADS,
};

pub use stmcore_concurrency::{
    Adaptive, CommitProtocol, ContentionManager, DefaultLockVersion, DefaultSwissVersion,
    HintPolicy, LockResponse, LockVersion, NonOpaque, Opaque, OpacityPolicy, Plain, SwissVersion,
    ThreadRegistry, Worker, NO_TIMESTAMP,
};
