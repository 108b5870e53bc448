//! Runtime entry point.
//!
//! [`Stm`] owns every process-wide piece of state the lock layer needs: the
//! worker registry and the contention manager with its global clock. There
//! are no hidden singletons; pass the runtime (or `Arc<Stm>`) to each worker.

use crate::error::Result;
use stmcore_concurrency::{
    ContentionManager, DefaultLockVersion, DefaultSwissVersion, ThreadRegistry, Worker,
};
use stmcore_core::{StmConfig, ThreadId};
use tracing::info;

/// An STM runtime.
///
/// # Example
///
/// ```
/// use stmcore::prelude::*;
///
/// let stm = Stm::builder()
///     .max_threads(8)
///     .ts_threshold(2)
///     .build()?;
///
/// std::thread::scope(|s| {
///     for _ in 0..4 {
///         s.spawn(|| {
///             let worker = stm.register().unwrap();
///             let txn = TxnDescriptor::new(worker.id());
///             stm.contention().start(&txn);
///         });
///     }
/// });
/// # Ok::<(), stmcore::Error>(())
/// ```
pub struct Stm {
    config: StmConfig,
    registry: ThreadRegistry,
    contention: ContentionManager,
}

impl Stm {
    /// Create a runtime with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(StmConfig::default())
    }

    /// Create a runtime from an explicit configuration.
    pub fn with_config(config: StmConfig) -> Result<Self> {
        config.validate()?;
        let registry = ThreadRegistry::new(&config)?;
        let contention = ContentionManager::new(config.max_threads, config.contention.clone());
        info!(
            max_threads = config.max_threads,
            spin_limit = config.spin_limit,
            ts_threshold = config.contention.ts_threshold,
            "stm runtime created"
        );
        Ok(Self {
            config,
            registry,
            contention,
        })
    }

    /// Create a builder for runtime configuration.
    pub fn builder() -> StmBuilder {
        StmBuilder::new()
    }

    /// Configuration in effect.
    pub fn config(&self) -> &StmConfig {
        &self.config
    }

    /// Claim a worker slot for the calling thread.
    ///
    /// The slot is released when the returned [`Worker`] is dropped.
    pub fn register(&self) -> Result<Worker<'_>> {
        Ok(self.registry.register()?)
    }

    /// Claim a specific worker slot.
    pub fn register_as(&self, id: usize) -> Result<Worker<'_>> {
        Ok(self.registry.register_as(ThreadId::new(id)?)?)
    }

    /// The worker registry.
    pub fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    /// The contention manager.
    pub fn contention(&self) -> &ContentionManager {
        &self.contention
    }

    /// A pessimistic lock with this build's default hint policy.
    pub fn new_lock_version(&self) -> DefaultLockVersion {
        DefaultLockVersion::new()
    }

    /// An optimistic lock with this build's default opacity policy.
    pub fn new_swiss_version(&self) -> DefaultSwissVersion {
        DefaultSwissVersion::new()
    }

    /// An optimistic lock for an object `creator` is inserting.
    pub fn new_inserted_version(&self, creator: &Worker<'_>) -> DefaultSwissVersion {
        DefaultSwissVersion::new_inserted(creator.id())
    }
}

impl std::fmt::Debug for Stm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stm")
            .field("registry", &self.registry)
            .field("contention", &self.contention)
            .finish()
    }
}

/// Builder for runtime configuration.
///
/// # Example
///
/// ```
/// use stmcore::Stm;
///
/// let stm = Stm::builder()
///     .max_threads(16)
///     .spin_limit(32)
///     .unlock_opt_chance(25)
///     .succ_aborts_max(8)
///     .wait_cycles_multiplier(1_000)
///     .seed(7)
///     .build()?;
/// assert_eq!(stm.config().max_threads, 16);
/// # Ok::<(), stmcore::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct StmBuilder {
    config: StmConfig,
}

impl StmBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: StmConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: StmConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of worker slots.
    pub fn max_threads(mut self, max_threads: usize) -> Self {
        self.config.max_threads = max_threads;
        self
    }

    /// Attempts made by the bounded-spin lock helpers.
    pub fn spin_limit(mut self, spin_limit: u32) -> Self {
        self.config.spin_limit = spin_limit;
        self
    }

    /// Percent chance an adaptive unlock sets the optimistic hint.
    pub fn unlock_opt_chance(mut self, percent: u8) -> Self {
        self.config.unlock_opt_chance = percent;
        self
    }

    /// Writes before an attempt earns a priority timestamp.
    pub fn ts_threshold(mut self, writes: u64) -> Self {
        self.config.contention.ts_threshold = writes;
        self
    }

    /// Saturation point of the abort counter.
    pub fn succ_aborts_max(mut self, aborts: u32) -> Self {
        self.config.contention.succ_aborts_max = aborts;
        self
    }

    /// Backoff cycles per recorded abort.
    pub fn wait_cycles_multiplier(mut self, cycles: u64) -> Self {
        self.config.contention.wait_cycles_multiplier = cycles;
        self
    }

    /// Base seed for the per-thread generators.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.contention.seed = seed;
        self
    }

    /// Validate the configuration and create the runtime.
    pub fn build(self) -> Result<Stm> {
        Stm::with_config(self.config)
    }
}
