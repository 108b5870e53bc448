//! Runtime configuration
//!
//! Lock-policy selection (adaptive hint, opacity) is a type parameter chosen
//! at construction, with cargo features picking the defaults. Everything
//! tunable at runtime lives in [`StmConfig`].

use crate::error::{Error, Result};
use crate::word::MAX_THREADS;
use serde::{Deserialize, Serialize};

/// Contention-manager tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentionConfig {
    /// Writes in one attempt before the thread is given a priority timestamp
    /// (zero disables priorities)
    pub ts_threshold: u64,
    /// Saturation point of the per-thread abort counter
    pub succ_aborts_max: u32,
    /// Backoff cycles per recorded abort
    pub wait_cycles_multiplier: u64,
    /// Base seed for the per-thread backoff generators
    pub seed: u64,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            ts_threshold: 4,
            succ_aborts_max: 10,
            wait_cycles_multiplier: 8_000,
            seed: 0x5EED_CAFE,
        }
    }
}

/// Configuration for an STM runtime
///
/// # Example
///
/// ```
/// use stmcore_core::StmConfig;
///
/// let config = StmConfig {
///     max_threads: 8,
///     ..StmConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StmConfig {
    /// Number of worker slots (at most [`MAX_THREADS`])
    pub max_threads: usize,
    /// Attempts made by the bounded-spin lock helpers
    pub spin_limit: u32,
    /// Percent chance that an adaptive unlock sets the optimistic hint
    pub unlock_opt_chance: u8,
    /// Contention-manager tuning
    pub contention: ContentionConfig,
}

impl Default for StmConfig {
    fn default() -> Self {
        Self {
            max_threads: MAX_THREADS,
            spin_limit: 16,
            unlock_opt_chance: 10,
            contention: ContentionConfig::default(),
        }
    }
}

impl StmConfig {
    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<()> {
        if self.max_threads == 0 || self.max_threads > MAX_THREADS {
            return Err(Error::InvalidConfig(format!(
                "max_threads must be in 1..={}, got {}",
                MAX_THREADS, self.max_threads
            )));
        }
        if self.spin_limit == 0 {
            return Err(Error::InvalidConfig(
                "spin_limit must be positive".to_string(),
            ));
        }
        if self.unlock_opt_chance > 100 {
            return Err(Error::InvalidConfig(format!(
                "unlock_opt_chance is a percentage, got {}",
                self.unlock_opt_chance
            )));
        }
        if self.contention.succ_aborts_max == 0 {
            return Err(Error::InvalidConfig(
                "succ_aborts_max must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
