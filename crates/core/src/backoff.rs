//! Relaxation strategies for spin loops
//!
//! Nothing in the lock layer blocks on the OS. A lost compare-and-swap or an
//! occupied lock is followed by a call into a [`Backoff`], which production
//! code implements with CPU pause hints and tests replace with [`NoBackoff`].

use std::hint;

/// Pause strategy used between spin attempts
pub trait Backoff {
    /// One short pause after a failed CAS or a busy observation
    fn relax(&self);

    /// Busy-wait for roughly `cycles` iterations
    fn wait_cycles(&self, cycles: u64);
}

/// Pause with `spin_loop` hints
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinBackoff;

impl Backoff for SpinBackoff {
    #[inline]
    fn relax(&self) {
        hint::spin_loop();
    }

    fn wait_cycles(&self, cycles: u64) {
        for _ in 0..cycles {
            hint::spin_loop();
        }
    }
}

/// Return immediately. Deterministic tests use this.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    #[inline]
    fn relax(&self) {}

    #[inline]
    fn wait_cycles(&self, _cycles: u64) {}
}

impl<B: Backoff + ?Sized> Backoff for &B {
    #[inline]
    fn relax(&self) {
        (**self).relax();
    }

    #[inline]
    fn wait_cycles(&self, cycles: u64) {
        (**self).wait_cycles(cycles);
    }
}
