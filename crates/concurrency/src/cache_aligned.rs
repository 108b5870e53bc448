//! Cache-line padding for per-thread slots
//!
//! Slots in the registry and contention tables are written by their owning
//! thread on every transaction. Padding each to its own cache line keeps
//! neighbouring workers from invalidating each other's lines.

/// Cache line size in bytes (x86-64, AArch64)
pub const CACHE_LINE_BYTES: usize = 64;

/// Wraps a value so it starts on, and fills whole, cache lines
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    /// Wrap `value`
    #[inline]
    pub const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> std::ops::DerefMut for CacheAligned<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}
