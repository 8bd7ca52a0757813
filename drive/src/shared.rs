//! Values shared between a producer (speed model, command handler) and a drive loop.
//!
//! Each value is a single word written by exactly one producer and read by exactly one
//! drive. Relaxed ordering is enough: the reader only needs the most recent value at
//! the instant it looks, and no other memory is published through these words.

use core::sync::atomic::{AtomicU32, Ordering};

/// Road speed in km/h, read by the tachometer drive on every task call.
pub struct SharedSpeed(AtomicU32);

impl SharedSpeed {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    #[inline]
    pub fn set(&self, kmh: u32) {
        self.0.store(kmh, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for SharedSpeed {
    fn default() -> Self {
        Self::new()
    }
}
