//! Shared periodic tick and the sector timer built on top of it.
//!
//! The tick context (interrupt or ticker task) only ever calls [`TickSource::tick`].
//! Everything derived from it, such as elapsed flags, is computed by the foreground
//! loop when it asks.

use core::sync::atomic::{AtomicU32, Ordering};

/// Free-running tick counter with a fixed base period.
pub struct TickSource {
    ticks: AtomicU32,
    period_us: u32,
}

impl TickSource {
    pub const fn new(period_us: u32) -> Self {
        Self {
            ticks: AtomicU32::new(0),
            // A zero period would make every delay elapse immediately
            period_us: if period_us == 0 { 1 } else { period_us },
        }
    }

    /// Advance by one tick. Called from the tick context only.
    #[inline]
    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Ticks elapsed since power-up (wrapping).
    #[inline]
    pub fn now(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn period_us(&self) -> u32 {
        self.period_us
    }

    /// Tick rate in Hz.
    pub fn hz(&self) -> u32 {
        1_000_000 / self.period_us
    }

    /// Number of ticks covering `us`, rounded up.
    pub fn ticks_for_us(&self, us: u32) -> u32 {
        us.div_ceil(self.period_us)
    }
}

/// One-shot delay with a sticky elapsed flag, as used by the commutation drive.
///
/// Mirrors a hardware timer with an update flag: `set_delay_us` programs the next
/// period, `clear_elapsed` acknowledges the flag and restarts the count.
pub trait SectorTimer {
    fn start(&mut self);
    fn stop(&mut self);
    fn set_delay_us(&mut self, delay_us: u32);
    fn is_elapsed(&self) -> bool;
    fn clear_elapsed(&mut self);
}

/// [`SectorTimer`] counting ticks of a shared [`TickSource`].
pub struct TickTimer<'a> {
    source: &'a TickSource,
    running: bool,
    armed_at: u32,
    delay_ticks: u32,
}

impl<'a> TickTimer<'a> {
    pub fn new(source: &'a TickSource) -> Self {
        Self {
            source,
            running: false,
            armed_at: 0,
            delay_ticks: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Ticks counted since the timer was last armed.
    pub fn elapsed_ticks(&self) -> u32 {
        self.source.now().wrapping_sub(self.armed_at)
    }
}

impl SectorTimer for TickTimer<'_> {
    fn start(&mut self) {
        self.running = true;
        self.armed_at = self.source.now();
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn set_delay_us(&mut self, delay_us: u32) {
        self.delay_ticks = self.source.ticks_for_us(delay_us);
    }

    fn is_elapsed(&self) -> bool {
        self.running && self.elapsed_ticks() >= self.delay_ticks
    }

    fn clear_elapsed(&mut self) {
        self.armed_at = self.source.now();
    }
}
