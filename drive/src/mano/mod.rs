//! Pressure gauge needle control.
//!
//! A gauge needle sits on an open-loop stepper. Pressure is mapped linearly onto the
//! step range (`pressure_max_decibars` is `pressure_max_steps`), the needle walks one
//! step at a time toward the target and the spacing of the steps follows [`ramp::Ramp`].
//!
//! State is split in two:
//! - [`NeedleShared`] holds what other contexts touch: enable flag, target step and
//!   current step. It is meant to live in a `static`.
//! - [`Needle`] is the control loop itself and owns the outputs and the tick counter.
//!
//! There is no position feedback. A stalled needle is not detected.

pub mod power;
pub mod ramp;
pub mod stepper;

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::fmt::{debug, trace};
use crate::tick::TickSource;

pub use self::power::{NeedlePower, RegistryFull};
pub use self::ramp::Ramp;
pub use self::stepper::{Direction, StepDir, StepperOutput};

/// Needle values crossing context boundaries.
///
/// `target_step` and `enable` are written by the owner of the gauge and read by the
/// control loop; `current_step` is written by the control loop only.
pub struct NeedleShared {
    enable: AtomicBool,
    target_step: AtomicU32,
    current_step: AtomicU32,
}

impl NeedleShared {
    pub const fn new() -> Self {
        Self {
            enable: AtomicBool::new(false),
            target_step: AtomicU32::new(0),
            current_step: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enable.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_enabled(&self, enabled: bool) {
        self.enable.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub fn target_step(&self) -> u32 {
        self.target_step.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn current_step(&self) -> u32 {
        self.current_step.load(Ordering::Relaxed)
    }
}

impl Default for NeedleShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Static description of one gauge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NeedleConfig {
    /// Full scale reading
    pub pressure_max_decibars: u32,
    /// Steps from zero to full scale
    pub pressure_max_steps: u32,
    /// Steps before the target where the needle starts easing in
    pub inertia_steps: u32,
    /// Top needle speed, steps per second
    pub speed_max_steps_per_s: u32,
    /// Step the needle is assumed to rest on at power-up
    pub start_step: u32,
}

impl NeedleConfig {
    pub const fn scale(&self) -> Scale {
        Scale::new(self.pressure_max_decibars, self.pressure_max_steps)
    }
}

/// Linear pressure <-> step mapping, rounded to nearest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scale {
    max_decibars: u32,
    max_steps: u32,
}

impl Scale {
    pub const fn new(max_decibars: u32, max_steps: u32) -> Self {
        Self {
            max_decibars,
            max_steps,
        }
    }

    /// Step for a pressure, clamped to the dial.
    pub fn to_step(&self, decibars: u32) -> u32 {
        if self.max_decibars == 0 {
            return 0;
        }
        let p = decibars.min(self.max_decibars) as u64;
        let q = self.max_decibars as u64;
        ((p * self.max_steps as u64 + q / 2) / q) as u32
    }

    /// Pressure shown at a step.
    pub fn to_decibars(&self, step: u32) -> u32 {
        if self.max_steps == 0 {
            return 0;
        }
        let s = step.min(self.max_steps) as u64;
        let m = self.max_steps as u64;
        ((s * self.max_decibars as u64 + m / 2) / m) as u32
    }
}

/// Cheap, copyable access to a needle from outside its control loop.
#[derive(Clone, Copy)]
pub struct NeedleHandle<'a> {
    shared: &'a NeedleShared,
    scale: Scale,
}

impl<'a> NeedleHandle<'a> {
    pub fn new(shared: &'a NeedleShared, scale: Scale) -> Self {
        Self { shared, scale }
    }

    /// Aim the needle at a pressure. Out of range values are pinned to the dial ends.
    /// The needle only moves once its task runs and it is started.
    pub fn set_target(&self, decibars: u32) {
        let step = self.scale.to_step(decibars);
        self.shared.target_step.store(step, Ordering::Relaxed);
        trace!("Needle target {} dbar -> step {}", decibars, step);
    }

    /// Pressure currently shown by the needle.
    pub fn get_pressure(&self) -> u32 {
        self.scale.to_decibars(self.shared.current_step())
    }

    pub fn start_needle(&self) {
        self.shared.set_enabled(true);
    }

    /// Freeze the needle where it is.
    pub fn stop_needle(&self) {
        self.shared.set_enabled(false);
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.is_enabled()
    }

    pub fn current_step(&self) -> u32 {
        self.shared.current_step()
    }

    pub fn target_step(&self) -> u32 {
        self.shared.target_step()
    }

    pub fn shared(&self) -> &'a NeedleShared {
        self.shared
    }
}

/// Needle control loop. Call [`Needle::task`] once per tick.
pub struct Needle<'a, O> {
    handle: NeedleHandle<'a>,
    output: O,
    ramp: Ramp,
    /// Ticks since the last step
    count: u32,
    /// Ticks to wait before the next step
    period: u32,
    heading: Option<Direction>,
    running: bool,
}

impl<'a, O: StepperOutput> Needle<'a, O> {
    /// Bind a gauge to its outputs.
    ///
    /// The needle is left stopped, resting on `config.start_step` with the target on
    /// the same step. The minimum step period follows from the tick rate of `tick` and
    /// `config.speed_max_steps_per_s`.
    pub fn new(
        shared: &'a NeedleShared,
        output: O,
        config: &NeedleConfig,
        tick: &TickSource,
    ) -> Self {
        let scale = config.scale();
        let start = config.start_step.min(config.pressure_max_steps);
        shared.set_enabled(false);
        shared.current_step.store(start, Ordering::Relaxed);
        shared.target_step.store(start, Ordering::Relaxed);

        let period_min = tick.hz().div_ceil(config.speed_max_steps_per_s.max(1)).max(1);
        let ramp = Ramp::new(period_min, config.inertia_steps);
        debug!(
            "Needle init: {} dbar over {} steps, period {}..{} ticks",
            config.pressure_max_decibars,
            config.pressure_max_steps,
            ramp.period_min(),
            ramp.period_start()
        );

        Self {
            handle: NeedleHandle::new(shared, scale),
            output,
            ramp,
            count: 0,
            period: ramp.period(),
            heading: None,
            running: false,
        }
    }

    pub fn handle(&self) -> NeedleHandle<'a> {
        self.handle
    }

    pub fn set_target(&self, decibars: u32) {
        self.handle.set_target(decibars);
    }

    pub fn get_pressure(&self) -> u32 {
        self.handle.get_pressure()
    }

    pub fn start_needle(&self) {
        self.handle.start_needle();
    }

    pub fn stop_needle(&self) {
        self.handle.stop_needle();
    }

    /// Period, in ticks, that the next step will wait for.
    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn ramp(&self) -> &Ramp {
        &self.ramp
    }

    pub fn is_moving(&self) -> bool {
        self.heading.is_some()
    }

    /// One tick of the control loop.
    ///
    /// Returns the direction of the step taken on this tick, if any. A pulse started on
    /// one tick is ended on the next, even if the needle was stopped in between.
    pub fn task(&mut self) -> Result<Option<Direction>, O::Error> {
        self.output.end_pulse()?;

        let shared = self.handle.shared;
        if !shared.is_enabled() {
            self.running = false;
            return Ok(None);
        }
        if !self.running {
            // Starting from rest, whatever speed we had before the stop is gone
            self.running = true;
            self.rest();
        }

        let current = shared.current_step();
        let target = shared.target_step();
        if current == target {
            if self.heading.is_some() {
                debug!("Needle settled on step {}", current);
                self.rest();
            }
            return Ok(None);
        }

        let direction = if target > current {
            Direction::Up
        } else {
            Direction::Down
        };
        if self.heading != Some(direction) {
            if self.heading.is_some() {
                trace!("Needle reversing at step {}", current);
            }
            self.rest();
            self.heading = Some(direction);
        }

        self.count += 1;
        if self.count < self.period {
            return Ok(None);
        }
        self.count = 0;

        let next = match direction {
            Direction::Up => current + 1,
            Direction::Down => current - 1,
        };
        self.output.step(direction)?;
        shared.current_step.store(next, Ordering::Relaxed);

        self.ramp.update(next.abs_diff(target));
        self.period = self.ramp.period();
        Ok(Some(direction))
    }

    fn rest(&mut self) {
        self.heading = None;
        self.count = 0;
        self.ramp.reset();
        self.period = self.ramp.period();
    }
}
