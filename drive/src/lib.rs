//! Actuator drives for the LSMCU cab panel.
//!
//! Two real-time loops live here, both clocked by a shared [`TickSource`]:
//!
//! - [`tch`] - six-sector commutation of the tachometer motor, dwell taken from a
//!   speed lookup table.
//! - [`mano`] - open-loop stepper control of the pressure gauge needles, with a
//!   ramp shaped by the needle inertia, plus the shared power rail registry.
//!
//! Nothing in this crate touches a HAL directly: outputs are `embedded-hal` pins and
//! the sector timer is a trait, so the same code runs on the panel and on the bench.
#![cfg_attr(not(test), no_std)]

mod fmt;
#[cfg(test)]
mod mock;

pub mod mano;
pub mod shared;
pub mod tch;
pub mod tick;

pub use mano::{Needle, NeedleConfig, NeedleHandle, NeedlePower, NeedleShared};
pub use shared::SharedSpeed;
pub use tch::{CommutationState, PhasePattern, PhasePins, Tachometer};
pub use tick::{SectorTimer, TickSource, TickTimer};

/// Base period of the panel tick, in microseconds.
pub const TICK_PERIOD_US: u32 = 100;
