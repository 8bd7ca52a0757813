//! Step/direction output of a gauge stepper.

use embedded_hal::digital::{OutputPin, PinState};

/// Needle travel direction. `Up` moves toward higher readings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Up,
    Down,
}

/// Something that can move a needle by one step.
pub trait StepperOutput {
    type Error;

    /// Set the direction and start one step pulse.
    fn step(&mut self, direction: Direction) -> Result<(), Self::Error>;

    /// Finish a pulse started by [`StepperOutput::step`]. Called once per tick, so the
    /// pulse lasts one tick.
    fn end_pulse(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Stepper driver wired with a step line and a direction line.
pub struct StepDir<S, D> {
    step: S,
    dir: D,
    /// Swap the direction level when the gauge is mounted the other way round
    reversed: bool,
    pulse: bool,
}

impl<S, D, E> StepDir<S, D>
where
    S: OutputPin<Error = E>,
    D: OutputPin<Error = E>,
{
    pub fn new(step: S, dir: D, reversed: bool) -> Self {
        Self {
            step,
            dir,
            reversed,
            pulse: false,
        }
    }
}

impl<S, D, E> StepperOutput for StepDir<S, D>
where
    S: OutputPin<Error = E>,
    D: OutputPin<Error = E>,
{
    type Error = E;

    fn step(&mut self, direction: Direction) -> Result<(), E> {
        let up = direction == Direction::Up;
        self.dir.set_state(PinState::from(up != self.reversed))?;
        self.step.set_high()?;
        self.pulse = true;
        Ok(())
    }

    fn end_pulse(&mut self) -> Result<(), E> {
        if self.pulse {
            self.step.set_low()?;
            self.pulse = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPin;

    #[test]
    fn pulse_spans_one_call() {
        let step = MockPin::new();
        let dir = MockPin::new();
        let mut out = StepDir::new(step.clone(), dir.clone(), false);

        out.step(Direction::Up).unwrap();
        assert!(step.is_high());
        assert!(dir.is_high());
        out.end_pulse().unwrap();
        assert!(!step.is_high());

        out.step(Direction::Down).unwrap();
        assert!(!dir.is_high());
        out.end_pulse().unwrap();
        assert_eq!(step.rises(), 2);
    }

    #[test]
    fn reversed_mount_flips_direction() {
        let dir = MockPin::new();
        let mut out = StepDir::new(MockPin::new(), dir.clone(), true);
        out.step(Direction::Up).unwrap();
        assert!(!dir.is_high());
        out.end_pulse().unwrap();
        out.step(Direction::Down).unwrap();
        assert!(dir.is_high());
    }
}
