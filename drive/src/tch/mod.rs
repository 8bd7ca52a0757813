//! Tachometer commutation drive.
//!
//! The tachometer is a small three-phase motor turned by a repeating six-sector
//! pattern on three inhibit lines and three drive lines. The dial reading is the
//! commutation rate, so the dwell of each sector comes straight from
//! [`table::STEP_DELAY_US`], looked up again at every sector edge.

pub mod sector;
pub mod table;

use embedded_hal::digital::{OutputPin, PinState};

use crate::fmt::{debug, info, trace};
use crate::shared::SharedSpeed;
use crate::tick::SectorTimer;

pub use self::sector::{CommutationState, PhasePattern};
pub use self::table::{SPEED_MAX_KMH, SPEED_MIN_KMH, step_delay_us};

/// The six tachometer output lines.
pub struct PhasePins<P> {
    /// Inhibit lines, phases A, B, C
    pub inh: [P; 3],
    /// Drive lines, phases A, B, C
    pub pwm: [P; 3],
}

impl<P: OutputPin> PhasePins<P> {
    pub fn new(inh: [P; 3], pwm: [P; 3]) -> Self {
        Self { inh, pwm }
    }

    /// Write all six lines.
    pub fn apply(&mut self, pattern: PhasePattern) -> Result<(), P::Error> {
        for (pin, level) in self.inh.iter_mut().zip(pattern.inh) {
            pin.set_state(PinState::from(level))?;
        }
        for (pin, level) in self.pwm.iter_mut().zip(pattern.pwm) {
            pin.set_state(PinState::from(level))?;
        }
        Ok(())
    }

    pub fn release(&mut self) -> Result<(), P::Error> {
        self.apply(PhasePattern::OFF)
    }
}

/// Commutation drive context.
pub struct Tachometer<'a, P, T> {
    pins: PhasePins<P>,
    timer: T,
    speed: &'a SharedSpeed,
    state: CommutationState,
}

impl<'a, P, T> Tachometer<'a, P, T>
where
    P: OutputPin,
    T: SectorTimer,
{
    /// Bind the drive to its outputs, sector timer and the shared speed value.
    ///
    /// Nothing is written until [`Tachometer::init`].
    pub fn new(pins: PhasePins<P>, timer: T, speed: &'a SharedSpeed) -> Self {
        Self {
            pins,
            timer,
            speed,
            state: CommutationState::Off,
        }
    }

    /// Release every output, stop the timer and zero the shared speed.
    ///
    /// Safe to call again at any time; it always lands in `Off`.
    pub fn init(&mut self) -> Result<(), P::Error> {
        self.timer.stop();
        self.state = CommutationState::Off;
        self.speed.set(0);
        self.pins.release()?;
        info!("Tachometer ready");
        Ok(())
    }

    /// Run one pass of the state machine.
    ///
    /// At most one transition happens per call; the outputs of the resulting state are
    /// written before returning. Must be called at least as often as the shortest
    /// sector dwell.
    pub fn task(&mut self) -> Result<CommutationState, P::Error> {
        let speed = self.speed.get();

        let next = match self.state {
            CommutationState::Off => {
                if speed >= SPEED_MIN_KMH {
                    self.timer.start();
                    self.timer.set_delay_us(step_delay_us(speed));
                    self.timer.clear_elapsed();
                    debug!("Tachometer engaged at {} km/h", speed);
                    CommutationState::Step1
                } else {
                    CommutationState::Off
                }
            }
            sector if speed < SPEED_MIN_KMH => {
                // Hard stop, whatever is left of the sector is dropped
                self.timer.stop();
                debug!("Tachometer released in sector {}", sector.sector());
                CommutationState::Off
            }
            sector => {
                if self.timer.is_elapsed() {
                    self.timer.set_delay_us(step_delay_us(speed));
                    self.timer.clear_elapsed();
                    trace!("Sector {} at {} km/h", sector.next().sector(), speed);
                    sector.next()
                } else {
                    sector
                }
            }
        };

        self.state = next;
        self.pins.apply(next.pattern())?;
        Ok(next)
    }

    pub fn state(&self) -> CommutationState {
        self.state
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPin;
    use crate::tick::{TickSource, TickTimer};

    struct Probe {
        inh: [MockPin; 3],
        pwm: [MockPin; 3],
    }

    impl Probe {
        fn pattern(&self) -> PhasePattern {
            PhasePattern {
                inh: [0, 1, 2].map(|i| self.inh[i].is_high()),
                pwm: [0, 1, 2].map(|i| self.pwm[i].is_high()),
            }
        }
    }

    fn rig<'a>(
        src: &'a TickSource,
        speed: &'a SharedSpeed,
    ) -> (Tachometer<'a, MockPin, TickTimer<'a>>, Probe) {
        let probe = Probe {
            inh: [MockPin::new(), MockPin::new(), MockPin::new()],
            pwm: [MockPin::new(), MockPin::new(), MockPin::new()],
        };
        let pins = PhasePins::new(probe.inh.clone(), probe.pwm.clone());
        let mut tch = Tachometer::new(pins, TickTimer::new(src), speed);
        tch.init().unwrap();
        (tch, probe)
    }

    /// Tick until the state changes, returning the new state and the ticks it took.
    fn dwell(
        tch: &mut Tachometer<'_, MockPin, TickTimer<'_>>,
        src: &TickSource,
    ) -> (CommutationState, u32) {
        let start = tch.state();
        for n in 1..=10_000 {
            src.tick();
            let s = tch.task().unwrap();
            if s != start {
                return (s, n);
            }
        }
        panic!("no transition out of {:?}", start);
    }

    #[test]
    fn init_releases_everything() {
        let src = TickSource::new(100);
        let speed = SharedSpeed::new();
        speed.set(90);
        let (mut tch, probe) = rig(&src, &speed);

        assert_eq!(tch.state(), CommutationState::Off);
        assert_eq!(speed.get(), 0);
        assert_eq!(probe.pattern(), PhasePattern::OFF);

        // Idempotent
        tch.init().unwrap();
        assert_eq!(tch.state(), CommutationState::Off);
    }

    #[test]
    fn stays_off_below_threshold() {
        let src = TickSource::new(100);
        let speed = SharedSpeed::new();
        let (mut tch, probe) = rig(&src, &speed);

        for v in 0..SPEED_MIN_KMH {
            speed.set(v);
            for _ in 0..100 {
                src.tick();
                assert_eq!(tch.task().unwrap(), CommutationState::Off);
            }
        }
        assert_eq!(probe.pattern(), PhasePattern::OFF);
        assert!(!tch.timer().is_running());
    }

    #[test]
    fn engages_and_cycles_at_60() {
        let src = TickSource::new(100);
        let speed = SharedSpeed::new();
        let (mut tch, probe) = rig(&src, &speed);

        speed.set(60);
        assert_eq!(tch.task().unwrap(), CommutationState::Step1);
        assert_eq!(probe.pattern(), CommutationState::Step1.pattern());

        let expected = src.ticks_for_us(step_delay_us(60));
        let order = [
            CommutationState::Step2,
            CommutationState::Step3,
            CommutationState::Step4,
            CommutationState::Step5,
            CommutationState::Step6,
            CommutationState::Step1,
            CommutationState::Step2,
        ];
        for want in order {
            let (got, ticks) = dwell(&mut tch, &src);
            assert_eq!(got, want);
            assert_eq!(ticks, expected);
            assert_eq!(probe.pattern(), want.pattern());
        }
    }

    #[test]
    fn dwell_is_resampled_every_sector() {
        let src = TickSource::new(100);
        let speed = SharedSpeed::new();
        let (mut tch, _probe) = rig(&src, &speed);

        speed.set(20);
        tch.task().unwrap();

        // Speed change mid-sector does not shorten the running sector
        for _ in 0..10 {
            src.tick();
            tch.task().unwrap();
        }
        speed.set(120);
        let (s, ticks) = dwell(&mut tch, &src);
        assert_eq!(s, CommutationState::Step2);
        assert_eq!(ticks + 10, src.ticks_for_us(step_delay_us(20)));

        // ... but the next one uses the speed seen at the edge
        let (s, ticks) = dwell(&mut tch, &src);
        assert_eq!(s, CommutationState::Step3);
        assert_eq!(ticks, src.ticks_for_us(step_delay_us(120)));

        speed.set(45);
        let (_, ticks) = dwell(&mut tch, &src);
        assert_eq!(ticks, src.ticks_for_us(step_delay_us(120)));
        let (_, ticks) = dwell(&mut tch, &src);
        assert_eq!(ticks, src.ticks_for_us(step_delay_us(45)));
    }

    #[test]
    fn drop_to_zero_mid_step3_goes_straight_off() {
        let src = TickSource::new(100);
        let speed = SharedSpeed::new();
        let (mut tch, probe) = rig(&src, &speed);

        speed.set(80);
        tch.task().unwrap();
        dwell(&mut tch, &src);
        let (s, _) = dwell(&mut tch, &src);
        assert_eq!(s, CommutationState::Step3);

        src.tick();
        tch.task().unwrap();
        speed.set(0);
        assert_eq!(tch.task().unwrap(), CommutationState::Off);
        assert_eq!(probe.pattern(), PhasePattern::OFF);
        assert!(!tch.timer().is_running());

        // And it does not come back by itself
        for _ in 0..5000 {
            src.tick();
            assert_eq!(tch.task().unwrap(), CommutationState::Off);
        }
    }

    #[test]
    fn any_sector_releases_within_one_call() {
        let src = TickSource::new(100);
        let speed = SharedSpeed::new();

        for sectors in 0..6 {
            let (mut tch, probe) = rig(&src, &speed);
            speed.set(160);
            tch.task().unwrap();
            for _ in 0..sectors {
                dwell(&mut tch, &src);
            }
            assert!(!tch.state().is_off());

            speed.set(SPEED_MIN_KMH - 1);
            assert_eq!(tch.task().unwrap(), CommutationState::Off);
            assert_eq!(probe.pattern(), PhasePattern::OFF);
        }
    }

    #[test]
    fn overspeed_is_clamped() {
        let src = TickSource::new(100);
        let speed = SharedSpeed::new();
        let (mut tch, _probe) = rig(&src, &speed);

        speed.set(1_000);
        tch.task().unwrap();
        let (_, ticks) = dwell(&mut tch, &src);
        assert_eq!(ticks, src.ticks_for_us(step_delay_us(SPEED_MAX_KMH)));
    }
}
