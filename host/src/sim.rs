//! Offline run of the panel drives on the bench.
//!
//! Same drives as the firmware, clocked by a simulated tick instead of the board
//! timer, with pins that only log their edges.

use std::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use lsmcu_drive::mano::StepDir;
use lsmcu_drive::tch::CommutationState;
use lsmcu_drive::{
    Needle, NeedlePower, NeedleShared, PhasePins, SharedSpeed, TICK_PERIOD_US, Tachometer,
    TickSource, TickTimer,
};
use lsmcu_protocol::{Gauge, PanelCommand};
use tracing::{debug, info, trace};

use crate::config::Scenario;

/// Output line that traces its edges.
pub struct LogPin {
    name: &'static str,
    high: bool,
}

impl LogPin {
    pub fn new(name: &'static str) -> Self {
        Self { name, high: false }
    }
}

impl ErrorType for LogPin {
    type Error = Infallible;
}

impl OutputPin for LogPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        if self.high {
            trace!(pin = self.name, "low");
        }
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        if !self.high {
            trace!(pin = self.name, "high");
        }
        self.high = true;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaugeReport {
    pub gauge: Gauge,
    pub enabled: bool,
    pub step: u32,
    pub target_step: u32,
    pub decibars: u32,
    /// Times the needle landed on its target
    pub arrivals: u32,
}

/// End state of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub ticks: u64,
    pub sector_changes: u32,
    /// Length of the last completed sector, 0 if none completed
    pub last_dwell_us: u32,
    pub tachometer: CommutationState,
    pub gauges: Vec<GaugeReport>,
    pub stepper_power: bool,
}

/// Run `scenario` from power-up to `duration_ms`.
pub fn run(scenario: &Scenario) -> Report {
    let tick = TickSource::new(TICK_PERIOD_US);
    let speed = SharedSpeed::new();
    let shared = [NeedleShared::new(), NeedleShared::new()];

    let pins = PhasePins::new(
        [LogPin::new("INH_A"), LogPin::new("INH_B"), LogPin::new("INH_C")],
        [LogPin::new("PWM_A"), LogPin::new("PWM_B"), LogPin::new("PWM_C")],
    );
    let mut tachometer = Tachometer::new(pins, TickTimer::new(&tick), &speed);
    let Ok(()) = tachometer.init();

    let mut needles = [
        Needle::new(
            &shared[0],
            StepDir::new(LogPin::new("CG_STEP"), LogPin::new("CG_DIR"), false),
            &Gauge::BrakePipe.config(),
            &tick,
        ),
        Needle::new(
            &shared[1],
            StepDir::new(LogPin::new("CF_STEP"), LogPin::new("CF_DIR"), false),
            &Gauge::BrakeCylinder.config(),
            &tick,
        ),
    ];
    let mut arrivals = [0u32; 2];

    let mut power: NeedlePower<'_, LogPin, 2> = NeedlePower::new(LogPin::new("STEPPER_EN"));
    let Ok(()) = power.init();
    for needle in &needles {
        if power.register(needle.handle().shared()).is_err() {
            tracing::warn!("Stepper power registry full");
        }
    }

    let ticks_per_ms = u64::from(1_000 / TICK_PERIOD_US);
    let total = scenario.duration_ms * ticks_per_ms;
    let mut events = scenario.events.iter().peekable();
    let mut state = CommutationState::Off;
    let mut last_change = 0u32;
    let mut sector_changes = 0;
    let mut last_dwell_us = 0;

    info!(
        "Simulating {} ms ({} ticks of {} us), {} events",
        scenario.duration_ms,
        total,
        TICK_PERIOD_US,
        scenario.events.len()
    );

    for t in 0..total {
        let now_ms = t / ticks_per_ms;
        while let Some(event) = events.next_if(|e| e.at_ms <= now_ms) {
            debug!(at_ms = now_ms, "{:?}", event.command);
            match event.command {
                PanelCommand::SetSpeed { kmh } => speed.set(kmh),
                PanelCommand::SetPressure { gauge, decibars } => {
                    needles[gauge.index()].set_target(decibars)
                }
                PanelCommand::StartNeedle { gauge } => needles[gauge.index()].start_needle(),
                PanelCommand::StopNeedle { gauge } => needles[gauge.index()].stop_needle(),
            }
        }

        tick.tick();

        let Ok(next) = tachometer.task();
        if next != state {
            let now = tick.now();
            let dwell_us = now.wrapping_sub(last_change) * tick.period_us();
            if state.is_off() {
                info!(at_ms = now_ms, "Tachometer engaged at {} km/h", speed.get());
            } else if next.is_off() {
                info!(at_ms = now_ms, "Tachometer released after sector {}", state.sector());
            } else {
                last_dwell_us = dwell_us;
                debug!(
                    at_ms = now_ms,
                    "Sector {} -> {} after {} us",
                    state.sector(),
                    next.sector(),
                    dwell_us
                );
            }
            state = next;
            last_change = now;
            sector_changes += 1;
        }

        for (i, needle) in needles.iter_mut().enumerate() {
            let Ok(stepped) = needle.task();
            let h = needle.handle();
            if stepped.is_some() && h.current_step() == h.target_step() {
                arrivals[i] += 1;
                info!(
                    at_ms = now_ms,
                    "{:?} needle arrived on step {} ({} dbar)",
                    Gauge::ALL[i],
                    h.current_step(),
                    h.get_pressure()
                );
            }
        }

        let Ok(_) = power.manage();
    }

    let gauges = Gauge::ALL
        .iter()
        .zip(&needles)
        .zip(arrivals)
        .map(|((&gauge, needle), arrivals)| {
            let h = needle.handle();
            GaugeReport {
                gauge,
                enabled: h.is_enabled(),
                step: h.current_step(),
                target_step: h.target_step(),
                decibars: h.get_pressure(),
                arrivals,
            }
        })
        .collect();

    Report {
        ticks: total,
        sector_changes,
        last_dwell_us,
        tachometer: state,
        gauges,
        stepper_power: power.is_powered(),
    }
}
