//! Panel actuators of the LSMCU cab
//!
//! - Tachometer: 3-phase commutated dial motor, INH_A..C on PA0-PA2, PWM_A..C on PA3-PA5
//! - Brake pipe gauge (CG): step PB0, dir PB1, 0-10 bar over 900 steps
//! - Brake cylinder gauge (CF): step PB3, dir PB4, 0-6 bar over 540 steps
//! - Stepper driver power: PB5

pub mod status;

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use embassy_stm32::gpio::Output;
use lsmcu_drive::mano::StepDir;
use lsmcu_drive::tch::CommutationState;
use lsmcu_drive::{
    Needle, NeedleHandle, NeedlePower, NeedleShared, PhasePins, SharedSpeed, TICK_PERIOD_US,
    Tachometer, TickSource, TickTimer,
};
use lsmcu_protocol::{Gauge, PanelCommand};

pub type TachometerDrive = Tachometer<'static, Output<'static>, TickTimer<'static>>;
pub type GaugeNeedle = Needle<'static, StepDir<Output<'static>, Output<'static>>>;
pub type StepperPower = NeedlePower<'static, Output<'static>, 2>;

/// Panel tick, advanced by the panel loop only
pub static TICK: TickSource = TickSource::new(TICK_PERIOD_US);

/// Road speed shown on the tachometer, km/h
pub static SPEED: SharedSpeed = SharedSpeed::new();

static NEEDLE_CG: NeedleShared = NeedleShared::new();
static NEEDLE_CF: NeedleShared = NeedleShared::new();

pub fn needle_shared(gauge: Gauge) -> &'static NeedleShared {
    match gauge {
        Gauge::BrakePipe => &NEEDLE_CG,
        Gauge::BrakeCylinder => &NEEDLE_CF,
    }
}

/// Handle for a gauge, usable from any context.
pub fn handle(gauge: Gauge) -> NeedleHandle<'static> {
    NeedleHandle::new(needle_shared(gauge), gauge.config().scale())
}

static TACHOMETER_SECTOR: AtomicU8 = AtomicU8::new(CommutationState::Off as u8);
static STEPPER_POWER: AtomicBool = AtomicBool::new(false);

/// Tachometer state as last published by the panel loop.
///
/// `None` if the stored value is not a known state; readers then skip it.
pub fn tachometer_state() -> Option<CommutationState> {
    CommutationState::from_raw(TACHOMETER_SECTOR.load(Ordering::Relaxed))
}

pub fn stepper_powered() -> bool {
    STEPPER_POWER.load(Ordering::Relaxed)
}

/// Every actuator of the panel, driven from one loop.
pub struct Panel {
    tachometer: TachometerDrive,
    needles: [GaugeNeedle; 2],
    power: StepperPower,
}

impl Panel {
    /// Configure every output and park the actuators.
    pub fn new(
        tach_pins: PhasePins<Output<'static>>,
        needles: [GaugeNeedle; 2],
        power_enable: Output<'static>,
    ) -> Self {
        let mut tachometer = Tachometer::new(tach_pins, TickTimer::new(&TICK), &SPEED);
        let Ok(()) = tachometer.init();

        let mut power = NeedlePower::new(power_enable);
        let Ok(()) = power.init();
        for needle in &needles {
            if power.register(needle.handle().shared()).is_err() {
                defmt::error!("Stepper power registry full");
            }
        }

        defmt::info!("Panel ready: {} needles on the stepper rail", power.len());

        Self {
            tachometer,
            needles,
            power,
        }
    }

    pub fn apply(&mut self, cmd: &PanelCommand) {
        match cmd {
            PanelCommand::SetSpeed { kmh } => {
                defmt::debug!("Speed set: {} km/h", kmh);
                SPEED.set(*kmh);
            }
            PanelCommand::SetPressure { gauge, decibars } => {
                defmt::debug!("{} target: {} dbar", gauge, decibars);
                handle(*gauge).set_target(*decibars);
            }
            PanelCommand::StartNeedle { gauge } => {
                defmt::info!("{} started", gauge);
                handle(*gauge).start_needle();
            }
            PanelCommand::StopNeedle { gauge } => {
                defmt::info!("{} stopped", gauge);
                handle(*gauge).stop_needle();
            }
        }
    }

    /// One panel tick: advance time, then run every drive once.
    pub fn tick(&mut self) {
        TICK.tick();

        let Ok(state) = self.tachometer.task();
        TACHOMETER_SECTOR.store(state.sector(), Ordering::Relaxed);

        for needle in self.needles.iter_mut() {
            let Ok(_) = needle.task();
        }

        let Ok(powered) = self.power.manage();
        STEPPER_POWER.store(powered, Ordering::Relaxed);
    }
}
