#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU8, Ordering};

use embassy_executor::Spawner;
use embassy_stm32::Peri;
use embassy_stm32::gpio::{Level, Output, Pin, Speed};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::{Duration, Ticker, Timer};
use embedded_io_async::{Read, Write};
use lsmcu_drive::mano::StepDir;
use lsmcu_drive::{Needle, PhasePins, TICK_PERIOD_US};
use lsmcu_protocol::{FeedResult, FrameReader, Gauge, MAX_FRAME, PanelCommand};
use rtt_target::{ChannelMode::*, rtt_init};
use static_cell::StaticCell;

mod rtt_io;
use rtt_io::{RttReader, RttWriter};

mod panel;
use panel::Panel;

// Use panic-probe for panics
use panic_probe as _;

const COMMAND_QUEUE: usize = 8;
const STATUS_PERIOD: Duration = Duration::from_millis(100);

type CommandChannel = Channel<CriticalSectionRawMutex, PanelCommand, COMMAND_QUEUE>;

/// Commands decoded from RTT, drained by the panel loop between ticks
static COMMANDS: CommandChannel = Channel::new();

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum DeviceState {
    Boot = 0,
    WaitingLink = 1,
    Linked = 2,
}

static DEVICE_STATE: AtomicU8 = AtomicU8::new(DeviceState::Boot as u8);

fn set_device_state(s: DeviceState) {
    DEVICE_STATE.store(s as u8, Ordering::Relaxed);
}

fn get_device_state() -> DeviceState {
    match DEVICE_STATE.load(Ordering::Relaxed) {
        1 => DeviceState::WaitingLink,
        2 => DeviceState::Linked,
        _ => DeviceState::Boot,
    }
}

/// Actuator line, parked low until its drive takes over
fn low(pin: Peri<'static, impl Pin>) -> Output<'static> {
    Output::new(pin, Level::Low, Speed::Low)
}

/// RTT channel storage
static RTT_UP_CHANNEL: StaticCell<rtt_target::UpChannel> = StaticCell::new();
static RTT_DOWN_CHANNEL: StaticCell<rtt_target::DownChannel> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // defmt on up 0, status frames on up 1, commands on down 0
    let channels = rtt_init! {
        up: {
            0: { size: 1024, mode: NoBlockSkip, name: "defmt" }
            1: { size: 512, mode: NoBlockSkip, name: "panel" }
        }
        down: {
            0: { size: 256, name: "panel-down" }
        }
    };

    rtt_target::set_defmt_channel(channels.up.0);

    let status_tx = RttWriter::new(RTT_UP_CHANNEL.init_with(|| channels.up.1));
    let command_rx = RttReader::new(RTT_DOWN_CHANNEL.init_with(|| channels.down.0));

    // Initialize STM32 with HSE=8MHz feeding PLL to 170MHz SYSCLK
    let p = {
        let mut config = embassy_stm32::Config::default();
        {
            use embassy_stm32::rcc::*;
            use embassy_stm32::time::Hertz;
            config.rcc.hse = Some(Hse {
                freq: Hertz(8_000_000),
                mode: HseMode::Oscillator,
            });
            // VCO in: 8MHz / 2 = 4MHz; VCO: 4MHz * 85 = 340MHz; SYSCLK: 340MHz / 2 = 170MHz
            config.rcc.pll = Some(Pll {
                source: PllSource::HSE,
                prediv: PllPreDiv::DIV2,
                mul: PllMul::MUL85,
                divp: None,
                divq: None,
                divr: Some(PllRDiv::DIV2),
            });
            config.rcc.sys = Sysclk::PLL1_R;
            // Above 150MHz, enable Range1 boost mode per RM0440 guidance
            config.rcc.boost = true;
        }
        embassy_stm32::init(config)
    };

    defmt::info!("LSMCU panel starting");

    let tach_pins = PhasePins::new(
        [low(p.PA0), low(p.PA1), low(p.PA2)],
        [low(p.PA3), low(p.PA4), low(p.PA5)],
    );

    let cg = Needle::new(
        panel::needle_shared(Gauge::BrakePipe),
        StepDir::new(low(p.PB0), low(p.PB1), false),
        &Gauge::BrakePipe.config(),
        &panel::TICK,
    );
    let cf = Needle::new(
        panel::needle_shared(Gauge::BrakeCylinder),
        StepDir::new(low(p.PB3), low(p.PB4), false),
        &Gauge::BrakeCylinder.config(),
        &panel::TICK,
    );

    let panel = Panel::new(tach_pins, [cg, cf], low(p.PB5));
    for gauge in Gauge::ALL {
        panel::handle(gauge).start_needle();
    }

    let mut led = Output::new(p.PC6, Level::Low, Speed::Low);

    spawner.spawn(panel_loop(panel, COMMANDS.receiver())).unwrap();
    spawner.spawn(command_reader(command_rx, COMMANDS.sender())).unwrap();
    spawner.spawn(status_reporter(status_tx)).unwrap();

    set_device_state(DeviceState::WaitingLink);

    defmt::info!("All tasks spawned, entering LED status loop");

    loop {
        match get_device_state() {
            DeviceState::Boot => {
                // Quick double blink
                for _ in 0..2 {
                    led.set_high();
                    Timer::after(Duration::from_millis(100)).await;
                    led.set_low();
                    Timer::after(Duration::from_millis(100)).await;
                }
                Timer::after(Duration::from_millis(600)).await;
            }
            DeviceState::WaitingLink => {
                // Slow blink (1 Hz, 10% duty)
                led.set_high();
                Timer::after(Duration::from_millis(100)).await;
                led.set_low();
                Timer::after(Duration::from_millis(900)).await;
            }
            DeviceState::Linked => {
                led.set_high();
                Timer::after(Duration::from_millis(500)).await;
            }
        }
    }
}

/// Panel tick: pending commands first, then every drive once.
#[embassy_executor::task]
async fn panel_loop(
    mut panel: Panel,
    commands: Receiver<'static, CriticalSectionRawMutex, PanelCommand, COMMAND_QUEUE>,
) {
    defmt::info!("Panel loop started, tick {} us", TICK_PERIOD_US);

    let mut ticker = Ticker::every(Duration::from_micros(TICK_PERIOD_US as u64));
    loop {
        ticker.next().await;

        while let Ok(cmd) = commands.try_receive() {
            panel.apply(&cmd);
        }

        panel.tick();
    }
}

/// Decode command frames from the RTT down channel.
#[embassy_executor::task]
async fn command_reader(
    mut rx: RttReader,
    commands: Sender<'static, CriticalSectionRawMutex, PanelCommand, COMMAND_QUEUE>,
) {
    let mut reader = FrameReader::new();
    let mut buf = [0u8; MAX_FRAME];

    loop {
        let n = match rx.read(&mut buf).await {
            Ok(0) | Err(_) => {
                Timer::after(Duration::from_millis(1)).await;
                continue;
            }
            Ok(n) => n,
        };

        let mut window = &buf[..n];
        while !window.is_empty() {
            window = match reader.feed::<PanelCommand>(window) {
                FeedResult::Consumed => break,
                FeedResult::OverFull(rest) => {
                    defmt::warn!("Command frame too long, dropped");
                    rest
                }
                FeedResult::DeserError(rest) => {
                    defmt::warn!("Malformed command frame, dropped");
                    rest
                }
                FeedResult::Success { data, remaining } => {
                    set_device_state(DeviceState::Linked);
                    if commands.try_send(data).is_err() {
                        defmt::warn!("Command queue full, dropped");
                    }
                    remaining
                }
            };
        }
    }
}

/// Publish a panel snapshot to the host at a fixed rate.
#[embassy_executor::task]
async fn status_reporter(mut tx: RttWriter) {
    defmt::info!("Status reporter started");

    let mut ticker = Ticker::every(STATUS_PERIOD);
    let mut buf = [0u8; MAX_FRAME];
    loop {
        ticker.next().await;

        let status = panel::status::snapshot();
        defmt::trace!("{}", status);
        match lsmcu_protocol::encode(&status, &mut buf) {
            Ok(frame) => {
                // A full channel means no host is draining it
                let _ = tx.write_all(frame).await;
            }
            Err(_) => defmt::error!("Status does not fit a frame"),
        }
    }
}
