//! Messages exchanged between the bench host and the panel over RTT.
//!
//! Every message is postcard encoded and COBS framed, so a zero byte always ends a
//! frame and a reader can pick up mid-stream.
#![no_std]

use heapless::Vec;
use lsmcu_drive::NeedleConfig;
use serde::{Deserialize, Serialize};

pub use postcard::accumulator::{CobsAccumulator, FeedResult};

/// Largest encoded frame, delimiter included.
pub const MAX_FRAME: usize = 64;

/// RTT up channel carrying [`PanelStatus`] frames.
pub const STATUS_CHANNEL: &str = "panel";
/// RTT down channel carrying [`PanelCommand`] frames.
pub const COMMAND_CHANNEL: &str = "panel-down";

/// Pressure gauges fitted to the panel
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gauge {
    /// Brake pipe (CG)
    BrakePipe,
    /// Brake cylinder (CF)
    BrakeCylinder,
}

impl Gauge {
    pub const ALL: [Gauge; 2] = [Gauge::BrakePipe, Gauge::BrakeCylinder];

    pub fn index(self) -> usize {
        match self {
            Gauge::BrakePipe => 0,
            Gauge::BrakeCylinder => 1,
        }
    }

    /// Dial fitted to the panel for this gauge.
    pub const fn config(self) -> NeedleConfig {
        match self {
            Gauge::BrakePipe => BRAKE_PIPE,
            Gauge::BrakeCylinder => BRAKE_CYLINDER,
        }
    }
}

/// Brake pipe, 0-10 bar over 900 steps
pub const BRAKE_PIPE: NeedleConfig = NeedleConfig {
    pressure_max_decibars: 100,
    pressure_max_steps: 900,
    inertia_steps: 30,
    speed_max_steps_per_s: 600,
    start_step: 0,
};

/// Brake cylinder, 0-6 bar over 540 steps
pub const BRAKE_CYLINDER: NeedleConfig = NeedleConfig {
    pressure_max_decibars: 60,
    pressure_max_steps: 540,
    inertia_steps: 30,
    speed_max_steps_per_s: 600,
    start_step: 0,
};

/// Host -> panel
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelCommand {
    SetSpeed { kmh: u32 },
    SetPressure { gauge: Gauge, decibars: u32 },
    StartNeedle { gauge: Gauge },
    StopNeedle { gauge: Gauge },
}

/// Snapshot of one gauge
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GaugeStatus {
    pub gauge: Gauge,
    pub enabled: bool,
    pub step: u32,
    pub target_step: u32,
    pub decibars: u32,
}

/// Panel -> host, sent periodically
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelStatus {
    pub speed_kmh: u32,
    /// Tachometer sector, 1-6, 0 when off
    pub sector: u8,
    pub gauges: Vec<GaugeStatus, 2>,
    pub stepper_power: bool,
}

/// Encode `msg` as one COBS frame into `buf`, returning the used part.
pub fn encode<'b, T: Serialize>(msg: &T, buf: &'b mut [u8]) -> postcard::Result<&'b mut [u8]> {
    postcard::to_slice_cobs(msg, buf)
}

/// Stream decoder, one per direction.
pub type FrameReader = CobsAccumulator<MAX_FRAME>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> PanelStatus {
        let mut gauges = Vec::new();
        gauges
            .push(GaugeStatus {
                gauge: Gauge::BrakePipe,
                enabled: true,
                step: 312,
                target_step: 300,
                decibars: 52,
            })
            .unwrap();
        gauges
            .push(GaugeStatus {
                gauge: Gauge::BrakeCylinder,
                enabled: false,
                step: 0,
                target_step: 0,
                decibars: 0,
            })
            .unwrap();
        PanelStatus {
            speed_kmh: 87,
            sector: 4,
            gauges,
            stepper_power: true,
        }
    }

    #[test]
    fn largest_status_fits_a_frame() {
        let mut s = status();
        s.speed_kmh = u32::MAX;
        for g in s.gauges.iter_mut() {
            g.step = u32::MAX;
            g.target_step = u32::MAX;
            g.decibars = u32::MAX;
        }
        let mut buf = [0u8; MAX_FRAME];
        assert!(encode(&s, &mut buf).is_ok());
    }

    #[test]
    fn frames_survive_chunked_stream() {
        let mut stream = [0u8; 3 * MAX_FRAME];
        let mut len = 0;
        let commands = [
            PanelCommand::SetSpeed { kmh: 60 },
            PanelCommand::SetPressure {
                gauge: Gauge::BrakeCylinder,
                decibars: 38,
            },
            PanelCommand::StopNeedle {
                gauge: Gauge::BrakePipe,
            },
        ];
        for cmd in &commands {
            len += encode(cmd, &mut stream[len..]).unwrap().len();
        }

        let mut reader = FrameReader::new();
        let mut decoded = [None, None, None];
        let mut n = 0;
        for chunk in stream[..len].chunks(5) {
            let mut window = chunk;
            while !window.is_empty() {
                window = match reader.feed::<PanelCommand>(window) {
                    FeedResult::Consumed => break,
                    FeedResult::OverFull(rest) | FeedResult::DeserError(rest) => rest,
                    FeedResult::Success { data, remaining } => {
                        decoded[n] = Some(data);
                        n += 1;
                        remaining
                    }
                };
            }
        }

        assert_eq!(n, 3);
        for (got, want) in decoded.iter().zip(commands.iter()) {
            assert_eq!(got.as_ref(), Some(want));
        }
    }

    #[test]
    fn status_decodes_from_frame() {
        let mut buf = [0u8; MAX_FRAME];
        let frame = encode(&status(), &mut buf).unwrap();
        assert_eq!(frame.last(), Some(&0));
        let back: PanelStatus = postcard::from_bytes_cobs(frame).unwrap();
        assert_eq!(back, status());
    }

    #[test]
    fn dials_map_full_scale_onto_the_step_range() {
        for g in Gauge::ALL {
            let config = g.config();
            let scale = config.scale();
            assert_eq!(scale.to_step(config.pressure_max_decibars), config.pressure_max_steps);
            assert_eq!(scale.to_decibars(config.pressure_max_steps), config.pressure_max_decibars);
            assert!(config.start_step <= config.pressure_max_steps);
        }
        assert_eq!(Gauge::BrakePipe.config(), BRAKE_PIPE);
        assert_eq!(Gauge::BrakeCylinder.config().pressure_max_decibars, 60);
    }

    #[test]
    fn gauge_indices_are_dense() {
        for (i, g) in Gauge::ALL.iter().enumerate() {
            assert_eq!(g.index(), i);
        }
    }
}
