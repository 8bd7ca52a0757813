use anyhow::{Context, Result};
use lsmcu_protocol::PanelCommand;
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf};

#[derive(Debug, Default, Deserialize, Clone)]
pub struct HostConfig {
    pub probe: Option<String>,        // e.g. "0483:374b:<serial>" or "0483:374b"
    pub chip: Option<String>,         // e.g. "STM32G431CBTx"
    pub elf: Option<String>,          // path to device ELF with .defmt
    pub stream_defmt: Option<bool>,   // default: true
    pub stream_status: Option<bool>,  // default: true
    /// Sent once after attaching, in order
    #[serde(default)]
    pub startup: Vec<PanelCommand>,
}

impl HostConfig {
    pub fn load_default() -> Option<Self> {
        // Priority: LSMCU_HOST_CONFIG env var, then ./lsmcu-host.toml if exists
        if let Ok(p) = env::var("LSMCU_HOST_CONFIG") {
            return Self::from_path(PathBuf::from(p));
        }
        let cwd = env::current_dir().ok()?;
        let p = cwd.join("lsmcu-host.toml");
        if p.exists() {
            return Self::from_path(p);
        }
        None
    }

    fn from_path(path: PathBuf) -> Option<Self> {
        match fs::read_to_string(&path) {
            Ok(s) => match toml::from_str::<HostConfig>(&s) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    tracing::error!("Failed to parse config (TOML) {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                tracing::error!("Failed to read config {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn stream_defmt(&self) -> bool {
        self.stream_defmt.unwrap_or(true)
    }

    pub fn stream_status(&self) -> bool {
        self.stream_status.unwrap_or(true)
    }
}

/// A command applied once the simulated clock reaches `at_ms`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ScheduledCommand {
    pub at_ms: u64,
    pub command: PanelCommand,
}

/// Offline run of the panel drives.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub duration_ms: u64,
    #[serde(default)]
    pub events: Vec<ScheduledCommand>,
}

impl Scenario {
    pub fn from_path(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::parse(&s).with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let mut scenario: Scenario = toml::from_str(s)?;
        // Stable, so same-time events keep file order
        scenario.events.sort_by_key(|e| e.at_ms);
        Ok(scenario)
    }
}

impl Default for Scenario {
    /// Spin the tachometer up to 80 km/h and swing both needles.
    fn default() -> Self {
        use lsmcu_protocol::Gauge;

        let at = |at_ms, command| ScheduledCommand { at_ms, command };
        let start = |gauge| PanelCommand::StartNeedle { gauge };
        let pressure = |gauge, decibars| PanelCommand::SetPressure { gauge, decibars };
        Self {
            duration_ms: 3_000,
            events: vec![
                at(0, start(Gauge::BrakePipe)),
                at(0, start(Gauge::BrakeCylinder)),
                at(0, PanelCommand::SetSpeed { kmh: 80 }),
                at(0, pressure(Gauge::BrakePipe, 50)),
                at(500, pressure(Gauge::BrakeCylinder, 38)),
                at(2_000, PanelCommand::SetSpeed { kmh: 0 }),
            ],
        }
    }
}
