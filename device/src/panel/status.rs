//! Snapshot of the panel for the host.

use heapless::Vec;
use lsmcu_protocol::{Gauge, GaugeStatus, PanelStatus};

use super::{SPEED, handle};

/// Read every shared value once. Safe from any task.
pub fn snapshot() -> PanelStatus {
    let mut gauges = Vec::new();
    for gauge in Gauge::ALL {
        let h = handle(gauge);
        // Two gauges, two slots
        let _ = gauges.push(GaugeStatus {
            gauge,
            enabled: h.is_enabled(),
            step: h.current_step(),
            target_step: h.target_step(),
            decibars: h.get_pressure(),
        });
    }

    PanelStatus {
        speed_kmh: SPEED.get(),
        // An unknown raw value reads as off
        sector: super::tachometer_state().map_or(0, |s| s.sector()),
        gauges,
        stepper_power: super::stepper_powered(),
    }
}
