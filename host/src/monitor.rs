//! Live view of a panel over RTT.

use anyhow::{Context, Result};
use defmt_decoder::{DecodeError, StreamDecoder, Table};
use lsmcu_protocol::{
    COMMAND_CHANNEL, FeedResult, FrameReader, MAX_FRAME, PanelStatus, STATUS_CHANNEL,
};
use probe_rs::Permissions;
use probe_rs::probe::list::Lister;
use probe_rs::rtt::{Rtt, ScanRegion};
use std::fs;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::HostConfig;

pub async fn run(cfg: HostConfig) -> Result<()> {
    let probe_sel = cfg.probe.clone();
    let chip = cfg.chip.clone();

    info!("LSMCU monitor - RTT (chip={:?}, probe={:?})", chip, probe_sel);

    // Get list of available probes
    let lister = Lister::new();
    let probes = lister.list_all();

    if probes.is_empty() {
        error!("No debug probes found! Make sure ST-Link is connected.");
        return Err(anyhow::anyhow!("No probes found"));
    }

    info!("Found {} probe(s)", probes.len());

    // Open specific probe if configured, otherwise first
    let probe = if let Some(sel) = probe_sel {
        let mut parts = sel.split(':');
        let vid = parts.next();
        let pid = parts.next();
        let serial = parts.next();
        let chosen = probes
            .iter()
            .find(|p| {
                let ok_vid = vid
                    .and_then(|v| u16::from_str_radix(v, 16).ok())
                    .map(|v| p.vendor_id == v)
                    .unwrap_or(true);
                let ok_pid = pid
                    .and_then(|v| u16::from_str_radix(v, 16).ok())
                    .map(|v| p.product_id == v)
                    .unwrap_or(true);
                let ok_ser = serial
                    .map(|s| p.serial_number.as_deref() == Some(s))
                    .unwrap_or(true);
                ok_vid && ok_pid && ok_ser
            })
            .ok_or_else(|| anyhow::anyhow!("Configured probe not found: {}", sel))?;
        chosen.open().context("Failed to open selected probe")?
    } else {
        probes[0].open().context("Failed to open probe")?
    };

    let ts = match chip {
        Some(name) => probe_rs::config::TargetSelector::from(name),
        None => probe_rs::config::TargetSelector::Auto,
    };
    let mut session = probe
        .attach(ts, Permissions::default())
        .context("Failed to attach to target")?;

    let mut core = session.core(0)?;

    let mut rtt = Rtt::attach_region(&mut core, &ScanRegion::Ram).context("Failed to attach RTT")?;

    info!("RTT attached");
    for (idx, channel) in rtt.up_channels().iter().enumerate() {
        info!("  up{}: {}", idx, channel.name().unwrap_or("unnamed"));
    }
    for (idx, channel) in rtt.down_channels().iter().enumerate() {
        info!("  down{}: {}", idx, channel.name().unwrap_or("unnamed"));
    }

    let find_up = |rtt: &mut Rtt, name: &str| -> Option<usize> {
        rtt.up_channels()
            .iter()
            .position(|ch| ch.name() == Some(name))
    };
    let status_up_idx = if cfg.stream_status() {
        find_up(&mut rtt, STATUS_CHANNEL).or(Some(1))
    } else {
        None
    };
    let defmt_up_idx = if cfg.stream_defmt() {
        find_up(&mut rtt, "defmt").or(Some(0))
    } else {
        None
    };
    let down_idx = rtt
        .down_channels()
        .iter()
        .position(|ch| ch.name() == Some(COMMAND_CHANNEL))
        .unwrap_or(0);
    info!(
        "Using channels: status={:?}, defmt={:?}, commands=down{}",
        status_up_idx, defmt_up_idx, down_idx
    );

    // Startup commands, one frame each
    if let Some(channel) = rtt.down_channels().get_mut(down_idx) {
        let mut frame = [0u8; MAX_FRAME];
        for cmd in &cfg.startup {
            let bytes = lsmcu_protocol::encode(cmd, &mut frame)
                .with_context(|| format!("Failed to encode {:?}", cmd))?;
            let written = channel.write(&mut core, bytes)?;
            if written < bytes.len() {
                warn!("Down channel full, {:?} truncated", cmd);
            } else {
                info!("Sent {:?}", cmd);
            }
        }
    } else if !cfg.startup.is_empty() {
        warn!("No down channel, startup commands not sent");
    }

    // Prepare defmt decoder (ELF path)
    let default_elf = {
        let p = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../device/target/thumbv7em-none-eabihf/release/lsmcu");
        p.to_string_lossy().into_owned()
    };
    let defmt_table: Option<Table> = if defmt_up_idx.is_some() {
        let elf_path = cfg.elf.clone().unwrap_or(default_elf);
        let elf_bytes =
            fs::read(&elf_path).with_context(|| format!("Failed to read ELF at {}", elf_path))?;
        Some(
            Table::parse(&elf_bytes)
                .context("Parsing defmt table from ELF failed")?
                .ok_or_else(|| {
                    anyhow::anyhow!("No .defmt section in ELF; build device with defmt")
                })?,
        )
    } else {
        None
    };
    let mut defmt_stream: Option<Box<dyn StreamDecoder + Send + Sync + '_>> =
        defmt_table.as_ref().map(|t| t.new_stream_decoder());

    let mut buf = vec![0u8; 1024];
    let mut defbuf = vec![0u8; 2048];
    let mut frames = FrameReader::new();
    let mut last: Option<PanelStatus> = None;

    loop {
        if let Some(up_idx) = status_up_idx
            && let Some(channel) = rtt.up_channels().get_mut(up_idx)
        {
            let count = channel.read(&mut core, &mut buf)?;
            let mut window = &buf[..count];
            while !window.is_empty() {
                window = match frames.feed::<PanelStatus>(window) {
                    FeedResult::Consumed => break,
                    FeedResult::OverFull(rest) => {
                        warn!("Status frame too long, dropped");
                        rest
                    }
                    FeedResult::DeserError(rest) => {
                        warn!("Malformed status frame, dropped");
                        rest
                    }
                    FeedResult::Success { data, remaining } => {
                        // Only changes are worth a line
                        if last.as_ref() != Some(&data) {
                            log_status(&data);
                            last = Some(data);
                        }
                        remaining
                    }
                };
            }
        }

        if let (Some(up_idx), Some(stream)) = (defmt_up_idx, defmt_stream.as_mut())
            && let Some(channel) = rtt.up_channels().get_mut(up_idx)
        {
            let count = channel.read(&mut core, &mut defbuf)?;
            if count > 0 {
                stream.received(&defbuf[..count]);
                loop {
                    match stream.decode() {
                        Ok(frame) => {
                            println!("{}", frame.display(true));
                        }
                        Err(DecodeError::UnexpectedEof) => break,
                        Err(DecodeError::Malformed) => {
                            error!("Malformed defmt frame");
                            break;
                        }
                    }
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn log_status(status: &PanelStatus) {
    info!(
        speed_kmh = status.speed_kmh,
        sector = status.sector,
        stepper_power = status.stepper_power,
        "Panel"
    );
    for g in &status.gauges {
        info!(
            enabled = g.enabled,
            step = g.step,
            target = g.target_step,
            decibars = g.decibars,
            "{:?}",
            g.gauge
        );
    }
}
