use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;

use cli::Cli;

use airsweep::channel::{channel_to_freq, CHANNELS_2GHZ, CHANNELS_5GHZ};
use airsweep::{
    Band, CaptureError, ChanWidth, Channel, ChannelError, ChannelPlan, Command, FrameSource,
    MonitorInterface, RadioControl, ScanConfig, Scanner,
};

/// Cadence of the live status line.
const REPORT_INTERVAL: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::load_or_default()?,
    };
    let config = cli.merge_config(config);

    if let Err(e) = run(config) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn run(config: ScanConfig) -> Result<()> {
    match config.capture_file.clone() {
        Some(path) => run_offline(&config, &path),
        None => run_live(&config),
    }
}

fn run_live(config: &ScanConfig) -> Result<()> {
    let iface = MonitorInterface::get(&config.interface)
        .with_context(|| format!("Interface {} not usable", config.interface))?;
    iface
        .enable_monitor()
        .context("Failed to enable monitor mode (need root/CAP_NET_ADMIN)")?;

    let (channels, bands) = iface
        .channel_list()
        .context("Failed to discover channel list")?;
    let plan = ChannelPlan::new(
        channels,
        bands,
        Duration::from_millis(config.channel_dwell_ms),
    )
    .context("No usable channels discovered")?;

    let mut radio = iface;
    let mut scanner = new_scanner(config, plan);
    if let Some(freq) = radio.current_frequency() {
        scanner.plan_mut().mark_current_freq(freq);
    }
    apply_initial_channel(&mut scanner, &mut radio, config)?;

    let mut source = FrameSource::open_live(&config.interface, config.capture_buffer)
        .with_context(|| format!("Failed to open capture on {}", config.interface))?;
    let link = source.link_type();

    let mut last_report = Instant::now();
    loop {
        let now = Instant::now();
        match source.next_frame() {
            // decode failures are counted and logged inside the scanner
            Ok(Some(data)) => {
                let _ = scanner.process_frame(link, data, now);
            }
            Ok(None) => {}
            Err(CaptureError::EndOfCapture) => break,
            Err(err) => return Err(err.into()),
        }
        scanner.tick(&mut radio, now);

        if now.saturating_duration_since(last_report) >= REPORT_INTERVAL {
            let stats = scanner.stats();
            info!(
                "{} stations, {} networks, channel {:?}, {} frames ({} dropped)",
                scanner.nodes().len(),
                scanner.essids().groups().len(),
                scanner.plan().current_channel(),
                stats.frames,
                stats.decode_errors,
            );
            last_report = now;
        }
    }

    print_summary(&scanner);
    Ok(())
}

fn run_offline(config: &ScanConfig, path: &std::path::Path) -> Result<()> {
    let plan = replay_plan(config)?;
    let mut scanner = new_scanner(config, plan);
    // replaying a file: channel changes would be meaningless
    scanner.plan_mut().set_scanning(false);
    let mut radio = ReplayRadio;

    let mut source = FrameSource::open_file(path)
        .with_context(|| format!("Failed to open capture file {}", path.display()))?;
    let link = source.link_type();

    loop {
        let now = Instant::now();
        match source.next_frame() {
            Ok(Some(data)) => {
                let _ = scanner.process_frame(link, data, now);
            }
            Ok(None) => {}
            Err(CaptureError::EndOfCapture) => break,
            Err(err) => return Err(err.into()),
        }
        scanner.tick(&mut radio, now);
    }

    print_summary(&scanner);
    Ok(())
}

fn new_scanner(config: &ScanConfig, plan: ChannelPlan) -> Scanner {
    let mut scanner = Scanner::new(plan, Duration::from_secs(config.node_timeout_secs));
    scanner.plan_mut().set_scanning(config.channel_scan);
    scanner.plan_mut().set_upper(config.channel_upper);
    scanner
}

fn apply_initial_channel(
    scanner: &mut Scanner,
    radio: &mut dyn RadioControl,
    config: &ScanConfig,
) -> Result<()> {
    if let Some(chan) = config.channel_initial {
        scanner
            .command(radio, Command::SetChannel(chan), Instant::now())
            .with_context(|| format!("Failed to tune to channel {chan}"))?;
    }
    Ok(())
}

/// Channel plan for offline replay, seeded from the standard 2.4/5 GHz
/// channel tables since there is no radio to discover them from.
fn replay_plan(config: &ScanConfig) -> Result<ChannelPlan> {
    let mut channels = Vec::new();
    for &chan in CHANNELS_2GHZ.iter().chain(CHANNELS_5GHZ) {
        if let Some(freq) = channel_to_freq(chan) {
            channels.push(Channel { chan, freq });
        }
    }
    let bands = vec![
        Band {
            num_channels: CHANNELS_2GHZ.len(),
            max_chan_width: ChanWidth::Width20,
            streams_rx: 1,
            streams_tx: 1,
        },
        Band {
            num_channels: CHANNELS_5GHZ.len(),
            max_chan_width: ChanWidth::Width20,
            streams_rx: 1,
            streams_tx: 1,
        },
    ];
    Ok(ChannelPlan::new(
        channels,
        bands,
        Duration::from_millis(config.channel_dwell_ms),
    )?)
}

/// No-op radio for offline replay.
struct ReplayRadio;

impl RadioControl for ReplayRadio {
    fn set_frequency(
        &mut self,
        _freq_mhz: u32,
        _width: ChanWidth,
        _center_mhz: u32,
    ) -> Result<(), ChannelError> {
        Ok(())
    }
}

fn print_summary(scanner: &Scanner) {
    let stats = scanner.stats();
    println!(
        "{} frames decoded, {} dropped, {} unattributable",
        stats.frames, stats.decode_errors, stats.ignored
    );

    let mut nodes: Vec<_> = scanner.nodes().nodes().iter().collect();
    nodes.sort_by_key(|(mac, _)| *mac.as_bytes());
    for (mac, node) in nodes {
        println!(
            "{mac}  {:>5}  ch {:>3}  snr {:>4.1} ({}..{})  {} pkts, {} retries{}",
            node.mode.to_string(),
            node.channel,
            node.snr_avg,
            node.snr_min,
            node.snr_max,
            node.pkt_count,
            node.retries_all,
            node.essid
                .as_deref()
                .map(|e| format!("  \"{e}\""))
                .unwrap_or_default(),
        );
    }

    for (essid, group) in scanner.essids().groups() {
        println!(
            "network \"{essid}\": {} stations{}",
            group.len(),
            if group.is_split() { "  [SPLIT]" } else { "" }
        );
    }
}
