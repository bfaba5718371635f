use std::path::PathBuf;

use clap::Parser;

use airsweep::config::ScanConfig;

#[derive(Parser)]
#[command(name = "airsweep")]
#[command(author, version, about = "Passive 802.11 spectrum scanner")]
pub struct Cli {
    /// Wireless interface to capture on
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Replay a capture file instead of capturing live
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Tune to this channel before scanning
    #[arg(short = 'C', long)]
    pub channel: Option<u32>,

    /// Stay on one channel instead of hopping
    #[arg(long)]
    pub no_scan: bool,

    /// Dwell time per channel in milliseconds
    #[arg(short, long)]
    pub dwell: Option<u64>,

    /// Scan only channel numbers up to this bound
    #[arg(short, long)]
    pub upper: Option<u32>,

    /// Seconds without a frame before a station is dropped
    #[arg(short = 't', long)]
    pub node_timeout: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Resolve the effective configuration: file values first, command
    /// line flags override.
    pub fn merge_config(&self, mut config: ScanConfig) -> ScanConfig {
        if let Some(interface) = &self.interface {
            config.interface = interface.clone();
        }
        if let Some(file) = &self.file {
            config.capture_file = Some(file.clone());
        }
        if let Some(channel) = self.channel {
            config.channel_initial = Some(channel);
        }
        if self.no_scan {
            config.channel_scan = false;
        }
        if let Some(dwell) = self.dwell {
            config.channel_dwell_ms = dwell;
        }
        if let Some(upper) = self.upper {
            config.channel_upper = Some(upper);
        }
        if let Some(timeout) = self.node_timeout {
            config.node_timeout_secs = timeout;
        }
        config
    }
}
