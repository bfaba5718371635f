use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Scanner configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Wireless interface to capture on
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Seconds without a frame before a station is dropped
    #[serde(default = "default_node_timeout")]
    pub node_timeout_secs: u64,

    /// Dwell time per channel in milliseconds
    #[serde(default = "default_dwell")]
    pub channel_dwell_ms: u64,

    /// Automatic channel hopping on startup
    #[serde(default = "default_true")]
    pub channel_scan: bool,

    /// Restrict the scan to channel numbers up to this bound
    #[serde(default)]
    pub channel_upper: Option<u32>,

    /// Channel to tune to before the first hop
    #[serde(default)]
    pub channel_initial: Option<u32>,

    /// Replay this capture file instead of capturing live
    #[serde(default)]
    pub capture_file: Option<PathBuf>,

    /// pcap buffer size in bytes
    #[serde(default = "default_buffer")]
    pub capture_buffer: i32,
}

fn default_interface() -> String {
    "wlan0".to_string()
}

fn default_node_timeout() -> u64 {
    60
}

fn default_dwell() -> u64 {
    250
}

fn default_true() -> bool {
    true
}

fn default_buffer() -> i32 {
    65536
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            node_timeout_secs: default_node_timeout(),
            channel_dwell_ms: default_dwell(),
            channel_scan: true,
            channel_upper: None,
            channel_initial: None,
            capture_file: None,
            capture_buffer: default_buffer(),
        }
    }
}

impl ScanConfig {
    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: ScanConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from the default locations or fall back to defaults.
    pub fn load_or_default() -> Result<Self> {
        let paths = [
            PathBuf::from("/etc/airsweep/config.toml"),
            dirs_next::config_dir()
                .map(|p| p.join("airsweep/config.toml"))
                .unwrap_or_default(),
            PathBuf::from("airsweep.toml"),
        ];

        for path in &paths {
            if path.is_file() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }
}
