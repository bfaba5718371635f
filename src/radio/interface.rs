//! Radio Control Backend
//!
//! Linux implementation of the radio seam: interface discovery over
//! nl80211 (via neli-wifi), channel/band discovery and frequency
//! changes through the `iw` command, interface up/down via `ip`.
//! Requires root or CAP_NET_ADMIN for anything that changes state.

use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

use crate::channel::{Band, ChanWidth, Channel, ChannelError, RadioControl, MAX_CHANNELS};

#[derive(Debug, Error)]
pub enum RadioError {
    #[error("nl80211 socket: {0}")]
    Socket(String),

    #[error("nl80211: {0}")]
    Nl80211(String),

    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("system error: {0}")]
    System(String),
}

/// A wireless interface driven into monitor mode for the scan.
#[derive(Debug)]
pub struct MonitorInterface {
    /// Interface name (wlan0, ...)
    pub name: String,
    pub ifindex: i32,
    /// Physical device index (phy0, ...)
    pub wiphy: u32,
    /// Frequency the radio is currently on, if reported
    pub frequency: Option<u32>,
}

impl MonitorInterface {
    /// Look an interface up by name over nl80211.
    pub fn get(name: &str) -> Result<Self, RadioError> {
        let mut socket =
            neli_wifi::Socket::connect().map_err(|e| RadioError::Socket(e.to_string()))?;
        let interfaces = socket
            .get_interfaces_info()
            .map_err(|e| RadioError::Nl80211(e.to_string()))?;

        for iface in interfaces {
            let iface_name = iface
                .name
                .as_ref()
                .map(|n| String::from_utf8_lossy(n).trim_end_matches('\0').to_string())
                .unwrap_or_default();
            if iface_name != name {
                continue;
            }
            return Ok(Self {
                name: iface_name,
                ifindex: iface.index.unwrap_or(0),
                wiphy: iface.phy.unwrap_or(0),
                frequency: iface.frequency,
            });
        }
        Err(RadioError::InterfaceNotFound(name.to_string()))
    }

    /// Frequency the radio currently reports, re-queried over nl80211.
    pub fn current_frequency(&self) -> Option<u32> {
        let mut socket = neli_wifi::Socket::connect().ok()?;
        let interfaces = socket.get_interfaces_info().ok()?;
        interfaces
            .into_iter()
            .find(|i| i.index == Some(self.ifindex))
            .and_then(|i| i.frequency)
    }

    /// Put the interface into monitor mode (down, set type, up).
    pub fn enable_monitor(&self) -> Result<(), RadioError> {
        run_cmd("ip", &["link", "set", &self.name, "down"])?;
        run_cmd("iw", &["dev", &self.name, "set", "type", "monitor"])?;
        run_cmd("ip", &["link", "set", &self.name, "up"])?;
        info!("{} switched to monitor mode", self.name);
        Ok(())
    }

    /// Discover the supported channels and band capabilities from
    /// `iw phy <phy> info`.
    pub fn channel_list(&self) -> Result<(Vec<Channel>, Vec<Band>), RadioError> {
        let phy = format!("phy{}", self.wiphy);
        let output = Command::new("iw")
            .args(["phy", &phy, "info"])
            .output()
            .map_err(|e| RadioError::System(e.to_string()))?;
        if !output.status.success() {
            return Err(RadioError::CommandFailed(format!("iw phy {phy} info")));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_phy_info(&stdout))
    }
}

impl RadioControl for MonitorInterface {
    fn set_frequency(
        &mut self,
        freq_mhz: u32,
        width: ChanWidth,
        center_mhz: u32,
    ) -> Result<(), ChannelError> {
        let freq = freq_mhz.to_string();
        let width_arg = match width {
            ChanWidth::Width20 => "20",
            ChanWidth::Width40 => "40",
            ChanWidth::Width80 => "80",
            ChanWidth::Width160 => "160",
            ChanWidth::Width8080 => return Err(ChannelError::UnsupportedWidth(width)),
        };
        let center = center_mhz.to_string();
        let mut args = vec![
            "dev",
            self.name.as_str(),
            "set",
            "freq",
            freq.as_str(),
            width_arg,
        ];
        if center_mhz != 0 {
            args.push(center.as_str());
        }
        run_cmd("iw", &args).map_err(|e| ChannelError::ApplyFailed(e.to_string()))?;
        self.frequency = Some(freq_mhz);
        debug!("{} tuned to {freq_mhz} MHz ({width})", self.name);
        Ok(())
    }
}

fn run_cmd(cmd: &str, args: &[&str]) -> Result<(), RadioError> {
    let status = Command::new(cmd)
        .args(args)
        .status()
        .map_err(|e| RadioError::System(e.to_string()))?;
    if !status.success() {
        return Err(RadioError::CommandFailed(format!(
            "{cmd} {}",
            args.join(" ")
        )));
    }
    Ok(())
}

/// Parse channels and band capabilities out of `iw phy info` output.
///
/// Frequencies come from lines like `* 2412 MHz [1] (20.0 dBm)`;
/// disabled entries are skipped. Band width and stream counts come from
/// the capability lines of each `Band N:` section.
fn parse_phy_info(stdout: &str) -> (Vec<Channel>, Vec<Band>) {
    let mut channels: Vec<Channel> = Vec::new();
    let mut bands: Vec<Band> = Vec::new();
    let mut current: Option<Band> = None;
    let mut count = 0usize;

    for line in stdout.lines() {
        let line = line.trim();

        if line.starts_with("Band ") {
            if let Some(mut band) = current.take() {
                band.num_channels = count;
                if count > 0 {
                    bands.push(band);
                }
            }
            count = 0;
            current = Some(Band {
                num_channels: 0,
                max_chan_width: ChanWidth::Width20,
                streams_rx: 1,
                streams_tx: 1,
            });
            continue;
        }

        if let Some(band) = current.as_mut() {
            if line == "HT20/HT40" {
                band.max_chan_width = ChanWidth::Width40;
            }
            if line.starts_with("VHT Capabilities") {
                band.max_chan_width = ChanWidth::Width80;
            }
            // "Supported Channel Width: 160 MHz" vs "... neither 160 nor 80+80"
            if line.starts_with("Supported Channel Width:")
                && line.contains("160")
                && !line.contains("neither")
            {
                band.max_chan_width = ChanWidth::Width160;
            }
            if let Some(streams) = parse_mcs_streams(line) {
                band.streams_rx = band.streams_rx.max(streams);
                band.streams_tx = band.streams_tx.max(streams);
            }
        }

        // e.g. "* 2412 MHz [1] (20.0 dBm)" or "* 5500 MHz [100] (disabled)"
        if line.starts_with("* ") && line.contains(" MHz [") && !line.contains("disabled") {
            if channels.len() >= MAX_CHANNELS {
                continue;
            }
            let mut parts = line.split_whitespace();
            let freq = parts.nth(1).and_then(|f| f.parse::<u32>().ok());
            let chan = line
                .split('[')
                .nth(1)
                .and_then(|s| s.split(']').next())
                .and_then(|c| c.parse::<u32>().ok());
            if let (Some(freq), Some(chan)) = (freq, chan) {
                channels.push(Channel { chan, freq });
                count += 1;
            }
        }
    }

    if let Some(mut band) = current.take() {
        band.num_channels = count;
        if count > 0 {
            bands.push(band);
        }
    }

    (channels, bands)
}

/// "HT TX/RX MCS rate indexes supported: 0-15" means two spatial streams.
fn parse_mcs_streams(line: &str) -> Option<u8> {
    let rest = line.strip_prefix("HT TX/RX MCS rate indexes supported: ")?;
    let top: u8 = rest.split('-').nth(1)?.trim().parse().ok()?;
    Some(top / 8 + 1)
}
