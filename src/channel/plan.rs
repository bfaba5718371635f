//! Channel Plan and Automatic Scan
//!
//! Owns the discovered channel/band list and the radio's current
//! channel, width and HT40 polarity, and steps the automatic
//! channel-hopping schedule. Frequency changes go through the
//! [`RadioControl`] collaborator; a rejected change leaves the plan
//! untouched and the scan moves on to the next candidate.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::freq::width_to_center;

/// Upper bound on the channel table.
pub const MAX_CHANNELS: usize = 64;
/// Upper bound on the band list.
pub const MAX_BANDS: usize = 2;

/// One scannable channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    /// Driver-defined channel number
    pub chan: u32,
    /// Base (control) frequency in MHz
    pub freq: u32,
}

/// Channel width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChanWidth {
    #[default]
    Width20,
    Width40,
    Width80,
    Width8080,
    Width160,
}

impl std::fmt::Display for ChanWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChanWidth::Width20 => write!(f, "20 MHz"),
            ChanWidth::Width40 => write!(f, "40 MHz"),
            ChanWidth::Width80 => write!(f, "80 MHz"),
            ChanWidth::Width8080 => write!(f, "80+80 MHz"),
            ChanWidth::Width160 => write!(f, "160 MHz"),
        }
    }
}

/// HT40 secondary-channel polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HtPolarity {
    /// Secondary channel above the base
    #[default]
    Plus,
    /// Secondary channel below the base
    Minus,
}

impl HtPolarity {
    pub fn flipped(self) -> Self {
        match self {
            HtPolarity::Plus => HtPolarity::Minus,
            HtPolarity::Minus => HtPolarity::Plus,
        }
    }
}

/// Capabilities of one frequency band.
#[derive(Debug, Clone, Copy)]
pub struct Band {
    /// Number of consecutive plan channels belonging to this band
    pub num_channels: usize,
    /// Widest channel the hardware supports here
    pub max_chan_width: ChanWidth,
    pub streams_rx: u8,
    pub streams_tx: u8,
}

/// Channel-plan errors (§ see crate docs); none are fatal except the
/// empty channel list at initialization.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel width {0} is not supported")]
    UnsupportedWidth(ChanWidth),

    #[error("no valid center frequency for {width} at {freq} MHz")]
    InvalidCenterFreq { width: ChanWidth, freq: u32 },

    #[error("invalid channel index {0}")]
    InvalidIndex(usize),

    #[error("channel {0} is not in the channel list")]
    UnknownChannel(u32),

    #[error("radio rejected the frequency change: {0}")]
    ApplyFailed(String),

    #[error("current channel not known yet")]
    UnknownCurrentChannel,

    #[error("channel list is empty, scanning is not possible")]
    EmptyChannelList,
}

/// Radio-control collaborator: applies a frequency/width/center change
/// to the hardware.
pub trait RadioControl {
    fn set_frequency(
        &mut self,
        freq_mhz: u32,
        width: ChanWidth,
        center_mhz: u32,
    ) -> Result<(), ChannelError>;
}

/// The channel/band table plus the scan state machine.
///
/// Two states: **Fixed** (`scanning == false`, only explicit
/// `apply_channel` calls change anything) and **Scanning** (`auto_step`
/// advances the channel whenever the dwell time has expired).
#[derive(Debug)]
pub struct ChannelPlan {
    channels: Vec<Channel>,
    bands: Vec<Band>,
    current: Option<usize>,
    width: ChanWidth,
    polarity: HtPolarity,
    dwell: Duration,
    upper: Option<u32>,
    scanning: bool,
    last_change: Option<Instant>,
}

impl ChannelPlan {
    /// Build a plan from discovered channels and bands.
    ///
    /// An empty channel table or band list is a fatal configuration
    /// error: no scanning is possible without one.
    pub fn new(
        mut channels: Vec<Channel>,
        mut bands: Vec<Band>,
        dwell: Duration,
    ) -> Result<Self, ChannelError> {
        channels.truncate(MAX_CHANNELS);
        bands.truncate(MAX_BANDS);
        if channels.is_empty() || bands.iter().map(|b| b.num_channels).sum::<usize>() == 0 {
            return Err(ChannelError::EmptyChannelList);
        }
        Ok(Self {
            channels,
            bands,
            current: None,
            width: ChanWidth::Width20,
            polarity: HtPolarity::Plus,
            dwell,
            upper: None,
            scanning: true,
            last_change: None,
        })
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Index of the channel currently applied, if known.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Channel number currently applied, if known.
    pub fn current_channel(&self) -> Option<u32> {
        self.current.map(|i| self.channels[i].chan)
    }

    pub fn width(&self) -> ChanWidth {
        self.width
    }

    pub fn polarity(&self) -> HtPolarity {
        self.polarity
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Toggle between the Fixed and Scanning states.
    pub fn set_scanning(&mut self, scanning: bool) {
        self.scanning = scanning;
    }

    pub fn set_dwell(&mut self, dwell: Duration) {
        self.dwell = dwell;
    }

    /// Restrict the scan to channel numbers up to `upper`.
    pub fn set_upper(&mut self, upper: Option<u32>) {
        self.upper = upper;
    }

    pub fn index_of_channel(&self, chan: u32) -> Option<usize> {
        self.channels.iter().position(|c| c.chan == chan)
    }

    pub fn index_of_freq(&self, freq: u32) -> Option<usize> {
        self.channels.iter().position(|c| c.freq == freq)
    }

    /// Record the channel the radio is already on (e.g. at startup)
    /// without issuing a change.
    pub fn mark_current_freq(&mut self, freq: u32) {
        if let Some(idx) = self.index_of_freq(freq) {
            self.current = Some(idx);
        }
    }

    /// Widest channel setting supported at `idx`.
    pub fn max_width_at(&self, idx: usize) -> ChanWidth {
        self.band_of(idx).max_chan_width
    }

    /// Band owning the channel at `idx`.
    fn band_of(&self, idx: usize) -> &Band {
        let mut start = 0;
        for band in &self.bands {
            if idx < start + band.num_channels {
                return band;
            }
            start += band.num_channels;
        }
        // indices past the declared bands fall into the last one
        self.bands.last().expect("plan has at least one band")
    }

    /// Time left on the current channel before the scan may advance.
    ///
    /// Infinite (`Duration::MAX`) while in the Fixed state; zero once
    /// the dwell interval has elapsed.
    pub fn remaining_dwell(&self, now: Instant) -> Duration {
        if !self.scanning {
            return Duration::MAX;
        }
        match self.last_change {
            Some(last) => self.dwell.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Resolve the center frequency and ask the radio to switch.
    ///
    /// On success the plan's current index/width/polarity and the
    /// last-change timestamp are updated; on failure the plan state is
    /// left unchanged and the error reported (not fatal — probing
    /// unsupported width/channel combinations is expected).
    pub fn apply_channel(
        &mut self,
        radio: &mut dyn RadioControl,
        idx: usize,
        width: ChanWidth,
        polarity: HtPolarity,
        now: Instant,
    ) -> Result<(), ChannelError> {
        let channel = *self
            .channels
            .get(idx)
            .ok_or(ChannelError::InvalidIndex(idx))?;
        let center = width_to_center(width, channel.freq, polarity, &self.channels)?;
        radio.set_frequency(channel.freq, width, center)?;

        self.current = Some(idx);
        self.width = width;
        self.polarity = polarity;
        self.last_change = Some(now);
        info!(
            "channel {} ({} MHz) {} applied",
            channel.chan, channel.freq, width
        );
        Ok(())
    }

    /// Next scan candidate after (`idx`, `polarity`).
    ///
    /// A 40 MHz band visits each index twice, once per polarity, and
    /// advances only after the `-` visit; other widths always advance.
    /// Past the last channel, or past the configured upper channel
    /// bound, the scan wraps to index 0 with `+` polarity.
    fn next_candidate(&self, idx: usize, polarity: HtPolarity) -> (usize, HtPolarity) {
        if self.band_of(idx).max_chan_width == ChanWidth::Width40
            && polarity == HtPolarity::Plus
        {
            return (idx, polarity.flipped());
        }
        let next = idx + 1;
        let overflow = next >= self.channels.len()
            || self
                .upper
                .map(|u| self.channels[next].chan > u)
                .unwrap_or(false);
        if overflow {
            (0, HtPolarity::Plus)
        } else {
            (next, HtPolarity::Plus)
        }
    }

    /// One step of the automatic scan.
    ///
    /// Does nothing while the dwell time still runs or while the
    /// current channel is unknown (waits for the first real channel to
    /// avoid busy-looping). A rejected change advances to the next
    /// candidate; the walk gives up after one full lap, so it
    /// terminates even if every channel rejects the change. Returns
    /// whether a channel change was applied.
    pub fn auto_step(&mut self, radio: &mut dyn RadioControl, now: Instant) -> bool {
        if self.remaining_dwell(now) > Duration::ZERO {
            return false;
        }
        let Some(start_idx) = self.current else {
            debug!("auto-scan deferred: current channel unknown");
            return false;
        };
        let start_pol = self.polarity;

        let (mut idx, mut pol) = (start_idx, start_pol);
        loop {
            let (next_idx, next_pol) = self.next_candidate(idx, pol);
            if next_idx == start_idx && next_pol == start_pol {
                // one full lap, every candidate rejected
                return false;
            }
            let width = self.band_of(next_idx).max_chan_width;
            match self.apply_channel(radio, next_idx, width, next_pol, now) {
                Ok(()) => return true,
                Err(err) => {
                    warn!("scan skipping channel index {next_idx}: {err}");
                    idx = next_idx;
                    pol = next_pol;
                }
            }
        }
    }
}
