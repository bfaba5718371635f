//! Channel / Frequency Math
//!
//! Table-driven conversions between driver channel numbers and center
//! frequencies, and the wide-channel center selection rules.

use super::plan::{ChanWidth, Channel, ChannelError, HtPolarity};

/// Convert a channel number to its base frequency in MHz.
pub fn channel_to_freq(channel: u32) -> Option<u32> {
    match channel {
        // 2.4 GHz
        1..=13 => Some(2407 + channel * 5),
        14 => Some(2484),
        // 5 GHz
        36..=64 if channel % 4 == 0 => Some(5000 + channel * 5),
        100..=144 if channel % 4 == 0 => Some(5000 + channel * 5),
        149 | 153 | 157 | 161 | 165 => Some(5000 + channel * 5),
        _ => None,
    }
}

/// Convert a frequency in MHz to its channel number.
pub fn freq_to_channel(freq: u32) -> Option<u32> {
    match freq {
        2484 => Some(14),
        2412..=2472 => Some((freq - 2407) / 5),
        5180..=5825 => Some((freq - 5000) / 5),
        _ => None,
    }
}

/// Standard 2.4 GHz channel numbers.
pub const CHANNELS_2GHZ: &[u32] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14];

/// Common 5 GHz channel numbers.
pub const CHANNELS_5GHZ: &[u32] = &[
    36, 40, 44, 48, 52, 56, 60, 64, 100, 104, 108, 112, 116, 120, 124, 128, 132, 136, 140, 144,
    149, 153, 157, 161, 165,
];

/// Published 80 MHz VHT segments: (low base freq, high base freq, center).
const VHT80_SEGMENTS: &[(u32, u32, u32)] = &[
    (5180, 5240, 5210),
    (5260, 5320, 5290),
    (5500, 5560, 5530),
    (5580, 5640, 5610),
    (5660, 5720, 5690),
    (5745, 5805, 5775),
];

/// 160 MHz segments.
const VHT160_SEGMENTS: &[(u32, u32, u32)] = &[(5180, 5320, 5250), (5500, 5640, 5570)];

/// HT40 center: base ± 10 MHz by polarity, valid only when the
/// neighboring 20 MHz channel (base ± 20 MHz) exists in the table.
fn ht40_center(freq: u32, polarity: HtPolarity, channels: &[Channel]) -> u32 {
    let (neighbor, center) = match polarity {
        HtPolarity::Plus => (freq + 20, freq + 10),
        HtPolarity::Minus => (freq.saturating_sub(20), freq.saturating_sub(10)),
    };
    if channels.iter().any(|c| c.freq == neighbor) {
        center
    } else {
        0
    }
}

fn segment_center(segments: &[(u32, u32, u32)], freq: u32) -> u32 {
    segments
        .iter()
        .find(|&&(lo, hi, _)| freq >= lo && freq <= hi)
        .map(|&(_, _, center)| center)
        .unwrap_or(0)
}

/// Resolve the center frequency required for `width` at base `freq`.
///
/// Returns 0 MHz ("no center needed") for 20 MHz channels. A width that
/// needs a center but has no valid one is refused.
pub fn width_to_center(
    width: ChanWidth,
    freq: u32,
    polarity: HtPolarity,
    channels: &[Channel],
) -> Result<u32, ChannelError> {
    let center = match width {
        ChanWidth::Width20 => return Ok(0),
        ChanWidth::Width40 => ht40_center(freq, polarity, channels),
        ChanWidth::Width80 => segment_center(VHT80_SEGMENTS, freq),
        ChanWidth::Width160 => segment_center(VHT160_SEGMENTS, freq),
        ChanWidth::Width8080 => return Err(ChannelError::UnsupportedWidth(width)),
    };
    if center == 0 {
        Err(ChannelError::InvalidCenterFreq { width, freq })
    } else {
        Ok(center)
    }
}
