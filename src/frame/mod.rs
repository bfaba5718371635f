//! Wire-Frame Decoder
//!
//! Turns the raw bytes of one captured frame into a normalized
//! [`PacketInfo`]. Decoding is a pure function of its input: no I/O, no
//! state between calls. The pipeline peels the link-layer capture
//! prefix, the 802.11 MAC header, and (for data frames) the optional
//! LLC/IP/OLSR layers; a stage that cannot fit its mandatory header
//! fails the frame, later stages are simply skipped.

pub mod ieee80211;
pub mod olsr;
pub mod packet;
pub mod prism;
pub mod radiotap;

pub use packet::{
    pkt_types, subtype, FrameType, MacAddr, PacketInfo, WlanMode,
};

use thiserror::Error;

/// Link-layer framing reported by the capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// Bare 802.11 frame, no capture prefix
    Ieee80211,
    /// Prism2 (wlan-ng) fixed header
    Prism,
    /// Radiotap variable header
    Radiotap,
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkType::Ieee80211 => write!(f, "802.11"),
            LinkType::Prism => write!(f, "prism2"),
            LinkType::Radiotap => write!(f, "radiotap"),
        }
    }
}

/// Decode failure: a mandatory header did not fit in the buffer.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("truncated frame: needed {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },
}

/// Decode one captured frame.
///
/// Truncation inside an optional stage is not an error: the frame is
/// reported with whatever fields were filled up to that point.
pub fn decode(link: LinkType, data: &[u8]) -> Result<PacketInfo, DecodeError> {
    let mut pkt = PacketInfo::default();

    let offset = match link {
        LinkType::Ieee80211 => 0,
        LinkType::Prism => prism::parse_prism_header(data, &mut pkt)?,
        LinkType::Radiotap => radiotap::parse_radiotap_header(data, &mut pkt)?,
    };

    if let Some(body) = ieee80211::parse_mac_header(&data[offset..], &mut pkt)? {
        // data frame: opportunistic higher-layer decode, never fatal
        olsr::parse_higher_layers(&data[offset + body..], &mut pkt);
    }

    Ok(pkt)
}
