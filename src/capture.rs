//! Frame Capture
//!
//! pcap-backed packet source: live capture from a monitor-mode
//! interface or offline replay of a capture file. The engine only ever
//! sees `(LinkType, bytes)`; everything pcap-specific stays here.

use std::path::Path;

use pcap::{Activated, Capture};
use thiserror::Error;
use tracing::info;

use crate::frame::LinkType;

/// pcap data-link type values we can decode.
const DLT_IEEE802_11: i32 = 105;
const DLT_PRISM_HEADER: i32 = 119;
const DLT_IEEE802_11_RADIO: i32 = 127;

/// Read timeout for live captures, so the loop can keep ticking the
/// scan schedule while the air is quiet.
const READ_TIMEOUT_MS: i32 = 100;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("pcap: {0}")]
    Pcap(#[from] pcap::Error),

    #[error("unsupported link-layer type {0}; interface not in monitor mode?")]
    UnsupportedLinkType(i32),

    #[error("end of capture")]
    EndOfCapture,
}

/// One source of raw 802.11 frames.
pub struct FrameSource {
    cap: Capture<dyn Activated>,
    link: LinkType,
}

impl FrameSource {
    /// Open a live capture on `interface` (expected in monitor mode).
    pub fn open_live(interface: &str, buffer_size: i32) -> Result<Self, CaptureError> {
        let cap = Capture::from_device(interface)?
            .promisc(true)
            .immediate_mode(true)
            .buffer_size(buffer_size)
            .timeout(READ_TIMEOUT_MS)
            .open()?;
        let source = Self::from_capture(cap.into())?;
        info!("capturing live on {interface} ({})", source.link);
        Ok(source)
    }

    /// Replay a capture file.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let cap = Capture::from_file(path.as_ref())?;
        let source = Self::from_capture(cap.into())?;
        info!(
            "replaying {} ({})",
            path.as_ref().display(),
            source.link
        );
        Ok(source)
    }

    fn from_capture(cap: Capture<dyn Activated>) -> Result<Self, CaptureError> {
        let dlt = cap.get_datalink().0;
        let link = match dlt {
            DLT_IEEE802_11 => LinkType::Ieee80211,
            DLT_PRISM_HEADER => LinkType::Prism,
            DLT_IEEE802_11_RADIO => LinkType::Radiotap,
            other => return Err(CaptureError::UnsupportedLinkType(other)),
        };
        Ok(Self { cap, link })
    }

    pub fn link_type(&self) -> LinkType {
        self.link
    }

    /// Next captured frame.
    ///
    /// `Ok(None)` on a quiet read timeout (live captures only);
    /// `EndOfCapture` once an offline file is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<&[u8]>, CaptureError> {
        match self.cap.next_packet() {
            Ok(packet) => Ok(Some(packet.data)),
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(pcap::Error::NoMorePackets) => Err(CaptureError::EndOfCapture),
            Err(err) => Err(err.into()),
        }
    }
}
