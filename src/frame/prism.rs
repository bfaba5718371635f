//! Prism2 (wlan-ng) Capture Header
//!
//! Fixed-size header prepended by older wlan-ng/hostap drivers. The
//! drivers disagree about which fields hold real dBm values; the sign of
//! the reported noise/rssi fields tells the encodings apart.

use super::packet::{clamp_snr, PacketInfo};
use super::DecodeError;

/// Total header size: msgcode + msglen + devname[16] + 10 item slots.
pub const PRISM_HEADER_LEN: usize = 144;

/// Byte offset of the first DID item slot.
const ITEM_BASE: usize = 24;
/// Each item: did(4) + status(2) + len(2) + data(4).
const ITEM_SIZE: usize = 12;

/// Item slot indices in capture order.
const ITEM_RSSI: usize = 3;
const ITEM_SIGNAL: usize = 5;
const ITEM_NOISE: usize = 6;
const ITEM_RATE: usize = 7;

/// Known driver signal-reporting encodings.
///
/// Chosen by inspecting which reported field is negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverQuirk {
    /// Signal/noise/rssi already hold correct dBm / ratio values.
    AbsoluteDbm,
    /// Vendor encoding reporting a negated ratio in the rssi field:
    /// signal = -95 - rssi, noise = -95, snr = -rssi.
    InvertedRssi,
    /// Conservative default: snr = signal - noise.
    SignalNoiseDiff,
}

/// Classify the driver encoding from the reported raw fields.
pub fn classify_quirk(noise: i32, rssi: i32) -> DriverQuirk {
    if noise < 0 {
        DriverQuirk::AbsoluteDbm
    } else if rssi < 0 {
        DriverQuirk::InvertedRssi
    } else {
        DriverQuirk::SignalNoiseDiff
    }
}

fn item_data(data: &[u8], item: usize) -> i32 {
    let off = ITEM_BASE + item * ITEM_SIZE + 8;
    i32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

/// Parse the Prism2 prefix, filling the phy fields of `pkt`.
///
/// Returns the number of bytes consumed.
pub fn parse_prism_header(data: &[u8], pkt: &mut PacketInfo) -> Result<usize, DecodeError> {
    if data.len() < PRISM_HEADER_LEN {
        return Err(DecodeError::Truncated {
            needed: PRISM_HEADER_LEN,
            available: data.len(),
        });
    }

    let rssi = item_data(data, ITEM_RSSI);
    let signal = item_data(data, ITEM_SIGNAL);
    let noise = item_data(data, ITEM_NOISE);
    let rate = item_data(data, ITEM_RATE);

    let snr = match classify_quirk(noise, rssi) {
        DriverQuirk::AbsoluteDbm => {
            pkt.phy_signal = signal;
            pkt.phy_noise = noise;
            rssi
        }
        DriverQuirk::InvertedRssi => {
            pkt.phy_signal = -95 - rssi;
            pkt.phy_noise = -95;
            -rssi
        }
        DriverQuirk::SignalNoiseDiff => {
            pkt.phy_signal = signal;
            pkt.phy_noise = noise;
            signal - noise
        }
    };
    pkt.phy_snr = clamp_snr(snr);

    if rate > 0 {
        // reported in 500 kbps units
        pkt.phy_rate = rate as u32 * 5;
    }

    Ok(PRISM_HEADER_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with(rssi: i32, signal: i32, noise: i32, rate: i32) -> Vec<u8> {
        let mut buf = vec![0u8; PRISM_HEADER_LEN];
        for (item, val) in [
            (ITEM_RSSI, rssi),
            (ITEM_SIGNAL, signal),
            (ITEM_NOISE, noise),
            (ITEM_RATE, rate),
        ] {
            let off = ITEM_BASE + item * ITEM_SIZE + 8;
            buf[off..off + 4].copy_from_slice(&val.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_classify_quirk() {
        assert_eq!(classify_quirk(-90, 30), DriverQuirk::AbsoluteDbm);
        assert_eq!(classify_quirk(0, -40), DriverQuirk::InvertedRssi);
        assert_eq!(classify_quirk(10, 20), DriverQuirk::SignalNoiseDiff);
    }

    #[test]
    fn test_absolute_dbm_profile() {
        let buf = header_with(35, -60, -95, 2);
        let mut pkt = PacketInfo::default();
        let consumed = parse_prism_header(&buf, &mut pkt).unwrap();
        assert_eq!(consumed, PRISM_HEADER_LEN);
        assert_eq!(pkt.phy_signal, -60);
        assert_eq!(pkt.phy_noise, -95);
        assert_eq!(pkt.phy_snr, 35);
        assert_eq!(pkt.phy_rate, 10);
    }

    #[test]
    fn test_inverted_rssi_profile() {
        let buf = header_with(-40, 0, 0, 0);
        let mut pkt = PacketInfo::default();
        parse_prism_header(&buf, &mut pkt).unwrap();
        assert_eq!(pkt.phy_signal, -55);
        assert_eq!(pkt.phy_noise, -95);
        assert_eq!(pkt.phy_snr, 40);
    }

    #[test]
    fn test_default_profile_clamps_snr() {
        // positive "signal" minus positive "noise" can exceed the cap
        let buf = header_with(0, 210, 10, 0);
        let mut pkt = PacketInfo::default();
        parse_prism_header(&buf, &mut pkt).unwrap();
        assert_eq!(pkt.phy_snr, 99);
    }

    #[test]
    fn test_truncated_header() {
        let buf = vec![0u8; PRISM_HEADER_LEN - 1];
        let mut pkt = PacketInfo::default();
        assert!(matches!(
            parse_prism_header(&buf, &mut pkt),
            Err(DecodeError::Truncated { .. })
        ));
    }
}
