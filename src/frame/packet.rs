//! Normalized Packet Record
//!
//! One `PacketInfo` is produced per captured frame and consumed by the
//! node tracker. Fields a frame does not carry stay at their zero/empty
//! defaults.

use std::net::Ipv4Addr;

/// MAC address (6 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
    pub const ZERO: MacAddr = MacAddr([0, 0, 0, 0, 0, 0]);

    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(data: &[u8]) -> Option<Self> {
        if data.len() >= 6 {
            let mut bytes = [0u8; 6];
            bytes.copy_from_slice(&data[..6]);
            Some(Self(bytes))
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0, 0, 0, 0, 0, 0]
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Frame type (2 bits of the frame control field)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameType {
    Management = 0,
    Control = 1,
    #[default]
    Data = 2,
    Extension = 3,
}

impl From<u8> for FrameType {
    fn from(val: u8) -> Self {
        match val & 0x03 {
            0 => FrameType::Management,
            1 => FrameType::Control,
            2 => FrameType::Data,
            _ => FrameType::Extension,
        }
    }
}

/// Frame subtype values (4 bits of the frame control field)
pub mod subtype {
    // management
    pub const PROBE_REQUEST: u8 = 4;
    pub const PROBE_RESPONSE: u8 = 5;
    pub const BEACON: u8 = 8;

    // data; QoS variants have bit 3 set and carry a 2-byte QoS control field
    pub const QOS_BIT: u8 = 0x08;
}

/// Returns true for the QoS data subtypes (header is 2 bytes longer).
pub fn is_qos_data(frame_type: FrameType, sub: u8) -> bool {
    frame_type == FrameType::Data && sub & subtype::QOS_BIT != 0
}

/// Operating mode attributed to the transmitter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WlanMode {
    #[default]
    Unknown,
    /// Access point (infrastructure)
    Ap,
    /// Station associated to an AP
    Sta,
    /// Ad-hoc participant
    Ibss,
    /// Seen probing only
    Probe,
}

impl std::fmt::Display for WlanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WlanMode::Unknown => write!(f, "?"),
            WlanMode::Ap => write!(f, "AP"),
            WlanMode::Sta => write!(f, "STA"),
            WlanMode::Ibss => write!(f, "IBSS"),
            WlanMode::Probe => write!(f, "PROBE"),
        }
    }
}

/// Detected protocol classes, OR-ed into `PacketInfo::pkt_types`
pub mod pkt_types {
    pub const MGMT: u32 = 1 << 0;
    pub const CTRL: u32 = 1 << 1;
    pub const DATA: u32 = 1 << 2;
    pub const BEACON: u32 = 1 << 3;
    pub const PROBE: u32 = 1 << 4;
    pub const ARP: u32 = 1 << 5;
    pub const IP: u32 = 1 << 6;
    pub const ICMP: u32 = 1 << 7;
    pub const UDP: u32 = 1 << 8;
    pub const TCP: u32 = 1 << 9;
    pub const OLSR: u32 = 1 << 10;
    pub const OLSR_LQ: u32 = 1 << 11;
    pub const OLSR_GW: u32 = 1 << 12;
    /// batman-adv and similar L2 mesh protocols
    pub const MESH: u32 = 1 << 13;
}

/// Per-packet radio flags, OR-ed into `PacketInfo::phy_flags`
pub mod phy_flags {
    pub const SHORTPRE: u32 = 1 << 0;
    pub const BAND_A: u32 = 1 << 1;
    pub const BAND_G: u32 = 1 << 2;
}

/// Signal-to-noise ratio ceiling; driver noise figures can otherwise
/// produce nonsensical values.
pub const SNR_MAX: u32 = 99;

/// Normalized record for one captured frame.
///
/// Produced by `frame::decode`, consumed and discarded by the node
/// tracker. All fields default to a defined "absent" value.
#[derive(Debug, Clone, Default)]
pub struct PacketInfo {
    // phy
    /// Signal strength in dBm (0 = absent)
    pub phy_signal: i32,
    /// Noise floor in dBm (0 = absent)
    pub phy_noise: i32,
    /// Signal-to-noise ratio, 0..=99
    pub phy_snr: u32,
    /// PHY rate in 100 kbps units
    pub phy_rate: u32,
    /// Radio flags, see [`phy_flags`]
    pub phy_flags: u32,

    // mac
    pub wlan_type: FrameType,
    /// Raw 4-bit subtype, see [`subtype`]
    pub wlan_subtype: u8,
    pub wlan_src: MacAddr,
    pub wlan_dst: MacAddr,
    pub wlan_bssid: MacAddr,
    /// Sequence number (0 = absent; control frames carry none)
    pub wlan_seqno: u16,
    pub wlan_fragno: u8,
    pub wlan_retry: bool,
    /// Protected-frame bit (WEP/WPA)
    pub wlan_wep: bool,
    pub wlan_mode: WlanMode,

    // higher layer
    /// Detected protocol classes, see [`pkt_types`]
    pub pkt_types: u32,
    pub ip_src: Option<Ipv4Addr>,
    pub ip_dst: Option<Ipv4Addr>,
    /// ESSID from beacon/probe response (empty = absent)
    pub wlan_essid: String,
    /// Channel number from a DS Parameter element (0 = absent)
    pub wlan_channel: u8,
    /// Beacon TSF timestamp in microseconds
    pub wlan_tsf: u64,
    /// Beacon interval in TUs
    pub bcn_interval: u16,
    /// OLSR message type (0 = absent)
    pub olsr_type: u8,
    /// Neighbor/alias count declared by the OLSR message
    pub olsr_neigh: u32,
}

impl PacketInfo {
    pub fn is_beacon(&self) -> bool {
        self.wlan_type == FrameType::Management && self.wlan_subtype == subtype::BEACON
    }

    pub fn is_probe_response(&self) -> bool {
        self.wlan_type == FrameType::Management && self.wlan_subtype == subtype::PROBE_RESPONSE
    }

    /// True when the frame advertises an ESSID (beacon or probe response).
    pub fn carries_essid(&self) -> bool {
        self.is_beacon() || self.is_probe_response()
    }
}

/// Clamp a raw SNR figure to the 0..=99 range.
pub fn clamp_snr(snr: i32) -> u32 {
    snr.clamp(0, SNR_MAX as i32) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_display() {
        let mac = MacAddr::new([0x00, 0x1b, 0x2c, 0x3d, 0x4e, 0x5f]);
        assert_eq!(mac.to_string(), "00:1b:2c:3d:4e:5f");
    }

    #[test]
    fn test_mac_classification() {
        assert!(MacAddr::ZERO.is_zero());
        assert!(MacAddr::BROADCAST.is_broadcast());
        assert!(MacAddr::BROADCAST.is_multicast());
        assert!(!MacAddr::new([0x00, 1, 2, 3, 4, 5]).is_multicast());
        assert_eq!(MacAddr::from_slice(&[1, 2, 3]), None);
    }

    #[test]
    fn test_clamp_snr() {
        assert_eq!(clamp_snr(-5), 0);
        assert_eq!(clamp_snr(42), 42);
        assert_eq!(clamp_snr(250), 99);
    }

    #[test]
    fn test_qos_subtype() {
        assert!(is_qos_data(FrameType::Data, 8));
        assert!(is_qos_data(FrameType::Data, 12));
        assert!(!is_qos_data(FrameType::Data, 0));
        assert!(!is_qos_data(FrameType::Management, 8));
    }

    #[test]
    fn test_packet_defaults_are_absent() {
        let pkt = PacketInfo::default();
        assert_eq!(pkt.phy_signal, 0);
        assert_eq!(pkt.wlan_src, MacAddr::ZERO);
        assert_eq!(pkt.wlan_essid, "");
        assert_eq!(pkt.wlan_channel, 0);
        assert_eq!(pkt.pkt_types, 0);
        assert!(pkt.ip_src.is_none());
    }
}
