//! 802.11 MAC Header
//!
//! Derives addressing roles from the frame type and the To-DS/From-DS
//! bits, and pulls the fixed beacon fields plus the two information
//! elements (SSID, DS Parameter) the tracker needs.

use super::packet::{
    is_qos_data, pkt_types, subtype, FrameType, MacAddr, PacketInfo, WlanMode,
};
use super::DecodeError;

/// Minimum header: frame control, duration, addr1.
const MIN_HDR: usize = 10;
/// Full management/data header: three addresses plus sequence control.
const FULL_HDR: usize = 24;
/// Fixed beacon fields: TSF timestamp, interval, capability info.
const BEACON_FIXED: usize = 12;

/// Capability info bits
const CAPA_ESS: u16 = 0x0001;
const CAPA_IBSS: u16 = 0x0002;

/// Information element ids
const IE_SSID: u8 = 0;
const IE_DS_PARAMETER: u8 = 3;

/// Parse the 802.11 MAC header into `pkt`.
///
/// Returns the offset of the frame body for data frames that should
/// continue into the higher-layer decode, or `None` when the pipeline
/// stops here (control, management, WDS).
pub fn parse_mac_header(data: &[u8], pkt: &mut PacketInfo) -> Result<Option<usize>, DecodeError> {
    if data.len() < MIN_HDR {
        return Err(DecodeError::Truncated {
            needed: MIN_HDR,
            available: data.len(),
        });
    }

    let fc0 = data[0];
    let fc1 = data[1];
    pkt.wlan_type = FrameType::from((fc0 >> 2) & 0x03);
    pkt.wlan_subtype = (fc0 >> 4) & 0x0f;
    pkt.wlan_retry = fc1 & 0x08 != 0;

    if pkt.wlan_type == FrameType::Control {
        // recognized by type only, addressing is not decoded
        pkt.pkt_types |= pkt_types::CTRL;
        return Ok(None);
    }

    if data.len() < FULL_HDR {
        return Err(DecodeError::Truncated {
            needed: FULL_HDR,
            available: data.len(),
        });
    }

    pkt.wlan_wep = fc1 & 0x40 != 0;
    let addr1 = MacAddr::from_slice(&data[4..10]).unwrap_or_default();
    let addr2 = MacAddr::from_slice(&data[10..16]).unwrap_or_default();
    let addr3 = MacAddr::from_slice(&data[16..22]).unwrap_or_default();
    let seq_ctrl = u16::from_le_bytes([data[22], data[23]]);
    pkt.wlan_seqno = seq_ctrl >> 4;
    pkt.wlan_fragno = (seq_ctrl & 0x0f) as u8;

    match pkt.wlan_type {
        FrameType::Data => {
            pkt.pkt_types |= pkt_types::DATA;
            let to_ds = fc1 & 0x01 != 0;
            let from_ds = fc1 & 0x02 != 0;
            match (to_ds, from_ds) {
                (true, true) => {
                    // 4-address WDS frame, reported as data type only
                    return Ok(None);
                }
                (true, false) => {
                    pkt.wlan_src = addr2;
                    pkt.wlan_dst = addr3;
                    pkt.wlan_bssid = addr1;
                    pkt.wlan_mode = WlanMode::Sta;
                }
                (false, true) => {
                    pkt.wlan_src = addr3;
                    pkt.wlan_dst = addr1;
                    pkt.wlan_bssid = addr2;
                    pkt.wlan_mode = WlanMode::Ap;
                }
                (false, false) => {
                    pkt.wlan_src = addr2;
                    pkt.wlan_dst = addr1;
                    pkt.wlan_bssid = addr3;
                    pkt.wlan_mode = WlanMode::Ibss;
                }
            }
            let mut body = FULL_HDR;
            if is_qos_data(pkt.wlan_type, pkt.wlan_subtype) {
                body += 2;
            }
            Ok(Some(body))
        }
        FrameType::Management => {
            pkt.pkt_types |= pkt_types::MGMT;
            pkt.wlan_dst = addr1;
            pkt.wlan_src = addr2;
            pkt.wlan_bssid = addr3;
            match pkt.wlan_subtype {
                subtype::BEACON | subtype::PROBE_RESPONSE => {
                    pkt.pkt_types |= if pkt.wlan_subtype == subtype::BEACON {
                        pkt_types::BEACON
                    } else {
                        pkt_types::PROBE
                    };
                    parse_beacon_body(&data[FULL_HDR..], pkt)?;
                }
                subtype::PROBE_REQUEST => {
                    pkt.pkt_types |= pkt_types::PROBE;
                    pkt.wlan_mode = WlanMode::Probe;
                }
                _ => {}
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

/// Fixed beacon/probe-response fields plus a minimal IE walk.
fn parse_beacon_body(data: &[u8], pkt: &mut PacketInfo) -> Result<(), DecodeError> {
    if data.len() < BEACON_FIXED {
        return Err(DecodeError::Truncated {
            needed: BEACON_FIXED,
            available: data.len(),
        });
    }

    pkt.wlan_tsf = u64::from_le_bytes([
        data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
    ]);
    pkt.bcn_interval = u16::from_le_bytes([data[8], data[9]]);
    let capability = u16::from_le_bytes([data[10], data[11]]);
    if capability & CAPA_IBSS != 0 {
        pkt.wlan_mode = WlanMode::Ibss;
    } else if capability & CAPA_ESS != 0 {
        pkt.wlan_mode = WlanMode::Ap;
    }

    // IE walk: stop as soon as a declared length would run past the
    // buffer; only SSID and DS Parameter are extracted.
    let ies = &data[BEACON_FIXED..];
    let mut pos = 0;
    while pos + 2 <= ies.len() {
        let id = ies[pos];
        let len = ies[pos + 1] as usize;
        pos += 2;
        if pos + len > ies.len() {
            break;
        }
        match id {
            IE_SSID => {
                pkt.wlan_essid = String::from_utf8_lossy(&ies[pos..pos + len])
                    .trim_end_matches('\0')
                    .to_string();
            }
            IE_DS_PARAMETER if len >= 1 => {
                pkt.wlan_channel = ies[pos];
            }
            _ => {}
        }
        pos += len;
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn mac_header(fc0: u8, fc1: u8, a1: u8, a2: u8, a3: u8, seq: u16) -> Vec<u8> {
        let mut buf = vec![fc0, fc1, 0, 0];
        buf.extend_from_slice(&[a1; 6]);
        buf.extend_from_slice(&[a2; 6]);
        buf.extend_from_slice(&[a3; 6]);
        buf.extend_from_slice(&(seq << 4).to_le_bytes());
        buf
    }

    pub(crate) fn beacon_frame(essid: &str, channel: u8, capability: u16) -> Vec<u8> {
        // management type, beacon subtype
        let mut buf = mac_header(0x80, 0x00, 0xff, 0xaa, 0xaa, 1);
        buf.extend_from_slice(&0x1122334455u64.to_le_bytes()); // tsf
        buf.extend_from_slice(&100u16.to_le_bytes()); // interval
        buf.extend_from_slice(&capability.to_le_bytes());
        buf.push(IE_SSID);
        buf.push(essid.len() as u8);
        buf.extend_from_slice(essid.as_bytes());
        buf.push(IE_DS_PARAMETER);
        buf.push(1);
        buf.push(channel);
        buf
    }

    #[test]
    fn test_control_frame_type_only() {
        // ACK: type control (1), subtype 13
        let buf = vec![0xd4, 0x00, 0, 0, 1, 2, 3, 4, 5, 6];
        let mut pkt = PacketInfo::default();
        assert_eq!(parse_mac_header(&buf, &mut pkt).unwrap(), None);
        assert_eq!(pkt.wlan_type, FrameType::Control);
        assert_eq!(pkt.wlan_src, MacAddr::ZERO);
        assert!(!pkt.wlan_wep);
    }

    #[test]
    fn test_data_to_ds_is_sta() {
        let buf = mac_header(0x08, 0x01, 0x0b, 0x02, 0x03, 7);
        let mut pkt = PacketInfo::default();
        assert_eq!(parse_mac_header(&buf, &mut pkt).unwrap(), Some(24));
        assert_eq!(pkt.wlan_mode, WlanMode::Sta);
        assert_eq!(pkt.wlan_src, MacAddr::new([0x02; 6]));
        assert_eq!(pkt.wlan_dst, MacAddr::new([0x03; 6]));
        assert_eq!(pkt.wlan_bssid, MacAddr::new([0x0b; 6]));
        assert_eq!(pkt.wlan_seqno, 7);
    }

    #[test]
    fn test_data_from_ds_is_ap() {
        let buf = mac_header(0x08, 0x02, 0x01, 0x0b, 0x03, 8);
        let mut pkt = PacketInfo::default();
        parse_mac_header(&buf, &mut pkt).unwrap();
        assert_eq!(pkt.wlan_mode, WlanMode::Ap);
        assert_eq!(pkt.wlan_src, MacAddr::new([0x03; 6]));
        assert_eq!(pkt.wlan_dst, MacAddr::new([0x01; 6]));
        assert_eq!(pkt.wlan_bssid, MacAddr::new([0x0b; 6]));
    }

    #[test]
    fn test_data_no_ds_is_ibss() {
        let buf = mac_header(0x08, 0x00, 0x01, 0x02, 0x0b, 9);
        let mut pkt = PacketInfo::default();
        parse_mac_header(&buf, &mut pkt).unwrap();
        assert_eq!(pkt.wlan_mode, WlanMode::Ibss);
        assert_eq!(pkt.wlan_bssid, MacAddr::new([0x0b; 6]));
    }

    #[test]
    fn test_wds_stops_pipeline() {
        let buf = mac_header(0x08, 0x03, 0x01, 0x02, 0x03, 9);
        let mut pkt = PacketInfo::default();
        assert_eq!(parse_mac_header(&buf, &mut pkt).unwrap(), None);
        assert_eq!(pkt.wlan_type, FrameType::Data);
        assert_eq!(pkt.wlan_mode, WlanMode::Unknown);
    }

    #[test]
    fn test_qos_data_body_offset() {
        // QoS data subtype 8
        let buf = mac_header(0x88, 0x01, 0x0b, 0x02, 0x03, 1);
        let mut pkt = PacketInfo::default();
        assert_eq!(parse_mac_header(&buf, &mut pkt).unwrap(), Some(26));
    }

    #[test]
    fn test_beacon_ess() {
        let buf = beacon_frame("net1", 6, CAPA_ESS);
        let mut pkt = PacketInfo::default();
        assert_eq!(parse_mac_header(&buf, &mut pkt).unwrap(), None);
        assert_eq!(pkt.wlan_essid, "net1");
        assert_eq!(pkt.wlan_channel, 6);
        assert_eq!(pkt.wlan_mode, WlanMode::Ap);
        assert_eq!(pkt.wlan_tsf, 0x1122334455);
        assert_eq!(pkt.bcn_interval, 100);
        assert!(pkt.pkt_types & pkt_types::BEACON != 0);
    }

    #[test]
    fn test_beacon_ibss_capability() {
        let buf = beacon_frame("adhoc", 1, CAPA_IBSS);
        let mut pkt = PacketInfo::default();
        parse_mac_header(&buf, &mut pkt).unwrap();
        assert_eq!(pkt.wlan_mode, WlanMode::Ibss);
    }

    #[test]
    fn test_ie_walk_stops_on_overlong_element() {
        let mut buf = beacon_frame("", 0, CAPA_ESS);
        // truncate the SSID element body away but leave its length byte
        buf.truncate(24 + BEACON_FIXED);
        buf.push(IE_SSID);
        buf.push(32); // claims 32 bytes, none follow
        let mut pkt = PacketInfo::default();
        parse_mac_header(&buf, &mut pkt).unwrap();
        assert_eq!(pkt.wlan_essid, "");
    }

    #[test]
    fn test_beacon_missing_fixed_fields_fails() {
        let mut buf = mac_header(0x80, 0x00, 0xff, 0xaa, 0xaa, 1);
        buf.extend_from_slice(&[0u8; 4]); // less than the fixed 12 bytes
        let mut pkt = PacketInfo::default();
        assert!(matches!(
            parse_mac_header(&buf, &mut pkt),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_probe_request_mode() {
        let buf = mac_header(0x40, 0x00, 0xff, 0x02, 0xff, 1);
        let mut pkt = PacketInfo::default();
        parse_mac_header(&buf, &mut pkt).unwrap();
        assert_eq!(pkt.wlan_mode, WlanMode::Probe);
        assert!(pkt.pkt_types & pkt_types::PROBE != 0);
    }

    #[test]
    fn test_short_buffer_fails() {
        let mut pkt = PacketInfo::default();
        assert!(parse_mac_header(&[0x08, 0x00, 0, 0], &mut pkt).is_err());
        // management frame needs the full 24-byte header
        assert!(parse_mac_header(&[0x80; 20], &mut pkt).is_err());
    }
}
