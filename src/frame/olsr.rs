//! Higher-Layer Decode: LLC/SNAP, IPv4, UDP, OLSR
//!
//! Opportunistic decode of data-frame payloads for mesh diagnostics.
//! Every step is gated by a length check; a failed gate leaves the
//! higher-layer fields absent instead of failing the frame.

use std::net::Ipv4Addr;

use super::packet::{pkt_types, PacketInfo};

const LLC_SNAP_LEN: usize = 8;
const ETHERTYPE_IP: u16 = 0x0800;
const ETHERTYPE_ARP: u16 = 0x0806;
const ETHERTYPE_BATMAN: u16 = 0x4305;

const IP_PROTO_ICMP: u8 = 1;
const IP_PROTO_TCP: u8 = 6;
const IP_PROTO_UDP: u8 = 17;

const UDP_HDR_LEN: usize = 8;
const OLSR_PORT: u16 = 698;

/// OLSR message types
pub mod olsr_msg {
    pub const HELLO: u8 = 1;
    pub const TC: u8 = 2;
    pub const MID: u8 = 3;
    pub const HNA: u8 = 4;
    pub const LQ_HELLO: u8 = 201;
    pub const LQ_TC: u8 = 202;
}

/// OLSR packet header: length + sequence number.
const OLSR_PKT_HDR: usize = 4;
/// OLSR message header: type, vtime, size, originator, ttl, hopcount, seq.
const OLSR_MSG_HDR: usize = 12;
/// HELLO/TC and their LQ variants carry 4 fixed bytes before the blocks.
const OLSR_TYPE_FIXED: usize = 4;

/// Per-type sub-record sizes used to derive neighbor/alias counts from
/// the declared message size.
const HELLO_BLOCK: usize = 8;
const LQ_HELLO_BLOCK: usize = 12;
const TC_NEIGH: usize = 4;
const LQ_TC_NEIGH: usize = 8;
const MID_ALIAS: usize = 4;
const HNA_PAIR: usize = 8;

/// Decode the data-frame payload starting at the LLC header.
///
/// Never fails: any length-check miss simply stops the walk.
pub fn parse_higher_layers(data: &[u8], pkt: &mut PacketInfo) {
    if data.len() < LLC_SNAP_LEN {
        return;
    }
    // LLC/SNAP: dsap/ssap 0xaa, control 0x03, OUI, ethertype
    if data[0] != 0xaa || data[1] != 0xaa || data[2] != 0x03 {
        return;
    }
    let ethertype = u16::from_be_bytes([data[6], data[7]]);
    let payload = &data[LLC_SNAP_LEN..];

    match ethertype {
        ETHERTYPE_ARP => parse_arp(payload, pkt),
        ETHERTYPE_BATMAN => {
            pkt.pkt_types |= pkt_types::MESH;
        }
        ETHERTYPE_IP => parse_ip(payload, pkt),
        _ => {}
    }
}

fn parse_arp(data: &[u8], pkt: &mut PacketInfo) {
    pkt.pkt_types |= pkt_types::ARP;
    // Ethernet/IPv4 ARP: sender IP at 14, target IP at 24
    if data.len() >= 28 {
        pkt.ip_src = Some(Ipv4Addr::new(data[14], data[15], data[16], data[17]));
        pkt.ip_dst = Some(Ipv4Addr::new(data[24], data[25], data[26], data[27]));
    }
}

fn parse_ip(data: &[u8], pkt: &mut PacketInfo) {
    if data.len() < 20 || data[0] >> 4 != 4 {
        return;
    }
    let ihl = (data[0] & 0x0f) as usize * 4;
    if ihl < 20 || data.len() < ihl {
        return;
    }
    pkt.pkt_types |= pkt_types::IP;
    pkt.ip_src = Some(Ipv4Addr::new(data[12], data[13], data[14], data[15]));
    pkt.ip_dst = Some(Ipv4Addr::new(data[16], data[17], data[18], data[19]));

    let proto = data[9];
    let payload = &data[ihl..];
    match proto {
        IP_PROTO_ICMP => {
            pkt.pkt_types |= pkt_types::ICMP;
        }
        IP_PROTO_TCP => {
            pkt.pkt_types |= pkt_types::TCP;
        }
        IP_PROTO_UDP => {
            pkt.pkt_types |= pkt_types::UDP;
            parse_udp(payload, pkt);
        }
        _ => {}
    }
}

fn parse_udp(data: &[u8], pkt: &mut PacketInfo) {
    if data.len() < UDP_HDR_LEN {
        return;
    }
    let dst_port = u16::from_be_bytes([data[2], data[3]]);
    if dst_port == OLSR_PORT {
        parse_olsr(&data[UDP_HDR_LEN..], pkt);
    }
}

/// Decode the first OLSR message in the packet.
fn parse_olsr(data: &[u8], pkt: &mut PacketInfo) {
    if data.len() < OLSR_PKT_HDR + OLSR_MSG_HDR {
        return;
    }
    pkt.pkt_types |= pkt_types::OLSR;

    let msg = &data[OLSR_PKT_HDR..];
    let msg_type = msg[0];
    let msg_size = u16::from_be_bytes([msg[2], msg[3]]) as usize;
    pkt.olsr_type = msg_type;

    let body_size = msg_size.saturating_sub(OLSR_MSG_HDR);
    match msg_type {
        olsr_msg::HELLO => {
            pkt.olsr_neigh = (body_size.saturating_sub(OLSR_TYPE_FIXED) / HELLO_BLOCK) as u32;
        }
        olsr_msg::LQ_HELLO => {
            pkt.pkt_types |= pkt_types::OLSR_LQ;
            pkt.olsr_neigh = (body_size.saturating_sub(OLSR_TYPE_FIXED) / LQ_HELLO_BLOCK) as u32;
        }
        olsr_msg::TC => {
            pkt.olsr_neigh = (body_size.saturating_sub(OLSR_TYPE_FIXED) / TC_NEIGH) as u32;
        }
        olsr_msg::LQ_TC => {
            pkt.pkt_types |= pkt_types::OLSR_LQ;
            pkt.olsr_neigh = (body_size.saturating_sub(OLSR_TYPE_FIXED) / LQ_TC_NEIGH) as u32;
        }
        olsr_msg::MID => {
            pkt.olsr_neigh = (body_size / MID_ALIAS) as u32;
        }
        olsr_msg::HNA => {
            pkt.olsr_neigh = (body_size / HNA_PAIR) as u32;
            parse_hna_pairs(&msg[OLSR_MSG_HDR..], body_size, pkt);
        }
        _ => {}
    }
}

/// An announced (address, netmask) pair of (0, 0) is a default route.
fn parse_hna_pairs(body: &[u8], declared: usize, pkt: &mut PacketInfo) {
    let avail = declared.min(body.len());
    let mut pos = 0;
    while pos + HNA_PAIR <= avail {
        if body[pos..pos + HNA_PAIR].iter().all(|&b| b == 0) {
            pkt.pkt_types |= pkt_types::OLSR_GW;
            return;
        }
        pos += HNA_PAIR;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llc_ip_udp(dst_port: u16, udp_payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0xaa, 0xaa, 0x03, 0, 0, 0];
        buf.extend_from_slice(&ETHERTYPE_IP.to_be_bytes());
        // IPv4 header, 20 bytes, proto UDP
        let mut ip = vec![0x45, 0, 0, 0, 0, 0, 0, 0, 64, IP_PROTO_UDP, 0, 0];
        ip.extend_from_slice(&[10, 0, 0, 1]);
        ip.extend_from_slice(&[10, 0, 0, 2]);
        buf.extend_from_slice(&ip);
        // UDP header
        buf.extend_from_slice(&698u16.to_be_bytes());
        buf.extend_from_slice(&dst_port.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(udp_payload);
        buf
    }

    fn olsr_message(msg_type: u8, msg_size: u16, body: &[u8]) -> Vec<u8> {
        let mut buf = vec![0, 0, 0, 0]; // packet length + sequence
        buf.push(msg_type);
        buf.push(0); // vtime
        buf.extend_from_slice(&msg_size.to_be_bytes());
        buf.extend_from_slice(&[10, 0, 0, 1]); // originator
        buf.push(64); // ttl
        buf.push(0); // hopcount
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn test_ip_addresses_extracted() {
        let buf = llc_ip_udp(9, &[]);
        let mut pkt = PacketInfo::default();
        parse_higher_layers(&buf, &mut pkt);
        assert!(pkt.pkt_types & pkt_types::IP != 0);
        assert!(pkt.pkt_types & pkt_types::UDP != 0);
        assert!(pkt.pkt_types & pkt_types::OLSR == 0);
        assert_eq!(pkt.ip_src, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(pkt.ip_dst, Some(Ipv4Addr::new(10, 0, 0, 2)));
    }

    #[test]
    fn test_non_snap_payload_ignored() {
        let buf = [0x42u8; 32];
        let mut pkt = PacketInfo::default();
        parse_higher_layers(&buf, &mut pkt);
        assert_eq!(pkt.pkt_types, 0);
        assert!(pkt.ip_src.is_none());
    }

    #[test]
    fn test_batman_flagged_as_mesh() {
        let mut buf = vec![0xaa, 0xaa, 0x03, 0, 0, 0];
        buf.extend_from_slice(&ETHERTYPE_BATMAN.to_be_bytes());
        let mut pkt = PacketInfo::default();
        parse_higher_layers(&buf, &mut pkt);
        assert!(pkt.pkt_types & pkt_types::MESH != 0);
    }

    #[test]
    fn test_arp_sender_target() {
        let mut buf = vec![0xaa, 0xaa, 0x03, 0, 0, 0];
        buf.extend_from_slice(&ETHERTYPE_ARP.to_be_bytes());
        let mut arp = vec![0u8; 28];
        arp[14..18].copy_from_slice(&[192, 168, 1, 5]);
        arp[24..28].copy_from_slice(&[192, 168, 1, 1]);
        buf.extend_from_slice(&arp);
        let mut pkt = PacketInfo::default();
        parse_higher_layers(&buf, &mut pkt);
        assert!(pkt.pkt_types & pkt_types::ARP != 0);
        assert_eq!(pkt.ip_src, Some(Ipv4Addr::new(192, 168, 1, 5)));
        assert_eq!(pkt.ip_dst, Some(Ipv4Addr::new(192, 168, 1, 1)));
    }

    #[test]
    fn test_olsr_hello_neighbor_count() {
        // 12 header + 4 fixed + two 8-byte link blocks
        let olsr = olsr_message(olsr_msg::HELLO, 32, &[0u8; 20]);
        let buf = llc_ip_udp(OLSR_PORT, &olsr);
        let mut pkt = PacketInfo::default();
        parse_higher_layers(&buf, &mut pkt);
        assert!(pkt.pkt_types & pkt_types::OLSR != 0);
        assert_eq!(pkt.olsr_type, olsr_msg::HELLO);
        assert_eq!(pkt.olsr_neigh, 2);
    }

    #[test]
    fn test_olsr_lq_tc_sets_lq_flag() {
        // 12 header + 4 fixed + three 8-byte LQ neighbor records
        let olsr = olsr_message(olsr_msg::LQ_TC, 40, &[0u8; 28]);
        let buf = llc_ip_udp(OLSR_PORT, &olsr);
        let mut pkt = PacketInfo::default();
        parse_higher_layers(&buf, &mut pkt);
        assert!(pkt.pkt_types & pkt_types::OLSR_LQ != 0);
        assert_eq!(pkt.olsr_neigh, 3);
    }

    #[test]
    fn test_hna_default_gateway() {
        let mut body = vec![0u8; 16];
        body[0..4].copy_from_slice(&[10, 1, 0, 0]);
        body[4..8].copy_from_slice(&[255, 255, 0, 0]);
        // second pair is all-zero: a default route announcement
        let olsr = olsr_message(olsr_msg::HNA, 28, &body);
        let buf = llc_ip_udp(OLSR_PORT, &olsr);
        let mut pkt = PacketInfo::default();
        parse_higher_layers(&buf, &mut pkt);
        assert_eq!(pkt.olsr_neigh, 2);
        assert!(pkt.pkt_types & pkt_types::OLSR_GW != 0);
    }

    #[test]
    fn test_hna_without_gateway() {
        let mut body = vec![0u8; 8];
        body[0..4].copy_from_slice(&[10, 1, 0, 0]);
        body[4..8].copy_from_slice(&[255, 255, 0, 0]);
        let olsr = olsr_message(olsr_msg::HNA, 20, &body);
        let buf = llc_ip_udp(OLSR_PORT, &olsr);
        let mut pkt = PacketInfo::default();
        parse_higher_layers(&buf, &mut pkt);
        assert!(pkt.pkt_types & pkt_types::OLSR_GW == 0);
    }

    #[test]
    fn test_truncated_olsr_leaves_fields_absent() {
        // UDP payload shorter than packet + message headers
        let buf = llc_ip_udp(OLSR_PORT, &[0u8; 6]);
        let mut pkt = PacketInfo::default();
        parse_higher_layers(&buf, &mut pkt);
        assert!(pkt.pkt_types & pkt_types::OLSR == 0);
        assert_eq!(pkt.olsr_type, 0);
    }

    #[test]
    fn test_declared_size_beyond_buffer_is_bounded() {
        // HNA message declaring far more pairs than the buffer holds
        let olsr = olsr_message(olsr_msg::HNA, 1012, &[0u8; 8]);
        let buf = llc_ip_udp(OLSR_PORT, &olsr);
        let mut pkt = PacketInfo::default();
        parse_higher_layers(&buf, &mut pkt);
        assert_eq!(pkt.olsr_neigh, 125);
        // the all-zero pair that is actually present still counts
        assert!(pkt.pkt_types & pkt_types::OLSR_GW != 0);
    }
}
