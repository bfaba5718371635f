//! Station (Node) Tracking
//!
//! One node per transmitting MAC address: last packet snapshot, signal
//! averaging, retry accounting and a rate-limited timeout sweep.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::frame::{pkt_types, FrameType, MacAddr, PacketInfo, WlanMode};

use super::essid::EssidTracker;

/// EWMA smoothing weight: each sample contributes 1/8.
const SNR_EWMA_WEIGHT: f64 = 8.0;

/// State kept per transmitting station.
#[derive(Debug, Clone)]
pub struct Node {
    /// Last decoded packet from this station
    pub last_pkt: PacketInfo,
    pub last_seen: Instant,
    pub pkt_count: u64,
    pub olsr_count: u64,
    /// All-time retry count
    pub retries_all: u64,
    /// Retries in the most recent burst; reset by a fresh sequence number
    pub retries_last: u64,
    /// EWMA-smoothed SNR
    pub snr_avg: f64,
    pub snr_min: u32,
    pub snr_max: u32,
    /// Last known BSSID (zero until one is seen)
    pub bssid: MacAddr,
    pub mode: WlanMode,
    /// Channel the station was last observed on (0 = unknown)
    pub channel: u32,
    /// Whether encrypted frames were seen from this station
    pub wep: bool,
    /// Last sequence number, for retry detection
    pub seqno: u16,
    /// Key of the ESSID group this node belongs to
    pub essid: Option<String>,
}

impl Node {
    fn new(pkt: &PacketInfo, now: Instant) -> Self {
        Self {
            last_pkt: pkt.clone(),
            last_seen: now,
            pkt_count: 0,
            olsr_count: 0,
            retries_all: 0,
            retries_last: 0,
            snr_avg: 0.0,
            snr_min: 0,
            snr_max: 0,
            bssid: MacAddr::ZERO,
            mode: WlanMode::Unknown,
            channel: 0,
            wep: false,
            seqno: 0,
            essid: None,
        }
    }
}

/// The station table. Nodes are created on the first attributable frame
/// and removed by the timeout sweep; nothing else touches the map.
#[derive(Debug)]
pub struct NodeTracker {
    nodes: HashMap<MacAddr, Node>,
    timeout: Duration,
    last_sweep: Option<Instant>,
    created: u64,
    expired: u64,
}

impl NodeTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            nodes: HashMap::new(),
            timeout,
            last_sweep: None,
            created: 0,
            expired: 0,
        }
    }

    pub fn nodes(&self) -> &HashMap<MacAddr, Node> {
        &self.nodes
    }

    /// Mutable access for the ESSID tracker's back-reference updates;
    /// node creation and deletion stay in this tracker.
    pub(crate) fn nodes_mut(&mut self) -> &mut HashMap<MacAddr, Node> {
        &mut self.nodes
    }

    pub fn get(&self, mac: &MacAddr) -> Option<&Node> {
        self.nodes.get(mac)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn expired(&self) -> u64 {
        self.expired
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Update (or create) the node for the packet's source address.
    ///
    /// Frames with an all-zero source are never attributable and are
    /// ignored. Returns the source address on an update.
    pub fn update(
        &mut self,
        pkt: &PacketInfo,
        current_channel: Option<u32>,
        now: Instant,
    ) -> Option<MacAddr> {
        let src = pkt.wlan_src;
        if src.is_zero() {
            return None;
        }

        let node = self.nodes.entry(src).or_insert_with(|| {
            debug!("new node {src}");
            self.created += 1;
            Node::new(pkt, now)
        });

        node.last_seen = now;
        node.pkt_count += 1;
        if pkt.pkt_types & pkt_types::OLSR != 0 {
            node.olsr_count += 1;
        }

        // Retry accounting: the same non-zero sequence number again with
        // the retry flag set counts; a fresh number ends the burst.
        if pkt.wlan_seqno != 0 && pkt.wlan_seqno == node.seqno && pkt.wlan_retry {
            node.retries_all += 1;
            node.retries_last += 1;
        } else {
            node.retries_last = 0;
        }
        node.seqno = pkt.wlan_seqno;

        if !pkt.wlan_bssid.is_zero() && !pkt.wlan_bssid.is_broadcast() {
            node.bssid = pkt.wlan_bssid;
        }
        if pkt.wlan_mode != WlanMode::Unknown {
            node.mode = pkt.wlan_mode;
        }
        if pkt.wlan_channel != 0 {
            node.channel = pkt.wlan_channel as u32;
        } else if let Some(chan) = current_channel {
            node.channel = chan;
        }
        // control frames carry no payload-protection information
        if pkt.wlan_type == FrameType::Data {
            node.wep = pkt.wlan_wep;
        }

        if pkt.phy_snr > 0 {
            if node.snr_avg == 0.0 {
                node.snr_avg = pkt.phy_snr as f64;
                node.snr_min = pkt.phy_snr;
                node.snr_max = pkt.phy_snr;
            } else {
                node.snr_avg += (pkt.phy_snr as f64 - node.snr_avg) / SNR_EWMA_WEIGHT;
                node.snr_min = node.snr_min.min(pkt.phy_snr);
                node.snr_max = node.snr_max.max(pkt.phy_snr);
            }
        }

        node.last_pkt = pkt.clone();
        Some(src)
    }

    /// Remove nodes not seen for the timeout interval.
    ///
    /// Runs at most once per timeout interval regardless of how often it
    /// is called, to bound the per-packet cost. Removed nodes are
    /// unlinked from their ESSID group first, which re-evaluates the
    /// group's split state.
    pub fn timeout_sweep(&mut self, essids: &mut EssidTracker, now: Instant) {
        if let Some(last) = self.last_sweep {
            if now.saturating_duration_since(last) < self.timeout {
                return;
            }
        }
        self.last_sweep = Some(now);

        let timeout = self.timeout;
        let expired: Vec<MacAddr> = self
            .nodes
            .iter()
            .filter(|(_, n)| now.saturating_duration_since(n.last_seen) > timeout)
            .map(|(mac, _)| *mac)
            .collect();

        for mac in expired {
            if let Some(node) = self.nodes.remove(&mac) {
                debug!("node {mac} timed out");
                self.expired += 1;
                if let Some(essid) = node.essid.as_deref() {
                    essids.unlink(&self.nodes, mac, essid);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::subtype;

    fn pkt_from(src: [u8; 6]) -> PacketInfo {
        PacketInfo {
            wlan_src: MacAddr::new(src),
            wlan_type: FrameType::Data,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_source_ignored() {
        let mut tracker = NodeTracker::new(Duration::from_secs(60));
        let pkt = PacketInfo::default();
        assert_eq!(tracker.update(&pkt, None, Instant::now()), None);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_node_created_and_counted() {
        let mut tracker = NodeTracker::new(Duration::from_secs(60));
        let now = Instant::now();
        let pkt = pkt_from([1; 6]);
        let mac = tracker.update(&pkt, Some(6), now).unwrap();
        let node = tracker.get(&mac).unwrap();
        assert_eq!(node.pkt_count, 1);
        assert_eq!(node.channel, 6);
        assert_eq!(tracker.created(), 1);
    }

    #[test]
    fn test_ds_channel_beats_current_channel() {
        let mut tracker = NodeTracker::new(Duration::from_secs(60));
        let mut pkt = pkt_from([1; 6]);
        pkt.wlan_type = FrameType::Management;
        pkt.wlan_subtype = subtype::BEACON;
        pkt.wlan_channel = 11;
        let mac = tracker.update(&pkt, Some(6), Instant::now()).unwrap();
        assert_eq!(tracker.get(&mac).unwrap().channel, 11);
    }

    #[test]
    fn test_broadcast_bssid_not_stored() {
        let mut tracker = NodeTracker::new(Duration::from_secs(60));
        let mut pkt = pkt_from([1; 6]);
        pkt.wlan_bssid = MacAddr::BROADCAST;
        let mac = tracker.update(&pkt, None, Instant::now()).unwrap();
        assert_eq!(tracker.get(&mac).unwrap().bssid, MacAddr::ZERO);

        pkt.wlan_bssid = MacAddr::new([0xb; 6]);
        tracker.update(&pkt, None, Instant::now());
        assert_eq!(tracker.get(&mac).unwrap().bssid, MacAddr::new([0xb; 6]));
    }

    #[test]
    fn test_control_frame_keeps_wep_flag() {
        let mut tracker = NodeTracker::new(Duration::from_secs(60));
        let mut pkt = pkt_from([1; 6]);
        pkt.wlan_wep = true;
        let mac = tracker.update(&pkt, None, Instant::now()).unwrap();
        assert!(tracker.get(&mac).unwrap().wep);

        let mut ctrl = pkt_from([1; 6]);
        ctrl.wlan_type = FrameType::Control;
        ctrl.wlan_wep = false;
        tracker.update(&ctrl, None, Instant::now());
        assert!(tracker.get(&mac).unwrap().wep);
    }

    #[test]
    fn test_retry_accounting() {
        let mut tracker = NodeTracker::new(Duration::from_secs(60));
        let now = Instant::now();

        let mut pkt = pkt_from([1; 6]);
        pkt.wlan_seqno = 100;
        let mac = tracker.update(&pkt, None, now).unwrap();

        // same sequence number, retry flag set
        pkt.wlan_retry = true;
        tracker.update(&pkt, None, now);
        let node = tracker.get(&mac).unwrap();
        assert_eq!(node.retries_all, 1);
        assert_eq!(node.retries_last, 1);

        // fresh sequence number resets the burst counter
        pkt.wlan_seqno = 101;
        pkt.wlan_retry = false;
        tracker.update(&pkt, None, now);
        let node = tracker.get(&mac).unwrap();
        assert_eq!(node.retries_all, 1);
        assert_eq!(node.retries_last, 0);
    }

    #[test]
    fn test_retry_flag_without_matching_seqno() {
        let mut tracker = NodeTracker::new(Duration::from_secs(60));
        let mut pkt = pkt_from([1; 6]);
        pkt.wlan_seqno = 5;
        pkt.wlan_retry = true;
        let mac = tracker.update(&pkt, None, Instant::now()).unwrap();
        // first sighting: stored seqno was 0, no retry counted
        assert_eq!(tracker.get(&mac).unwrap().retries_all, 0);
    }

    #[test]
    fn test_ewma_single_sample_is_exact() {
        let mut tracker = NodeTracker::new(Duration::from_secs(60));
        let mut pkt = pkt_from([1; 6]);
        pkt.phy_snr = 40;
        let mac = tracker.update(&pkt, None, Instant::now()).unwrap();
        let node = tracker.get(&mac).unwrap();
        assert_eq!(node.snr_avg, 40.0);
        assert_eq!(node.snr_min, 40);
        assert_eq!(node.snr_max, 40);
    }

    #[test]
    fn test_ewma_converges_to_constant_input() {
        let mut tracker = NodeTracker::new(Duration::from_secs(60));
        let now = Instant::now();
        let mut pkt = pkt_from([1; 6]);
        pkt.phy_snr = 20;
        let mac = tracker.update(&pkt, None, now).unwrap();
        pkt.phy_snr = 60;
        for _ in 0..100 {
            tracker.update(&pkt, None, now);
        }
        let node = tracker.get(&mac).unwrap();
        assert!((node.snr_avg - 60.0).abs() < 0.01);
        assert_eq!(node.snr_min, 20);
        assert_eq!(node.snr_max, 60);
    }

    #[test]
    fn test_timeout_sweep() {
        let timeout = Duration::from_secs(60);
        let mut tracker = NodeTracker::new(timeout);
        let mut essids = EssidTracker::new();
        let t0 = Instant::now();
        tracker.update(&pkt_from([1; 6]), None, t0);

        // still present just before the timeout
        tracker.timeout_sweep(&mut essids, t0 + timeout - Duration::from_secs(1));
        assert_eq!(tracker.len(), 1);

        // sweep rate limit: a second call within the interval is a no-op,
        // so step past it before checking expiry
        tracker.timeout_sweep(&mut essids, t0 + timeout + timeout + Duration::from_secs(1));
        assert_eq!(tracker.len(), 0);
        assert_eq!(tracker.expired(), 1);
    }

    #[test]
    fn test_sweep_rate_limited() {
        let timeout = Duration::from_secs(60);
        let mut tracker = NodeTracker::new(timeout);
        let mut essids = EssidTracker::new();
        let t0 = Instant::now();
        tracker.update(&pkt_from([1; 6]), None, t0);

        tracker.timeout_sweep(&mut essids, t0);
        // node is long expired, but the previous sweep was too recent
        tracker.timeout_sweep(&mut essids, t0 + Duration::from_secs(30));
        assert_eq!(tracker.len(), 1);
    }
}
