//! Scanner Façade
//!
//! Owns the channel plan and both trackers and runs the synchronous
//! capture → decode → track → scan cadence. Consumers poll the node
//! table, the ESSID groups and the plan state through the read
//! accessors; the scanner emits no events of its own.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::channel::{ChanWidth, ChannelError, ChannelPlan, HtPolarity, RadioControl};
use crate::frame::{self, DecodeError, LinkType, MacAddr};
use crate::track::{EssidTracker, NodeTracker};

/// Control operations accepted while running; each maps onto one
/// configuration setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    /// Switch to a fixed channel by number
    SetChannel(u32),
    /// Enable or disable the automatic scan
    SetAutoScan(bool),
    /// Dwell time per channel in milliseconds
    SetDwell(u64),
    /// Upper channel-number bound for the scan
    SetUpper(Option<u32>),
}

/// Cumulative counters, polled by the presentation layer.
#[derive(Debug, Default, Clone)]
pub struct ScanStats {
    pub frames: u64,
    pub decode_errors: u64,
    /// Frames with no attributable source address
    pub ignored: u64,
    pub channel_changes: u64,
}

/// The capture-decode and channel-scan engine.
pub struct Scanner {
    plan: ChannelPlan,
    nodes: NodeTracker,
    essids: EssidTracker,
    paused: bool,
    stats: ScanStats,
}

impl Scanner {
    pub fn new(plan: ChannelPlan, node_timeout: Duration) -> Self {
        Self {
            plan,
            nodes: NodeTracker::new(node_timeout),
            essids: EssidTracker::new(),
            paused: false,
            stats: ScanStats::default(),
        }
    }

    pub fn plan(&self) -> &ChannelPlan {
        &self.plan
    }

    pub fn plan_mut(&mut self) -> &mut ChannelPlan {
        &mut self.plan
    }

    pub fn nodes(&self) -> &NodeTracker {
        &self.nodes
    }

    pub fn essids(&self) -> &EssidTracker {
        &self.essids
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Decode one captured frame and feed the trackers.
    ///
    /// Returns the source address the frame was attributed to, `None`
    /// while paused or for unattributable frames. A truncated frame is
    /// an error for the caller's statistics but leaves all state
    /// untouched.
    pub fn process_frame(
        &mut self,
        link: LinkType,
        data: &[u8],
        now: Instant,
    ) -> Result<Option<MacAddr>, DecodeError> {
        if self.paused {
            return Ok(None);
        }
        self.stats.frames += 1;

        let pkt = match frame::decode(link, data) {
            Ok(pkt) => pkt,
            Err(err) => {
                self.stats.decode_errors += 1;
                debug!("dropped frame: {err}");
                return Err(err);
            }
        };

        let Some(mac) = self.nodes.update(&pkt, self.plan.current_channel(), now) else {
            self.stats.ignored += 1;
            return Ok(None);
        };

        if pkt.carries_essid() {
            let essid = Some(pkt.wlan_essid.as_str()).filter(|e| !e.is_empty());
            self.essids.on_node_essid(self.nodes.nodes_mut(), mac, essid);
        }

        Ok(Some(mac))
    }

    /// Periodic cadence: expire stale nodes and step the automatic
    /// scan once the dwell time is up.
    pub fn tick(&mut self, radio: &mut dyn RadioControl, now: Instant) {
        self.nodes.timeout_sweep(&mut self.essids, now);
        if !self.paused && self.plan.auto_step(radio, now) {
            self.stats.channel_changes += 1;
        }
    }

    /// Apply one control operation.
    pub fn command(
        &mut self,
        radio: &mut dyn RadioControl,
        cmd: Command,
        now: Instant,
    ) -> Result<(), ChannelError> {
        match cmd {
            Command::Pause => self.paused = true,
            Command::Resume => self.paused = false,
            Command::SetAutoScan(on) => self.plan.set_scanning(on),
            Command::SetDwell(ms) => self.plan.set_dwell(Duration::from_millis(ms)),
            Command::SetUpper(upper) => self.plan.set_upper(upper),
            Command::SetChannel(chan) => {
                let idx = self
                    .plan
                    .index_of_channel(chan)
                    .ok_or(ChannelError::UnknownChannel(chan))?;
                self.set_channel_widest(radio, idx, now)?;
                self.stats.channel_changes += 1;
            }
        }
        Ok(())
    }

    /// Explicit channel change: try the band's widest setting first and
    /// fall back to a plain 20 MHz channel when no valid center exists.
    fn set_channel_widest(
        &mut self,
        radio: &mut dyn RadioControl,
        idx: usize,
        now: Instant,
    ) -> Result<(), ChannelError> {
        let widest = self.plan.max_width_at(idx);
        match self
            .plan
            .apply_channel(radio, idx, widest, HtPolarity::Plus, now)
        {
            Err(ChannelError::InvalidCenterFreq { .. }) | Err(ChannelError::UnsupportedWidth(_))
                if widest != ChanWidth::Width20 =>
            {
                self.plan
                    .apply_channel(radio, idx, ChanWidth::Width20, HtPolarity::Plus, now)
            }
            other => other,
        }
    }
}
