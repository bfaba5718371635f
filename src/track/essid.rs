//! ESSID Grouping and Split Detection
//!
//! Groups stations advertising the same network name and flags ad-hoc
//! networks that have fragmented into disagreeing BSSIDs. At most one
//! group holds the process-wide "active split" slot; it is advisory
//! state for the display, not a consistency guarantee.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::frame::{MacAddr, WlanMode};

use super::node::Node;

/// One ESSID group: member stations in insertion order plus the split
/// flag.
#[derive(Debug, Default)]
pub struct EssidGroup {
    members: Vec<MacAddr>,
    split: bool,
}

impl EssidGroup {
    pub fn members(&self) -> &[MacAddr] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_split(&self) -> bool {
        self.split
    }
}

/// Owns the ESSID groups and the single active-split reference.
#[derive(Debug, Default)]
pub struct EssidTracker {
    groups: HashMap<String, EssidGroup>,
    active_split: Option<String>,
}

impl EssidTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &HashMap<String, EssidGroup> {
        &self.groups
    }

    pub fn get(&self, essid: &str) -> Option<&EssidGroup> {
        self.groups.get(essid)
    }

    /// ESSID of the group currently flagged as split, if any.
    pub fn active_split(&self) -> Option<&str> {
        self.active_split.as_deref()
    }

    /// React to a node advertising an ESSID (or losing it).
    ///
    /// Re-links the node when the name changed, creates the group on
    /// first sight, deletes groups that lose their last member, and
    /// re-runs split detection on every affected group.
    pub fn on_node_essid(
        &mut self,
        nodes: &mut HashMap<MacAddr, Node>,
        mac: MacAddr,
        essid: Option<&str>,
    ) {
        let current = nodes.get(&mac).and_then(|n| n.essid.clone());

        if let Some(cur) = current {
            if essid == Some(cur.as_str()) {
                // membership unchanged, but the member's BSSID may have
                // moved: re-check the partition state
                self.evaluate_split(nodes, &cur);
                return;
            }
            if let Some(node) = nodes.get_mut(&mac) {
                node.essid = None;
            }
            self.unlink(nodes, mac, &cur);
        }

        let Some(new) = essid.filter(|e| !e.is_empty()) else {
            return;
        };

        let group = self.groups.entry(new.to_string()).or_insert_with(|| {
            debug!("new essid group \"{new}\"");
            EssidGroup::default()
        });
        if !group.members.contains(&mac) {
            group.members.push(mac);
        }
        if let Some(node) = nodes.get_mut(&mac) {
            node.essid = Some(new.to_string());
        }
        self.evaluate_split(nodes, new);
    }

    /// Remove `mac` from its group after the node left (timeout or
    /// ESSID change). Deletes the group once empty, otherwise re-runs
    /// split detection on the remaining members.
    pub fn unlink(&mut self, nodes: &HashMap<MacAddr, Node>, mac: MacAddr, essid: &str) {
        let Some(group) = self.groups.get_mut(essid) else {
            return;
        };
        group.members.retain(|m| *m != mac);
        if group.members.is_empty() {
            debug!("essid group \"{essid}\" empty, removed");
            self.groups.remove(essid);
            if self.active_split.as_deref() == Some(essid) {
                self.active_split = None;
            }
        } else {
            self.evaluate_split(nodes, essid);
        }
    }

    /// Re-run split detection for one group.
    ///
    /// Walks the members in group order and compares the BSSIDs of
    /// consecutive non-AP members; an AP's BSSID is itself and says
    /// nothing about partitioning. Groups of one can never be split.
    fn evaluate_split(&mut self, nodes: &HashMap<MacAddr, Node>, essid: &str) {
        let Some(group) = self.groups.get_mut(essid) else {
            return;
        };

        let mut split = false;
        if group.members.len() > 1 {
            let mut prev_bssid: Option<MacAddr> = None;
            for mac in &group.members {
                let Some(node) = nodes.get(mac) else {
                    continue;
                };
                if node.mode == WlanMode::Ap {
                    continue;
                }
                if let Some(prev) = prev_bssid {
                    if prev != node.bssid {
                        split = true;
                        break;
                    }
                }
                prev_bssid = Some(node.bssid);
            }
        }

        if split && !group.split {
            group.split = true;
            info!("essid \"{essid}\" split between BSSIDs");
            self.active_split = Some(essid.to_string());
        } else if !split && group.split {
            group.split = false;
            if self.active_split.as_deref() == Some(essid) {
                self.active_split = None;
            }
        }
    }
}
