//! Station and Network State Tracking

pub mod essid;
pub mod node;

pub use essid::{EssidGroup, EssidTracker};
pub use node::{Node, NodeTracker};
