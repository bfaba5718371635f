//! OS Radio Backend (Linux nl80211 + iw)

pub mod interface;

pub use interface::{MonitorInterface, RadioError};
