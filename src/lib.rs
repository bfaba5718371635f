//! Passive 802.11 Spectrum Scanner
//!
//! Decodes captured wireless frames in real time, attributes them to
//! transmitting stations, groups stations into ESSID networks (with
//! ad-hoc split detection), and drives an automatic channel-hopping
//! sweep so a single radio can cover a whole band.

pub mod capture;
pub mod channel;
pub mod config;
pub mod frame;
pub mod radio;
pub mod scanner;
pub mod track;

pub use capture::{CaptureError, FrameSource};
pub use channel::{Band, ChanWidth, Channel, ChannelError, ChannelPlan, HtPolarity, RadioControl};
pub use config::ScanConfig;
pub use frame::{decode, DecodeError, LinkType, MacAddr, PacketInfo, WlanMode};
pub use radio::{MonitorInterface, RadioError};
pub use scanner::{Command, ScanStats, Scanner};
pub use track::{EssidGroup, EssidTracker, Node, NodeTracker};
