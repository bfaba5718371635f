//! Channel Plan, Scan Scheduling and RF Math

pub mod freq;
pub mod plan;

pub use freq::{channel_to_freq, freq_to_channel, width_to_center, CHANNELS_2GHZ, CHANNELS_5GHZ};
pub use plan::{
    Band, ChanWidth, Channel, ChannelError, ChannelPlan, HtPolarity, RadioControl, MAX_BANDS,
    MAX_CHANNELS,
};
