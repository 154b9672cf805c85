//! # ieee80211: 频段 / 信道 / 监管域抽象
//!
//! 供策略管理器（pmgr）在计算并发与 PCL 时使用的 802.11 基础类型。
//!
//! | 模块        | 说明 |
//! |-------------|------|
//! | ieee80211   | 频段划分、信道号与频率换算、信道带宽编码 |
//! | regulatory  | 监管域信道表、信道状态（可用 / DFS / 禁用） |

#![cfg_attr(not(test), no_std)]

pub mod ieee80211;
pub mod regulatory;

pub use ieee80211::{
    chan_to_freq, freq_to_band, freq_to_chan, is_24ghz, is_5ghz, is_6ghz, is_same_band, Band,
    ChanWidth, Channel,
};
pub use regulatory::{channel_state, ChannelState, RegChannel, DEFAULT_CHANNEL_TABLE, NUM_CHANNELS};
