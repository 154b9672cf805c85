//! 监管域信道表
//!
//! 每个信道携带一个状态（可用 / DFS 被动 / 禁用 / 无效）。默认表覆盖 2.4 GHz 1..14、
//! 5 GHz UNII-1..UNII-3 与 6 GHz UNII-5 的 20 MHz 信道，可在国家码变化时整体替换。

use crate::ieee80211::{chan_to_freq, Band};

/// 信道监管状态（对应 enum channel_state）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ChannelState {
    #[default]
    Invalid = 0,
    Disable = 1,
    /// 需要 DFS / 被动扫描
    Dfs = 2,
    Enable = 3,
}

impl ChannelState {
    /// 可作为工作信道（Enable 或 DFS）
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Enable | Self::Dfs)
    }
}

/// 监管表中的单个信道
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegChannel {
    pub freq: u32,
    pub state: ChannelState,
}

impl RegChannel {
    pub const fn new(freq: u32, state: ChannelState) -> Self {
        Self { freq, state }
    }

    pub const fn is_dfs(&self) -> bool {
        matches!(self.state, ChannelState::Dfs)
    }
}

const NUM_2G_CHANNELS: usize = 14;
const CHANS_5G: [u8; 25] = [
    36, 40, 44, 48, 52, 56, 60, 64, 100, 104, 108, 112, 116, 120, 124, 128, 132, 136, 140, 144,
    149, 153, 157, 161, 165,
];
/// 6 GHz UNII-5：1, 5, .., 93
const NUM_6G_CHANNELS: usize = 24;

/// 信道表最大长度，也是 PCL 的最大信道数
pub const NUM_CHANNELS: usize = NUM_2G_CHANNELS + CHANS_5G.len() + NUM_6G_CHANNELS;

/// 默认（世界域）信道表：5 GHz 52..144 为 DFS，2.4 GHz 信道 14 禁用
pub const DEFAULT_CHANNEL_TABLE: [RegChannel; NUM_CHANNELS] = build_default_table();

const fn build_default_table() -> [RegChannel; NUM_CHANNELS] {
    let mut table = [RegChannel::new(0, ChannelState::Invalid); NUM_CHANNELS];
    let mut idx = 0;

    let mut chan = 1u8;
    while chan as usize <= NUM_2G_CHANNELS {
        let state = if chan == 14 {
            ChannelState::Disable
        } else {
            ChannelState::Enable
        };
        table[idx] = RegChannel::new(chan_to_freq(chan, Band::TwoGhz), state);
        idx += 1;
        chan += 1;
    }

    let mut i = 0;
    while i < CHANS_5G.len() {
        let chan = CHANS_5G[i];
        let state = if chan >= 52 && chan <= 144 {
            ChannelState::Dfs
        } else {
            ChannelState::Enable
        };
        table[idx] = RegChannel::new(chan_to_freq(chan, Band::FiveGhz), state);
        idx += 1;
        i += 1;
    }

    let mut n = 0;
    while n < NUM_6G_CHANNELS {
        let chan = (1 + n * 4) as u8;
        table[idx] = RegChannel::new(chan_to_freq(chan, Band::SixGhz), ChannelState::Enable);
        idx += 1;
        n += 1;
    }
    table
}

/// 在信道表中查找频率的监管状态；不在表中视为 Invalid
pub fn channel_state(table: &[RegChannel], freq: u32) -> ChannelState {
    table
        .iter()
        .find(|c| c.freq == freq)
        .map(|c| c.state)
        .unwrap_or(ChannelState::Invalid)
}
