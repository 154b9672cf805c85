//! IEEE 802.11 频段、信道与带宽
//!
//! 频率统一以 MHz (u32) 表示；信道号与频率的换算按 802.11 各频段的起始频率计算。

/// 2.4 GHz 频段起止（信道 1..14）
pub const FREQ_2G_MIN: u32 = 2412;
pub const FREQ_2G_MAX: u32 = 2484;
/// 5 GHz 频段起止（含 4.9 GHz 公共安全信道）
pub const FREQ_5G_MIN: u32 = 4900;
pub const FREQ_5G_MAX: u32 = 5900;
/// 6 GHz 频段起止（UNII-5 ~ UNII-8）
pub const FREQ_6G_MIN: u32 = 5935;
pub const FREQ_6G_MAX: u32 = 7125;

/// 频段（对应 NL80211_BAND_*）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Band {
    #[default]
    TwoGhz = 0,
    FiveGhz = 1,
    SixGhz = 2,
}

/// 频率所属频段；不在任何频段内返回 None
pub const fn freq_to_band(freq: u32) -> Option<Band> {
    if freq >= FREQ_2G_MIN && freq <= FREQ_2G_MAX {
        Some(Band::TwoGhz)
    } else if freq >= FREQ_5G_MIN && freq <= FREQ_5G_MAX {
        Some(Band::FiveGhz)
    } else if freq >= FREQ_6G_MIN && freq <= FREQ_6G_MAX {
        Some(Band::SixGhz)
    } else {
        None
    }
}

#[inline]
pub const fn is_24ghz(freq: u32) -> bool {
    freq >= FREQ_2G_MIN && freq <= FREQ_2G_MAX
}

#[inline]
pub const fn is_5ghz(freq: u32) -> bool {
    freq >= FREQ_5G_MIN && freq <= FREQ_5G_MAX
}

#[inline]
pub const fn is_6ghz(freq: u32) -> bool {
    freq >= FREQ_6G_MIN && freq <= FREQ_6G_MAX
}

/// 两个频率是否同一频段。5 GHz 与 6 GHz 共用高频射频链，按同频段处理。
pub fn is_same_band(freq1: u32, freq2: u32) -> bool {
    match (freq_to_band(freq1), freq_to_band(freq2)) {
        (Some(Band::TwoGhz), Some(Band::TwoGhz)) => true,
        (Some(b1), Some(b2)) => b1 != Band::TwoGhz && b2 != Band::TwoGhz,
        _ => false,
    }
}

/// 频率 -> 信道号（ieee80211_frequency_to_channel）
pub const fn freq_to_chan(freq: u32) -> u8 {
    if freq == 2484 {
        14
    } else if is_24ghz(freq) {
        ((freq - 2407) / 5) as u8
    } else if is_6ghz(freq) {
        if freq == 5935 {
            2
        } else {
            ((freq - 5950) / 5) as u8
        }
    } else if freq >= 5000 && freq <= FREQ_5G_MAX {
        ((freq - 5000) / 5) as u8
    } else if freq >= FREQ_5G_MIN && freq < 5000 {
        ((freq - 4000) / 5) as u8
    } else {
        0
    }
}

/// 信道号 + 频段 -> 频率（ieee80211_channel_to_frequency）；无效组合返回 0
pub const fn chan_to_freq(chan: u8, band: Band) -> u32 {
    let chan = chan as u32;
    match band {
        Band::TwoGhz => {
            if chan == 14 {
                2484
            } else if chan >= 1 && chan < 14 {
                2407 + chan * 5
            } else {
                0
            }
        }
        Band::FiveGhz => {
            if chan >= 182 && chan <= 196 {
                4000 + chan * 5
            } else if chan >= 1 {
                5000 + chan * 5
            } else {
                0
            }
        }
        Band::SixGhz => {
            if chan == 2 {
                5935
            } else if chan >= 1 && chan <= 233 {
                5950 + chan * 5
            } else {
                0
            }
        }
    }
}

/// 信道（中心频率 + 所属频段）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    /// 中心频率 MHz
    pub center_freq: u32,
    pub band: Band,
}

impl Channel {
    pub const fn from_freq(freq: u32) -> Option<Self> {
        match freq_to_band(freq) {
            Some(band) => Some(Self { center_freq: freq, band }),
            None => None,
        }
    }

    pub const fn number(&self) -> u8 {
        freq_to_chan(self.center_freq)
    }
}

/// 信道带宽（HW_MODE_BW_* 同一编码，数值越大带宽越宽）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum ChanWidth {
    #[default]
    None = 0,
    Mhz5 = 1,
    Mhz10 = 2,
    Mhz20 = 3,
    Mhz40 = 4,
    Mhz80 = 5,
    Mhz160 = 6,
    Mhz80P80 = 7,
}

impl ChanWidth {
    /// 从 4 bit 固件编码转换；超出范围的值视为 None
    pub const fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::Mhz5,
            2 => Self::Mhz10,
            3 => Self::Mhz20,
            4 => Self::Mhz40,
            5 => Self::Mhz80,
            6 => Self::Mhz160,
            7 => Self::Mhz80P80,
            _ => Self::None,
        }
    }

    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// 占用带宽 MHz（80+80 按 160 计）
    pub const fn mhz(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Mhz5 => 5,
            Self::Mhz10 => 10,
            Self::Mhz20 => 20,
            Self::Mhz40 => 40,
            Self::Mhz80 => 80,
            Self::Mhz160 | Self::Mhz80P80 => 160,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_of_common_freqs() {
        assert_eq!(freq_to_band(2437), Some(Band::TwoGhz));
        assert_eq!(freq_to_band(5180), Some(Band::FiveGhz));
        assert_eq!(freq_to_band(5955), Some(Band::SixGhz));
        assert_eq!(freq_to_band(1000), None);
        assert!(is_same_band(5180, 5955));
        assert!(!is_same_band(2412, 5180));
    }

    #[test]
    fn chan_freq_conversion() {
        assert_eq!(freq_to_chan(2412), 1);
        assert_eq!(freq_to_chan(2484), 14);
        assert_eq!(freq_to_chan(5745), 149);
        assert_eq!(freq_to_chan(5955), 1);
        assert_eq!(chan_to_freq(36, Band::FiveGhz), 5180);
        assert_eq!(chan_to_freq(6, Band::TwoGhz), 2437);
        assert_eq!(chan_to_freq(0, Band::TwoGhz), 0);
    }

    #[test]
    fn width_ordering_follows_encoding() {
        assert!(ChanWidth::Mhz80 > ChanWidth::Mhz40);
        assert_eq!(ChanWidth::from_bits(5), ChanWidth::Mhz80);
        assert_eq!(ChanWidth::from_bits(12), ChanWidth::None);
        assert_eq!(ChanWidth::Mhz80P80.mhz(), 160);
    }
}
