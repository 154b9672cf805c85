//! 硬件模式目录
//!
//! 固件在初始化时上报芯片支持的 hw mode 列表，每项是一个 32 bit 能力字：
//!
//! | bit    | 字段 |
//! |--------|------|
//! | 28..31 | mac0 tx 流数 |
//! | 24..27 | mac0 rx 流数 |
//! | 20..23 | mac1 tx 流数 |
//! | 16..19 | mac1 rx 流数 |
//! | 12..15 | mac0 带宽 |
//! | 8..11  | mac1 带宽 |
//! | 6..7   | mac0 频段限制 |
//! | 5      | DBS |
//! | 4      | Agile DFS |
//! | 3      | SBS |
//!
//! 能力字只在 `decode_hw_mode_word` 中解析一次，之后全部使用 `HwModeDescriptor`。
//! 目录顺序即固件的偏好顺序，能力匹配时先匹配到的胜出。

use alloc::vec::Vec;

use ieee80211::{Band, ChanWidth};

/// 能力字各字段的位置与掩码
pub mod hw_mode_bits {
    pub const MAC0_TX_STREAMS_BITPOS: u32 = 28;
    pub const MAC0_RX_STREAMS_BITPOS: u32 = 24;
    pub const MAC1_TX_STREAMS_BITPOS: u32 = 20;
    pub const MAC1_RX_STREAMS_BITPOS: u32 = 16;
    pub const MAC0_BANDWIDTH_BITPOS: u32 = 12;
    pub const MAC1_BANDWIDTH_BITPOS: u32 = 8;
    pub const MAC0_BAND_BITPOS: u32 = 6;
    pub const DBS_MODE_BITPOS: u32 = 5;
    pub const AGILE_DFS_MODE_BITPOS: u32 = 4;
    pub const SBS_MODE_BITPOS: u32 = 3;

    pub const STREAMS_MASK: u32 = 0xf;
    pub const BANDWIDTH_MASK: u32 = 0xf;
    pub const BAND_MASK: u32 = 0x3;
    pub const FLAG_MASK: u32 = 0x1;
}

use hw_mode_bits::*;

/// mac0 的频段限制
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MacBand {
    #[default]
    None = 0,
    TwoGhz = 1,
    FiveGhz = 2,
}

impl MacBand {
    pub const fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::TwoGhz,
            2 => Self::FiveGhz,
            _ => Self::None,
        }
    }
}

/// 单个 MAC 的能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacCaps {
    pub tx_streams: u8,
    pub rx_streams: u8,
    pub bw: ChanWidth,
}

impl MacCaps {
    pub const NONE: MacCaps = MacCaps {
        tx_streams: 0,
        rx_streams: 0,
        bw: ChanWidth::None,
    };

    pub const fn new(tx_streams: u8, rx_streams: u8, bw: ChanWidth) -> Self {
        Self {
            tx_streams,
            rx_streams,
            bw,
        }
    }

    /// tx / rx 中较小的流数
    #[inline]
    pub fn min_ss(&self) -> u8 {
        self.tx_streams.min(self.rx_streams)
    }

    /// 每一项都不低于 req
    #[inline]
    fn covers(&self, req: &MacCaps) -> bool {
        self.tx_streams >= req.tx_streams && self.rx_streams >= req.rx_streams && self.bw >= req.bw
    }
}

/// hw mode 对应的动作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwModeAction {
    SingleMac,
    /// 两个 MAC 流数相同的 DBS
    Dbs,
    /// DBS，mac0 流数更多
    Dbs1,
    /// DBS，mac1 流数更多
    Dbs2,
    Sbs,
}

/// 一个固件支持的 hw mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HwModeDescriptor {
    pub id: u32,
    pub mac0: MacCaps,
    pub mac1: MacCaps,
    pub mac0_band: MacBand,
    pub dbs: bool,
    pub agile_dfs: bool,
    pub sbs: bool,
}

impl HwModeDescriptor {
    /// DBS 时由两个 MAC 的最小流数差异决定 DBS / DBS1 / DBS2
    pub fn action_type(&self) -> HwModeAction {
        if self.dbs {
            let mac0_ss = self.mac0.min_ss();
            let mac1_ss = self.mac1.min_ss();
            if mac0_ss > mac1_ss {
                HwModeAction::Dbs1
            } else if mac0_ss < mac1_ss {
                HwModeAction::Dbs2
            } else {
                HwModeAction::Dbs
            }
        } else if self.sbs {
            HwModeAction::Sbs
        } else {
            HwModeAction::SingleMac
        }
    }

    #[inline]
    pub fn is_single_mac(&self) -> bool {
        !self.dbs && !self.sbs
    }

    /// 该 hw mode 下承载 band 的 MAC。非 DBS 时为 mac0（SBS 的 5 GHz 由上下文按子频段分配）；
    /// DBS 且 mac0 无频段限制时按 mac0 = 5 GHz、mac1 = 2.4 GHz 处理。
    pub fn mac_for_band(&self, band: Band) -> u8 {
        if !self.dbs {
            return 0;
        }
        let is_2g = band == Band::TwoGhz;
        match self.mac0_band {
            MacBand::TwoGhz => {
                if is_2g {
                    0
                } else {
                    1
                }
            }
            MacBand::FiveGhz | MacBand::None => {
                if is_2g {
                    1
                } else {
                    0
                }
            }
        }
    }
}

/// 解析固件能力字
pub fn decode_hw_mode_word(id: u32, word: u32) -> HwModeDescriptor {
    let field = |pos: u32, mask: u32| (word >> pos) & mask;
    HwModeDescriptor {
        id,
        mac0: MacCaps::new(
            field(MAC0_TX_STREAMS_BITPOS, STREAMS_MASK) as u8,
            field(MAC0_RX_STREAMS_BITPOS, STREAMS_MASK) as u8,
            ChanWidth::from_bits(field(MAC0_BANDWIDTH_BITPOS, BANDWIDTH_MASK)),
        ),
        mac1: MacCaps::new(
            field(MAC1_TX_STREAMS_BITPOS, STREAMS_MASK) as u8,
            field(MAC1_RX_STREAMS_BITPOS, STREAMS_MASK) as u8,
            ChanWidth::from_bits(field(MAC1_BANDWIDTH_BITPOS, BANDWIDTH_MASK)),
        ),
        mac0_band: MacBand::from_bits(field(MAC0_BAND_BITPOS, BAND_MASK)),
        dbs: field(DBS_MODE_BITPOS, FLAG_MASK) != 0,
        agile_dfs: field(AGILE_DFS_MODE_BITPOS, FLAG_MASK) != 0,
        sbs: field(SBS_MODE_BITPOS, FLAG_MASK) != 0,
    }
}

/// 生成固件能力字（固件模拟与测试用）
pub fn encode_hw_mode_word(d: &HwModeDescriptor) -> u32 {
    ((d.mac0.tx_streams as u32 & STREAMS_MASK) << MAC0_TX_STREAMS_BITPOS)
        | ((d.mac0.rx_streams as u32 & STREAMS_MASK) << MAC0_RX_STREAMS_BITPOS)
        | ((d.mac1.tx_streams as u32 & STREAMS_MASK) << MAC1_TX_STREAMS_BITPOS)
        | ((d.mac1.rx_streams as u32 & STREAMS_MASK) << MAC1_RX_STREAMS_BITPOS)
        | ((d.mac0.bw.bits() & BANDWIDTH_MASK) << MAC0_BANDWIDTH_BITPOS)
        | ((d.mac1.bw.bits() & BANDWIDTH_MASK) << MAC1_BANDWIDTH_BITPOS)
        | (((d.mac0_band as u32) & BAND_MASK) << MAC0_BAND_BITPOS)
        | ((d.dbs as u32) << DBS_MODE_BITPOS)
        | ((d.agile_dfs as u32) << AGILE_DFS_MODE_BITPOS)
        | ((d.sbs as u32) << SBS_MODE_BITPOS)
}

/// 能力匹配条件：流数与带宽是下限，DBS/Agile DFS/SBS 与（非 None 的）mac0 频段须完全一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HwModeQuery {
    pub mac0: MacCaps,
    pub mac1: MacCaps,
    pub mac0_band: MacBand,
    pub dbs: bool,
    pub agile_dfs: bool,
    pub sbs: bool,
}

impl HwModeQuery {
    /// 单 MAC：mac0 给定流数与带宽
    pub const fn single_mac(ss: u8, bw: ChanWidth) -> Self {
        Self {
            mac0: MacCaps::new(ss, ss, bw),
            mac1: MacCaps::NONE,
            mac0_band: MacBand::None,
            dbs: false,
            agile_dfs: false,
            sbs: false,
        }
    }

    pub const fn dbs(mac0_ss: u8, mac0_bw: ChanWidth, mac1_ss: u8, mac1_bw: ChanWidth) -> Self {
        Self {
            mac0: MacCaps::new(mac0_ss, mac0_ss, mac0_bw),
            mac1: MacCaps::new(mac1_ss, mac1_ss, mac1_bw),
            mac0_band: MacBand::None,
            dbs: true,
            agile_dfs: false,
            sbs: false,
        }
    }

    pub const fn sbs(ss: u8, bw: ChanWidth) -> Self {
        Self {
            mac0: MacCaps::new(ss, ss, bw),
            mac1: MacCaps::new(ss, ss, bw),
            mac0_band: MacBand::None,
            dbs: false,
            agile_dfs: false,
            sbs: true,
        }
    }
}

/// 固件上报的 hw mode 目录；初始化后只读，固件重新初始化时整体替换
#[derive(Debug, Clone, Default)]
pub struct HwModeCatalog {
    modes: Vec<HwModeDescriptor>,
}

impl HwModeCatalog {
    pub const fn new() -> Self {
        Self { modes: Vec::new() }
    }

    /// 由固件能力字列表构造，id 为列表下标
    pub fn from_fw_words(words: &[u32]) -> Self {
        let modes = words
            .iter()
            .enumerate()
            .map(|(i, w)| decode_hw_mode_word(i as u32, *w))
            .collect();
        Self { modes }
    }

    pub fn from_descriptors(modes: Vec<HwModeDescriptor>) -> Self {
        Self { modes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, HwModeDescriptor> {
        self.modes.iter()
    }

    /// 线性扫描，返回第一个满足 query 的 hw mode id
    pub fn match_capability(&self, q: &HwModeQuery) -> Option<u32> {
        let found = self.modes.iter().find(|m| {
            m.mac0.covers(&q.mac0)
                && m.mac1.covers(&q.mac1)
                && m.dbs == q.dbs
                && m.agile_dfs == q.agile_dfs
                && m.sbs == q.sbs
                && (q.mac0_band == MacBand::None || m.mac0_band == q.mac0_band)
        });
        match found {
            Some(m) => Some(m.id),
            None => {
                log::debug!(target: "wireless::pmgr", "no hw mode matches {:?}", q);
                None
            }
        }
    }

    pub fn lookup_by_id(&self, id: u32) -> Option<HwModeDescriptor> {
        self.modes.iter().find(|m| m.id == id).copied()
    }

    pub fn is_dbs_capable(&self) -> bool {
        self.modes.iter().any(|m| m.dbs)
    }

    pub fn is_sbs_capable(&self) -> bool {
        self.modes.iter().any(|m| m.sbs)
    }

    pub fn is_agile_dfs_capable(&self) -> bool {
        self.modes.iter().any(|m| m.agile_dfs)
    }

    /// 是否存在两个 MAC 都为 2x2 的 DBS 模式
    pub fn is_dbs_2x2_capable(&self) -> bool {
        self.modes
            .iter()
            .any(|m| m.dbs && m.mac0.min_ss() >= 2 && m.mac1.min_ss() >= 2)
    }
}

/// 固件随 hw mode 目录一起上报的其它能力
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwCaps {
    /// 单 MAC 上支持跨频段 MCC
    pub interband_mcc: bool,
    pub max_connections: usize,
}

impl Default for HwCaps {
    fn default() -> Self {
        Self {
            interband_mcc: false,
            max_connections: crate::conn_table::MAX_CONC_CONNECTIONS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn desc(id: u32, m0: (u8, ChanWidth), m1: (u8, ChanWidth), dbs: bool, sbs: bool) -> HwModeDescriptor {
        HwModeDescriptor {
            id,
            mac0: MacCaps::new(m0.0, m0.0, m0.1),
            mac1: MacCaps::new(m1.0, m1.0, m1.1),
            mac0_band: MacBand::None,
            dbs,
            agile_dfs: false,
            sbs,
        }
    }

    /// 常见 2x2 DBS 芯片：单 MAC 2x2/80、DBS 2x2+1x1、DBS 1x1+1x1、SBS 2x2+2x2
    fn catalog() -> HwModeCatalog {
        HwModeCatalog::from_descriptors(vec![
            desc(0, (2, ChanWidth::Mhz80), (0, ChanWidth::None), false, false),
            desc(1, (2, ChanWidth::Mhz80), (1, ChanWidth::Mhz40), true, false),
            desc(2, (1, ChanWidth::Mhz80), (1, ChanWidth::Mhz40), true, false),
            desc(3, (2, ChanWidth::Mhz80), (2, ChanWidth::Mhz80), false, true),
        ])
    }

    #[test]
    fn decode_known_word() {
        // mac0 2x2/80, mac1 1x1/40, mac0 限 5G, DBS
        let word = (2 << 28) | (2 << 24) | (1 << 20) | (1 << 16) | (5 << 12) | (4 << 8) | (2 << 6) | (1 << 5);
        let d = decode_hw_mode_word(7, word);
        assert_eq!(d.id, 7);
        assert_eq!(d.mac0, MacCaps::new(2, 2, ChanWidth::Mhz80));
        assert_eq!(d.mac1, MacCaps::new(1, 1, ChanWidth::Mhz40));
        assert_eq!(d.mac0_band, MacBand::FiveGhz);
        assert!(d.dbs && !d.sbs && !d.agile_dfs);
        assert_eq!(encode_hw_mode_word(&d), word);
        assert_eq!(d.action_type(), HwModeAction::Dbs1);
    }

    #[test]
    fn match_is_greater_or_equal_and_first_wins() {
        let c = catalog();
        // 1x1 单 MAC 请求被 2x2 单 MAC 满足
        assert_eq!(c.match_capability(&HwModeQuery::single_mac(1, ChanWidth::Mhz20)), Some(0));
        // 1x1 + 1x1 DBS：id 1 和 id 2 都满足，目录中先出现的 id 1 胜出
        assert_eq!(
            c.match_capability(&HwModeQuery::dbs(1, ChanWidth::Mhz40, 1, ChanWidth::Mhz20)),
            Some(1)
        );
        assert_eq!(
            c.match_capability(&HwModeQuery::dbs(2, ChanWidth::Mhz80, 2, ChanWidth::Mhz80)),
            None
        );
        assert_eq!(c.match_capability(&HwModeQuery::sbs(2, ChanWidth::Mhz80)), Some(3));
        assert_eq!(c.match_capability(&HwModeQuery::single_mac(2, ChanWidth::Mhz160)), None);
    }

    #[test]
    fn match_never_returns_weaker_mode() {
        let c = catalog();
        let queries = [
            HwModeQuery::single_mac(1, ChanWidth::Mhz40),
            HwModeQuery::single_mac(2, ChanWidth::Mhz80),
            HwModeQuery::dbs(1, ChanWidth::Mhz20, 1, ChanWidth::Mhz20),
            HwModeQuery::dbs(2, ChanWidth::Mhz40, 1, ChanWidth::Mhz40),
            HwModeQuery::sbs(1, ChanWidth::Mhz20),
        ];
        for q in queries.iter() {
            let id = c.match_capability(q).unwrap();
            let m = c.lookup_by_id(id).unwrap();
            assert!(m.mac0.tx_streams >= q.mac0.tx_streams && m.mac0.bw >= q.mac0.bw);
            assert!(m.mac1.rx_streams >= q.mac1.rx_streams && m.mac1.bw >= q.mac1.bw);
            assert_eq!((m.dbs, m.sbs), (q.dbs, q.sbs));
        }
    }

    #[test]
    fn band_restriction_must_match_when_given() {
        let mut d = desc(0, (2, ChanWidth::Mhz80), (1, ChanWidth::Mhz40), true, false);
        d.mac0_band = MacBand::TwoGhz;
        let c = HwModeCatalog::from_fw_words(&[encode_hw_mode_word(&d)]);
        let mut q = HwModeQuery::dbs(1, ChanWidth::Mhz20, 1, ChanWidth::Mhz20);
        assert_eq!(c.match_capability(&q), Some(0));
        q.mac0_band = MacBand::FiveGhz;
        assert_eq!(c.match_capability(&q), None);
        q.mac0_band = MacBand::TwoGhz;
        assert_eq!(c.match_capability(&q), Some(0));
        assert_eq!(d.mac_for_band(Band::TwoGhz), 0);
        assert_eq!(d.mac_for_band(Band::FiveGhz), 1);
    }

    #[test]
    fn action_types_and_capabilities() {
        let c = catalog();
        assert_eq!(c.lookup_by_id(0).unwrap().action_type(), HwModeAction::SingleMac);
        assert_eq!(c.lookup_by_id(1).unwrap().action_type(), HwModeAction::Dbs1);
        assert_eq!(c.lookup_by_id(2).unwrap().action_type(), HwModeAction::Dbs);
        assert_eq!(c.lookup_by_id(3).unwrap().action_type(), HwModeAction::Sbs);
        let d2 = desc(9, (1, ChanWidth::Mhz40), (2, ChanWidth::Mhz80), true, false);
        assert_eq!(d2.action_type(), HwModeAction::Dbs2);
        assert!(c.lookup_by_id(42).is_none());
        assert!(c.is_dbs_capable() && c.is_sbs_capable());
        assert!(!c.is_dbs_2x2_capable());
        assert!(!HwModeCatalog::new().is_dbs_capable());
    }
}
