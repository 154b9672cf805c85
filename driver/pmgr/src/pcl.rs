//! PCL（Preferred Channel List）生成
//!
//! 给定连接表快照与目标模式，按 PCL 类型把若干互不相交的信道组依次拼接，
//! 每组占用一个权重档（组 1 > 组 2 > 组 3 > 组 4）：
//!
//! - 已有连接的信道（可按 2.4→5 或 5→2.4 排序，可过滤 DFS）
//! - 2.4 GHz 全频段
//! - 5 GHz + 6 GHz 全频段（5G / 6G 先后由配置决定）
//! - 相对已有 5 GHz 连接可 SBS 的信道，不兼容的信道可作为低一档的尾组
//!
//! 拼接完成后做后处理：SAP/GO 的 LTE 不安全信道、监管禁用信道、
//! 以及（有 SAP 且不允许 STA+SAP DFS 同信道时的）DFS 信道权重清零。
//! 结果超过 weight_len 时截断并置 `truncated`。

use ieee80211::{channel_state, is_24ghz, is_5ghz, is_6ghz, ChannelState, NUM_CHANNELS};

use crate::callbacks::Regulatory;
use crate::cfgfile::PolicyConfig;
use crate::conn_table::{ConnSnapshot, ConnectionEntry, PmMode};
use crate::error::{PmResult, PolicyError};

pub const WEIGHT_OF_GROUP1_PCL_CHANNELS: u8 = 255;
pub const WEIGHT_OF_GROUP2_PCL_CHANNELS: u8 = 254;
pub const WEIGHT_OF_GROUP3_PCL_CHANNELS: u8 = 253;
pub const WEIGHT_OF_GROUP4_PCL_CHANNELS: u8 = 252;
pub const WEIGHT_OF_NON_PCL_CHANNELS: u8 = 1;
pub const WEIGHT_OF_DISALLOWED_CHANNELS: u8 = 0;

/// 权重档数
pub const PCL_GROUP_COUNT: usize = 4;

const PCL_GROUP_WEIGHTS: [u8; PCL_GROUP_COUNT] = [
    WEIGHT_OF_GROUP1_PCL_CHANNELS,
    WEIGHT_OF_GROUP2_PCL_CHANNELS,
    WEIGHT_OF_GROUP3_PCL_CHANNELS,
    WEIGHT_OF_GROUP4_PCL_CHANNELS,
];

/// PCL 类型：各组的拼接顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PclType {
    None,
    Band24,
    Band5,
    SccCh,
    MccCh,
    SccCh24g,
    SccCh5g,
    Band24SccCh,
    Band5SccCh,
    SccOn5SccOn24Band24,
    SccOn5SccOn24Band5,
    SccOn24SccOn5Band24,
    SccOn24SccOn5Band5,
    SccOn5SccOn24,
    SccOn24SccOn5,
    MccCh24g,
    MccCh5g,
    Band24MccCh,
    Band5MccCh,
    SbsCh,
    SbsCh5g,
    Scc24gSbsCh,
    Scc24gSbsCh5g,
    Band24SbsChMccCh,
    SbsChBand24SccCh,
    SbsChSccChBand24,
    SccChSbsChBand24,
    SbsChSccCh5gBand24,
    Scc24gBand24SbsCh5g,
    SbsChBand24,
}

impl PclType {
    pub const ALL: [PclType; 30] = [
        Self::None,
        Self::Band24,
        Self::Band5,
        Self::SccCh,
        Self::MccCh,
        Self::SccCh24g,
        Self::SccCh5g,
        Self::Band24SccCh,
        Self::Band5SccCh,
        Self::SccOn5SccOn24Band24,
        Self::SccOn5SccOn24Band5,
        Self::SccOn24SccOn5Band24,
        Self::SccOn24SccOn5Band5,
        Self::SccOn5SccOn24,
        Self::SccOn24SccOn5,
        Self::MccCh24g,
        Self::MccCh5g,
        Self::Band24MccCh,
        Self::Band5MccCh,
        Self::SbsCh,
        Self::SbsCh5g,
        Self::Scc24gSbsCh,
        Self::Scc24gSbsCh5g,
        Self::Band24SbsChMccCh,
        Self::SbsChBand24SccCh,
        Self::SbsChSccChBand24,
        Self::SccChSbsChBand24,
        Self::SbsChSccCh5gBand24,
        Self::Scc24gBand24SbsCh5g,
        Self::SbsChBand24,
    ];
}

/// 已有连接信道的排列方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnOrder {
    None,
    TwoGThenFiveG,
    FiveGThenTwoG,
}

/// 一次 PCL 计算请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PclRequest {
    pub pcl_type: PclType,
    pub mode: PmMode,
    /// 输出权重数组长度，超出部分截断
    pub weight_len: usize,
    /// 第一组使用的权重档（0 = 组 1）
    pub start_group: usize,
}

impl PclRequest {
    pub const fn new(pcl_type: PclType, mode: PmMode) -> Self {
        Self {
            pcl_type,
            mode,
            weight_len: NUM_CHANNELS,
            start_group: 0,
        }
    }
}

/// 有序信道列表 + 并行权重
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PclResult {
    freqs: [u32; NUM_CHANNELS],
    weights: [u8; NUM_CHANNELS],
    len: usize,
    capacity: usize,
    truncated: bool,
}

impl PclResult {
    pub fn new(capacity: usize) -> Self {
        Self {
            freqs: [0; NUM_CHANNELS],
            weights: [0; NUM_CHANNELS],
            len: 0,
            capacity: capacity.min(NUM_CHANNELS),
            truncated: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn freqs(&self) -> &[u32] {
        &self.freqs[..self.len]
    }

    pub fn weights(&self) -> &[u8] {
        &self.weights[..self.len]
    }

    /// 是否有信道因超出 weight_len 或 NUM_CHANNELS 被丢弃
    #[inline]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.freqs().iter().copied().zip(self.weights().iter().copied())
    }

    pub fn contains(&self, freq: u32) -> bool {
        self.freqs().contains(&freq)
    }

    pub fn weight_of(&self, freq: u32) -> Option<u8> {
        self.iter().find(|(f, _)| *f == freq).map(|(_, w)| w)
    }

    /// 追加信道；已存在的信道不重复添加。成功追加返回 true。
    fn push(&mut self, freq: u32, weight: u8) -> bool {
        if self.contains(freq) {
            return false;
        }
        if self.len >= self.capacity {
            if !self.truncated {
                log::debug!(target: "wireless::pmgr",
                    "pcl full ({}), dropping freq {} and later entries", self.capacity, freq);
            }
            self.truncated = true;
            return false;
        }
        self.freqs[self.len] = freq;
        self.weights[self.len] = weight;
        self.len += 1;
        true
    }
}

/// 两个信道是否落在 5 GHz 的不同子频段（可由两个 MAC 同时工作）。6 GHz 视为高子频段。
pub fn are_sbs_freqs(freq1: u32, freq2: u32, split_freq: u32) -> bool {
    let high_band = |f: u32| is_5ghz(f) || is_6ghz(f);
    high_band(freq1) && high_band(freq2) && ((freq1 <= split_freq) != (freq2 <= split_freq))
}

/// 模式能否使用 6 GHz
pub fn is_6ghz_allowed(mode: PmMode, config: &PolicyConfig) -> bool {
    match mode {
        PmMode::Sta => true,
        PmMode::Sap | PmMode::P2pGo => config.ap_6ghz_allowed,
        _ => false,
    }
}

/// SAP/GO 是否需要跳过 DFS 信道
pub fn skip_dfs_for_ap(conns: &ConnSnapshot, config: &PolicyConfig) -> bool {
    !config.dfs_master_enabled || (conns.has_mode(PmMode::Sta) && !config.sta_sap_scc_on_dfs_allowed)
}

#[derive(Clone, Copy)]
struct FreqList {
    freqs: [u32; NUM_CHANNELS],
    len: usize,
    /// 有信道因超出 NUM_CHANNELS 被丢弃
    overflow: bool,
}

impl FreqList {
    const fn new() -> Self {
        Self {
            freqs: [0; NUM_CHANNELS],
            len: 0,
            overflow: false,
        }
    }

    fn push(&mut self, freq: u32) {
        if self.as_slice().contains(&freq) {
            return;
        }
        if self.len >= NUM_CHANNELS {
            self.overflow = true;
            return;
        }
        self.freqs[self.len] = freq;
        self.len += 1;
    }

    fn as_slice(&self) -> &[u32] {
        &self.freqs[..self.len]
    }
}

/// 按频段划分的可用信道
struct ChannelBuckets {
    b24: FreqList,
    b5: FreqList,
    b6: FreqList,
}

impl ChannelBuckets {
    fn overflow(&self) -> bool {
        self.b24.overflow || self.b5.overflow || self.b6.overflow
    }
}

fn build_buckets(reg: &dyn Regulatory, mode: PmMode, config: &PolicyConfig, skip_dfs: bool) -> ChannelBuckets {
    let mut b = ChannelBuckets {
        b24: FreqList::new(),
        b5: FreqList::new(),
        b6: FreqList::new(),
    };
    let allow_6g = is_6ghz_allowed(mode, config);
    for ch in reg.channels() {
        if !ch.state.is_usable() || (skip_dfs && ch.is_dfs()) {
            continue;
        }
        if is_24ghz(ch.freq) {
            b.b24.push(ch.freq);
        } else if is_5ghz(ch.freq) {
            b.b5.push(ch.freq);
        } else if is_6ghz(ch.freq) && allow_6g {
            b.b6.push(ch.freq);
        }
    }
    b
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ConnBand {
    Any,
    TwoG,
    High,
}

struct Composer<'a> {
    out: PclResult,
    group: usize,
    mode: PmMode,
    conns: &'a ConnSnapshot,
    buckets: &'a ChannelBuckets,
    reg: &'a dyn Regulatory,
    config: &'a PolicyConfig,
    skip_dfs: bool,
}

impl<'a> Composer<'a> {
    fn weight(&self) -> u8 {
        PCL_GROUP_WEIGHTS[self.group.min(PCL_GROUP_COUNT - 1)]
    }

    /// 以当前权重档追加一组；组非空时消耗该档
    fn add_group<I: IntoIterator<Item = u32>>(&mut self, freqs: I) {
        let weight = self.weight();
        let mut added = false;
        for f in freqs {
            added |= self.out.push(f, weight);
        }
        if added {
            self.group += 1;
        }
    }

    fn conn_eligible(&self, c: &ConnectionEntry) -> bool {
        if self.skip_dfs
            && (c.is_dfs() || channel_state(self.reg.channels(), c.freq) == ChannelState::Dfs)
        {
            return false;
        }
        !(is_6ghz(c.freq) && !is_6ghz_allowed(self.mode, self.config))
    }

    fn connection_channels(&self, band: ConnBand) -> FreqList {
        let mut list = FreqList::new();
        for c in self.conns.iter().filter(|c| self.conn_eligible(c)) {
            let keep = match band {
                ConnBand::Any => true,
                ConnBand::TwoG => is_24ghz(c.freq),
                ConnBand::High => !is_24ghz(c.freq),
            };
            if keep {
                list.push(c.freq);
            }
        }
        list
    }

    fn add_connection_channels(&mut self, order: ConnOrder) {
        match order {
            ConnOrder::None => {
                let l = self.connection_channels(ConnBand::Any);
                self.add_group(l.as_slice().iter().copied());
            }
            ConnOrder::TwoGThenFiveG => {
                self.add_connection_channels_in(ConnBand::TwoG);
                self.add_connection_channels_in(ConnBand::High);
            }
            ConnOrder::FiveGThenTwoG => {
                self.add_connection_channels_in(ConnBand::High);
                self.add_connection_channels_in(ConnBand::TwoG);
            }
        }
    }

    fn add_connection_channels_in(&mut self, band: ConnBand) {
        let l = self.connection_channels(band);
        self.add_group(l.as_slice().iter().copied());
    }

    fn add_band24(&mut self) {
        let buckets = self.buckets;
        self.add_group(buckets.b24.as_slice().iter().copied());
    }

    /// 5 GHz + 6 GHz，先后顺序由配置决定
    fn high_band(&self) -> FreqList {
        let (first, second) = if self.config.prefer_6g_over_5g {
            (&self.buckets.b6, &self.buckets.b5)
        } else {
            (&self.buckets.b5, &self.buckets.b6)
        };
        let mut l = FreqList::new();
        for f in first.as_slice().iter().chain(second.as_slice()) {
            l.push(*f);
        }
        l
    }

    fn add_band5(&mut self) {
        let l = self.high_band();
        self.add_group(l.as_slice().iter().copied());
    }

    /// 相对第一个 5 GHz 连接可 SBS 的信道；spill 时其余高频信道作为下一组
    fn add_sbs_channels(&mut self, spill: bool) {
        let high = self.high_band();
        let anchor = self.conns.iter().find(|c| is_5ghz(c.freq)).map(|c| c.freq);
        let split = self.config.sbs_split_freq;
        match anchor {
            None => self.add_group(high.as_slice().iter().copied()),
            Some(anchor) => {
                self.add_group(
                    high.as_slice()
                        .iter()
                        .copied()
                        .filter(|f| are_sbs_freqs(anchor, *f, split)),
                );
                if spill {
                    self.add_group(
                        high.as_slice()
                            .iter()
                            .copied()
                            .filter(|f| !are_sbs_freqs(anchor, *f, split)),
                    );
                }
            }
        }
    }

    fn compose(&mut self, pcl_type: PclType) {
        use PclType::*;
        match pcl_type {
            None => {}
            Band24 => self.add_band24(),
            Band5 => self.add_band5(),
            SccCh | MccCh => self.add_connection_channels(ConnOrder::None),
            SccCh24g | MccCh24g => {
                self.add_connection_channels(ConnOrder::None);
                self.add_band24();
            }
            SccCh5g | MccCh5g => {
                self.add_connection_channels(ConnOrder::None);
                self.add_band5();
            }
            Band24SccCh | Band24MccCh => {
                self.add_band24();
                self.add_connection_channels(ConnOrder::None);
            }
            Band5SccCh | Band5MccCh => {
                self.add_band5();
                self.add_connection_channels(ConnOrder::None);
            }
            SccOn5SccOn24Band24 => {
                self.add_connection_channels(ConnOrder::FiveGThenTwoG);
                self.add_band24();
            }
            SccOn5SccOn24Band5 => {
                self.add_connection_channels(ConnOrder::FiveGThenTwoG);
                self.add_band5();
            }
            SccOn24SccOn5Band24 => {
                self.add_connection_channels(ConnOrder::TwoGThenFiveG);
                self.add_band24();
            }
            SccOn24SccOn5Band5 => {
                self.add_connection_channels(ConnOrder::TwoGThenFiveG);
                self.add_band5();
            }
            SccOn5SccOn24 => self.add_connection_channels(ConnOrder::FiveGThenTwoG),
            SccOn24SccOn5 => self.add_connection_channels(ConnOrder::TwoGThenFiveG),
            SbsCh => self.add_sbs_channels(false),
            SbsCh5g => self.add_sbs_channels(true),
            Scc24gSbsCh => {
                self.add_connection_channels_in(ConnBand::TwoG);
                self.add_sbs_channels(false);
            }
            Scc24gSbsCh5g => {
                self.add_connection_channels_in(ConnBand::TwoG);
                self.add_sbs_channels(true);
            }
            Band24SbsChMccCh => {
                self.add_band24();
                self.add_sbs_channels(false);
                self.add_connection_channels(ConnOrder::None);
            }
            SbsChBand24SccCh => {
                self.add_sbs_channels(false);
                self.add_band24();
                self.add_connection_channels(ConnOrder::None);
            }
            SbsChSccChBand24 => {
                self.add_sbs_channels(false);
                self.add_connection_channels(ConnOrder::None);
                self.add_band24();
            }
            SccChSbsChBand24 => {
                self.add_connection_channels(ConnOrder::None);
                self.add_sbs_channels(false);
                self.add_band24();
            }
            SbsChSccCh5gBand24 => {
                self.add_sbs_channels(false);
                self.add_connection_channels(ConnOrder::None);
                self.add_band5();
                self.add_band24();
            }
            // 两段拼接：2.4G SCC + 2.4G，再接 SBS（含 5G 尾组）
            Scc24gBand24SbsCh5g => {
                self.add_connection_channels_in(ConnBand::TwoG);
                self.add_band24();
                self.compose(SbsCh5g);
            }
            SbsChBand24 => {
                self.add_sbs_channels(false);
                self.add_band24();
            }
        }
    }

    /// 后处理：不可用 / 不安全 / 受限 DFS 信道权重清零
    fn finish(mut self) -> PclResult {
        let reg_channels = self.reg.channels();
        let unsafe_list = self.reg.unsafe_channels();
        let zero_dfs = !self.config.sta_sap_scc_on_dfs_allowed && self.conns.has_mode(PmMode::Sap);
        for i in 0..self.out.len {
            let freq = self.out.freqs[i];
            let state = channel_state(reg_channels, freq);
            let disallowed = !state.is_usable()
                || (self.mode.is_ap() && unsafe_list.contains(&freq))
                || (zero_dfs && state == ChannelState::Dfs);
            if disallowed {
                self.out.weights[i] = WEIGHT_OF_DISALLOWED_CHANNELS;
            }
        }
        self.out
    }
}

/// 按请求生成 PCL。PCL 类型为 None 时返回空列表。
pub fn get_channel_list(
    req: &PclRequest,
    conns: &ConnSnapshot,
    reg: &dyn Regulatory,
    config: &PolicyConfig,
) -> PmResult<PclResult> {
    if req.weight_len == 0 || req.start_group >= PCL_GROUP_COUNT {
        log::error!(target: "wireless::pmgr",
            "get_channel_list: bad weight_len {} / start_group {}", req.weight_len, req.start_group);
        return Err(PolicyError::InvalidArgument);
    }
    if req.pcl_type == PclType::None {
        return Ok(PclResult::new(req.weight_len));
    }

    let skip_dfs = req.mode.is_ap() && skip_dfs_for_ap(conns, config);
    let buckets = build_buckets(reg, req.mode, config, skip_dfs);
    let mut out = PclResult::new(req.weight_len);
    if buckets.overflow() {
        log::warn!(target: "wireless::pmgr",
            "regulatory table has more than {} channels per band, extra dropped", NUM_CHANNELS);
        out.truncated = true;
    }
    let mut composer = Composer {
        out,
        group: req.start_group,
        mode: req.mode,
        conns,
        buckets: &buckets,
        reg,
        config,
        skip_dfs,
    };
    composer.compose(req.pcl_type);
    let out = composer.finish();
    log::debug!(target: "wireless::pmgr",
        "pcl {:?} mode={:?}: {} channel(s), skip_dfs={} truncated={}",
        req.pcl_type, req.mode, out.len(), skip_dfs, out.truncated());
    Ok(out)
}
