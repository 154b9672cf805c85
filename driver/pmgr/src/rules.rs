//! 并发规则
//!
//! 候选 BSS 校验阶段调用的判定函数。判定只读取连接表快照，不修改任何状态；
//! 拒绝时调用方换下一个候选或上报连接失败。

use ieee80211::{channel_state, is_24ghz, is_5ghz, is_same_band, ChanWidth, ChannelState, RegChannel};

use crate::cfgfile::{MccToSccSwitch, PolicyConfig};
use crate::conn_table::{ConnSnapshot, ConnectionEntry, PmMode, MAX_CONC_CONNECTIONS};
use crate::context::PolicyManagerContext;
use crate::pcl::are_sbs_freqs;

/// 规则判定用到的芯片能力（已叠加 dual_mac_disable）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChipCaps {
    pub dbs: bool,
    pub sbs: bool,
    pub interband_mcc: bool,
    pub max_connections: usize,
}

impl ChipCaps {
    /// 单 MAC、不支持跨频段 MCC 的芯片
    #[inline]
    pub fn is_legacy_single_mac(&self) -> bool {
        !self.dbs && !self.interband_mcc
    }
}

fn conn_is_dfs(c: &ConnectionEntry, reg: &[RegChannel]) -> bool {
    c.is_dfs() || channel_state(reg, c.freq) == ChannelState::Dfs
}

/// 已有连接中有 DFS 信道上的 SAP/GO 时，不允许在另一个 5 GHz 信道上做 MCC
pub fn is_5g_channel_allowed(conns: &ConnSnapshot, reg: &[RegChannel], freq: u32, mode: PmMode) -> bool {
    if !is_5ghz(freq) {
        return true;
    }
    for c in conns.iter() {
        if c.mode.is_ap() && c.freq != freq && is_5ghz(c.freq) && conn_is_dfs(c, reg) {
            log::warn!(target: "wireless::pmgr",
                "{:?} on {} would MCC with DFS {:?} on {}", mode, freq, c.mode, c.freq);
            return false;
        }
    }
    true
}

/// NAN 发现与 NDI 在固件中按时隙共享 MAC，第三个连接可以与之同 MAC
fn is_nan_ndi_pair(a: &ConnectionEntry, b: &ConnectionEntry) -> bool {
    matches!(
        (a.mode, b.mode),
        (PmMode::NanDisc, PmMode::Ndi) | (PmMode::Ndi, PmMode::NanDisc)
    )
}

/// 在已有 num_connections 个连接的基础上，是否允许新连接使用 freq 作为 home channel
pub fn allow_new_home_channel(
    conns: &ConnSnapshot,
    chip: &ChipCaps,
    config: &PolicyConfig,
    mode: PmMode,
    freq: u32,
    num_connections: usize,
    is_dfs: bool,
) -> bool {
    let conns = conns.truncated(num_connections);
    let list = conns.as_slice();
    match list {
        [c0, c1] => {
            if config.mcc_to_scc_switch == MccToSccSwitch::ForceWithoutDisconnect
                && is_dfs
                && (c0.is_dfs() || c1.is_dfs())
            {
                log::warn!(target: "wireless::pmgr",
                    "force SCC: {:?} on DFS {} refused, DFS port already active", mode, freq);
                return false;
            }
            if freq == c0.freq || freq == c1.freq {
                return true;
            }
            if is_nan_ndi_pair(c0, c1) {
                return true;
            }
            if !chip.dbs {
                if !chip.interband_mcc {
                    log::warn!(target: "wireless::pmgr",
                        "third home channel {} refused on single-mac chip", freq);
                }
                return chip.interband_mcc;
            }
            let all_2g = is_24ghz(freq) && is_24ghz(c0.freq) && is_24ghz(c1.freq);
            let all_high = !is_24ghz(freq) && !is_24ghz(c0.freq) && !is_24ghz(c1.freq);
            if all_2g {
                log::warn!(target: "wireless::pmgr", "three 2.4 GHz home channels not allowed");
                return false;
            }
            if all_high {
                let split_ok = chip.sbs
                    && [c0.freq, c1.freq]
                        .iter()
                        .any(|f| are_sbs_freqs(*f, freq, config.sbs_split_freq));
                if !split_ok {
                    log::warn!(target: "wireless::pmgr", "three 5 GHz home channels on one mac not allowed");
                }
                return split_ok;
            }
            true
        }
        [c0] => {
            if freq != c0.freq && chip.is_legacy_single_mac() && !is_same_band(freq, c0.freq) {
                log::warn!(target: "wireless::pmgr",
                    "{:?} on {} needs interband MCC against {}", mode, freq, c0.freq);
                return false;
            }
            true
        }
        _ => true,
    }
}

/// 新连接（mode, freq, bw）能否与现有连接并发
pub fn is_concurrency_allowed(
    conns: &ConnSnapshot,
    chip: &ChipCaps,
    config: &PolicyConfig,
    reg: &[RegChannel],
    mode: PmMode,
    freq: u32,
    bw: ChanWidth,
) -> bool {
    let num = conns.len();
    if num >= chip.max_connections.min(MAX_CONC_CONNECTIONS) {
        log::warn!(target: "wireless::pmgr", "max concurrent connections reached ({})", num);
        return false;
    }
    if mode == PmMode::Sta && conns.has_mode(PmMode::Sta) && !config.allow_dual_sta {
        log::warn!(target: "wireless::pmgr", "dual STA not allowed");
        return false;
    }
    if !is_5g_channel_allowed(conns, reg, freq, mode) {
        return false;
    }
    let is_dfs = channel_state(reg, freq) == ChannelState::Dfs;
    if !allow_new_home_channel(conns, chip, config, mode, freq, num, is_dfs) {
        return false;
    }
    if chip.is_legacy_single_mac() {
        for c in conns.iter().filter(|c| c.freq != freq) {
            if mode == PmMode::NanDisc || c.mode == PmMode::NanDisc {
                continue;
            }
            if !is_same_band(freq, c.freq) {
                log::warn!(target: "wireless::pmgr",
                    "{:?} on {}: band differs from {:?} on {}", mode, freq, c.mode, c.freq);
                return false;
            }
            if c.bw != bw {
                log::warn!(target: "wireless::pmgr",
                    "{:?} on {}/{:?}: MCC needs matching bandwidth ({:?})", mode, freq, bw, c.bw);
                return false;
            }
        }
    }
    true
}

impl PolicyManagerContext {
    pub fn chip_caps(&self) -> ChipCaps {
        let caps = self.caps();
        ChipCaps {
            dbs: self.is_dbs_enabled(),
            sbs: self.is_sbs_enabled(),
            interband_mcc: caps.interband_mcc,
            max_connections: caps.max_connections,
        }
    }

    pub fn is_concurrency_allowed(&self, mode: PmMode, freq: u32, bw: ChanWidth) -> bool {
        let snap = self.table.snapshot();
        let reg = self.regulatory();
        is_concurrency_allowed(&snap, &self.chip_caps(), &self.config(), reg.channels(), mode, freq, bw)
    }

    pub fn allow_new_home_channel(&self, mode: PmMode, freq: u32, num_connections: usize, is_dfs: bool) -> bool {
        let snap = self.table.snapshot();
        allow_new_home_channel(&snap, &self.chip_caps(), &self.config(), mode, freq, num_connections, is_dfs)
    }

    pub fn is_5g_channel_allowed(&self, freq: u32, mode: PmMode) -> bool {
        let snap = self.table.snapshot();
        let reg = self.regulatory();
        is_5g_channel_allowed(&snap, reg.channels(), freq, mode)
    }
}
