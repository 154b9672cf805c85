//! MCC 下的 beacon interval 协调
//!
//! SAP/GO 与另一信道上的 BSS 做 MCC 时，两者的 beacon interval 必须互为整数倍，
//! 否则固件无法稳定地在两个信道间分配时隙。

use ieee80211::is_same_band;

use crate::cfgfile::MccBiPolicy;
use crate::conn_table::PmMode;
use crate::context::PolicyManagerContext;
use crate::error::{PmResult, PolicyError};

/// beacon interval 的归一化下限（TU）
pub const MCC_BI_BASE: u16 = 100;

fn is_multiple(a: u16, b: u16) -> bool {
    if a == 0 || b == 0 {
        return false;
    }
    if a > b {
        a % b == 0
    } else {
        b % a == 0
    }
}

/// 计算与 STA beacon interval 兼容的 GO beacon interval。
///
/// GO 的值先归一化到 [100, 199]；与 STA 互为整数倍时直接使用，
/// 否则对齐到 `sta_bi / (sta_bi / 100)`。sta_bi 为 0 按 100 处理。
pub fn calculate_mcc_beacon_interval(sta_bi: u16, go_given_bi: u16) -> u16 {
    let go_cbi = if go_given_bi < MCC_BI_BASE {
        MCC_BI_BASE
    } else {
        MCC_BI_BASE + go_given_bi % MCC_BI_BASE
    };
    let sta_bi = if sta_bi == 0 { MCC_BI_BASE } else { sta_bi };

    if is_multiple(sta_bi, go_cbi) {
        return go_cbi;
    }
    let num_beacons = sta_bi / MCC_BI_BASE;
    if num_beacons == 0 {
        go_cbi
    } else {
        sta_bi / num_beacons
    }
}

impl PolicyManagerContext {
    /// 新 BSS（freq，beacon_interval）与已有 SAP/GO 做 MCC 时按配置策略协调 beacon interval。
    ///
    /// 返回 Err(Unsupported) 表示策略为拒绝；ChangeGoBi / TeardownGo 通过 SME 就地处理冲突的 SAP/GO。
    pub fn validate_mcc_beacon_interval(&self, freq: u32, beacon_interval: u16, mode: PmMode) -> PmResult<()> {
        if mode.is_ap() {
            return Ok(());
        }
        let policy = self.config().mcc_bi_policy;
        let dbs = self.is_dbs_enabled();
        let snap = self.table.snapshot();
        let sme = self.callbacks().sme;

        for c in snap.iter().filter(|c| c.mode.is_ap() && c.freq != freq) {
            // DBS 下不同频段在不同 MAC 上，不构成 MCC
            if dbs && !is_same_band(c.freq, freq) {
                continue;
            }
            let Some(sme) = sme.as_ref() else {
                log::error!(target: "wireless::pmgr", "beacon interval check without SME callbacks");
                return Err(PolicyError::InvalidContext);
            };
            let Some(go_bi) = sme.beacon_interval(c.vdev_id) else {
                continue;
            };
            if is_multiple(go_bi, if beacon_interval == 0 { MCC_BI_BASE } else { beacon_interval }) {
                continue;
            }
            match policy {
                MccBiPolicy::AllowDifferent => {
                    log::debug!(target: "wireless::pmgr",
                        "vdev {} bi {} vs {}: allowed as is", c.vdev_id, go_bi, beacon_interval);
                }
                MccBiPolicy::Disallow => {
                    log::warn!(target: "wireless::pmgr",
                        "{:?} bi {} incompatible with {:?} vdev {} bi {}",
                        mode, beacon_interval, c.mode, c.vdev_id, go_bi);
                    return Err(PolicyError::Unsupported);
                }
                MccBiPolicy::ChangeGoBi => {
                    let new_bi = calculate_mcc_beacon_interval(beacon_interval, go_bi);
                    log::info!(target: "wireless::pmgr",
                        "vdev {} beacon interval {} -> {}", c.vdev_id, go_bi, new_bi);
                    sme.change_beacon_interval(c.vdev_id, new_bi)?;
                }
                MccBiPolicy::TeardownGo => {
                    log::info!(target: "wireless::pmgr",
                        "stopping {:?} vdev {} for beacon interval conflict", c.mode, c.vdev_id);
                    sme.stop_bss(c.vdev_id)?;
                }
            }
        }
        Ok(())
    }
}
