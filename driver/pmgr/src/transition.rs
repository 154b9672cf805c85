//! hw mode 切换
//!
//! 状态机：`Idle → RequestInFlight → Idle`，另有定时器驱动的 `Idle → OpportunisticPending`。
//! 同一时刻最多一个 set hw mode 请求在途；固件完成事件到达后才更新连接表，
//! 失败不会改动连接表。
//!
//! 切换动作可以带后续动作（NSS 降级后再切 DBS、切回单 MAC 后再升 NSS），
//! 由 `next_actions` / `complete_action` / `on_nss_update_complete` 串起来。

use ieee80211::{is_24ghz, ChanWidth};

use crate::conn_table::{chain_mask, ConnSnapshot, ConnectionEntry};
use crate::context::PolicyManagerContext;
use crate::error::{PmResult, PolicyError};
use crate::hw_mode::{HwModeAction, HwModeCatalog, HwModeDescriptor, HwModeQuery};
use crate::pcl::are_sbs_freqs;

/// 需要执行的 hw mode 动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NextAction {
    #[default]
    Nop,
    SingleMac,
    /// 两个 MAC 对称的 DBS
    Dbs,
    /// DBS，mac0 流数更多
    Dbs1,
    /// DBS，mac1 流数更多
    Dbs2,
    Sbs,
    /// 切回单 MAC，之后把 NSS 恢复为 2x2
    SingleMacUpgrade,
    /// 先把 NSS 降为 1x1，再切 1x1 DBS
    DbsDowngrade,
    /// 把 NSS 恢复为连接建立时的值
    Upgrade,
}

impl NextAction {
    /// 是否对应一次 set hw mode 请求
    pub const fn is_hw_mode_request(self) -> bool {
        !matches!(self, Self::Nop | Self::Upgrade)
    }

    /// 是否需要双 MAC（DBS / SBS）能力
    pub const fn needs_dual_mac(self) -> bool {
        matches!(
            self,
            Self::Dbs | Self::Dbs1 | Self::Dbs2 | Self::Sbs | Self::DbsDowngrade
        )
    }
}

/// hw mode 切换原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateReason {
    #[default]
    Unspecified,
    StartAp,
    ConnectInfra,
    ConnectP2p,
    ConnectNan,
    ConnectNdi,
    Roam,
    ChannelSwitch,
    OpportunisticUpgrade,
    PreCac,
}

/// 完成事件中的 vdev → MAC 映射
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VdevMacEntry {
    pub vdev_id: u8,
    pub mac_id: u8,
}

/// 在途的 set hw mode 请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRequest {
    pub hw_mode_id: u32,
    pub action: NextAction,
    /// 切换完成后继续执行的动作
    pub next_action: NextAction,
    pub reason: UpdateReason,
    pub session_id: u8,
    pub request_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionState {
    #[default]
    Idle,
    RequestInFlight(TransitionRequest),
    /// 机会性升级定时器已启动
    OpportunisticPending,
}

/// 等待 SME 完成的 NSS 调整
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingNss {
    pub remaining: u32,
    pub next_action: NextAction,
    pub reason: UpdateReason,
    pub session_id: u8,
    pub request_id: u32,
}

/// 动作对应的能力查询（按偏好顺序依次尝试）
fn queries_for(action: NextAction) -> &'static [HwModeQuery] {
    const SINGLE: [HwModeQuery; 2] = [
        HwModeQuery::single_mac(2, ChanWidth::Mhz80),
        HwModeQuery::single_mac(1, ChanWidth::Mhz20),
    ];
    const DBS: [HwModeQuery; 1] = [HwModeQuery::dbs(2, ChanWidth::Mhz80, 2, ChanWidth::Mhz40)];
    const DBS1: [HwModeQuery; 1] = [HwModeQuery::dbs(2, ChanWidth::Mhz80, 1, ChanWidth::Mhz40)];
    const DBS2: [HwModeQuery; 1] = [HwModeQuery::dbs(1, ChanWidth::Mhz80, 2, ChanWidth::Mhz40)];
    const DBS_1X1: [HwModeQuery; 1] = [HwModeQuery::dbs(1, ChanWidth::Mhz40, 1, ChanWidth::Mhz20)];
    const SBS: [HwModeQuery; 1] = [HwModeQuery::sbs(1, ChanWidth::Mhz40)];

    match action {
        NextAction::SingleMac | NextAction::SingleMacUpgrade => &SINGLE,
        NextAction::Dbs => &DBS,
        NextAction::Dbs1 => &DBS1,
        NextAction::Dbs2 => &DBS2,
        NextAction::DbsDowngrade => &DBS_1X1,
        NextAction::Sbs => &SBS,
        NextAction::Nop | NextAction::Upgrade => &[],
    }
}

/// 在目录中为动作找 hw mode id
pub fn hw_mode_for_action(catalog: &HwModeCatalog, action: NextAction) -> Option<u32> {
    queries_for(action)
        .iter()
        .find_map(|q| catalog.match_capability(q))
}

/// 跨频段时用哪种 DBS：优先两个 MAC 都为 2x2 的对称 DBS，
/// 其次有一个 2x2 MAC 的非对称 DBS（按目录顺序），都没有时先降 NSS 再切 1x1 DBS
fn dbs_action(catalog: &HwModeCatalog) -> NextAction {
    if catalog.is_dbs_2x2_capable() {
        return NextAction::Dbs;
    }
    catalog
        .iter()
        .filter(|m| m.dbs)
        .find_map(|m| match m.action_type() {
            HwModeAction::Dbs1 if m.mac0.min_ss() >= 2 => Some(NextAction::Dbs1),
            HwModeAction::Dbs2 if m.mac1.min_ss() >= 2 => Some(NextAction::Dbs2),
            _ => None,
        })
        .unwrap_or(NextAction::DbsDowngrade)
}

/// 由一组信道与当前 hw mode 决定需要的动作。
///
/// 跨 2.4/5 GHz 且支持 DBS 时切 DBS；
/// 5 GHz 信道分处两个子频段且支持 SBS 时切 SBS；
/// 全部同频段而当前处于 DBS/SBS 时切回单 MAC（连接被降过 NSS 时带 NSS 恢复）。
pub fn decide_action(
    freqs: &[u32],
    current: Option<&HwModeDescriptor>,
    catalog: &HwModeCatalog,
    dual_mac_enabled: bool,
    sbs_split_freq: u32,
) -> NextAction {
    if freqs.is_empty() {
        return NextAction::Nop;
    }
    let has_2g = freqs.iter().any(|f| is_24ghz(*f));
    let has_high = freqs.iter().any(|f| !is_24ghz(*f));
    let sbs_pair = freqs.iter().enumerate().any(|(i, a)| {
        freqs[i + 1..]
            .iter()
            .any(|b| are_sbs_freqs(*a, *b, sbs_split_freq))
    });
    let in_dbs = current.map_or(false, |m| m.dbs);
    let in_sbs = current.map_or(false, |m| m.sbs);

    if has_2g && has_high {
        if !dual_mac_enabled || !catalog.is_dbs_capable() {
            return NextAction::Nop;
        }
        if in_dbs {
            return NextAction::Nop;
        }
        return dbs_action(catalog);
    }
    if sbs_pair && dual_mac_enabled && catalog.is_sbs_capable() {
        return if in_sbs { NextAction::Nop } else { NextAction::Sbs };
    }
    if !(in_dbs || in_sbs) {
        return NextAction::Nop;
    }
    if catalog.is_dbs_2x2_capable() {
        NextAction::SingleMac
    } else {
        NextAction::SingleMacUpgrade
    }
}

/// NSS 调整的目标连接：new_nss == 1 时是当前 2x2 的连接，否则是建立时为 2x2 的连接
fn nss_eligible(c: &ConnectionEntry, new_nss: u8) -> bool {
    c.original_nss >= 2 && (new_nss >= 2 || c.chain_mask == chain_mask::TWO_TWO)
}

impl PolicyManagerContext {
    /// 只看前 count 个连接时的期望动作
    pub fn preferred_action(&self, count: usize) -> NextAction {
        let snap = self.table.snapshot().truncated(count);
        self.action_for(&snap, None)
    }

    fn action_for(&self, snap: &ConnSnapshot, candidate: Option<u32>) -> NextAction {
        let mut freqs = [0u32; crate::conn_table::MAX_CONC_CONNECTIONS + 1];
        let mut n = 0;
        for c in snap.iter() {
            freqs[n] = c.freq;
            n += 1;
        }
        if let Some(f) = candidate {
            freqs[n] = f;
            n += 1;
        }
        let catalog = self.catalog.read();
        let current = self.current_hw_mode();
        decide_action(
            &freqs[..n],
            current.as_ref(),
            &catalog,
            self.dual_mac_enabled(),
            self.config().sbs_split_freq,
        )
    }

    /// 新连接（freq）建立前，为现有连接加上它决定并发起 hw mode 动作
    pub fn current_connections_update(
        &self,
        session_id: u8,
        freq: u32,
        reason: UpdateReason,
        request_id: u32,
    ) -> PmResult<NextAction> {
        let snap = self.table.snapshot();
        let candidate = if freq == 0 { None } else { Some(freq) };
        let action = self.action_for(&snap, candidate);
        log::debug!(target: "wireless::pmgr",
            "current_connections_update session={} freq={} reason={:?}: {:?}",
            session_id, freq, reason, action);
        if action == NextAction::Nop {
            return Ok(action);
        }
        self.next_actions(session_id, action, reason, request_id)?;
        Ok(action)
    }

    /// 发起 set hw mode。已有请求在途时返回 Busy。
    pub fn request_hw_mode_change(
        &self,
        action: NextAction,
        next_action: NextAction,
        reason: UpdateReason,
        session_id: u8,
        request_id: u32,
    ) -> PmResult<()> {
        if !action.is_hw_mode_request() {
            return Err(PolicyError::InvalidArgument);
        }
        if action.needs_dual_mac() {
            let capable = {
                let catalog = self.catalog.read();
                if action == NextAction::Sbs {
                    catalog.is_sbs_capable()
                } else {
                    catalog.is_dbs_capable()
                }
            };
            if !capable || !self.dual_mac_enabled() {
                log::warn!(target: "wireless::pmgr", "{:?} requested on a chip without support", action);
                return Err(PolicyError::Unsupported);
            }
        }
        let hw_mode_id = hw_mode_for_action(&self.catalog.read(), action).ok_or_else(|| {
            log::error!(target: "wireless::pmgr", "no hw mode for {:?}", action);
            PolicyError::NotFound
        })?;
        let wma = self.callbacks().wma.ok_or(PolicyError::InvalidContext)?;

        let req = TransitionRequest {
            hw_mode_id,
            action,
            next_action,
            reason,
            session_id,
            request_id,
        };
        let prev = {
            let mut state = self.transition.lock();
            if let TransitionState::RequestInFlight(inflight) = *state {
                log::warn!(target: "wireless::pmgr",
                    "hw mode change busy (in flight: {:?}), dropping {:?}", inflight.action, action);
                return Err(PolicyError::Busy);
            }
            core::mem::replace(&mut *state, TransitionState::RequestInFlight(req))
        };
        self.hw_mode_event.reset();

        if let Err(e) = wma.set_hw_mode(&req) {
            log::error!(target: "wireless::pmgr", "set hw mode {} post failed: {}", hw_mode_id, e);
            *self.transition.lock() = prev;
            self.hw_mode_event.set();
            return Err(e);
        }
        log::info!(target: "wireless::pmgr",
            "set hw mode {} ({:?}, next {:?}) reason={:?} session={} req={}",
            hw_mode_id, action, next_action, reason, session_id, request_id);
        Ok(())
    }

    /// 固件 set hw mode 完成事件
    pub fn on_hw_mode_set_complete(
        &self,
        success: bool,
        hw_mode_id: u32,
        vdev_mac_map: &[VdevMacEntry],
        req: TransitionRequest,
    ) {
        {
            let mut state = self.transition.lock();
            let cur = *state;
            match cur {
                TransitionState::RequestInFlight(_) => *state = TransitionState::Idle,
                other => log::warn!(target: "wireless::pmgr",
                    "hw mode completion without request in flight ({:?})", other),
            }
        }
        let cbs = self.callbacks();

        let new_mode = if success {
            self.catalog.read().lookup_by_id(hw_mode_id)
        } else {
            None
        };
        let Some(new_mode) = new_mode else {
            if success {
                log::error!(target: "wireless::pmgr", "unknown hw mode id {} in completion", hw_mode_id);
            } else {
                log::error!(target: "wireless::pmgr", "set hw mode {:?} failed", req.action);
            }
            if let Some(cm) = &cbs.cm {
                cm.hw_mode_change_done(false, req.session_id, req.request_id);
            }
            self.hw_mode_event.set();
            return;
        };

        *self.current_hw_mode.write() = Some(new_mode);
        for m in vdev_mac_map {
            if !self.table.update_mac_id(m.vdev_id, m.mac_id) {
                log::debug!(target: "wireless::pmgr", "vdev {} not in table, mac map skipped", m.vdev_id);
                continue;
            }
            if let Some(wma) = &cbs.wma {
                wma.update_mac_id(m.vdev_id, m.mac_id);
            }
        }
        log::info!(target: "wireless::pmgr",
            "hw mode now {} ({:?})", hw_mode_id, new_mode.action_type());
        if let Some(hdd) = &cbs.hdd {
            hdd.mode_changed();
        }
        if let Some(cm) = &cbs.cm {
            cm.hw_mode_change_done(true, req.session_id, req.request_id);
        }
        // 先置位：后续动作若再发起请求，会重新 reset
        self.hw_mode_event.set();
        if req.next_action != NextAction::Nop {
            if let Err(e) = self.next_actions(req.session_id, req.next_action, req.reason, req.request_id) {
                log::error!(target: "wireless::pmgr", "next action {:?} failed: {}", req.next_action, e);
            }
        }
    }

    /// 执行一个动作：hw mode 请求，或先调整 NSS 再请求
    pub fn next_actions(
        &self,
        session_id: u8,
        action: NextAction,
        reason: UpdateReason,
        request_id: u32,
    ) -> PmResult<()> {
        match action {
            NextAction::Nop => Ok(()),
            NextAction::DbsDowngrade => {
                self.complete_action(1, NextAction::DbsDowngrade, reason, session_id, request_id)
            }
            NextAction::SingleMacUpgrade => self.request_hw_mode_change(
                NextAction::SingleMacUpgrade,
                NextAction::Upgrade,
                reason,
                session_id,
                request_id,
            ),
            NextAction::Upgrade => {
                self.complete_action(2, NextAction::Nop, reason, session_id, request_id)
            }
            NextAction::SingleMac | NextAction::Dbs | NextAction::Dbs1 | NextAction::Dbs2 | NextAction::Sbs => {
                self.request_hw_mode_change(action, NextAction::Nop, reason, session_id, request_id)
            }
        }
    }

    /// 把可调整的连接 NSS 改为 new_nss，全部完成后执行 next_action。
    /// 没有可调整的连接或 SME 拒绝时直接执行 next_action。
    pub fn complete_action(
        &self,
        new_nss: u8,
        next_action: NextAction,
        reason: UpdateReason,
        session_id: u8,
        request_id: u32,
    ) -> PmResult<()> {
        let snap = self.table.snapshot();
        if let Some(sme) = self.callbacks().sme {
            let eligible = snap.iter().filter(|c| nss_eligible(c, new_nss)).count() as u32;
            if eligible > 0 {
                // 先登记再下发，SME 可能同步回调 on_nss_update_complete
                *self.nss_pending.lock() = Some(PendingNss {
                    remaining: eligible,
                    next_action,
                    reason,
                    session_id,
                    request_id,
                });
                let mut failed = false;
                for c in snap.iter().filter(|c| nss_eligible(c, new_nss)) {
                    if let Err(e) = sme.nss_update(c.vdev_id, new_nss, next_action, reason, request_id) {
                        log::error!(target: "wireless::pmgr",
                            "nss update vdev {} -> {} failed: {}", c.vdev_id, new_nss, e);
                        failed = true;
                        break;
                    }
                }
                if !failed {
                    log::debug!(target: "wireless::pmgr", "{} nss update(s) to {} issued", eligible, new_nss);
                    return Ok(());
                }
                *self.nss_pending.lock() = None;
            }
        }

        if next_action == NextAction::Nop {
            return Ok(());
        }
        self.request_hw_mode_change(next_action, NextAction::Nop, reason, session_id, request_id)
    }

    /// SME 的 NSS 调整完成事件；最后一个完成时执行后续动作
    pub fn on_nss_update_complete(&self, success: bool, vdev_id: u8) {
        let next = {
            let mut guard = self.nss_pending.lock();
            let Some(pending) = guard.as_mut() else {
                log::warn!(target: "wireless::pmgr", "nss update completion for vdev {} unexpected", vdev_id);
                return;
            };
            if !success {
                log::error!(target: "wireless::pmgr",
                    "nss update failed on vdev {}, dropping {:?}", vdev_id, pending.next_action);
                *guard = None;
                drop(guard);
                self.hw_mode_event.set();
                return;
            }
            pending.remaining = pending.remaining.saturating_sub(1);
            if pending.remaining > 0 {
                return;
            }
            let done = *pending;
            *guard = None;
            done
        };
        if next.next_action == NextAction::Nop {
            return;
        }
        if let Err(e) = self.request_hw_mode_change(
            next.next_action,
            NextAction::Nop,
            next.reason,
            next.session_id,
            next.request_id,
        ) {
            log::error!(target: "wireless::pmgr", "hw mode after nss update failed: {}", e);
        }
    }

    /// 是否有 set hw mode 请求在途
    pub fn is_hw_mode_change_in_progress(&self) -> bool {
        matches!(*self.transition.lock(), TransitionState::RequestInFlight(_))
    }

    pub fn transition_state(&self) -> TransitionState {
        *self.transition.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_mode::{MacBand, MacCaps};
    use alloc::vec;

    fn desc(id: u32, m0: u8, m1: u8, dbs: bool, sbs: bool) -> HwModeDescriptor {
        HwModeDescriptor {
            id,
            mac0: MacCaps::new(m0, m0, ChanWidth::Mhz80),
            mac1: if m1 == 0 {
                MacCaps::NONE
            } else {
                MacCaps::new(m1, m1, ChanWidth::Mhz40)
            },
            mac0_band: MacBand::None,
            dbs,
            agile_dfs: false,
            sbs,
        }
    }

    #[test]
    fn decide_by_bands() {
        let cat = HwModeCatalog::from_descriptors(vec![
            desc(0, 2, 0, false, false),
            desc(1, 2, 2, true, false),
            desc(2, 2, 2, false, true),
        ]);
        let single = cat.lookup_by_id(0);
        let dbs = cat.lookup_by_id(1);
        assert_eq!(decide_action(&[], single.as_ref(), &cat, true, 5400), NextAction::Nop);
        assert_eq!(decide_action(&[2412, 2437], single.as_ref(), &cat, true, 5400), NextAction::Nop);
        assert_eq!(decide_action(&[2412, 5180], single.as_ref(), &cat, true, 5400), NextAction::Dbs);
        assert_eq!(decide_action(&[2412, 5180], dbs.as_ref(), &cat, true, 5400), NextAction::Nop);
        assert_eq!(decide_action(&[5180, 5745], single.as_ref(), &cat, true, 5400), NextAction::Sbs);
        assert_eq!(decide_action(&[5180, 5200], single.as_ref(), &cat, true, 5400), NextAction::Nop);
        // 关闭双 MAC
        assert_eq!(decide_action(&[2412, 5180], single.as_ref(), &cat, false, 5400), NextAction::Nop);
    }

    #[test]
    fn single_band_in_dual_mac_prefers_single_mac() {
        let cat = HwModeCatalog::from_descriptors(vec![
            desc(0, 2, 0, false, false),
            desc(1, 2, 2, true, false),
            desc(2, 2, 2, false, true),
        ]);
        let dbs = cat.lookup_by_id(1);
        let sbs = cat.lookup_by_id(2);
        assert_eq!(decide_action(&[5180, 5200], dbs.as_ref(), &cat, true, 5400), NextAction::SingleMac);
        assert_eq!(decide_action(&[2412], dbs.as_ref(), &cat, true, 5400), NextAction::SingleMac);
        // SBS 对仍在时保持
        assert_eq!(decide_action(&[5180, 5745], sbs.as_ref(), &cat, true, 5400), NextAction::Nop);
        assert_eq!(decide_action(&[5745], sbs.as_ref(), &cat, true, 5400), NextAction::SingleMac);

        // 没有 2x2 DBS：连接被降过 NSS，切回时一并恢复
        let cat = HwModeCatalog::from_descriptors(vec![
            desc(0, 2, 0, false, false),
            desc(1, 1, 1, true, false),
        ]);
        let dbs = cat.lookup_by_id(1);
        assert_eq!(
            decide_action(&[5180, 5200], dbs.as_ref(), &cat, true, 5400),
            NextAction::SingleMacUpgrade
        );
    }

    #[test]
    fn asymmetric_dbs_variants() {
        let cat = HwModeCatalog::from_descriptors(vec![
            desc(0, 2, 0, false, false),
            desc(1, 2, 1, true, false),
        ]);
        assert_eq!(decide_action(&[2412, 5180], None, &cat, true, 5400), NextAction::Dbs1);
        assert_eq!(hw_mode_for_action(&cat, NextAction::Dbs1), Some(1));

        let cat = HwModeCatalog::from_descriptors(vec![
            desc(0, 2, 0, false, false),
            desc(1, 1, 2, true, false),
        ]);
        assert_eq!(decide_action(&[2412, 5180], None, &cat, true, 5400), NextAction::Dbs2);
        assert_eq!(hw_mode_for_action(&cat, NextAction::Dbs2), Some(1));
        assert_eq!(hw_mode_for_action(&cat, NextAction::Dbs1), None);
    }

    #[test]
    fn downgrade_when_no_2x2_dbs() {
        let cat = HwModeCatalog::from_descriptors(vec![
            desc(0, 2, 0, false, false),
            desc(1, 1, 1, true, false),
        ]);
        assert_eq!(decide_action(&[2412, 5180], None, &cat, true, 5400), NextAction::DbsDowngrade);
        assert_eq!(hw_mode_for_action(&cat, NextAction::DbsDowngrade), Some(1));
        assert_eq!(hw_mode_for_action(&cat, NextAction::Dbs), None);
        assert_eq!(hw_mode_for_action(&cat, NextAction::SingleMacUpgrade), Some(0));
        assert_eq!(hw_mode_for_action(&cat, NextAction::Nop), None);
    }

    #[test]
    fn single_mac_falls_back_to_1x1() {
        let cat = HwModeCatalog::from_descriptors(vec![HwModeDescriptor {
            id: 4,
            mac0: MacCaps::new(1, 1, ChanWidth::Mhz40),
            ..Default::default()
        }]);
        assert_eq!(hw_mode_for_action(&cat, NextAction::SingleMac), Some(4));
    }

    #[test]
    fn action_classes() {
        assert!(!NextAction::Nop.is_hw_mode_request());
        assert!(!NextAction::Upgrade.is_hw_mode_request());
        assert!(NextAction::SingleMacUpgrade.is_hw_mode_request());
        assert!(NextAction::DbsDowngrade.needs_dual_mac());
        assert!(!NextAction::SingleMac.needs_dual_mac());
    }
}
