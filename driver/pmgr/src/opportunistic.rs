//! 机会性升级定时器
//!
//! 双 MAC 模式下某个 MAC 上的连接全部断开后，不立即切回单 MAC，
//! 而是等定时器到期再判断一次，避免连接抖动时来回切换。

use crate::context::PolicyManagerContext;
use crate::error::{PmResult, PolicyError};
use crate::pcl::are_sbs_freqs;
use crate::transition::{NextAction, TransitionState, UpdateReason};

impl PolicyManagerContext {
    /// 当前是否可以从双 MAC 模式切回单 MAC。
    ///
    /// 处于 DBS/SBS 且两个 MAC 不再同时有连接时返回 SingleMac（SBS 下仍有
    /// 分处两个子频段的 5 GHz 连接时不算），
    /// 芯片没有 2x2 DBS（连接被降过 NSS）时返回 SingleMacUpgrade。
    pub fn need_opportunistic_upgrade(&self) -> NextAction {
        let Some(mode) = self.current_hw_mode() else {
            return NextAction::Nop;
        };
        if mode.is_single_mac() {
            return NextAction::Nop;
        }
        let snap = self.table.snapshot();
        if mode.sbs {
            let split = self.config().sbs_split_freq;
            let sbs_pair = snap
                .iter()
                .any(|a| snap.iter().any(|b| are_sbs_freqs(a.freq, b.freq, split)));
            if sbs_pair {
                return NextAction::Nop;
            }
        }
        let mac0 = snap.iter().any(|c| c.mac_id == 0);
        let mac1 = snap.iter().any(|c| c.mac_id == 1);
        if mac0 && mac1 {
            return NextAction::Nop;
        }
        if self.catalog.read().is_dbs_2x2_capable() {
            NextAction::SingleMac
        } else {
            NextAction::SingleMacUpgrade
        }
    }

    /// 需要升级时启动定时器
    pub fn check_n_start_opportunistic_timer(&self) -> PmResult<()> {
        if self.need_opportunistic_upgrade() == NextAction::Nop {
            return Ok(());
        }
        let timer = self.callbacks().timer.ok_or(PolicyError::InvalidContext)?;
        if timer.is_running() {
            return Ok(());
        }
        {
            let mut state = self.transition.lock();
            if *state == TransitionState::Idle {
                *state = TransitionState::OpportunisticPending;
            }
        }
        let ms = self.config().opportunistic_timer_ms;
        timer.start(ms);
        log::debug!(target: "wireless::pmgr", "opportunistic timer started ({} ms)", ms);
        Ok(())
    }

    /// 重启定时器；check_state 为 true 时只重启正在运行的定时器
    pub fn restart_opportunistic_timer(&self, check_state: bool) -> PmResult<()> {
        let timer = self.callbacks().timer.ok_or(PolicyError::InvalidContext)?;
        let running = timer.is_running();
        if check_state && !running {
            return Ok(());
        }
        if running {
            timer.stop();
        }
        {
            let mut state = self.transition.lock();
            if *state == TransitionState::Idle {
                *state = TransitionState::OpportunisticPending;
            }
        }
        timer.start(self.config().opportunistic_timer_ms);
        Ok(())
    }

    pub fn stop_opportunistic_timer(&self) {
        if let Some(timer) = self.callbacks().timer {
            if timer.is_running() {
                timer.stop();
            }
        }
        let mut state = self.transition.lock();
        if *state == TransitionState::OpportunisticPending {
            *state = TransitionState::Idle;
        }
    }

    /// 定时器到期（由平台的定时器上下文调用）
    pub fn opportunistic_timer_fired(&self) {
        {
            let mut state = self.transition.lock();
            if *state == TransitionState::OpportunisticPending {
                *state = TransitionState::Idle;
            }
        }
        let cbs = self.callbacks();
        if cbs.hdd.as_ref().map_or(false, |h| h.sap_cac_in_progress()) {
            log::info!(target: "wireless::pmgr", "SAP CAC in progress, opportunistic upgrade postponed");
            if let Err(e) = self.restart_opportunistic_timer(false) {
                log::error!(target: "wireless::pmgr", "restart opportunistic timer: {}", e);
            }
            return;
        }

        let action = self.need_opportunistic_upgrade();
        if action == NextAction::Nop {
            log::debug!(target: "wireless::pmgr", "opportunistic timer: nothing to do");
            return;
        }
        let session_id = self
            .table
            .snapshot()
            .iter()
            .next()
            .map_or(0, |c| c.vdev_id);
        let request_id = self.alloc_request_id();
        if let Err(e) = self.next_actions(session_id, action, UpdateReason::OpportunisticUpgrade, request_id) {
            log::warn!(target: "wireless::pmgr", "opportunistic {:?} not issued: {}", action, e);
            if e == PolicyError::Busy {
                if let Err(e) = self.restart_opportunistic_timer(false) {
                    log::error!(target: "wireless::pmgr", "restart opportunistic timer: {}", e);
                }
            }
        }
    }

    /// 阻塞等待在途的 hw mode 切换完成（调试与测试工具用）
    pub fn wait_for_opportunistic_update(&self, timeout_ms: u32) -> PmResult<()> {
        self.hw_mode_event.wait_timeout_ms(timeout_ms).map_err(|_| {
            log::warn!(target: "wireless::pmgr", "hw mode update not done in {} ms", timeout_ms);
            PolicyError::Busy
        })
    }
}
