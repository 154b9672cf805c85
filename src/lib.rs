//! 无线并发策略管理 crate
//!
//! 整合双 MAC Wi-Fi 芯片的并发策略：ieee80211 基础类型 + pmgr 策略引擎
//! - ieee80211: 频段 / 信道换算、监管域信道表
//! - pmgr: 连接表、hw mode 目录、PCL、并发规则、hw mode 切换与机会性升级

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::sync::Arc;

use axerrno::AxResult;

pub use ieee80211;
pub use pmgr;

use pmgr::{HwCaps, PmMode, PolicyConfig, PolicyManagerContext};

/// 策略驱动上下文：设备 bring-up 时创建，teardown 时注销回调后丢弃
pub struct PolicyDriver {
    pub ctx: Arc<PolicyManagerContext>,
}

impl PolicyDriver {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            ctx: Arc::new(PolicyManagerContext::new(config)),
        }
    }

    /// 共享句柄，交给 HDD / WMA / 定时器等上下文使用
    pub fn context(&self) -> Arc<PolicyManagerContext> {
        self.ctx.clone()
    }

    /// 固件就绪后装入 hw mode 能力字
    pub fn bring_up(&self, hw_mode_words: &[u32], caps: HwCaps) {
        self.ctx.init_hw_modes(hw_mode_words, caps);
        log::info!(target: "wireless",
            "wireless: policy manager up, dbs={} sbs={}", self.ctx.is_dbs_enabled(), self.ctx.is_sbs_enabled());
    }

    /// 计算并下发 vdev 的 PCL（平台侧 AxResult 接口）
    pub fn set_pcl(&self, vdev_id: u8, mode: PmMode) -> AxResult {
        self.ctx.set_pcl(vdev_id, mode).map_err(Into::into)
    }

    pub fn teardown(&self) {
        self.ctx.stop_opportunistic_timer();
        self.ctx.deregister_callbacks();
        log::info!(target: "wireless", "wireless: policy manager down");
    }
}

/// 按配置文件创建策略驱动；无配置文件或解析失败时使用默认配置
pub fn policy_driver_init(cfg_file: Option<&[u8]>) -> PolicyDriver {
    let mut config = PolicyConfig::default();
    if let Some(data) = cfg_file {
        if let Err(e) = pmgr::parse_configfile(data, &mut config) {
            log::warn!(target: "wireless", "wireless: bad policy config ({}), using defaults", e);
        }
    }
    log::info!(target: "wireless", "wireless: init policy driver, pref={:?}", config.system_pref);
    PolicyDriver::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axerrno::AxError;
    use pmgr::SystemPref;

    #[test]
    fn init_reads_config() {
        let drv = policy_driver_init(Some(&b"PM_SYSTEM_PREF=1\n"[..]));
        assert_eq!(drv.ctx.config().system_pref, SystemPref::Power);
        let drv = policy_driver_init(None);
        assert_eq!(drv.ctx.config(), PolicyConfig::default());
    }

    #[test]
    fn init_falls_back_on_unreadable_config() {
        let drv = policy_driver_init(Some(&b"garbage\n"[..]));
        assert_eq!(drv.ctx.config(), PolicyConfig::default());
    }

    #[test]
    fn set_pcl_without_wma_maps_to_ax_error() {
        let drv = policy_driver_init(None);
        drv.bring_up(&[], HwCaps::default());
        assert_eq!(drv.set_pcl(0, PmMode::Sta), Err(AxError::BadState));
        drv.teardown();
    }
}
