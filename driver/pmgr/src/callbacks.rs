//! 外部协作方接口
//!
//! 每个协作域一个 trait，初始化时按需注册；未注册的回调视为不存在，调用方直接跳过。
//! 回调都可能在任意控制线程上被调用，因此要求 `Send + Sync`。

use alloc::sync::Arc;

use ieee80211::{RegChannel, DEFAULT_CHANNEL_TABLE};

use crate::error::PmResult;
use crate::pcl::PclResult;
use crate::transition::{NextAction, TransitionRequest, UpdateReason};

/// 主机驱动侧（接口管理 / SAP 状态）
pub trait HddCallbacks: Send + Sync {
    /// STA / SAP 连接模式发生变化
    fn mode_changed(&self);
    /// 是否有 SAP 正在做 CAC（信道可用性检查）
    fn sap_cac_in_progress(&self) -> bool {
        false
    }
}

/// 固件命令通道（异步投递，结果经完成事件返回）
pub trait WmaCallbacks: Send + Sync {
    /// 投递 set hw mode 命令；返回 Ok 仅表示已投递
    fn set_hw_mode(&self, req: &TransitionRequest) -> PmResult<()>;
    /// 下发 PCL
    fn set_pcl(&self, vdev_id: u8, pcl: &PclResult) -> PmResult<()>;
    /// 通知数据路径 vdev 的 MAC 变化
    fn update_mac_id(&self, _vdev_id: u8, _mac_id: u8) {}
}

/// SME 侧（NSS 调整、beacon interval、BSS 启停）
pub trait SmeCallbacks: Send + Sync {
    /// 请求将 vdev 的 NSS 改为 new_nss，完成后调用 `on_nss_update_complete`
    fn nss_update(
        &self,
        vdev_id: u8,
        new_nss: u8,
        next_action: NextAction,
        reason: UpdateReason,
        request_id: u32,
    ) -> PmResult<()>;
    /// vdev（SAP/GO）当前 beacon interval
    fn beacon_interval(&self, vdev_id: u8) -> Option<u16>;
    /// 修改 SAP/GO 的 beacon interval 并下发固件
    fn change_beacon_interval(&self, vdev_id: u8, beacon_interval: u16) -> PmResult<()>;
    /// 停止 SAP/GO
    fn stop_bss(&self, vdev_id: u8) -> PmResult<()>;
}

/// 连接管理器：hw mode 切换结果上报，避免调用方无限期等待
pub trait CmCallbacks: Send + Sync {
    fn hw_mode_change_done(&self, success: bool, session_id: u8, request_id: u32);
}

/// 一次性定时器（机会性升级用），到期后平台调用 `opportunistic_timer_fired`
pub trait TimerOps: Send + Sync {
    fn start(&self, duration_ms: u32);
    fn stop(&self);
    fn is_running(&self) -> bool;
}

/// 监管域：当前有效信道表与 LTE 共存不安全信道
pub trait Regulatory: Send + Sync {
    fn channels(&self) -> &[RegChannel];
    fn unsafe_channels(&self) -> &[u32] {
        &[]
    }
}

/// 固定信道表实现，默认使用世界域信道表
#[derive(Debug, Clone, Copy)]
pub struct StaticRegulatory<'a> {
    pub channels: &'a [RegChannel],
    pub unsafe_channels: &'a [u32],
}

impl Default for StaticRegulatory<'static> {
    fn default() -> Self {
        Self {
            channels: &DEFAULT_CHANNEL_TABLE,
            unsafe_channels: &[],
        }
    }
}

impl<'a> Regulatory for StaticRegulatory<'a> {
    fn channels(&self) -> &[RegChannel] {
        self.channels
    }

    fn unsafe_channels(&self) -> &[u32] {
        self.unsafe_channels
    }
}

/// 已注册的协作方集合
#[derive(Clone, Default)]
pub struct Callbacks {
    pub hdd: Option<Arc<dyn HddCallbacks>>,
    pub wma: Option<Arc<dyn WmaCallbacks>>,
    pub sme: Option<Arc<dyn SmeCallbacks>>,
    pub cm: Option<Arc<dyn CmCallbacks>>,
    pub timer: Option<Arc<dyn TimerOps>>,
}
