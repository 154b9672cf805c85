//! 策略管理器上下文
//!
//! 设备 bring-up 时创建、teardown 时销毁的唯一状态持有者：连接表、hw mode 目录、
//! 配置、已注册的协作方、当前 hw mode 与切换状态。所有操作都通过它进行，没有全局变量。

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use spin::{Mutex, RwLock};

use ieee80211::{channel_state, freq_to_band, is_24ghz, Band, ChanWidth, ChannelState, NUM_CHANNELS};

use crate::callbacks::{
    Callbacks, CmCallbacks, HddCallbacks, Regulatory, SmeCallbacks, StaticRegulatory, TimerOps,
    WmaCallbacks,
};
use crate::cfgfile::PolicyConfig;
use crate::conn_table::{
    chain_mask, chan_flags, ConnSelector, ConnectionEntry, ConnectionTable, PmMode,
};
use crate::error::{PmResult, PolicyError};
use crate::hw_mode::{HwCaps, HwModeCatalog, HwModeDescriptor};
use crate::pcl::{are_sbs_freqs, get_channel_list, PclRequest, PclResult};
use crate::pcl_select::select_pcl_type;
use crate::sync::CompletionEvent;
use crate::transition::{PendingNss, TransitionState};

pub struct PolicyManagerContext {
    pub(crate) table: ConnectionTable,
    pub(crate) catalog: RwLock<HwModeCatalog>,
    caps: RwLock<HwCaps>,
    config: RwLock<PolicyConfig>,
    callbacks: RwLock<Callbacks>,
    regulatory: RwLock<Arc<dyn Regulatory>>,
    pub(crate) current_hw_mode: RwLock<Option<HwModeDescriptor>>,
    pub(crate) transition: Mutex<TransitionState>,
    pub(crate) nss_pending: Mutex<Option<PendingNss>>,
    pub(crate) hw_mode_event: CompletionEvent,
    next_request_id: AtomicU32,
}

impl PolicyManagerContext {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            table: ConnectionTable::new(),
            catalog: RwLock::new(HwModeCatalog::new()),
            caps: RwLock::new(HwCaps::default()),
            config: RwLock::new(config),
            callbacks: RwLock::new(Callbacks::default()),
            regulatory: RwLock::new(Arc::new(StaticRegulatory::default())),
            current_hw_mode: RwLock::new(None),
            transition: Mutex::new(TransitionState::Idle),
            nss_pending: Mutex::new(None),
            hw_mode_event: CompletionEvent::new(),
            next_request_id: AtomicU32::new(1),
        }
    }

    /// 固件上报 hw mode 能力字后调用；当前 hw mode 取目录中第一个单 MAC 模式
    pub fn init_hw_modes(&self, words: &[u32], caps: HwCaps) {
        self.set_hw_mode_catalog(HwModeCatalog::from_fw_words(words), caps);
    }

    /// 整体替换 hw mode 目录（固件重新初始化）
    pub fn set_hw_mode_catalog(&self, catalog: HwModeCatalog, caps: HwCaps) {
        let initial = catalog.iter().find(|m| m.is_single_mac()).copied();
        log::info!(target: "wireless::pmgr",
            "{} hw mode(s): dbs={} sbs={} dbs_2x2={} interband_mcc={}",
            catalog.len(), catalog.is_dbs_capable(), catalog.is_sbs_capable(),
            catalog.is_dbs_2x2_capable(), caps.interband_mcc);
        *self.catalog.write() = catalog;
        *self.caps.write() = caps;
        *self.current_hw_mode.write() = initial;
    }

    /// 固件报告的当前 hw mode
    pub fn set_current_hw_mode(&self, hw_mode_id: u32) -> PmResult<()> {
        let mode = self
            .catalog
            .read()
            .lookup_by_id(hw_mode_id)
            .ok_or(PolicyError::NotFound)?;
        *self.current_hw_mode.write() = Some(mode);
        Ok(())
    }

    pub fn current_hw_mode(&self) -> Option<HwModeDescriptor> {
        *self.current_hw_mode.read()
    }

    /// 注册 HDD 回调，同时作为连接表的 mode changed 通知
    pub fn register_hdd_callbacks(&self, hdd: Arc<dyn HddCallbacks>) {
        let notify = hdd.clone();
        self.table
            .register_mode_change_cb(Some(Arc::new(move || notify.mode_changed())));
        self.callbacks.write().hdd = Some(hdd);
    }

    pub fn register_wma_callbacks(&self, wma: Arc<dyn WmaCallbacks>) {
        self.callbacks.write().wma = Some(wma);
    }

    pub fn register_sme_callbacks(&self, sme: Arc<dyn SmeCallbacks>) {
        self.callbacks.write().sme = Some(sme);
    }

    pub fn register_cm_callbacks(&self, cm: Arc<dyn CmCallbacks>) {
        self.callbacks.write().cm = Some(cm);
    }

    pub fn register_timer(&self, timer: Arc<dyn TimerOps>) {
        self.callbacks.write().timer = Some(timer);
    }

    /// 注销全部回调（teardown）
    pub fn deregister_callbacks(&self) {
        self.table.register_mode_change_cb(None);
        *self.callbacks.write() = Callbacks::default();
    }

    pub fn set_regulatory(&self, reg: Arc<dyn Regulatory>) {
        *self.regulatory.write() = reg;
    }

    pub fn regulatory(&self) -> Arc<dyn Regulatory> {
        self.regulatory.read().clone()
    }

    pub fn set_config(&self, config: PolicyConfig) {
        *self.config.write() = config;
    }

    pub fn config(&self) -> PolicyConfig {
        *self.config.read()
    }

    pub fn caps(&self) -> HwCaps {
        *self.caps.read()
    }

    pub(crate) fn callbacks(&self) -> Callbacks {
        self.callbacks.read().clone()
    }

    pub fn table(&self) -> &ConnectionTable {
        &self.table
    }

    #[inline]
    pub fn dual_mac_enabled(&self) -> bool {
        !self.config.read().dual_mac_disable
    }

    pub fn is_dbs_enabled(&self) -> bool {
        self.dual_mac_enabled() && self.catalog.read().is_dbs_capable()
    }

    pub fn is_sbs_enabled(&self) -> bool {
        self.dual_mac_enabled() && self.catalog.read().is_sbs_capable()
    }

    pub(crate) fn alloc_request_id(&self) -> u32 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    fn channel_flags(&self, freq: u32) -> u32 {
        match channel_state(self.regulatory().channels(), freq) {
            ChannelState::Dfs => chan_flags::DFS | chan_flags::PASSIVE,
            _ => 0,
        }
    }

    /// freq 在 hw 下所在的 MAC。
    ///
    /// SBS 时两个 MAC 都在 5 GHz：与已有连接分处两个子频段则用另一个 MAC，
    /// 同一子频段则共用它的 MAC；没有可参照的连接时低子频段为 mac0、高子频段为 mac1。
    fn mac_for_freq(&self, hw: &HwModeDescriptor, freq: u32, vdev_id: u8) -> Option<u8> {
        let band = freq_to_band(freq)?;
        if !hw.sbs || band == Band::TwoGhz {
            return Some(hw.mac_for_band(band));
        }
        let split = self.config().sbs_split_freq;
        let snap = self.table.snapshot();
        let peer = snap
            .iter()
            .find(|c| c.vdev_id != vdev_id && !is_24ghz(c.freq));
        let mac_id = match peer {
            Some(c) if are_sbs_freqs(c.freq, freq, split) => c.mac_id ^ 1,
            Some(c) => c.mac_id,
            None => (freq > split) as u8,
        };
        Some(mac_id)
    }

    /// vdev 进入已连接 / 已启动状态
    pub fn on_connection_added(&self, mode: PmMode, freq: u32, bw: ChanWidth, vdev_id: u8) -> PmResult<usize> {
        let mut entry = ConnectionEntry::new(mode, freq, bw, vdev_id).with_flags(self.channel_flags(freq));
        if let Some(hw) = self.current_hw_mode() {
            if let Some(mac_id) = self.mac_for_freq(&hw, freq, vdev_id) {
                let mac = if mac_id == 0 { hw.mac0 } else { hw.mac1 };
                entry = entry.with_mac(mac_id);
                if mac.min_ss() < 2 {
                    entry = entry.with_nss(2, chain_mask::ONE_ONE);
                }
            }
        }
        let index = self.table.add(entry, true)?;
        log::info!(target: "wireless::pmgr",
            "add {:?} vdev {} freq {} bw {:?} mac {} at [{}]", mode, vdev_id, freq, bw, entry.mac_id, index);
        Ok(index)
    }

    /// vdev 断开 / 停止；之后检查是否可以机会性升级
    pub fn on_connection_removed(&self, vdev_id: u8) -> PmResult<ConnectionEntry> {
        let removed = self.table.remove_by_vdev(vdev_id).map_err(|e| {
            log::warn!(target: "wireless::pmgr", "remove: vdev {} not found", vdev_id);
            e
        })?;
        log::info!(target: "wireless::pmgr",
            "remove {:?} vdev {} freq {}", removed.mode, vdev_id, removed.freq);
        self.table.notify_mode_change(removed.mode);
        match self.check_n_start_opportunistic_timer() {
            Ok(()) => {}
            Err(PolicyError::InvalidContext) => {
                log::debug!(target: "wireless::pmgr", "no timer registered, opportunistic upgrade skipped");
            }
            Err(e) => log::error!(target: "wireless::pmgr", "opportunistic timer: {}", e),
        }
        Ok(removed)
    }

    /// vdev 的模式或信道变化（信道切换、角色变化）
    pub fn on_connection_changed(&self, mode: PmMode, freq: u32, bw: ChanWidth, vdev_id: u8) -> PmResult<()> {
        let (index, old) = self.table.find_by_vdev(vdev_id).ok_or(PolicyError::NotFound)?;
        let mut entry = ConnectionEntry {
            mode,
            freq,
            bw,
            ch_flags: self.channel_flags(freq),
            ..old
        };
        if let Some(mac_id) = self
            .current_hw_mode()
            .and_then(|hw| self.mac_for_freq(&hw, freq, vdev_id))
        {
            entry.mac_id = mac_id;
        }
        self.table.update(index, entry, old.mode != mode)?;
        log::info!(target: "wireless::pmgr",
            "update vdev {}: {:?}/{} -> {:?}/{} bw {:?}", vdev_id, old.mode, old.freq, mode, freq, bw);
        Ok(())
    }

    pub fn update_mac_id(&self, vdev_id: u8, mac_id: u8) -> PmResult<()> {
        if self.table.update_mac_id(vdev_id, mac_id) {
            Ok(())
        } else {
            Err(PolicyError::NotFound)
        }
    }

    pub fn active_session_count(&self, mode: PmMode) -> u32 {
        self.table.active_sessions(mode)
    }

    pub fn dump_concurrency(&self) {
        match self.current_hw_mode() {
            Some(hw) => log::debug!(target: "wireless::pmgr",
                "hw mode {} ({:?})", hw.id, hw.action_type()),
            None => log::debug!(target: "wireless::pmgr", "hw mode unknown"),
        }
        self.table.dump();
    }

    /// 新 mode 连接的 PCL
    pub fn get_pcl(&self, mode: PmMode) -> PmResult<PclResult> {
        let snap = self.table.snapshot();
        let config = self.config();
        let pcl_type = select_pcl_type(
            &snap,
            mode,
            config.system_pref,
            self.is_dbs_enabled(),
            self.is_sbs_enabled(),
        );
        let reg = self.regulatory();
        let req = PclRequest {
            pcl_type,
            mode,
            weight_len: NUM_CHANNELS,
            start_group: 0,
        };
        get_channel_list(&req, &snap, reg.as_ref(), &config)
    }

    /// 已连接 vdev 的 PCL：计算期间把该 vdev 自己的条目移出连接表
    pub fn get_pcl_for_vdev(&self, mode: PmMode, vdev_id: u8) -> PmResult<PclResult> {
        let _hidden = self.table.hide(ConnSelector::Vdev(vdev_id));
        self.get_pcl(mode)
    }

    /// 计算并下发 vdev 的 PCL
    pub fn set_pcl(&self, vdev_id: u8, mode: PmMode) -> PmResult<()> {
        let wma = self.callbacks().wma.ok_or(PolicyError::InvalidContext)?;
        let pcl = self.get_pcl_for_vdev(mode, vdev_id)?;
        if pcl.truncated() {
            log::warn!(target: "wireless::pmgr", "pcl for vdev {} truncated to {}", vdev_id, pcl.len());
        }
        wma.set_pcl(vdev_id, &pcl)
    }
}
