//! 并发连接表
//!
//! 固定容量的活动连接数组 + 一把锁，是“当前有哪些连接”的唯一来源。
//!
//! - `in_use` 的槽位始终紧凑排列在低下标（遍历按“前 N 个有效”语义）
//! - 同一 vdev_id 最多占一个槽位
//! - 每种模式维护活动会话计数，随增删同步增减
//! - 回调（mode changed）一律在释放锁之后调用，回调内可以重入本表

use alloc::sync::Arc;
use spin::{Mutex, RwLock};

use ieee80211::{freq_to_band, Band, ChanWidth};

use crate::error::{PmResult, PolicyError};

/// 连接表容量（最大并发连接数）
pub const MAX_CONC_CONNECTIONS: usize = 3;

/// 连接的逻辑模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PmMode {
    #[default]
    Sta = 0,
    Sap = 1,
    P2pClient = 2,
    P2pGo = 3,
    NanDisc = 4,
    Ndi = 5,
}

impl PmMode {
    pub const COUNT: usize = 6;

    pub const ALL: [PmMode; Self::COUNT] = [
        Self::Sta,
        Self::Sap,
        Self::P2pClient,
        Self::P2pGo,
        Self::NanDisc,
        Self::Ndi,
    ];

    /// SAP / P2P GO：需要发 beacon、受 DFS 约束的模式
    #[inline]
    pub const fn is_ap(self) -> bool {
        matches!(self, Self::Sap | Self::P2pGo)
    }

    #[inline]
    pub const fn is_nan(self) -> bool {
        matches!(self, Self::NanDisc | Self::Ndi)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// 连接的信道标志位
pub mod chan_flags {
    pub const DFS: u32 = 1 << 0;
    pub const PASSIVE: u32 = 1 << 1;
    pub const INDOOR: u32 = 1 << 2;
}

/// 链路 chain mask
pub mod chain_mask {
    pub const ONE_ONE: u8 = 0;
    pub const TWO_TWO: u8 = 1;
}

/// 连接表的一个槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionEntry {
    pub mode: PmMode,
    /// 中心频率 MHz
    pub freq: u32,
    pub bw: ChanWidth,
    /// 当前承载该连接的物理 MAC（0 或 1）
    pub mac_id: u8,
    pub chain_mask: u8,
    /// 建立连接时的空间流数
    pub original_nss: u8,
    pub vdev_id: u8,
    pub in_use: bool,
    pub ch_flags: u32,
}

impl ConnectionEntry {
    pub const EMPTY: ConnectionEntry = ConnectionEntry {
        mode: PmMode::Sta,
        freq: 0,
        bw: ChanWidth::None,
        mac_id: 0,
        chain_mask: chain_mask::ONE_ONE,
        original_nss: 0,
        vdev_id: 0,
        in_use: false,
        ch_flags: 0,
    };

    /// 新连接（in_use = true，MAC 0，2x2）
    pub fn new(mode: PmMode, freq: u32, bw: ChanWidth, vdev_id: u8) -> Self {
        Self {
            mode,
            freq,
            bw,
            mac_id: 0,
            chain_mask: chain_mask::TWO_TWO,
            original_nss: 2,
            vdev_id,
            in_use: true,
            ch_flags: 0,
        }
    }

    pub fn with_mac(mut self, mac_id: u8) -> Self {
        self.mac_id = mac_id;
        self
    }

    pub fn with_nss(mut self, nss: u8, chain_mask: u8) -> Self {
        self.original_nss = nss;
        self.chain_mask = chain_mask;
        self
    }

    pub fn with_flags(mut self, ch_flags: u32) -> Self {
        self.ch_flags = ch_flags;
        self
    }

    #[inline]
    pub fn is_dfs(&self) -> bool {
        self.ch_flags & chan_flags::DFS != 0
    }

    #[inline]
    pub fn band(&self) -> Option<Band> {
        freq_to_band(self.freq)
    }
}

/// 连接表的时间点快照，供 PCL 计算与规则判断使用（无锁纯计算）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnSnapshot {
    conns: [ConnectionEntry; MAX_CONC_CONNECTIONS],
    len: usize,
}

impl ConnSnapshot {
    pub const fn empty() -> Self {
        Self {
            conns: [ConnectionEntry::EMPTY; MAX_CONC_CONNECTIONS],
            len: 0,
        }
    }

    /// 由给定条目构造；超出容量的部分丢弃
    pub fn from_entries(entries: &[ConnectionEntry]) -> Self {
        let mut snap = Self::empty();
        for e in entries.iter().take(MAX_CONC_CONNECTIONS) {
            snap.conns[snap.len] = *e;
            snap.len += 1;
        }
        snap
    }

    #[inline]
    pub fn as_slice(&self) -> &[ConnectionEntry] {
        &self.conns[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> core::slice::Iter<'_, ConnectionEntry> {
        self.as_slice().iter()
    }

    pub fn mode_count(&self, mode: PmMode) -> usize {
        self.iter().filter(|c| c.mode == mode).count()
    }

    pub fn has_mode(&self, mode: PmMode) -> bool {
        self.iter().any(|c| c.mode == mode)
    }

    /// 仅保留前 n 个连接
    pub fn truncated(&self, n: usize) -> Self {
        Self::from_entries(&self.as_slice()[..n.min(self.len)])
    }
}

/// store_and_remove 的选择器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnSelector {
    /// 该模式的全部连接
    Mode(PmMode),
    Vdev(u8),
    /// 指定频率上的指定模式
    FreqMode(u32, PmMode),
}

impl ConnSelector {
    fn matches(&self, c: &ConnectionEntry) -> bool {
        match *self {
            Self::Mode(mode) => c.mode == mode,
            Self::Vdev(vdev_id) => c.vdev_id == vdev_id,
            Self::FreqMode(freq, mode) => c.freq == freq && c.mode == mode,
        }
    }
}

/// 被暂时移出表的条目（记录原下标以便原样恢复）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredEntry {
    pub index: usize,
    pub entry: ConnectionEntry,
}

/// store_and_remove 的输出缓冲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredConnections {
    entries: [StoredEntry; MAX_CONC_CONNECTIONS],
    count: usize,
}

impl StoredConnections {
    pub const fn empty() -> Self {
        Self {
            entries: [StoredEntry {
                index: 0,
                entry: ConnectionEntry::EMPTY,
            }; MAX_CONC_CONNECTIONS],
            count: 0,
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn entries(&self) -> &[StoredEntry] {
        &self.entries[..self.count]
    }
}

struct TableInner {
    conns: [ConnectionEntry; MAX_CONC_CONNECTIONS],
    active_sessions: [u32; PmMode::COUNT],
}

impl TableInner {
    const fn new() -> Self {
        Self {
            conns: [ConnectionEntry::EMPTY; MAX_CONC_CONNECTIONS],
            active_sessions: [0; PmMode::COUNT],
        }
    }

    fn count(&self) -> usize {
        self.conns.iter().take_while(|c| c.in_use).count()
    }

    fn vdev_index(&self, vdev_id: u8) -> Option<usize> {
        self.conns[..self.count()]
            .iter()
            .position(|c| c.vdev_id == vdev_id)
    }

    fn incr_session(&mut self, mode: PmMode) {
        self.active_sessions[mode.index()] += 1;
    }

    fn decr_session(&mut self, mode: PmMode) {
        let n = &mut self.active_sessions[mode.index()];
        if *n == 0 {
            log::error!(target: "wireless::pmgr", "active session count underflow mode={:?}", mode);
            return;
        }
        *n -= 1;
    }

    /// 删除 index 处的条目，后续条目前移，末尾清零
    fn remove_at(&mut self, index: usize) -> ConnectionEntry {
        let count = self.count();
        let removed = self.conns[index];
        for i in index..count.saturating_sub(1) {
            self.conns[i] = self.conns[i + 1];
        }
        self.conns[count - 1] = ConnectionEntry::EMPTY;
        self.decr_session(removed.mode);
        removed
    }

    /// 在 index 处插入，原 index 及之后的条目后移；调用方保证有空位
    fn insert_at(&mut self, index: usize, entry: ConnectionEntry) {
        let count = self.count();
        let index = index.min(count);
        let mut i = count;
        while i > index {
            self.conns[i] = self.conns[i - 1];
            i -= 1;
        }
        self.conns[index] = entry;
        self.incr_session(entry.mode);
    }

    fn write_slot(&mut self, index: usize, entry: ConnectionEntry) -> PmResult<()> {
        let count = self.count();
        if !entry.in_use {
            if index < count {
                self.remove_at(index);
            }
            return Ok(());
        }
        if index > count {
            log::error!(target: "wireless::pmgr",
                "conn table: index {} would leave a gap (count {})", index, count);
            return Err(PolicyError::InvalidArgument);
        }
        if let Some(other) = self.vdev_index(entry.vdev_id) {
            if other != index {
                log::error!(target: "wireless::pmgr",
                    "conn table: vdev {} already at index {}", entry.vdev_id, other);
                return Err(PolicyError::InvalidArgument);
            }
        }
        let old = self.conns[index];
        if !old.in_use {
            self.incr_session(entry.mode);
        } else if old.mode != entry.mode {
            self.decr_session(old.mode);
            self.incr_session(entry.mode);
        }
        self.conns[index] = entry;
        Ok(())
    }
}

/// 只有 STA/SAP 的进出需要通知上层
#[inline]
fn is_notify_mode(mode: PmMode) -> bool {
    matches!(mode, PmMode::Sta | PmMode::Sap)
}

/// 模式变化通知
pub type ModeChangeCb = Arc<dyn Fn() + Send + Sync>;

/// 并发连接表
pub struct ConnectionTable {
    inner: Mutex<TableInner>,
    mode_change_cb: RwLock<Option<ModeChangeCb>>,
}

impl ConnectionTable {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(TableInner::new()),
            mode_change_cb: RwLock::new(None),
        }
    }

    /// 注册 STA/SAP 模式变化回调
    pub fn register_mode_change_cb(&self, cb: Option<ModeChangeCb>) {
        *self.mode_change_cb.write() = cb;
    }

    pub(crate) fn notify_mode_change(&self, mode: PmMode) {
        if !is_notify_mode(mode) {
            return;
        }
        let cb = self.mode_change_cb.read().clone();
        if let Some(cb) = cb {
            cb();
        }
    }

    /// 写入 index 处的槽位。
    ///
    /// `entry.in_use == false` 表示删除该槽位（后续条目前移）。新增只能写在第一个空位，
    /// 否则表会出现空洞，按契约违规处理。`notify` 为 true 且槽位的模式发生变化、
    /// 新旧模式之一为 STA/SAP 时，在释放锁后调用 mode changed 回调。
    pub fn update(&self, index: usize, entry: ConnectionEntry, notify: bool) -> PmResult<()> {
        if index >= MAX_CONC_CONNECTIONS {
            debug_assert!(index < MAX_CONC_CONNECTIONS, "conn table index out of range");
            log::error!(target: "wireless::pmgr", "conn table: index {} out of range", index);
            return Err(PolicyError::CapacityExceeded);
        }
        let (old_mode, new_mode) = {
            let mut inner = self.inner.lock();
            let old = inner.conns[index];
            inner.write_slot(index, entry)?;
            (old.in_use.then_some(old.mode), entry.in_use.then_some(entry.mode))
        };
        if notify && old_mode != new_mode {
            match (old_mode, new_mode) {
                (_, Some(m)) if is_notify_mode(m) => self.notify_mode_change(m),
                (Some(m), _) => self.notify_mode_change(m),
                _ => {}
            }
        }
        Ok(())
    }

    /// 在第一个空位追加新连接，返回其下标
    pub fn add(&self, entry: ConnectionEntry, notify: bool) -> PmResult<usize> {
        let index = {
            let mut inner = self.inner.lock();
            let index = inner.count();
            if index >= MAX_CONC_CONNECTIONS {
                log::error!(target: "wireless::pmgr",
                    "conn table full, cannot add vdev {}", entry.vdev_id);
                return Err(PolicyError::CapacityExceeded);
            }
            inner.write_slot(index, ConnectionEntry { in_use: true, ..entry })?;
            index
        };
        if notify {
            self.notify_mode_change(entry.mode);
        }
        Ok(index)
    }

    /// 删除 vdev 对应的连接，返回被删除的条目
    pub fn remove_by_vdev(&self, vdev_id: u8) -> PmResult<ConnectionEntry> {
        let mut inner = self.inner.lock();
        let index = inner.vdev_index(vdev_id).ok_or(PolicyError::NotFound)?;
        Ok(inner.remove_at(index))
    }

    /// 就地修改 vdev 的信道与带宽
    pub fn update_channel(&self, vdev_id: u8, freq: u32, bw: ChanWidth, ch_flags: u32) -> PmResult<()> {
        let mut inner = self.inner.lock();
        let index = inner.vdev_index(vdev_id).ok_or(PolicyError::NotFound)?;
        let c = &mut inner.conns[index];
        c.freq = freq;
        c.bw = bw;
        c.ch_flags = ch_flags;
        Ok(())
    }

    /// hw mode 切换完成后更新 vdev 所在 MAC；vdev 不在表中返回 false
    pub fn update_mac_id(&self, vdev_id: u8, mac_id: u8) -> bool {
        let mut inner = self.inner.lock();
        match inner.vdev_index(vdev_id) {
            Some(index) => {
                inner.conns[index].mac_id = mac_id;
                true
            }
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.inner.lock().count()
    }

    /// 指定模式的连接数；提供 indices 时写入各连接下标（最多 indices.len() 个）
    pub fn mode_count(&self, mode: PmMode, indices: Option<&mut [usize]>) -> usize {
        let inner = self.inner.lock();
        let count = inner.count();
        let mut n = 0;
        let mut out = indices;
        for (i, c) in inner.conns[..count].iter().enumerate() {
            if c.mode != mode {
                continue;
            }
            if let Some(buf) = out.as_deref_mut() {
                if n < buf.len() {
                    buf[n] = i;
                }
            }
            n += 1;
        }
        n
    }

    pub fn find_by_vdev(&self, vdev_id: u8) -> Option<(usize, ConnectionEntry)> {
        let inner = self.inner.lock();
        inner.vdev_index(vdev_id).map(|i| (i, inner.conns[i]))
    }

    pub fn find_by_freq_mode(&self, freq: u32, mode: PmMode) -> Option<(usize, ConnectionEntry)> {
        let inner = self.inner.lock();
        let count = inner.count();
        inner.conns[..count]
            .iter()
            .position(|c| c.freq == freq && c.mode == mode)
            .map(|i| (i, inner.conns[i]))
    }

    /// 模式的活动会话数
    pub fn active_sessions(&self, mode: PmMode) -> u32 {
        self.inner.lock().active_sessions[mode.index()]
    }

    /// 表中全部槽位（含空槽）的拷贝
    pub fn slots(&self) -> [ConnectionEntry; MAX_CONC_CONNECTIONS] {
        self.inner.lock().conns
    }

    /// 有效连接的时间点快照
    pub fn snapshot(&self) -> ConnSnapshot {
        let inner = self.inner.lock();
        ConnSnapshot::from_entries(&inner.conns[..inner.count()])
    }

    /// 原子地拷出并删除所有匹配 selector 的连接，返回被删条目（含原下标）
    pub fn store_and_remove(&self, selector: ConnSelector) -> StoredConnections {
        let mut stored = StoredConnections::empty();
        let mut inner = self.inner.lock();
        let count = inner.count();
        for i in 0..count {
            let c = inner.conns[i];
            if selector.matches(&c) {
                stored.entries[stored.count] = StoredEntry { index: i, entry: c };
                stored.count += 1;
            }
        }
        // 从高下标往低删，保持记录的原下标有效
        for s in stored.entries[..stored.count].iter().rev() {
            inner.remove_at(s.index);
        }
        if stored.count == 0 {
            log::debug!(target: "wireless::pmgr", "store_and_remove: no match for {:?}", selector);
        }
        stored
    }

    /// 把 store_and_remove 拷出的条目按原下标放回。
    /// 空位不足或某个 vdev 已在表中时整体拒绝，表保持不变。
    pub fn restore(&self, stored: &StoredConnections) -> PmResult<()> {
        let mut inner = self.inner.lock();
        let count = inner.count();
        if count + stored.count > MAX_CONC_CONNECTIONS {
            log::error!(target: "wireless::pmgr",
                "restore: {} entries do not fit (count {})", stored.count, count);
            return Err(PolicyError::CapacityExceeded);
        }
        if let Some(dup) = stored.entries().iter().find(|s| inner.vdev_index(s.entry.vdev_id).is_some()) {
            log::error!(target: "wireless::pmgr",
                "restore: vdev {} already in table", dup.entry.vdev_id);
            return Err(PolicyError::InvalidArgument);
        }
        // 按原下标升序插回，恰好还原删除前的排列
        for s in stored.entries() {
            inner.insert_at(s.index, s.entry);
        }
        Ok(())
    }

    /// 作用域形式的 store_and_remove：返回的 guard 在 drop 时自动恢复
    pub fn hide(&self, selector: ConnSelector) -> HiddenConnections<'_> {
        HiddenConnections {
            table: self,
            stored: self.store_and_remove(selector),
        }
    }

    /// debug 日志输出当前并发状态
    pub fn dump(&self) {
        let inner = self.inner.lock();
        let count = inner.count();
        log::debug!(target: "wireless::pmgr", "---- concurrency: {} connection(s) ----", count);
        for (i, c) in inner.conns[..count].iter().enumerate() {
            log::debug!(target: "wireless::pmgr",
                "[{}] vdev={} mode={:?} freq={} bw={:?} mac={} nss={} dfs={}",
                i, c.vdev_id, c.mode, c.freq, c.bw, c.mac_id, c.original_nss, c.is_dfs());
        }
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// 暂时隐藏的一组连接；drop 时放回原位
pub struct HiddenConnections<'a> {
    table: &'a ConnectionTable,
    stored: StoredConnections,
}

impl HiddenConnections<'_> {
    pub fn stored(&self) -> &StoredConnections {
        &self.stored
    }
}

impl Drop for HiddenConnections<'_> {
    fn drop(&mut self) {
        if self.stored.is_empty() {
            return;
        }
        if let Err(e) = self.table.restore(&self.stored) {
            log::error!(target: "wireless::pmgr", "hidden connections not restored: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    fn sta(freq: u32, vdev: u8) -> ConnectionEntry {
        ConnectionEntry::new(PmMode::Sta, freq, ChanWidth::Mhz20, vdev)
    }

    fn sap(freq: u32, vdev: u8) -> ConnectionEntry {
        ConnectionEntry::new(PmMode::Sap, freq, ChanWidth::Mhz80, vdev)
    }

    fn assert_packed(t: &ConnectionTable) {
        let slots = t.slots();
        let n = slots.iter().filter(|c| c.in_use).count();
        assert_eq!(t.count(), n);
        assert!(slots[..n].iter().all(|c| c.in_use));
        assert!(slots[n..].iter().all(|c| *c == ConnectionEntry::EMPTY));
    }

    #[test]
    fn add_remove_keeps_table_packed() {
        let t = ConnectionTable::new();
        t.add(sta(5180, 0), false).unwrap();
        t.add(sap(2437, 1), false).unwrap();
        t.add(sta(5745, 2), false).unwrap();
        assert_packed(&t);
        assert_eq!(t.add(sta(5200, 3), false), Err(PolicyError::CapacityExceeded));

        let removed = t.remove_by_vdev(1).unwrap();
        assert_eq!(removed.mode, PmMode::Sap);
        assert_packed(&t);
        assert_eq!(t.count(), 2);
        assert_eq!(t.find_by_vdev(2).map(|(i, _)| i), Some(1));
        assert_eq!(t.active_sessions(PmMode::Sap), 0);
        assert_eq!(t.active_sessions(PmMode::Sta), 2);
    }

    #[test]
    fn update_rejects_gap_and_duplicate_vdev() {
        let t = ConnectionTable::new();
        assert_eq!(t.update(1, sta(5180, 0), false), Err(PolicyError::InvalidArgument));
        t.update(0, sta(5180, 0), false).unwrap();
        assert_eq!(t.update(1, sap(5180, 0), false), Err(PolicyError::InvalidArgument));
        // 同一槽位就地修改模式
        t.update(0, sap(5180, 0), false).unwrap();
        assert_eq!(t.active_sessions(PmMode::Sta), 0);
        assert_eq!(t.active_sessions(PmMode::Sap), 1);
        // in_use = false 即删除
        t.update(0, ConnectionEntry::EMPTY, false).unwrap();
        assert_eq!(t.count(), 0);
        assert_packed(&t);
    }

    #[test]
    fn mode_change_callback_only_for_sta_sap() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let t = ConnectionTable::new();
        t.register_mode_change_cb(Some(Arc::new(|| {
            CALLS.fetch_add(1, Ordering::SeqCst);
        })));
        t.update(0, sta(5180, 0), true).unwrap();
        t.update(1, ConnectionEntry::new(PmMode::NanDisc, 2437, ChanWidth::Mhz20, 1), true)
            .unwrap();
        t.update(0, sta(5200, 0), false).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        // 模式没变：只是信道更新
        t.update(0, sta(5220, 0), true).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sta_leaving_to_go_notifies() {
        let t = ConnectionTable::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        t.register_mode_change_cb(Some(Arc::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
        })));
        t.add(sta(5180, 0), false).unwrap();
        t.update(0, ConnectionEntry::new(PmMode::P2pGo, 5180, ChanWidth::Mhz20, 0), true)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // GO -> P2P client：两端都不是 STA/SAP
        t.update(0, ConnectionEntry::new(PmMode::P2pClient, 5180, ChanWidth::Mhz20, 0), true)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // 删除 SAP 也算离开
        t.update(0, sap(5180, 0), true).unwrap();
        t.update(0, ConnectionEntry::EMPTY, true).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn callback_may_reenter_table() {
        let t = Arc::new(ConnectionTable::new());
        let t2 = t.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        t.register_mode_change_cb(Some(Arc::new(move || {
            seen2.store(t2.count(), Ordering::SeqCst);
        })));
        t.add(sap(5180, 4), true).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        t.register_mode_change_cb(None);
    }

    #[test]
    fn mode_count_reports_indices() {
        let t = ConnectionTable::new();
        t.add(sta(5180, 0), false).unwrap();
        t.add(sap(2437, 1), false).unwrap();
        t.add(sta(5745, 2), false).unwrap();
        let mut idx = [usize::MAX; MAX_CONC_CONNECTIONS];
        assert_eq!(t.mode_count(PmMode::Sta, Some(&mut idx)), 2);
        assert_eq!(&idx[..2], &[0, 2]);
        assert_eq!(t.mode_count(PmMode::P2pGo, None), 0);
        assert_eq!(t.find_by_freq_mode(2437, PmMode::Sap).map(|(i, _)| i), Some(1));
        assert!(t.find_by_freq_mode(2437, PmMode::Sta).is_none());
    }

    #[test]
    fn store_and_restore_round_trip() {
        let t = ConnectionTable::new();
        t.add(sta(5180, 0), false).unwrap();
        t.add(sap(2437, 1).with_mac(1), false).unwrap();
        t.add(sta(5745, 2), false).unwrap();
        let before = t.slots();
        let sessions_before = t.active_sessions(PmMode::Sta);

        let stored = t.store_and_remove(ConnSelector::Mode(PmMode::Sta));
        assert_eq!(stored.count(), 2);
        assert_eq!(t.count(), 1);
        assert_eq!(t.active_sessions(PmMode::Sta), 0);
        assert_packed(&t);

        t.restore(&stored).unwrap();
        assert_eq!(t.slots(), before);
        assert_eq!(t.active_sessions(PmMode::Sta), sessions_before);
    }

    #[test]
    fn store_by_vdev_and_freq_mode() {
        let t = ConnectionTable::new();
        t.add(sta(5180, 0), false).unwrap();
        t.add(sap(5180, 1), false).unwrap();
        let before = t.slots();

        let stored = t.store_and_remove(ConnSelector::FreqMode(5180, PmMode::Sap));
        assert_eq!(stored.count(), 1);
        assert_eq!(stored.entries()[0].index, 1);
        t.restore(&stored).unwrap();
        assert_eq!(t.slots(), before);

        let stored = t.store_and_remove(ConnSelector::Vdev(0));
        assert_eq!(t.slots()[0].vdev_id, 1);
        t.restore(&stored).unwrap();
        assert_eq!(t.slots(), before);

        let none = t.store_and_remove(ConnSelector::Vdev(9));
        assert!(none.is_empty());
        assert_eq!(t.slots(), before);
    }

    #[test]
    fn restore_without_room_leaves_table_unchanged() {
        let t = ConnectionTable::new();
        t.add(sta(5180, 0), false).unwrap();
        t.add(sap(2437, 1), false).unwrap();
        let stored = t.store_and_remove(ConnSelector::Mode(PmMode::Sta));
        t.add(sta(5200, 5), false).unwrap();
        t.add(sta(5220, 6), false).unwrap();
        let before = t.slots();
        assert_eq!(t.restore(&stored), Err(PolicyError::CapacityExceeded));
        assert_eq!(t.slots(), before);
    }

    #[test]
    fn restore_refuses_vdev_already_present() {
        let t = ConnectionTable::new();
        t.add(sta(5180, 0), false).unwrap();
        let stored = t.store_and_remove(ConnSelector::Vdev(0));
        t.restore(&stored).unwrap();
        let before = t.slots();
        // 同一份拷贝恢复两次
        assert_eq!(t.restore(&stored), Err(PolicyError::InvalidArgument));
        assert_eq!(t.slots(), before);
        assert_eq!(t.active_sessions(PmMode::Sta), 1);

        // 隐藏期间同一 vdev 又被加回
        let stored = t.store_and_remove(ConnSelector::Vdev(0));
        t.add(sta(5745, 0), false).unwrap();
        let before = t.slots();
        assert_eq!(t.restore(&stored), Err(PolicyError::InvalidArgument));
        assert_eq!(t.slots(), before);
        assert_eq!(t.active_sessions(PmMode::Sta), 1);
    }

    #[test]
    fn hide_guard_restores_on_drop() {
        let t = ConnectionTable::new();
        t.add(sta(5180, 0), false).unwrap();
        t.add(sap(2437, 1), false).unwrap();
        let before = t.slots();
        {
            let hidden = t.hide(ConnSelector::Mode(PmMode::Sap));
            assert_eq!(hidden.stored().count(), 1);
            assert_eq!(t.count(), 1);
            assert!(!t.snapshot().has_mode(PmMode::Sap));
        }
        assert_eq!(t.slots(), before);
    }

    #[test]
    fn update_mac_and_channel() {
        let t = ConnectionTable::new();
        t.add(sta(5180, 3), false).unwrap();
        assert!(t.update_mac_id(3, 1));
        assert!(!t.update_mac_id(7, 1));
        t.update_channel(3, 5260, ChanWidth::Mhz40, chan_flags::DFS).unwrap();
        let (_, c) = t.find_by_vdev(3).unwrap();
        assert_eq!((c.mac_id, c.freq, c.bw), (1, 5260, ChanWidth::Mhz40));
        assert!(c.is_dfs());
        assert_eq!(t.update_channel(9, 5180, ChanWidth::Mhz20, 0), Err(PolicyError::NotFound));
    }
}
