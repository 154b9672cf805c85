//! 策略管理器配置及其 ini 解析
//!
//! 配置文件按行书写 `TAG=value`，例如：
//!
//! ```text
//! PM_SYSTEM_PREF=1
//! PM_DFS_MASTER=0
//! PM_MCC_BI_POLICY=2
//! ```
//!
//! 未出现或无法解析的 tag 保持默认值。

use core::result::Result;

/// 并发系统偏好（决定 PCL 类型选择）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SystemPref {
    /// 吞吐优先：倾向 DBS / 异频
    #[default]
    Throughput = 0,
    /// 功耗优先：倾向 SCC
    Power = 1,
    /// 时延优先：避免 MCC
    Latency = 2,
}

/// MCC 转 SCC 策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MccToSccSwitch {
    #[default]
    Disable = 0,
    Enable = 1,
    /// 强制 SCC 且不断开已有连接
    ForceWithoutDisconnect = 2,
}

/// MCC 下 SAP/GO 与新 BSS beacon interval 冲突时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MccBiPolicy {
    /// 拒绝新连接
    Disallow = 0,
    /// 接受不同的 beacon interval
    AllowDifferent = 1,
    /// 就地修改 GO 的 beacon interval 并下发固件
    #[default]
    ChangeGoBi = 2,
    /// 拆除冲突的 SAP/GO
    TeardownGo = 3,
}

/// DBS 机会性升级定时器默认时长
pub const DBS_OPPORTUNISTIC_TIME_MS: u32 = 5000;
/// 5 GHz 低/高子频段分界（SBS 判定用）
pub const DEFAULT_SBS_SPLIT_FREQ: u32 = 5400;

/// 策略管理器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyConfig {
    pub system_pref: SystemPref,
    /// 关闭双 MAC 特性，按单 MAC 芯片处理
    pub dual_mac_disable: bool,
    /// SAP/GO 可在 DFS 信道上启动
    pub dfs_master_enabled: bool,
    /// 允许 STA 与 SAP 在 DFS 信道上同信道并发
    pub sta_sap_scc_on_dfs_allowed: bool,
    /// SAP/GO 可使用 6 GHz
    pub ap_6ghz_allowed: bool,
    /// PCL 中 6 GHz 排在 5 GHz 之前
    pub prefer_6g_over_5g: bool,
    pub mcc_to_scc_switch: MccToSccSwitch,
    pub mcc_bi_policy: MccBiPolicy,
    /// 允许两个 STA 并发
    pub allow_dual_sta: bool,
    pub opportunistic_timer_ms: u32,
    /// 不大于该频率的 5 GHz 信道属于低子频段
    pub sbs_split_freq: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            system_pref: SystemPref::Throughput,
            dual_mac_disable: false,
            dfs_master_enabled: true,
            sta_sap_scc_on_dfs_allowed: false,
            ap_6ghz_allowed: false,
            prefer_6g_over_5g: false,
            mcc_to_scc_switch: MccToSccSwitch::Disable,
            mcc_bi_policy: MccBiPolicy::ChangeGoBi,
            allow_dual_sta: false,
            opportunistic_timer_ms: DBS_OPPORTUNISTIC_TIME_MS,
            sbs_split_freq: DEFAULT_SBS_SPLIT_FREQ,
        }
    }
}

/// 在 file_data 中查找以 tag_name 开头的行，返回其后的值（不含换行与回车）
fn find_tag<'a>(file_data: &'a [u8], tag_name: &str) -> Option<&'a [u8]> {
    let tag = tag_name.as_bytes();
    let mut line_start = 0;
    while line_start < file_data.len() {
        let mut curr = line_start;
        while curr < file_data.len() && file_data[curr] != b'\n' {
            curr += 1;
        }
        let mut line = &file_data[line_start..curr];
        if let [rest @ .., b'\r'] = line {
            line = rest;
        }
        if line.len() >= tag.len() && &line[..tag.len()] == tag {
            return Some(&line[tag.len()..]);
        }
        line_start = curr + 1;
    }
    None
}

/// 十进制无符号整数
fn parse_dec(s: &[u8]) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut v: u32 = 0;
    for &b in s {
        if !b.is_ascii_digit() {
            return None;
        }
        v = v.checked_mul(10)?.checked_add((b - b'0') as u32)?;
    }
    Some(v)
}

fn parse_bool(s: &[u8]) -> Option<bool> {
    match parse_dec(s)? {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

const KNOWN_TAGS: [&str; 11] = [
    "PM_SYSTEM_PREF=",
    "PM_DUAL_MAC_DISABLE=",
    "PM_DFS_MASTER=",
    "PM_STA_SAP_SCC_ON_DFS=",
    "PM_AP_6GHZ=",
    "PM_PREFER_6G=",
    "PM_DUAL_STA=",
    "PM_MCC_TO_SCC=",
    "PM_MCC_BI_POLICY=",
    "PM_OPPORTUNISTIC_MS=",
    "PM_SBS_SPLIT_FREQ=",
];

/// 解析配置文件，找到的 tag 覆盖 config 中对应字段。
///
/// 非空文件中一个已知 tag 都没有时返回 -EINVAL，config 不变。
pub fn parse_configfile(file_data: &[u8], config: &mut PolicyConfig) -> Result<(), i32> {
    let blank = file_data.iter().all(|b| b.is_ascii_whitespace());
    if !blank && !KNOWN_TAGS.iter().any(|t| find_tag(file_data, t).is_some()) {
        log::warn!(target: "wireless::pmgr", "policy config: no known tag in {} bytes", file_data.len());
        return Err(-22);
    }
    let defaults = PolicyConfig::default();

    macro_rules! parse_flag {
        ($tag:expr, $field:ident) => {
            if let Some(v) = find_tag(file_data, $tag) {
                config.$field = parse_bool(v).unwrap_or(defaults.$field);
            }
        };
    }

    if let Some(v) = find_tag(file_data, "PM_SYSTEM_PREF=") {
        config.system_pref = match parse_dec(v) {
            Some(1) => SystemPref::Power,
            Some(2) => SystemPref::Latency,
            Some(0) => SystemPref::Throughput,
            _ => defaults.system_pref,
        };
    }
    parse_flag!("PM_DUAL_MAC_DISABLE=", dual_mac_disable);
    parse_flag!("PM_DFS_MASTER=", dfs_master_enabled);
    parse_flag!("PM_STA_SAP_SCC_ON_DFS=", sta_sap_scc_on_dfs_allowed);
    parse_flag!("PM_AP_6GHZ=", ap_6ghz_allowed);
    parse_flag!("PM_PREFER_6G=", prefer_6g_over_5g);
    parse_flag!("PM_DUAL_STA=", allow_dual_sta);
    if let Some(v) = find_tag(file_data, "PM_MCC_TO_SCC=") {
        config.mcc_to_scc_switch = match parse_dec(v) {
            Some(0) => MccToSccSwitch::Disable,
            Some(1) => MccToSccSwitch::Enable,
            Some(2) => MccToSccSwitch::ForceWithoutDisconnect,
            _ => defaults.mcc_to_scc_switch,
        };
    }
    if let Some(v) = find_tag(file_data, "PM_MCC_BI_POLICY=") {
        config.mcc_bi_policy = match parse_dec(v) {
            Some(0) => MccBiPolicy::Disallow,
            Some(1) => MccBiPolicy::AllowDifferent,
            Some(2) => MccBiPolicy::ChangeGoBi,
            Some(3) => MccBiPolicy::TeardownGo,
            _ => defaults.mcc_bi_policy,
        };
    }
    if let Some(v) = find_tag(file_data, "PM_OPPORTUNISTIC_MS=") {
        config.opportunistic_timer_ms = parse_dec(v)
            .filter(|ms| *ms > 0)
            .unwrap_or(defaults.opportunistic_timer_ms);
    }
    if let Some(v) = find_tag(file_data, "PM_SBS_SPLIT_FREQ=") {
        config.sbs_split_freq = parse_dec(v)
            .filter(|f| ieee80211::is_5ghz(*f))
            .unwrap_or(defaults.sbs_split_freq);
    }
    log::debug!(target: "wireless::pmgr", "policy config: {:?}", config);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_overrides_known_tags() {
        let ini = b"PM_SYSTEM_PREF=1\r\nPM_DFS_MASTER=0\nPM_MCC_BI_POLICY=3\nPM_DUAL_STA=1\nPM_OPPORTUNISTIC_MS=2000\nPM_MCC_TO_SCC=2\n";
        let mut cfg = PolicyConfig::default();
        parse_configfile(ini, &mut cfg).unwrap();
        assert_eq!(cfg.system_pref, SystemPref::Power);
        assert!(!cfg.dfs_master_enabled);
        assert_eq!(cfg.mcc_bi_policy, MccBiPolicy::TeardownGo);
        assert!(cfg.allow_dual_sta);
        assert_eq!(cfg.opportunistic_timer_ms, 2000);
        assert_eq!(cfg.mcc_to_scc_switch, MccToSccSwitch::ForceWithoutDisconnect);
        assert_eq!(cfg.sbs_split_freq, DEFAULT_SBS_SPLIT_FREQ);
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let ini = b"PM_SYSTEM_PREF=9\nPM_DFS_MASTER=yes\nPM_OPPORTUNISTIC_MS=0\nPM_SBS_SPLIT_FREQ=2412\n";
        let mut cfg = PolicyConfig::default();
        cfg.dfs_master_enabled = false;
        parse_configfile(ini, &mut cfg).unwrap();
        assert_eq!(cfg, PolicyConfig::default());
    }

    #[test]
    fn empty_file_keeps_config() {
        let mut cfg = PolicyConfig::default();
        cfg.allow_dual_sta = true;
        parse_configfile(b"", &mut cfg).unwrap();
        parse_configfile(b"\r\n\n", &mut cfg).unwrap();
        assert!(cfg.allow_dual_sta);
    }

    #[test]
    fn file_without_known_tags_is_rejected() {
        let mut cfg = PolicyConfig::default();
        cfg.allow_dual_sta = true;
        assert_eq!(parse_configfile(b"\x7fELF\x02\x01", &mut cfg), Err(-22));
        assert_eq!(parse_configfile(b"DUAL_STA=1\nFOO=2\n", &mut cfg), Err(-22));
        assert!(cfg.allow_dual_sta);
    }
}
