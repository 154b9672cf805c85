//! 双 MAC Wi-Fi 芯片的并发策略管理器（policy manager）
//!
//! 功能包括:
//! - 并发连接表 (conn_table)
//! - 固件 hw mode 目录与能力匹配 (hw_mode)
//! - PCL 生成与类型选择 (pcl, pcl_select)
//! - 并发规则、beacon interval 协调 (rules, beacon)
//! - hw mode 切换状态机、NSS 调整流水线、机会性升级定时器 (transition, opportunistic)
//!
//! 所有状态由 `PolicyManagerContext` 持有；协作方（HDD / WMA / SME / CM / 定时器 / 监管域）
//! 以 trait 对象在初始化时注册。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod beacon;
mod callbacks;
mod cfgfile;
mod conn_table;
mod context;
mod error;
mod hw_mode;
mod opportunistic;
mod pcl;
mod pcl_select;
mod rules;
mod sync;
mod transition;

pub use beacon::{calculate_mcc_beacon_interval, MCC_BI_BASE};
pub use callbacks::{
    Callbacks, CmCallbacks, HddCallbacks, Regulatory, SmeCallbacks, StaticRegulatory, TimerOps,
    WmaCallbacks,
};
pub use cfgfile::{
    parse_configfile, MccBiPolicy, MccToSccSwitch, PolicyConfig, SystemPref,
    DBS_OPPORTUNISTIC_TIME_MS, DEFAULT_SBS_SPLIT_FREQ,
};
pub use conn_table::{
    chain_mask, chan_flags, ConnSelector, ConnSnapshot, ConnectionEntry, ConnectionTable,
    HiddenConnections, ModeChangeCb, PmMode, StoredConnections, StoredEntry, MAX_CONC_CONNECTIONS,
};
pub use context::PolicyManagerContext;
pub use error::{PmResult, PolicyError};
pub use hw_mode::{
    decode_hw_mode_word, encode_hw_mode_word, hw_mode_bits, HwCaps, HwModeAction, HwModeCatalog,
    HwModeDescriptor, HwModeQuery, MacBand, MacCaps,
};
pub use pcl::{
    are_sbs_freqs, get_channel_list, is_6ghz_allowed, skip_dfs_for_ap, ConnOrder, PclRequest,
    PclResult, PclType, PCL_GROUP_COUNT, WEIGHT_OF_DISALLOWED_CHANNELS,
    WEIGHT_OF_GROUP1_PCL_CHANNELS, WEIGHT_OF_GROUP2_PCL_CHANNELS, WEIGHT_OF_GROUP3_PCL_CHANNELS,
    WEIGHT_OF_GROUP4_PCL_CHANNELS, WEIGHT_OF_NON_PCL_CHANNELS,
};
pub use pcl_select::select_pcl_type;
pub use rules::{allow_new_home_channel, is_5g_channel_allowed, is_concurrency_allowed, ChipCaps};
pub use sync::{CompletionEvent, LOOPS_PER_MS};
pub use transition::{
    decide_action, hw_mode_for_action, NextAction, TransitionRequest, TransitionState,
    UpdateReason, VdevMacEntry,
};
