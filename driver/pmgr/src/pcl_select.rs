//! PCL 类型选择：按现有连接数、所在频段、系统偏好与芯片能力决定新连接使用哪种 PCL

use ieee80211::{is_24ghz, is_5ghz};

use crate::cfgfile::SystemPref;
use crate::conn_table::{ConnSnapshot, PmMode};
use crate::pcl::PclType;

/// 选择 mode 新连接的 PCL 类型。dbs / sbs 为已叠加配置后的芯片能力。
pub fn select_pcl_type(
    conns: &ConnSnapshot,
    mode: PmMode,
    pref: SystemPref,
    dbs: bool,
    sbs: bool,
) -> PclType {
    let pcl_type = match conns.as_slice() {
        [] => match mode {
            PmMode::Sta => PclType::None,
            PmMode::NanDisc => PclType::Band24,
            _ => PclType::Band5,
        },
        [c] => {
            let on_2g = is_24ghz(c.freq);
            match (dbs, pref) {
                (true, SystemPref::Power) if on_2g => PclType::SccCh5g,
                (true, SystemPref::Power) => PclType::SccCh24g,
                (true, _) if on_2g => PclType::Band5SccCh,
                (true, _) if sbs && is_5ghz(c.freq) => PclType::SbsChBand24SccCh,
                (true, _) => PclType::Band24SccCh,
                (false, SystemPref::Throughput) if on_2g => PclType::SccCh24g,
                (false, SystemPref::Throughput) => PclType::SccCh5g,
                (false, _) => PclType::SccCh,
            }
        }
        [c0, c1] => {
            let mixed = is_24ghz(c0.freq) != is_24ghz(c1.freq);
            match (dbs, pref) {
                (true, SystemPref::Power) if mixed => PclType::SccOn5SccOn24,
                (true, _) if mixed => PclType::SccOn5SccOn24Band5,
                (true, _) if is_24ghz(c0.freq) => PclType::SccCh5g,
                (true, _) => PclType::SccCh24g,
                (false, _) => PclType::SccCh,
            }
        }
        _ => PclType::None,
    };
    log::debug!(target: "wireless::pmgr",
        "pcl type for {:?} with {} connection(s): {:?}", mode, conns.len(), pcl_type);
    pcl_type
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn_table::ConnectionEntry;
    use ieee80211::ChanWidth;

    fn snap(freqs: &[u32]) -> ConnSnapshot {
        let mut entries = [ConnectionEntry::EMPTY; 3];
        for (i, f) in freqs.iter().enumerate() {
            entries[i] = ConnectionEntry::new(PmMode::Sta, *f, ChanWidth::Mhz20, i as u8);
        }
        ConnSnapshot::from_entries(&entries[..freqs.len()])
    }

    #[test]
    fn first_connection() {
        let s = snap(&[]);
        assert_eq!(select_pcl_type(&s, PmMode::Sta, SystemPref::Throughput, true, false), PclType::None);
        assert_eq!(select_pcl_type(&s, PmMode::Sap, SystemPref::Throughput, true, false), PclType::Band5);
        assert_eq!(select_pcl_type(&s, PmMode::NanDisc, SystemPref::Power, false, false), PclType::Band24);
    }

    #[test]
    fn second_connection() {
        let on_2g = snap(&[2437]);
        let on_5g = snap(&[5180]);
        let t = SystemPref::Throughput;
        assert_eq!(select_pcl_type(&on_2g, PmMode::Sap, t, true, false), PclType::Band5SccCh);
        assert_eq!(select_pcl_type(&on_5g, PmMode::Sap, t, true, false), PclType::Band24SccCh);
        assert_eq!(select_pcl_type(&on_5g, PmMode::Sap, t, true, true), PclType::SbsChBand24SccCh);
        assert_eq!(select_pcl_type(&on_2g, PmMode::Sap, SystemPref::Power, true, false), PclType::SccCh5g);
        assert_eq!(select_pcl_type(&on_5g, PmMode::Sap, t, false, false), PclType::SccCh5g);
        assert_eq!(select_pcl_type(&on_5g, PmMode::Sap, SystemPref::Latency, false, false), PclType::SccCh);
    }

    #[test]
    fn third_connection() {
        let mixed = snap(&[5180, 2437]);
        assert_eq!(
            select_pcl_type(&mixed, PmMode::P2pGo, SystemPref::Throughput, true, false),
            PclType::SccOn5SccOn24Band5
        );
        assert_eq!(
            select_pcl_type(&mixed, PmMode::P2pGo, SystemPref::Power, true, false),
            PclType::SccOn5SccOn24
        );
        assert_eq!(
            select_pcl_type(&mixed, PmMode::P2pGo, SystemPref::Throughput, false, false),
            PclType::SccCh
        );
        let full = snap(&[5180, 2437, 2412]);
        assert_eq!(select_pcl_type(&full, PmMode::Sta, SystemPref::Throughput, true, true), PclType::None);
    }
}
