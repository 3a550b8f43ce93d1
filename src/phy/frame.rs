//! Frame-level metadata passed through the PHY on reception and transmission.
//!
//! Frame encoding is out of scope: MPDUs are opaque byte buffers and the
//! transmission vector only carries what the PHY state machine, its traces and
//! the channel-bonding managers look at.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Station id used for single-user transmissions.
pub const SU_STA_ID: u16 = 65535;

/// A modulation and coding scheme, identified by name (e.g. `HeMcs7`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WifiMode(String);

impl WifiMode {
    pub fn new(name: impl Into<String>) -> Self {
        WifiMode(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WifiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// PHY preamble format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Preamble {
    Long,
    Short,
    HtMixed,
    Vht,
    HeSu,
    HeMu,
    HeTb,
}

/// Transmission parameters of a PPDU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxVector {
    pub mode: WifiMode,
    pub preamble: Preamble,
    pub channel_width: u16,
    pub nss: u8,
    pub tx_power_level: u8,
    /// Per-user modes of a multi-user PPDU, keyed by station id.
    #[serde(default)]
    pub user_modes: BTreeMap<u16, WifiMode>,
}

impl TxVector {
    /// Single-user vector with one spatial stream.
    pub fn new(mode: WifiMode, preamble: Preamble, channel_width: u16) -> Self {
        Self {
            mode,
            preamble,
            channel_width,
            nss: 1,
            tx_power_level: 0,
            user_modes: BTreeMap::new(),
        }
    }

    /// Mode used for `sta_id`, falling back to the common mode.
    pub fn mode_for(&self, sta_id: u16) -> &WifiMode {
        self.user_modes.get(&sta_id).unwrap_or(&self.mode)
    }

    pub fn is_multi_user(&self) -> bool {
        !self.user_modes.is_empty()
    }
}

/// Signal quality measured over a received PSDU.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RxSignalInfo {
    /// Linear SNR
    pub snr: f64,
    pub rssi_dbm: f64,
}

/// A PHY service data unit: one MPDU, or several for an A-MPDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Psdu {
    mpdus: Vec<Bytes>,
}

impl Psdu {
    pub fn new(mpdus: Vec<Bytes>) -> Self {
        Self { mpdus }
    }

    pub fn single(mpdu: impl Into<Bytes>) -> Self {
        Self {
            mpdus: vec![mpdu.into()],
        }
    }

    pub fn mpdus(&self) -> &[Bytes] {
        &self.mpdus
    }

    pub fn mpdu_count(&self) -> usize {
        self.mpdus.len()
    }

    pub fn is_aggregate(&self) -> bool {
        self.mpdus.len() > 1
    }

    /// Total payload size in bytes
    pub fn size(&self) -> usize {
        self.mpdus.iter().map(Bytes::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psdu_aggregation() {
        let single = Psdu::single(Bytes::from_static(b"frame"));
        assert!(!single.is_aggregate());
        assert_eq!(single.size(), 5);

        let ampdu = Psdu::new(vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cde")]);
        assert!(ampdu.is_aggregate());
        assert_eq!(ampdu.mpdu_count(), 2);
        assert_eq!(ampdu.size(), 5);
    }

    #[test]
    fn test_mode_for_user() {
        let mut vector = TxVector::new(WifiMode::new("HeMcs0"), Preamble::HeMu, 80);
        vector.user_modes.insert(7, WifiMode::new("HeMcs9"));
        assert_eq!(vector.mode_for(7).name(), "HeMcs9");
        assert_eq!(vector.mode_for(SU_STA_ID).name(), "HeMcs0");
        assert!(vector.is_multi_user());
    }
}
