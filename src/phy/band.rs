//! Frequency bands, CCA thresholds and the key that combines them.
//!
//! The state machine keeps one busy interval per `(band, threshold)` pair, so
//! the same sub-band observed at two different energy-detection thresholds is
//! two logically distinct channels.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A contiguous spectral sub-range, `[low_mhz, high_mhz)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Band {
    pub low_mhz: u32,
    pub high_mhz: u32,
}

impl Band {
    pub const fn new(low_mhz: u32, high_mhz: u32) -> Self {
        Self { low_mhz, high_mhz }
    }

    /// Bandwidth in MHz
    pub const fn width_mhz(&self) -> u32 {
        self.high_mhz.saturating_sub(self.low_mhz)
    }

    /// True if both bands share at least one MHz of spectrum.
    pub fn overlaps(&self, other: &Band) -> bool {
        self.low_mhz < other.high_mhz && other.low_mhz < self.high_mhz
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{} MHz]", self.low_mhz, self.high_mhz)
    }
}

/// Energy-detection level (dBm) used to classify a band as busy or idle.
///
/// Comparison is by IEEE-754 total order so thresholds can be used as map keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CcaThreshold(f64);

impl CcaThreshold {
    pub const fn from_dbm(dbm: f64) -> Self {
        CcaThreshold(dbm)
    }

    pub const fn dbm(self) -> f64 {
        self.0
    }

    /// Threshold expressed in watts
    pub fn watts(self) -> f64 {
        10f64.powf((self.0 - 30.0) / 10.0)
    }

    /// Whether a received power (dBm) reaches this threshold.
    pub fn is_exceeded_by(self, power_dbm: f64) -> bool {
        power_dbm >= self.0
    }
}

impl PartialEq for CcaThreshold {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for CcaThreshold {}

impl PartialOrd for CcaThreshold {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CcaThreshold {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for CcaThreshold {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for CcaThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dBm", self.0)
    }
}

impl From<f64> for CcaThreshold {
    fn from(dbm: f64) -> Self {
        CcaThreshold(dbm)
    }
}

/// Key of the per-channel busy-interval maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BandThresholdKey {
    pub band: Band,
    pub threshold: CcaThreshold,
}

impl BandThresholdKey {
    pub const fn new(band: Band, threshold: CcaThreshold) -> Self {
        Self { band, threshold }
    }
}

impl fmt::Display for BandThresholdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.band, self.threshold)
    }
}
