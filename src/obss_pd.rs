//! # OBSS-PD Spatial Reuse
//!
//! When the HE-SIG-A field of an incoming PPDU shows that the frame belongs to
//! an overlapping BSS (a different BSS color) and is received weakly enough,
//! the station may ignore it: the reception is dropped, CCA is reset and the
//! station may transmit over it, at a capped power.
//!
//! The power cap follows IEEE 802.11ax: the higher the OBSS-PD level above
//! its minimum, the lower the allowed transmit power.

use crate::constants::{
    OBSS_PD_LEVEL_DEFAULT_DBM, OBSS_PD_LEVEL_MAX_DBM, OBSS_PD_LEVEL_MIN_DBM, OBSS_PD_TX_POWER_REF_DBM,
};
use crate::error::PhyError;
use crate::phy::WifiPhy;
use log::debug;
use serde::{Deserialize, Serialize};

/// What the receiver learned from HE-SIG-A.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HePreambleParameters {
    pub rssi_dbm: f64,
    pub bss_color: u8,
}

/// Outcome of evaluating one HE-SIG-A.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ObssPdDecision {
    /// Spatial reuse only applies to associated stations.
    NotAssociated,
    /// BSS color 0 disables OBSS-PD.
    ColorDisabled,
    /// Keep receiving: the frame is intra-BSS or too strong.
    Defer,
    /// Drop the reception, optionally capping the transmit power.
    ResetCca { tx_power_max_dbm: Option<f64> },
}

/// Constant OBSS-PD algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObssPdAlgorithm {
    pub level_dbm: f64,
    pub level_min_dbm: f64,
    pub level_max_dbm: f64,
    pub tx_power_ref_dbm: f64,
}

impl Default for ObssPdAlgorithm {
    fn default() -> Self {
        Self {
            level_dbm: OBSS_PD_LEVEL_DEFAULT_DBM,
            level_min_dbm: OBSS_PD_LEVEL_MIN_DBM,
            level_max_dbm: OBSS_PD_LEVEL_MAX_DBM,
            tx_power_ref_dbm: OBSS_PD_TX_POWER_REF_DBM,
        }
    }
}

impl ObssPdAlgorithm {
    pub fn with_level(level_dbm: f64) -> Result<Self, PhyError> {
        let mut algorithm = Self::default();
        algorithm.set_level(level_dbm)?;
        Ok(algorithm)
    }

    pub fn set_level(&mut self, level_dbm: f64) -> Result<(), PhyError> {
        if !(self.level_min_dbm..=self.level_max_dbm).contains(&level_dbm) {
            return Err(PhyError::ObssPdLevelOutOfRange {
                level: level_dbm,
                min: self.level_min_dbm,
                max: self.level_max_dbm,
            });
        }
        self.level_dbm = level_dbm;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), PhyError> {
        if self.level_min_dbm > self.level_max_dbm
            || !(self.level_min_dbm..=self.level_max_dbm).contains(&self.level_dbm)
        {
            return Err(PhyError::ObssPdLevelOutOfRange {
                level: self.level_dbm,
                min: self.level_min_dbm,
                max: self.level_max_dbm,
            });
        }
        Ok(())
    }

    /// Transmit power cap implied by the current level, if any.
    pub fn tx_power_restriction(&self) -> Option<f64> {
        let restricted = self.level_dbm > self.level_min_dbm || self.level_dbm >= self.level_max_dbm;
        restricted.then(|| self.tx_power_ref_dbm - (self.level_dbm - self.level_min_dbm))
    }

    pub fn on_he_sig_a(&self, params: &HePreambleParameters, own_bss_color: u8, associated: bool) -> ObssPdDecision {
        if !associated {
            return ObssPdDecision::NotAssociated;
        }
        if own_bss_color == 0 {
            return ObssPdDecision::ColorDisabled;
        }
        let inter_bss = params.bss_color != own_bss_color;
        if inter_bss && params.rssi_dbm < self.level_dbm {
            debug!(
                "ignoring OBSS frame (color {}, {} dBm < {} dBm)",
                params.bss_color, params.rssi_dbm, self.level_dbm
            );
            ObssPdDecision::ResetCca {
                tx_power_max_dbm: self.tx_power_restriction(),
            }
        } else {
            ObssPdDecision::Defer
        }
    }

    /// Evaluate HE-SIG-A and carry out a CCA reset on `phy` if warranted.
    pub fn apply(
        &self,
        phy: &mut WifiPhy,
        params: &HePreambleParameters,
        own_bss_color: u8,
        associated: bool,
    ) -> Result<ObssPdDecision, PhyError> {
        let decision = self.on_he_sig_a(params, own_bss_color, associated);
        if let ObssPdDecision::ResetCca { tx_power_max_dbm } = decision {
            match tx_power_max_dbm {
                Some(max_dbm) => phy.reset_cca(true, max_dbm, max_dbm)?,
                None => phy.reset_cca(false, 0.0, 0.0)?,
            }
        }
        Ok(decision)
    }
}
