//! # PHY Configuration
//!
//! [`PhyConfig`] gathers everything needed to build a [`WifiPhy`] and its
//! channel-bonding manager. It is loaded from JSON; every field has a default
//! so a configuration file only lists what it changes.
//!
//! ```json
//! {
//!   "channel": { "center_frequency_mhz": 5210, "channel_width": 80, "primary20_index": 1 },
//!   "standard": "he",
//!   "bonding": { "policy": "dynamic_threshold", "thresholds_dbm": { "HeMcs0": -62.0 } }
//! }
//! ```

use crate::bonding::{BondingPolicy, ChannelBondingManager};
use crate::constants::{
    DEFAULT_CCA_SENSITIVITY_DBM, DEFAULT_CHANNEL_SWITCH_DELAY, DEFAULT_PIFS,
    HT_SECONDARY_CCA_ED_THRESHOLD_DBM, VHT_SECONDARY_CCA_ED_THRESHOLD_DBM,
};
use crate::error::PhyError;
use crate::obss_pd::ObssPdAlgorithm;
use crate::phy::{CcaThreshold, ChannelLayout, StateTraceSink, WifiPhy};
use crate::time::Clock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

/// PHY amendment; decides the default secondary CCA-ED threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhyStandard {
    /// 802.11n
    Ht,
    /// 802.11ac
    Vht,
    /// 802.11ax
    #[default]
    He,
}

impl PhyStandard {
    pub fn default_secondary_threshold_dbm(self) -> f64 {
        match self {
            PhyStandard::Ht => HT_SECONDARY_CCA_ED_THRESHOLD_DBM,
            PhyStandard::Vht | PhyStandard::He => VHT_SECONDARY_CCA_ED_THRESHOLD_DBM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhyConfig {
    pub channel: ChannelLayout,
    pub standard: PhyStandard,
    /// Primary channel CCA threshold (dBm)
    pub cca_threshold_dbm: f64,
    /// Extra secondary thresholds on top of the standard's default (dBm)
    pub secondary_thresholds_dbm: Vec<f64>,
    pub pifs_us: u64,
    pub channel_switch_delay_us: u64,
    pub bonding: BondingPolicy,
    /// OBSS-PD spatial reuse; disabled when absent
    pub obss_pd: Option<ObssPdAlgorithm>,
}

impl Default for PhyConfig {
    fn default() -> Self {
        Self {
            channel: ChannelLayout::default(),
            standard: PhyStandard::default(),
            cca_threshold_dbm: DEFAULT_CCA_SENSITIVITY_DBM,
            secondary_thresholds_dbm: Vec::new(),
            pifs_us: DEFAULT_PIFS.as_micros() as u64,
            channel_switch_delay_us: DEFAULT_CHANNEL_SWITCH_DELAY.as_micros() as u64,
            bonding: BondingPolicy::default(),
            obss_pd: None,
        }
    }
}

impl PhyConfig {
    pub fn from_json_str(json: &str) -> Result<Self, PhyError> {
        let config: PhyConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PhyError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String, PhyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), PhyError> {
        self.channel.validate()?;
        let thresholds = std::iter::once(self.cca_threshold_dbm).chain(self.secondary_thresholds_dbm.iter().copied());
        for dbm in thresholds {
            if !dbm.is_finite() {
                return Err(PhyError::Config(format!("CCA threshold {dbm} dBm is not finite")));
            }
        }
        if self.pifs_us == 0 {
            return Err(PhyError::Config("PIFS must be positive".to_string()));
        }
        if let Some(obss_pd) = &self.obss_pd {
            obss_pd.validate()?;
        }
        Ok(())
    }

    pub fn pifs(&self) -> Duration {
        Duration::from_micros(self.pifs_us)
    }

    pub fn channel_switch_delay(&self) -> Duration {
        Duration::from_micros(self.channel_switch_delay_us)
    }

    /// Build the PHY together with its attached bonding manager.
    pub fn build(
        &self,
        clock: Rc<dyn Clock>,
        trace: Rc<dyn StateTraceSink>,
    ) -> Result<(WifiPhy, Box<dyn ChannelBondingManager>), PhyError> {
        self.validate()?;
        let mut phy = WifiPhy::new(
            clock,
            trace,
            self.channel,
            CcaThreshold::from_dbm(self.cca_threshold_dbm),
        )?;
        phy.set_pifs(self.pifs());
        phy.set_channel_switch_delay(self.channel_switch_delay());
        phy.set_default_secondary_threshold(CcaThreshold::from_dbm(self.standard.default_secondary_threshold_dbm()));
        for dbm in &self.secondary_thresholds_dbm {
            phy.add_secondary_threshold(CcaThreshold::from_dbm(*dbm));
        }
        let manager = self.bonding.build();
        manager.attach(&mut phy);
        Ok((phy, manager))
    }
}
