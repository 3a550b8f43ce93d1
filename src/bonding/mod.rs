//! # Channel Bonding
//!
//! A channel-bonding manager decides, at each transmission opportunity, how
//! wide the next PPDU may be. It only ever widens an opportunity on the
//! primary channel: when the primary channel is not IDLE the usable width is
//! 0 and the caller defers.
//!
//! ## Policies
//!
//! - [`StaticBondingManager`]: all or nothing, based on the primary channel alone
//! - [`ConstantThresholdBondingManager`]: widest block idle for PIFS at one secondary threshold
//! - [`DynamicThresholdBondingManager`]: same walk with a secondary threshold per transmission mode

pub mod constant_threshold;
pub mod dynamic_threshold;
pub mod static_manager;

pub use constant_threshold::ConstantThresholdBondingManager;
pub use dynamic_threshold::DynamicThresholdBondingManager;
pub use static_manager::StaticBondingManager;

use crate::constants::SUBCHANNEL_WIDTH_MHZ;
use crate::phy::{CcaThreshold, WifiMode, WifiPhy};
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decides the channel width usable for the next transmission.
pub trait ChannelBondingManager {
    fn name(&self) -> &'static str;

    /// Register whatever secondary thresholds the policy evaluates.
    fn attach(&self, _phy: &mut WifiPhy) {}

    /// Width in MHz usable right now for a PPDU sent with `mode`, 0 if the
    /// primary channel is not available.
    fn usable_channel_width(&self, phy: &WifiPhy, mode: &WifiMode) -> u16;
}

/// Configured bonding policy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum BondingPolicy {
    #[default]
    Static,
    ConstantThreshold {
        /// Falls back to the PHY default secondary threshold.
        #[serde(default)]
        secondary_threshold_dbm: Option<f64>,
    },
    DynamicThreshold {
        /// Secondary threshold per mode name.
        #[serde(default)]
        thresholds_dbm: BTreeMap<String, f64>,
    },
}

impl BondingPolicy {
    pub fn build(&self) -> Box<dyn ChannelBondingManager> {
        match self {
            BondingPolicy::Static => Box::new(StaticBondingManager::new()),
            BondingPolicy::ConstantThreshold {
                secondary_threshold_dbm,
            } => Box::new(ConstantThresholdBondingManager::new(
                secondary_threshold_dbm.map(CcaThreshold::from_dbm),
            )),
            BondingPolicy::DynamicThreshold { thresholds_dbm } => {
                let mut manager = DynamicThresholdBondingManager::new();
                for (mode, dbm) in thresholds_dbm {
                    manager.set_threshold_for_mode(WifiMode::new(mode.as_str()), CcaThreshold::from_dbm(*dbm));
                }
                Box::new(manager)
            }
        }
    }
}

/// True if the `width`-wide block around the primary has been idle for at
/// least PIFS at `threshold`.
pub(crate) fn idle_for_pifs(phy: &WifiPhy, width: u16, threshold: CcaThreshold) -> bool {
    phy.delay_since_channel_is_idle(width, threshold)
        .map_or(false, |delay| delay >= phy.pifs())
}

/// Halve the operating width until the block around the primary has been
/// idle for PIFS at `threshold`. Assumes the primary channel is IDLE.
pub(crate) fn widest_idle_block(phy: &WifiPhy, threshold: CcaThreshold) -> u16 {
    let mut width = phy.channel_width();
    while width > SUBCHANNEL_WIDTH_MHZ {
        if idle_for_pifs(phy, width, threshold) {
            return width;
        }
        trace!("{width} MHz block not idle for PIFS at {threshold}");
        width /= 2;
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_json() {
        let policy: BondingPolicy =
            serde_json::from_str(r#"{"policy":"dynamic_threshold","thresholds_dbm":{"VhtMcs9":-62.0}}"#)
                .unwrap();
        assert_eq!(policy.build().name(), "dynamic-threshold");

        let policy: BondingPolicy = serde_json::from_str(r#"{"policy":"constant_threshold"}"#).unwrap();
        assert_eq!(
            policy,
            BondingPolicy::ConstantThreshold {
                secondary_threshold_dbm: None
            }
        );
        assert_eq!(BondingPolicy::default().build().name(), "static");
    }
}
