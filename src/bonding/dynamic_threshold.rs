//! Bonding with a secondary energy-detection threshold chosen per
//! transmission mode. Robust modes can afford a looser threshold on the
//! secondary channels than fragile high-order ones.

use crate::bonding::{widest_idle_block, ChannelBondingManager};
use crate::phy::{CcaThreshold, WifiMode, WifiPhy};
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct DynamicThresholdBondingManager {
    thresholds: BTreeMap<WifiMode, CcaThreshold>,
}

impl DynamicThresholdBondingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, mode: WifiMode, threshold: CcaThreshold) -> Self {
        self.set_threshold_for_mode(mode, threshold);
        self
    }

    /// Set the threshold of `mode` before the manager is attached to a PHY.
    pub fn set_threshold_for_mode(&mut self, mode: WifiMode, threshold: CcaThreshold) -> Option<CcaThreshold> {
        self.thresholds.insert(mode, threshold)
    }

    /// Set the threshold of `mode` on a manager already attached to `phy`,
    /// swapping the threshold registered with the PHY.
    pub fn configure_secondary_threshold(&mut self, phy: &mut WifiPhy, mode: WifiMode, threshold: CcaThreshold) {
        let previous = self.set_threshold_for_mode(mode.clone(), threshold);
        if let Some(previous) = previous.filter(|previous| *previous != threshold) {
            let still_used = self.thresholds.values().any(|t| *t == previous);
            if !still_used {
                phy.remove_secondary_threshold(previous);
            }
        }
        phy.add_secondary_threshold(threshold);
        debug!("secondary threshold for {mode} set to {threshold}");
    }

    /// Threshold applied to secondary channels for `mode`.
    pub fn threshold_for(&self, phy: &WifiPhy, mode: &WifiMode) -> CcaThreshold {
        self.thresholds
            .get(mode)
            .copied()
            .unwrap_or_else(|| phy.default_secondary_threshold())
    }
}

impl ChannelBondingManager for DynamicThresholdBondingManager {
    fn name(&self) -> &'static str {
        "dynamic-threshold"
    }

    fn attach(&self, phy: &mut WifiPhy) {
        for threshold in self.thresholds.values() {
            phy.add_secondary_threshold(*threshold);
        }
    }

    fn usable_channel_width(&self, phy: &WifiPhy, mode: &WifiMode) -> u16 {
        if !phy.is_state_idle() {
            return 0;
        }
        widest_idle_block(phy, self.threshold_for(phy, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::{Band, ChannelLayout, NullTraceSink, Signal, SignalSet};
    use crate::time::{ManualClock, SimTime};
    use std::rc::Rc;
    use std::time::Duration;

    fn phy(clock: &Rc<ManualClock>) -> WifiPhy {
        WifiPhy::new(
            clock.clone(),
            Rc::new(NullTraceSink),
            ChannelLayout::new(5190, 40, 0).unwrap(),
            CcaThreshold::from_dbm(-82.0),
        )
        .unwrap()
    }

    #[test]
    fn test_threshold_depends_on_mode() {
        let clock = Rc::new(ManualClock::new());
        let mut phy = phy(&clock);
        let robust = WifiMode::new("HtMcs0");
        let fragile = WifiMode::new("HtMcs7");
        let manager = DynamicThresholdBondingManager::new()
            .with_threshold(robust.clone(), CcaThreshold::from_dbm(-62.0))
            .with_threshold(fragile.clone(), CcaThreshold::from_dbm(-82.0));
        manager.attach(&mut phy);

        phy.maybe_cca_busy(&SignalSet::new(vec![Signal {
            band: Band::new(5190, 5210),
            power_dbm: -70.0,
            remaining: Duration::from_micros(30),
        }]));
        clock.advance_to(SimTime::from_micros(40));

        assert_eq!(manager.usable_channel_width(&phy, &robust), 40);
        assert_eq!(manager.usable_channel_width(&phy, &fragile), 20);
    }

    #[test]
    fn test_unknown_mode_uses_phy_default() {
        let clock = Rc::new(ManualClock::new());
        let mut phy = phy(&clock);
        phy.set_default_secondary_threshold(CcaThreshold::from_dbm(-72.0));
        let manager = DynamicThresholdBondingManager::new();
        assert_eq!(
            manager.threshold_for(&phy, &WifiMode::new("HtMcs3")),
            CcaThreshold::from_dbm(-72.0)
        );
    }

    #[test]
    fn test_reconfigure_swaps_registered_threshold() {
        let clock = Rc::new(ManualClock::new());
        let mut phy = phy(&clock);
        let mode = WifiMode::new("HtMcs0");
        let mut manager = DynamicThresholdBondingManager::new().with_threshold(mode.clone(), CcaThreshold::from_dbm(-62.0));
        manager.attach(&mut phy);
        manager.configure_secondary_threshold(&mut phy, mode, CcaThreshold::from_dbm(-72.0));
        assert_eq!(phy.secondary_thresholds(), &[CcaThreshold::from_dbm(-72.0)]);
    }
}
