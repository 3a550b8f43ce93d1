//! Bonding with a single secondary energy-detection threshold: the widest
//! block around the primary channel that has been idle for PIFS.

use crate::bonding::{widest_idle_block, ChannelBondingManager};
use crate::phy::{CcaThreshold, WifiMode, WifiPhy};

#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantThresholdBondingManager {
    threshold: Option<CcaThreshold>,
}

impl ConstantThresholdBondingManager {
    /// `threshold` of `None` uses the PHY default secondary threshold.
    pub fn new(threshold: Option<CcaThreshold>) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self, phy: &WifiPhy) -> CcaThreshold {
        self.threshold
            .unwrap_or_else(|| phy.default_secondary_threshold())
    }
}

impl ChannelBondingManager for ConstantThresholdBondingManager {
    fn name(&self) -> &'static str {
        "constant-threshold"
    }

    fn attach(&self, phy: &mut WifiPhy) {
        if let Some(threshold) = self.threshold {
            phy.add_secondary_threshold(threshold);
        }
    }

    fn usable_channel_width(&self, phy: &WifiPhy, _mode: &WifiMode) -> u16 {
        if !phy.is_state_idle() {
            return 0;
        }
        widest_idle_block(phy, self.threshold(phy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::{Band, ChannelLayout, NullTraceSink, Signal, SignalSet};
    use crate::time::{ManualClock, SimTime};
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn test_halves_until_idle_block() {
        let clock = Rc::new(ManualClock::new());
        let mut phy = WifiPhy::new(
            clock.clone(),
            Rc::new(NullTraceSink),
            ChannelLayout::default(),
            CcaThreshold::from_dbm(-82.0),
        )
        .unwrap();
        let manager = ConstantThresholdBondingManager::new(Some(CcaThreshold::from_dbm(-72.0)));
        manager.attach(&mut phy);

        // Energy on the upper 40 MHz only.
        phy.maybe_cca_busy(&SignalSet::new(vec![Signal {
            band: Band::new(5210, 5250),
            power_dbm: -65.0,
            remaining: Duration::from_micros(50),
        }]));
        clock.advance_to(SimTime::from_micros(60));
        let mode = WifiMode::new("VhtMcs9");
        assert_eq!(manager.usable_channel_width(&phy, &mode), 40);

        clock.advance_to(SimTime::from_micros(75));
        assert_eq!(manager.usable_channel_width(&phy, &mode), 80);
    }

    #[test]
    fn test_weak_energy_below_threshold_is_ignored() {
        let clock = Rc::new(ManualClock::new());
        let mut phy = WifiPhy::new(
            clock.clone(),
            Rc::new(NullTraceSink),
            ChannelLayout::default(),
            CcaThreshold::from_dbm(-82.0),
        )
        .unwrap();
        phy.set_default_secondary_threshold(CcaThreshold::from_dbm(-62.0));
        let manager = ConstantThresholdBondingManager::new(None);
        manager.attach(&mut phy);

        phy.maybe_cca_busy(&SignalSet::new(vec![Signal {
            band: Band::new(5190, 5250),
            power_dbm: -70.0,
            remaining: Duration::from_micros(50),
        }]));
        clock.advance_to(SimTime::from_micros(30));
        assert_eq!(manager.usable_channel_width(&phy, &WifiMode::new("VhtMcs0")), 80);
    }
}
