//! All-or-nothing bonding: the full operating width whenever the primary
//! channel has been idle for PIFS. Secondary channels are never examined.

use crate::bonding::{idle_for_pifs, ChannelBondingManager};
use crate::constants::SUBCHANNEL_WIDTH_MHZ;
use crate::phy::{WifiMode, WifiPhy};

#[derive(Debug, Default, Clone, Copy)]
pub struct StaticBondingManager;

impl StaticBondingManager {
    pub fn new() -> Self {
        Self
    }
}

impl ChannelBondingManager for StaticBondingManager {
    fn name(&self) -> &'static str {
        "static"
    }

    fn usable_channel_width(&self, phy: &WifiPhy, _mode: &WifiMode) -> u16 {
        if !phy.is_state_idle() {
            return 0;
        }
        let width = phy.channel_width();
        if width <= SUBCHANNEL_WIDTH_MHZ {
            return width;
        }
        if idle_for_pifs(phy, SUBCHANNEL_WIDTH_MHZ, phy.primary_threshold()) {
            width
        } else {
            SUBCHANNEL_WIDTH_MHZ
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::{Band, CcaThreshold, ChannelLayout, NullTraceSink, Signal, SignalSet};
    use crate::time::{ManualClock, SimTime};
    use std::rc::Rc;
    use std::time::Duration;

    fn phy(clock: &Rc<ManualClock>, width: u16) -> WifiPhy {
        let center = if width == 20 { 5180 } else { 5190 };
        WifiPhy::new(
            clock.clone(),
            Rc::new(NullTraceSink),
            ChannelLayout::new(center, width, 0).unwrap(),
            CcaThreshold::from_dbm(-82.0),
        )
        .unwrap()
    }

    #[test]
    fn test_full_width_after_pifs() {
        let clock = Rc::new(ManualClock::starting_at(SimTime::from_micros(100)));
        let phy = phy(&clock, 40);
        let mode = WifiMode::new("HtMcs7");
        assert_eq!(StaticBondingManager::new().usable_channel_width(&phy, &mode), 40);
    }

    #[test]
    fn test_primary_only_within_pifs() {
        let clock = Rc::new(ManualClock::new());
        let mut phy = phy(&clock, 40);
        phy.maybe_cca_busy(&SignalSet::new(vec![Signal {
            band: Band::new(5170, 5190),
            power_dbm: -70.0,
            remaining: Duration::from_micros(10),
        }]));
        let mode = WifiMode::new("HtMcs7");
        let manager = StaticBondingManager::new();
        assert_eq!(manager.usable_channel_width(&phy, &mode), 0);

        clock.advance_to(SimTime::from_micros(20));
        assert_eq!(manager.usable_channel_width(&phy, &mode), 20);
        clock.advance_to(SimTime::from_micros(35));
        assert_eq!(manager.usable_channel_width(&phy, &mode), 40);
    }

    #[test]
    fn test_narrow_channel_is_returned_as_is() {
        let clock = Rc::new(ManualClock::new());
        let phy = phy(&clock, 20);
        let mode = WifiMode::new("OfdmRate54Mbps");
        assert_eq!(StaticBondingManager::new().usable_channel_width(&phy, &mode), 20);
    }
}
