//! PHY Constants
//!
//! This module defines default values used by the PHY state machine, the
//! channel-bonding managers and OBSS-PD, based on IEEE 802.11-2016 and
//! IEEE 802.11ax (OFDM PHY, 5 GHz band).

use std::time::Duration;

/// Width of the smallest bondable channel unit
pub const SUBCHANNEL_WIDTH_MHZ: u16 = 20;

/// Channel widths an OFDM PHY can operate on
pub const SUPPORTED_CHANNEL_WIDTHS_MHZ: [u16; 6] = [5, 10, 20, 40, 80, 160];

/// Short inter-frame space for the 5 GHz OFDM PHY
pub const SIFS_5GHZ: Duration = Duration::from_micros(16);

/// Slot time for the 5 GHz OFDM PHY
pub const SLOT_5GHZ: Duration = Duration::from_micros(9);

/// PIFS = SIFS + one slot
pub const DEFAULT_PIFS: Duration = Duration::from_micros(25);

/// Time the radio needs to retune to another channel
pub const DEFAULT_CHANNEL_SWITCH_DELAY: Duration = Duration::from_micros(250);

/// Maximum propagation delay (delay spread) tolerated between the expected
/// end of a reception and its completion call.
pub const RX_END_TOLERANCE: Duration = Duration::from_micros(1);

/// Primary channel CCA sensitivity for frames (dBm)
pub const DEFAULT_CCA_SENSITIVITY_DBM: f64 = -82.0;

/// Energy-detection threshold used for secondary channels by 802.11n (dBm)
pub const HT_SECONDARY_CCA_ED_THRESHOLD_DBM: f64 = -62.0;

/// Energy-detection threshold used for secondary channels by 802.11ac/ax (dBm)
pub const VHT_SECONDARY_CCA_ED_THRESHOLD_DBM: f64 = -72.0;

/// Default OBSS-PD level (dBm)
pub const OBSS_PD_LEVEL_DEFAULT_DBM: f64 = -82.0;

/// Lower bound of the OBSS-PD level (dBm)
pub const OBSS_PD_LEVEL_MIN_DBM: f64 = -82.0;

/// Upper bound of the OBSS-PD level (dBm)
pub const OBSS_PD_LEVEL_MAX_DBM: f64 = -62.0;

/// SISO reference transmit power for OBSS-PD power restriction (dBm)
pub const OBSS_PD_TX_POWER_REF_DBM: f64 = 21.0;

/// Default center frequency: 80 MHz channel 42 in the 5 GHz band
pub const DEFAULT_CENTER_FREQUENCY_MHZ: u32 = 5210;

/// Default operating channel width
pub const DEFAULT_CHANNEL_WIDTH_MHZ: u16 = 80;
