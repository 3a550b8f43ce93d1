//! PHY states as observed on one band/threshold key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven states a Wi-Fi PHY can be in.
///
/// States are never stored: they are derived from the state machine's
/// timestamps whenever they are queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhyState {
    /// The medium is free and the radio is listening.
    Idle,
    /// Energy above the CCA threshold is present but no frame is being received.
    CcaBusy,
    /// The radio is transmitting.
    Tx,
    /// The radio is receiving a frame.
    Rx,
    /// The radio is retuning to another channel.
    Switching,
    /// The radio sleeps until explicitly woken up.
    Sleep,
    /// The radio is powered down until explicitly switched on.
    Off,
}

impl PhyState {
    pub const ALL: [PhyState; 7] = [
        PhyState::Idle,
        PhyState::CcaBusy,
        PhyState::Tx,
        PhyState::Rx,
        PhyState::Switching,
        PhyState::Sleep,
        PhyState::Off,
    ];

    /// True for the two states that only end on an explicit request.
    pub const fn requires_explicit_exit(self) -> bool {
        matches!(self, PhyState::Sleep | PhyState::Off)
    }
}

impl fmt::Display for PhyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhyState::Idle => "IDLE",
            PhyState::CcaBusy => "CCA_BUSY",
            PhyState::Tx => "TX",
            PhyState::Rx => "RX",
            PhyState::Switching => "SWITCHING",
            PhyState::Sleep => "SLEEP",
            PhyState::Off => "OFF",
        };
        f.write_str(name)
    }
}
