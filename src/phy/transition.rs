//! Requested transitions and the table of states each one may start from.
//!
//! The public `switch_*` methods of the state machine are thin wrappers that
//! build a [`Transition`] and hand it to one internal function, so the legal
//! transition matrix lives in exactly one place: [`TransitionKind::permits`].

use crate::phy::state::PhyState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of a requested transition, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    Tx,
    Rx,
    ChannelSwitching,
    Sleep,
    Off,
    WakeUp,
    PowerOn,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 7] = [
        TransitionKind::Tx,
        TransitionKind::Rx,
        TransitionKind::ChannelSwitching,
        TransitionKind::Sleep,
        TransitionKind::Off,
        TransitionKind::WakeUp,
        TransitionKind::PowerOn,
    ];

    /// Whether this transition may be requested while the primary channel is in `from`.
    pub const fn permits(self, from: PhyState) -> bool {
        use PhyState::*;
        match self {
            TransitionKind::Tx => matches!(from, Idle | CcaBusy | Rx),
            TransitionKind::Rx => matches!(from, Idle | CcaBusy),
            TransitionKind::ChannelSwitching => matches!(from, Idle | CcaBusy | Rx),
            TransitionKind::Sleep => matches!(from, Idle | CcaBusy),
            TransitionKind::Off => matches!(from, Idle | CcaBusy | Rx | Tx),
            TransitionKind::WakeUp => matches!(from, Sleep),
            TransitionKind::PowerOn => matches!(from, Off),
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionKind::Tx => "TX",
            TransitionKind::Rx => "RX",
            TransitionKind::ChannelSwitching => "SWITCHING",
            TransitionKind::Sleep => "SLEEP",
            TransitionKind::Off => "OFF",
            TransitionKind::WakeUp => "WAKE-UP",
            TransitionKind::PowerOn => "POWER-ON",
        };
        f.write_str(name)
    }
}

/// A transition into a state that starts on the primary channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Tx { duration: Duration, power_dbm: f64 },
    Rx { duration: Duration },
    ChannelSwitching { duration: Duration },
    Sleep,
    Off,
}

impl Transition {
    pub const fn kind(&self) -> TransitionKind {
        match self {
            Transition::Tx { .. } => TransitionKind::Tx,
            Transition::Rx { .. } => TransitionKind::Rx,
            Transition::ChannelSwitching { .. } => TransitionKind::ChannelSwitching,
            Transition::Sleep => TransitionKind::Sleep,
            Transition::Off => TransitionKind::Off,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transmit_table() {
        assert!(TransitionKind::Tx.permits(PhyState::Idle));
        assert!(TransitionKind::Tx.permits(PhyState::CcaBusy));
        assert!(TransitionKind::Tx.permits(PhyState::Rx));
        assert!(!TransitionKind::Tx.permits(PhyState::Tx));
        assert!(!TransitionKind::Tx.permits(PhyState::Switching));
        assert!(!TransitionKind::Tx.permits(PhyState::Sleep));
        assert!(!TransitionKind::Tx.permits(PhyState::Off));
    }

    #[test]
    fn test_power_down_table() {
        assert!(TransitionKind::Off.permits(PhyState::Tx));
        assert!(TransitionKind::Off.permits(PhyState::Rx));
        assert!(!TransitionKind::Off.permits(PhyState::Switching));
        assert!(!TransitionKind::Sleep.permits(PhyState::Tx));
    }

    #[test]
    fn test_sleep_and_off_are_exclusive() {
        assert!(!TransitionKind::Sleep.permits(PhyState::Off));
        assert!(!TransitionKind::Off.permits(PhyState::Sleep));
        assert!(!TransitionKind::WakeUp.permits(PhyState::Off));
        assert!(!TransitionKind::PowerOn.permits(PhyState::Sleep));
    }

    #[test]
    fn test_every_state_can_be_left() {
        for state in PhyState::ALL {
            let exits = TransitionKind::ALL
                .iter()
                .filter(|kind| kind.permits(state))
                .count();
            // SWITCHING only ends on its own.
            let self_resolving = state == PhyState::Switching;
            assert_eq!(exits == 0, self_resolving, "state {state}");
        }
    }
}
