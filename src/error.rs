//! # PHY Error Handling
//!
//! This module defines the PhyError enum. Apart from `Config`, every variant
//! reports a broken caller contract (a MAC or PHY layer asking for something
//! the radio cannot do in its current state). Errors are returned before any
//! state is touched and must be treated as fatal by the caller.

use crate::phy::state::PhyState;
use crate::phy::transition::TransitionKind;
use crate::time::SimTime;
use thiserror::Error;

/// Represents the different error types that can occur in the PHY models.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhyError {
    /// A transition was requested from a state that does not allow it.
    #[error("Invalid PHY state transition: cannot switch to {requested} while {from}")]
    InvalidTransition {
        from: PhyState,
        requested: TransitionKind,
    },

    /// The time until idle is unknown because the radio waits for an explicit request.
    #[error("Cannot determine when the PHY becomes idle while {0}")]
    UndefinedIdleDelay(PhyState),

    /// A reception completion arrived outside the propagation-delay tolerance.
    #[error("Stale RX completion at {now}: reception ends at {expected_end}")]
    StaleRxCompletion { expected_end: SimTime, now: SimTime },

    /// A successful reception was reported without any MPDU status.
    #[error("RX completion carries no MPDU status")]
    EmptyMpduStatus,

    /// A reception abort was requested while nothing is being received.
    #[error("No reception in progress")]
    NoReceptionInProgress,

    /// The channel layout is not a valid 802.11 channelization.
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    /// A channel-width query exceeds the operating channel width.
    #[error("Channel width {requested} MHz exceeds operating width {operating} MHz")]
    ChannelWidthExceeded { requested: u16, operating: u16 },

    /// OBSS-PD level outside the configured range.
    #[error("OBSS PD level {level} dBm outside [{min}, {max}] dBm")]
    ObssPdLevelOutOfRange { level: f64, min: f64, max: f64 },

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for PhyError {
    fn from(err: serde_json::Error) -> Self {
        PhyError::Config(err.to_string())
    }
}

impl From<std::io::Error> for PhyError {
    fn from(err: std::io::Error) -> Self {
        PhyError::Config(err.to_string())
    }
}
