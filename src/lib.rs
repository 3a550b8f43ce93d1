//! # wifi-phy-cca - Wi-Fi PHY State Machine and Clear Channel Assessment
//!
//! The wifi-phy-cca crate models the PHY of an IEEE 802.11 device inside a
//! discrete-event network simulation: a time-indexed state machine that
//! tracks busy and idle periods per frequency sub-band and energy-detection
//! threshold, the channel-bonding policies that decide how wide the next
//! transmission may be, and OBSS-PD spatial reuse.
//!
//! ## Features
//!
//! - Derive the PHY state (IDLE, CCA_BUSY, TX, RX, SWITCHING, SLEEP, OFF) of any band at any virtual time
//! - Report every completed state interval to an injected trace sink
//! - Notify MAC-layer listeners through weak handles
//! - Decide the usable channel width with static, constant-threshold or dynamic-threshold bonding
//! - Evaluate HE-SIG-A for OBSS-PD and restrict the transmit power
//! - Load PHY settings and replay timed scenarios from JSON
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! wifi-phy-cca = "0.1.0"
//! ```
//!
//! ```rust
//! use std::rc::Rc;
//! use std::time::Duration;
//! use wifi_phy_cca::{ChannelBondingManager, ManualClock, PhyConfig, RecordingTraceSink, SimTime, WifiMode};
//!
//! let clock = Rc::new(ManualClock::new());
//! let trace = Rc::new(RecordingTraceSink::new());
//! let (mut phy, bonding) = PhyConfig::default().build(clock.clone(), trace.clone()).unwrap();
//!
//! clock.advance_to(SimTime::from_micros(100));
//! assert_eq!(bonding.usable_channel_width(&phy, &WifiMode::new("HeMcs7")), 80);
//!
//! phy.start_rx(Duration::from_micros(50)).unwrap();
//! assert!(phy.is_state_rx());
//! ```

pub mod bonding;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod obss_pd;
pub mod phy;
pub mod scenario;
pub mod time;

pub use crate::error::PhyError;
pub use crate::logging::init_logger;

pub use bonding::{
    BondingPolicy, ChannelBondingManager, ConstantThresholdBondingManager, DynamicThresholdBondingManager,
    StaticBondingManager,
};
pub use config::{PhyConfig, PhyStandard};
pub use obss_pd::{HePreambleParameters, ObssPdAlgorithm, ObssPdDecision};
pub use phy::{
    Band, CcaThreshold, ChannelLayout, EnergySensor, MediumBusyTracker, PhyListener, PhyState,
    PhyStateMachine, RecordingTraceSink, StateInterval, StateTraceSink, TxVector, WifiMode, WifiPhy,
};
pub use scenario::{Scenario, ScenarioReport};
pub use time::{Clock, ManualClock, SimTime};
