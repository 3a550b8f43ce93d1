//! PHY layer: the per-device state machine and the facade that drives it
//! over an operating channel.

pub mod band;
pub mod busy_tracker;
pub mod channel;
pub mod frame;
pub mod listener;
pub mod state;
pub mod state_machine;
pub mod trace;
pub mod transition;
pub mod wifi_phy;

pub use band::{Band, BandThresholdKey, CcaThreshold};
pub use busy_tracker::{MediumBusyTracker, NotificationCounters};
pub use channel::ChannelLayout;
pub use frame::{Preamble, Psdu, RxSignalInfo, TxVector, WifiMode, SU_STA_ID};
pub use listener::{ListenerId, ListenerRegistry, PhyListener};
pub use state::PhyState;
pub use state_machine::{PhyStateMachine, RxErrorCallback, RxOkCallback};
pub use trace::{
    FrameCounters, LogTraceSink, NullTraceSink, RecordingTraceSink, StateInterval, StateTraceSink,
};
pub use transition::{Transition, TransitionKind};
pub use wifi_phy::{EnergySensor, PowerRestriction, QuietMedium, Signal, SignalSet, WifiPhy};
