//! # Wi-Fi PHY State Machine
//!
//! A per-device, time-indexed record of the radio state. Nothing here stores a
//! "current state": [`PhyStateMachine::state`] derives it from a handful of
//! timestamps and from two maps holding the most recent CCA-busy interval of
//! every tracked `(band, threshold)` key.
//!
//! ## Interval logging
//!
//! Past intervals are not kept either. Whenever a transition starts, the
//! interval that is ending is rebuilt from the stored timestamps and emitted
//! to the trace sink before the timestamps are overwritten. TX and SWITCHING
//! are emitted forward when they start since their duration is known.
//!
//! ## Band scoping
//!
//! TX and RX occupy the primary band of the last transition. Every other
//! tracked band sees its busy interval stretched over the TX/RX so that it
//! reads as CCA_BUSY for at least as long. SWITCHING, SLEEP and OFF affect the
//! whole radio.
//!
//! ## Usage
//!
//! ```rust
//! use std::rc::Rc;
//! use std::time::Duration;
//! use wifi_phy_cca::phy::{Band, CcaThreshold, PhyState, PhyStateMachine, RecordingTraceSink};
//! use wifi_phy_cca::time::{ManualClock, SimTime};
//!
//! let clock = Rc::new(ManualClock::new());
//! let trace = Rc::new(RecordingTraceSink::new());
//! let mut phy = PhyStateMachine::new(clock.clone(), trace.clone());
//! let primary = Band::new(5170, 5190);
//! let threshold = CcaThreshold::from_dbm(-82.0);
//!
//! phy.switch_maybe_to_cca_busy(Duration::from_millis(10), primary, true, threshold);
//! assert_eq!(phy.state(primary, threshold), PhyState::CcaBusy);
//!
//! clock.advance_to(SimTime::from_millis(10));
//! assert!(phy.is_state_idle(primary, threshold));
//! ```

use crate::constants::RX_END_TOLERANCE;
use crate::error::PhyError;
use crate::phy::band::{Band, BandThresholdKey, CcaThreshold};
use crate::phy::frame::{Psdu, RxSignalInfo, TxVector};
use crate::phy::listener::{ListenerId, ListenerRegistry, PhyListener};
use crate::phy::state::PhyState;
use crate::phy::trace::{LogTraceSink, StateTraceSink};
use crate::phy::transition::{Transition, TransitionKind};
use crate::time::{Clock, SimTime};
use log::{debug, trace, warn};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

/// Called on successful reception with the per-MPDU status vector.
pub type RxOkCallback = Box<dyn FnMut(&Psdu, &RxSignalInfo, &TxVector, &[bool])>;

/// Called on failed reception.
pub type RxErrorCallback = Box<dyn FnMut(&Psdu)>;

/// Temporal state of one simulated radio.
pub struct PhyStateMachine {
    clock: Rc<dyn Clock>,
    trace: Rc<dyn StateTraceSink>,
    listeners: ListenerRegistry,
    rx_ok_callback: Option<RxOkCallback>,
    rx_error_callback: Option<RxErrorCallback>,

    sleeping: bool,
    is_off: bool,
    /// Set between the start of a reception and its completion, abort or truncation.
    rx_pending: bool,
    /// The pending reception ran to its end and its RX interval is already logged.
    rx_logged: bool,
    /// Band occupied by our own TX/RX.
    primary_band: Option<Band>,

    end_tx: SimTime,
    end_rx: SimTime,
    end_switching: SimTime,
    start_tx: SimTime,
    start_rx: SimTime,
    start_switching: SimTime,
    start_sleep: SimTime,
    start_off: SimTime,
    previous_state_change_time: SimTime,

    start_cca_busy: BTreeMap<BandThresholdKey, SimTime>,
    end_cca_busy: BTreeMap<BandThresholdKey, SimTime>,
}

impl PhyStateMachine {
    /// Create an idle state machine reading time from `clock` and reporting
    /// intervals to `trace`.
    pub fn new(clock: Rc<dyn Clock>, trace: Rc<dyn StateTraceSink>) -> Self {
        Self {
            clock,
            trace,
            listeners: ListenerRegistry::default(),
            rx_ok_callback: None,
            rx_error_callback: None,
            sleeping: false,
            is_off: false,
            rx_pending: false,
            rx_logged: false,
            primary_band: None,
            end_tx: SimTime::ZERO,
            end_rx: SimTime::ZERO,
            end_switching: SimTime::ZERO,
            start_tx: SimTime::ZERO,
            start_rx: SimTime::ZERO,
            start_switching: SimTime::ZERO,
            start_sleep: SimTime::ZERO,
            start_off: SimTime::ZERO,
            previous_state_change_time: SimTime::ZERO,
            start_cca_busy: BTreeMap::new(),
            end_cca_busy: BTreeMap::new(),
        }
    }

    /// Create a state machine whose intervals go to the `log` facade.
    pub fn with_log_trace(clock: Rc<dyn Clock>, device: &str) -> Self {
        Self::new(clock, Rc::new(LogTraceSink::new(device)))
    }

    /// Current virtual time
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn set_receive_ok_callback(
        &mut self,
        callback: impl FnMut(&Psdu, &RxSignalInfo, &TxVector, &[bool]) + 'static,
    ) {
        self.rx_ok_callback = Some(Box::new(callback));
    }

    pub fn set_receive_error_callback(&mut self, callback: impl FnMut(&Psdu) + 'static) {
        self.rx_error_callback = Some(Box::new(callback));
    }

    /// Register a listener; only a weak handle is kept.
    pub fn register_listener<L: PhyListener + 'static>(&mut self, listener: &Rc<L>) -> ListenerId {
        self.listeners.register(listener)
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    /// Start tracking `(band, threshold)` so own TX/RX extend its busy interval
    /// even before any energy has been sensed on it.
    pub fn track(&mut self, band: Band, threshold: CcaThreshold) {
        let key = BandThresholdKey::new(band, threshold);
        self.end_cca_busy.entry(key).or_insert(SimTime::ZERO);
        self.start_cca_busy.entry(key).or_insert(SimTime::ZERO);
    }

    /// Stop tracking `(band, threshold)` and drop its busy history.
    pub fn untrack(&mut self, band: Band, threshold: CcaThreshold) {
        let key = BandThresholdKey::new(band, threshold);
        self.end_cca_busy.remove(&key);
        self.start_cca_busy.remove(&key);
    }

    /// Keys that currently have a busy interval on record.
    pub fn tracked_keys(&self) -> impl Iterator<Item = &BandThresholdKey> {
        self.end_cca_busy.keys()
    }

    /// Forget every recorded CCA-busy interval.
    pub fn reset_cca_history(&mut self) {
        self.start_cca_busy.clear();
        self.end_cca_busy.clear();
    }

    /// Band occupied by own TX/RX, once known
    pub fn primary_band(&self) -> Option<Band> {
        self.primary_band
    }

    /// Start of the recorded busy interval of `(band, threshold)`.
    pub fn cca_busy_start(&self, band: Band, threshold: CcaThreshold) -> Option<SimTime> {
        self.start_cca_busy
            .get(&BandThresholdKey::new(band, threshold))
            .copied()
    }

    /// End of the recorded busy interval of `(band, threshold)`.
    pub fn cca_busy_end(&self, band: Band, threshold: CcaThreshold) -> Option<SimTime> {
        self.end_cca_busy
            .get(&BandThresholdKey::new(band, threshold))
            .copied()
    }

    // ----- queries -----

    /// State of `(band, threshold)` at the current time.
    ///
    /// Priority: OFF, SLEEP, TX, RX, SWITCHING, CCA_BUSY, IDLE.
    pub fn state(&self, band: Band, threshold: CcaThreshold) -> PhyState {
        self.state_at(&BandThresholdKey::new(band, threshold), self.now())
    }

    fn state_at(&self, key: &BandThresholdKey, now: SimTime) -> PhyState {
        let occupied = self.occupies(key.band);
        if self.is_off {
            PhyState::Off
        } else if self.sleeping {
            PhyState::Sleep
        } else if occupied && self.end_tx > now {
            PhyState::Tx
        } else if occupied && self.end_rx > now {
            PhyState::Rx
        } else if self.end_switching > now {
            PhyState::Switching
        } else if self.end_cca_busy.get(key).is_some_and(|end| *end > now) {
            PhyState::CcaBusy
        } else {
            PhyState::Idle
        }
    }

    fn occupies(&self, band: Band) -> bool {
        self.primary_band.map_or(true, |primary| primary == band)
    }

    pub fn is_state_idle(&self, band: Band, threshold: CcaThreshold) -> bool {
        self.state(band, threshold) == PhyState::Idle
    }

    pub fn is_state_cca_busy(&self, band: Band, threshold: CcaThreshold) -> bool {
        self.state(band, threshold) == PhyState::CcaBusy
    }

    pub fn is_state_rx(&self, band: Band, threshold: CcaThreshold) -> bool {
        self.state(band, threshold) == PhyState::Rx
    }

    pub fn is_state_tx(&self, band: Band, threshold: CcaThreshold) -> bool {
        self.state(band, threshold) == PhyState::Tx
    }

    pub fn is_state_switching(&self, band: Band, threshold: CcaThreshold) -> bool {
        self.state(band, threshold) == PhyState::Switching
    }

    pub fn is_state_sleep(&self, band: Band, threshold: CcaThreshold) -> bool {
        self.state(band, threshold) == PhyState::Sleep
    }

    pub fn is_state_off(&self, band: Band, threshold: CcaThreshold) -> bool {
        self.state(band, threshold) == PhyState::Off
    }

    /// Time left until `(band, threshold)` becomes IDLE.
    ///
    /// Fails while sleeping or off: the radio only leaves those states on an
    /// explicit request, so the delay is undefined.
    pub fn delay_until_idle(&self, band: Band, threshold: CcaThreshold) -> Result<Duration, PhyError> {
        let now = self.now();
        let key = BandThresholdKey::new(band, threshold);
        match self.state_at(&key, now) {
            state @ (PhyState::Sleep | PhyState::Off) => Err(PhyError::UndefinedIdleDelay(state)),
            PhyState::Idle => Ok(Duration::ZERO),
            _ => Ok(self.busy_until(&key).saturating_duration_since(now)),
        }
    }

    fn busy_until(&self, key: &BandThresholdKey) -> SimTime {
        let mut end = self.end_switching.max(self.cca_end(key));
        if self.occupies(key.band) {
            end = end.max(self.end_tx).max(self.end_rx);
        }
        end
    }

    /// Time elapsed since `(band, threshold)` was last busy, zero if it still is.
    pub fn delay_since_idle(&self, band: Band, threshold: CcaThreshold) -> Duration {
        let key = BandThresholdKey::new(band, threshold);
        let idle_start = self
            .end_tx
            .max(self.end_rx)
            .max(self.end_switching)
            .max(self.cca_end(&key));
        self.now().saturating_duration_since(idle_start)
    }

    pub fn last_rx_start_time(&self) -> SimTime {
        self.start_rx
    }

    /// Expected end of the reception awaiting completion, if any.
    pub fn pending_rx_end(&self) -> Option<SimTime> {
        self.rx_pending.then_some(self.end_rx)
    }

    fn cca_end(&self, key: &BandThresholdKey) -> SimTime {
        self.end_cca_busy.get(key).copied().unwrap_or(SimTime::ZERO)
    }

    // ----- transitions into a new state -----

    /// Start transmitting on `primary_band` for `duration`.
    pub fn switch_to_tx(
        &mut self,
        duration: Duration,
        power_dbm: f64,
        primary_band: Band,
        primary_threshold: CcaThreshold,
    ) -> Result<(), PhyError> {
        self.request(
            Transition::Tx {
                duration,
                power_dbm,
            },
            BandThresholdKey::new(primary_band, primary_threshold),
        )
    }

    /// Start receiving on `primary_band` for `duration`.
    pub fn switch_to_rx(
        &mut self,
        duration: Duration,
        primary_band: Band,
        primary_threshold: CcaThreshold,
    ) -> Result<(), PhyError> {
        self.request(
            Transition::Rx { duration },
            BandThresholdKey::new(primary_band, primary_threshold),
        )
    }

    /// Start retuning the radio. An ongoing reception is truncated.
    pub fn switch_to_channel_switching(
        &mut self,
        duration: Duration,
        primary_band: Band,
        primary_threshold: CcaThreshold,
    ) -> Result<(), PhyError> {
        self.request(
            Transition::ChannelSwitching { duration },
            BandThresholdKey::new(primary_band, primary_threshold),
        )
    }

    pub fn switch_to_sleep(&mut self, primary_band: Band, primary_threshold: CcaThreshold) -> Result<(), PhyError> {
        self.request(Transition::Sleep, BandThresholdKey::new(primary_band, primary_threshold))
    }

    pub fn switch_to_off(&mut self, primary_band: Band, primary_threshold: CcaThreshold) -> Result<(), PhyError> {
        self.request(Transition::Off, BandThresholdKey::new(primary_band, primary_threshold))
    }

    fn request(&mut self, transition: Transition, primary: BandThresholdKey) -> Result<(), PhyError> {
        let now = self.now();
        let from = self.state_at(&primary, now);
        let requested = transition.kind();
        if !requested.permits(from) {
            warn!("rejecting {requested} at {now}: PHY is {from} on {primary}");
            return Err(PhyError::InvalidTransition { from, requested });
        }
        debug!("{from} -> {requested} at {now} on {primary}");

        self.log_finished_rx(now);
        self.close_current_state(from, &primary, now);
        self.primary_band = Some(primary.band);
        self.previous_state_change_time = now;

        match transition {
            Transition::Tx {
                duration,
                power_dbm,
            } => {
                self.trace.state(now, duration, PhyState::Tx);
                self.trace.tx_start(duration, power_dbm);
                self.start_tx = now;
                self.end_tx = now + duration;
                self.block_other_bands(primary.band, now, duration);
                self.listeners
                    .notify(|listener| listener.notify_tx_start(duration, power_dbm));
            }
            Transition::Rx { duration } => {
                self.start_rx = now;
                self.end_rx = now + duration;
                self.rx_pending = true;
                self.rx_logged = false;
                self.block_other_bands(primary.band, now, duration);
                self.listeners
                    .notify(|listener| listener.notify_rx_start(duration));
            }
            Transition::ChannelSwitching { duration } => {
                // Nothing is sensed while retuning.
                for end in self.end_cca_busy.values_mut() {
                    if *end > now {
                        *end = now;
                    }
                }
                self.trace.state(now, duration, PhyState::Switching);
                self.start_switching = now;
                self.end_switching = now + duration;
                self.listeners
                    .notify(|listener| listener.notify_switching_start(duration));
            }
            Transition::Sleep => {
                self.sleeping = true;
                self.start_sleep = now;
                self.listeners.notify(|listener| listener.notify_sleep());
            }
            Transition::Off => {
                self.is_off = true;
                self.start_off = now;
                self.listeners.notify(|listener| listener.notify_off());
            }
        }
        Ok(())
    }

    /// Emit the interval of `from` that ends now.
    fn close_current_state(&mut self, from: PhyState, primary: &BandThresholdKey, now: SimTime) {
        match from {
            PhyState::Rx => {
                // The caller cancels the reception and its end event.
                self.trace
                    .state(self.start_rx, now.saturating_duration_since(self.start_rx), PhyState::Rx);
                self.end_rx = now;
                self.rx_pending = false;
            }
            PhyState::Tx => {
                // Only power-down interrupts a transmission.
                self.trace.truncate(self.start_tx, now, PhyState::Tx);
                self.end_tx = now;
            }
            PhyState::CcaBusy => {
                let start = self.cca_busy_interval_start(primary);
                self.trace
                    .state(start, now.saturating_duration_since(start), PhyState::CcaBusy);
            }
            PhyState::Idle => self.log_previous_idle_and_cca_busy(primary, now),
            PhyState::Switching | PhyState::Sleep | PhyState::Off => {}
        }
    }

    /// Log a reception that reached its end without a completion call yet, so
    /// the intervals that follow it do not leave a gap. The completion may
    /// still arrive within the tolerance.
    fn log_finished_rx(&mut self, now: SimTime) {
        if self.rx_pending && !self.rx_logged && self.end_rx <= now {
            self.trace.state(
                self.start_rx,
                self.end_rx.saturating_duration_since(self.start_rx),
                PhyState::Rx,
            );
            self.rx_logged = true;
        }
    }

    /// Start of the CCA_BUSY period of `key` that follows the last own activity.
    fn cca_busy_interval_start(&self, key: &BandThresholdKey) -> SimTime {
        let recorded = self.start_cca_busy.get(key).copied().unwrap_or(SimTime::ZERO);
        self.end_tx
            .max(self.end_rx)
            .max(self.end_switching)
            .max(self.previous_state_change_time)
            .max(recorded)
    }

    /// Emit the IDLE period ending now, preceded by the CCA_BUSY period that
    /// ended it started from, if the last busy source was sensed energy.
    fn log_previous_idle_and_cca_busy(&self, key: &BandThresholdKey, now: SimTime) {
        let end_cca = self.cca_end(key);
        let end_own_activity = self
            .end_rx
            .max(self.end_tx)
            .max(self.end_switching)
            .max(self.previous_state_change_time);
        let idle_start = end_cca.max(end_own_activity).min(now);
        if end_cca > end_own_activity {
            let busy_start = self.cca_busy_interval_start(key).min(idle_start);
            self.trace.state(
                busy_start,
                idle_start.saturating_duration_since(busy_start),
                PhyState::CcaBusy,
            );
        }
        self.trace
            .state(idle_start, now.saturating_duration_since(idle_start), PhyState::Idle);
    }

    /// Make every other tracked band read busy for at least `duration` from now.
    fn block_other_bands(&mut self, primary_band: Band, now: SimTime, duration: Duration) {
        let end = now + duration;
        for (key, busy_end) in self.end_cca_busy.iter_mut() {
            if key.band == primary_band {
                continue;
            }
            let start = self.start_cca_busy.entry(*key).or_insert(now);
            if *busy_end <= now || *start > now {
                *start = now;
            }
            *busy_end = (*busy_end).max(end);
        }
    }

    // ----- energy detection -----

    /// Record energy on `(band, threshold)` lasting `duration` from now.
    ///
    /// Listeners hear about it only for the primary channel and only when not
    /// already receiving, since RX implies a busy medium.
    pub fn switch_maybe_to_cca_busy(
        &mut self,
        duration: Duration,
        band: Band,
        is_primary_channel: bool,
        threshold: CcaThreshold,
    ) {
        let now = self.now();
        let key = BandThresholdKey::new(band, threshold);
        let prior = self.state_at(&key, now);
        trace!("maybe CCA busy on {key} for {duration:?} at {now} ({prior})");

        if is_primary_channel && prior != PhyState::Rx {
            self.listeners
                .notify(|listener| listener.notify_maybe_cca_busy_start(duration));
        }
        if is_primary_channel && prior == PhyState::Idle {
            self.log_finished_rx(now);
            self.log_previous_idle_and_cca_busy(&key, now);
        }
        self.extend_cca_busy(key, now, duration);
    }

    fn extend_cca_busy(&mut self, key: BandThresholdKey, now: SimTime, duration: Duration) -> SimTime {
        let end = self.end_cca_busy.entry(key).or_insert(SimTime::ZERO);
        if *end <= now {
            self.start_cca_busy.insert(key, now);
        }
        *end = (*end).max(now + duration);
        *end
    }

    // ----- leaving sleep / off -----

    /// Wake up. `duration` is the energy already present on `(band, threshold)`.
    pub fn switch_from_sleep(
        &mut self,
        duration: Duration,
        band: Band,
        is_primary_channel: bool,
        threshold: CcaThreshold,
    ) -> Result<(), PhyError> {
        let now = self.now();
        let key = BandThresholdKey::new(band, threshold);
        self.check_permitted(TransitionKind::WakeUp, &key, now)?;
        debug!("waking up at {now} on {key}");

        self.sleeping = false;
        if is_primary_channel {
            self.trace.state(
                self.start_sleep,
                now.saturating_duration_since(self.start_sleep),
                PhyState::Sleep,
            );
            self.previous_state_change_time = now;
            self.listeners.notify(|listener| listener.notify_wakeup());
        }
        self.sense_after_resume(key, now, duration, is_primary_channel);
        Ok(())
    }

    /// Power on. `duration` is the energy already present on `(band, threshold)`.
    pub fn switch_from_off(
        &mut self,
        duration: Duration,
        band: Band,
        is_primary_channel: bool,
        threshold: CcaThreshold,
    ) -> Result<(), PhyError> {
        let now = self.now();
        let key = BandThresholdKey::new(band, threshold);
        self.check_permitted(TransitionKind::PowerOn, &key, now)?;
        debug!("switching on at {now} on {key}");

        self.is_off = false;
        if is_primary_channel {
            self.trace.state(
                self.start_off,
                now.saturating_duration_since(self.start_off),
                PhyState::Off,
            );
            self.previous_state_change_time = now;
            self.listeners.notify(|listener| listener.notify_on());
        }
        self.sense_after_resume(key, now, duration, is_primary_channel);
        Ok(())
    }

    fn sense_after_resume(&mut self, key: BandThresholdKey, now: SimTime, duration: Duration, is_primary: bool) {
        let end = self.extend_cca_busy(key, now, duration);
        if is_primary && end > now {
            let remaining = end.saturating_duration_since(now);
            self.listeners
                .notify(|listener| listener.notify_maybe_cca_busy_start(remaining));
        }
    }

    fn check_permitted(&self, requested: TransitionKind, key: &BandThresholdKey, now: SimTime) -> Result<(), PhyError> {
        let from = self.state_at(key, now);
        if requested.permits(from) {
            Ok(())
        } else {
            warn!("rejecting {requested} at {now}: PHY is {from} on {key}");
            Err(PhyError::InvalidTransition { from, requested })
        }
    }

    // ----- end of reception -----

    /// Complete the ongoing reception successfully.
    ///
    /// `status_per_mpdu` holds one flag per MPDU of the PSDU, so partially
    /// successful A-MPDUs can be delivered.
    pub fn switch_from_rx_end_ok(
        &mut self,
        psdu: &Psdu,
        signal: &RxSignalInfo,
        tx_vector: &TxVector,
        sta_id: u16,
        status_per_mpdu: &[bool],
    ) -> Result<(), PhyError> {
        if status_per_mpdu.is_empty() {
            return Err(PhyError::EmptyMpduStatus);
        }
        let now = self.now();
        self.check_rx_completion(now)?;
        debug!(
            "RX ok at {now}: {} MPDUs, all ok={}",
            status_per_mpdu.len(),
            status_per_mpdu.iter().all(|ok| *ok)
        );

        self.trace.rx_ok(psdu, signal.snr, tx_vector, sta_id);
        self.listeners.notify(|listener| listener.notify_rx_end_ok());
        self.do_switch_from_rx(now);
        if let Some(callback) = self.rx_ok_callback.as_mut() {
            callback(psdu, signal, tx_vector, status_per_mpdu);
        }
        Ok(())
    }

    /// Complete the ongoing reception with an error.
    pub fn switch_from_rx_end_error(&mut self, psdu: &Psdu, snr: f64) -> Result<(), PhyError> {
        let now = self.now();
        self.check_rx_completion(now)?;
        debug!("RX error at {now}, snr={snr:.2}");

        self.trace.rx_error(psdu, snr);
        self.listeners.notify(|listener| listener.notify_rx_end_error());
        self.do_switch_from_rx(now);
        if let Some(callback) = self.rx_error_callback.as_mut() {
            callback(psdu);
        }
        Ok(())
    }

    /// Hand one more MPDU of an A-MPDU that is still being received to the
    /// receive callback, without touching the state.
    pub fn continue_rx_next_mpdu(&mut self, psdu: &Psdu, signal: &RxSignalInfo, tx_vector: &TxVector) {
        if let Some(callback) = self.rx_ok_callback.as_mut() {
            callback(psdu, signal, tx_vector, &[]);
        }
    }

    /// Abort the ongoing reception before its natural end.
    ///
    /// A reception whose end time has passed can only be completed, so a late
    /// abort is rejected like one without any reception.
    pub fn switch_from_rx_abort(&mut self, failure: bool) -> Result<(), PhyError> {
        let now = self.now();
        if !self.rx_pending || self.end_rx <= now {
            return Err(PhyError::NoReceptionInProgress);
        }
        debug!("RX aborted at {now} (failure={failure})");
        if failure {
            self.listeners.notify(|listener| listener.notify_rx_end_error());
        } else {
            self.listeners.notify(|listener| listener.notify_rx_end_ok());
        }
        self.do_switch_from_rx(now);
        Ok(())
    }

    fn check_rx_completion(&self, now: SimTime) -> Result<(), PhyError> {
        if self.end_rx.abs_diff(now) >= RX_END_TOLERANCE {
            warn!("stale RX completion at {now}, reception ends at {}", self.end_rx);
            return Err(PhyError::StaleRxCompletion {
                expected_end: self.end_rx,
                now,
            });
        }
        if !self.rx_pending {
            return Err(PhyError::NoReceptionInProgress);
        }
        Ok(())
    }

    fn do_switch_from_rx(&mut self, now: SimTime) {
        // Once logged, later intervals are already built on the original end.
        if !self.rx_logged {
            self.trace
                .state(self.start_rx, now.saturating_duration_since(self.start_rx), PhyState::Rx);
            self.previous_state_change_time = now;
            self.end_rx = now;
        }
        self.rx_pending = false;
        self.rx_logged = false;
    }
}

impl std::fmt::Debug for PhyStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhyStateMachine")
            .field("now", &self.now())
            .field("sleeping", &self.sleeping)
            .field("is_off", &self.is_off)
            .field("primary_band", &self.primary_band)
            .field("end_tx", &self.end_tx)
            .field("end_rx", &self.end_rx)
            .field("end_switching", &self.end_switching)
            .field("start_switching", &self.start_switching)
            .field("end_cca_busy", &self.end_cca_busy)
            .field("listeners", &self.listeners)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::trace::RecordingTraceSink;
    use crate::time::ManualClock;

    const PRIMARY: Band = Band::new(5170, 5190);
    const SECONDARY: Band = Band::new(5190, 5210);

    fn thr() -> CcaThreshold {
        CcaThreshold::from_dbm(-82.0)
    }

    fn setup() -> (Rc<ManualClock>, Rc<RecordingTraceSink>, PhyStateMachine) {
        let clock = Rc::new(ManualClock::new());
        let trace = Rc::new(RecordingTraceSink::new());
        let phy = PhyStateMachine::new(clock.clone(), trace.clone());
        (clock, trace, phy)
    }

    #[test]
    fn test_initially_idle() {
        let (_, _, phy) = setup();
        assert_eq!(phy.state(PRIMARY, thr()), PhyState::Idle);
        assert_eq!(phy.delay_until_idle(PRIMARY, thr()), Ok(Duration::ZERO));
        assert_eq!(phy.delay_since_idle(PRIMARY, thr()), Duration::ZERO);
    }

    #[test]
    fn test_cca_busy_extends_but_never_shrinks() {
        let (clock, _, mut phy) = setup();
        phy.switch_maybe_to_cca_busy(Duration::from_millis(10), PRIMARY, true, thr());
        clock.advance_to(SimTime::from_millis(2));
        phy.switch_maybe_to_cca_busy(Duration::from_millis(1), PRIMARY, true, thr());
        assert_eq!(phy.cca_busy_end(PRIMARY, thr()), Some(SimTime::from_millis(10)));
        assert_eq!(phy.cca_busy_start(PRIMARY, thr()), Some(SimTime::ZERO));
        assert_eq!(phy.delay_until_idle(PRIMARY, thr()), Ok(Duration::from_millis(8)));
    }

    #[test]
    fn test_rx_blocks_tracked_secondary() {
        let (clock, _, mut phy) = setup();
        phy.track(SECONDARY, thr());
        phy.switch_to_rx(Duration::from_millis(3), PRIMARY, thr()).unwrap();
        assert!(phy.is_state_rx(PRIMARY, thr()));
        assert!(phy.is_state_cca_busy(SECONDARY, thr()));
        clock.advance_to(SimTime::from_millis(3));
        assert!(phy.is_state_idle(SECONDARY, thr()));
    }

    #[test]
    fn test_rx_from_rx_rejected() {
        let (_, _, mut phy) = setup();
        phy.switch_to_rx(Duration::from_millis(3), PRIMARY, thr()).unwrap();
        let err = phy.switch_to_rx(Duration::from_millis(3), PRIMARY, thr()).unwrap_err();
        assert_eq!(
            err,
            PhyError::InvalidTransition {
                from: PhyState::Rx,
                requested: TransitionKind::Rx
            }
        );
    }

    #[test]
    fn test_abort_requires_reception() {
        let (_, _, mut phy) = setup();
        assert_eq!(phy.switch_from_rx_abort(true), Err(PhyError::NoReceptionInProgress));
        phy.switch_to_rx(Duration::from_millis(3), PRIMARY, thr()).unwrap();
        assert!(phy.switch_from_rx_abort(true).is_ok());
        assert!(phy.is_state_idle(PRIMARY, thr()));
    }

    #[test]
    fn test_reset_cca_history() {
        let (_, _, mut phy) = setup();
        phy.switch_maybe_to_cca_busy(Duration::from_millis(1), PRIMARY, true, thr());
        phy.reset_cca_history();
        assert_eq!(phy.tracked_keys().count(), 0);
        assert!(phy.is_state_idle(PRIMARY, thr()));
    }
}
