//! # Device PHY
//!
//! [`WifiPhy`] drives one [`PhyStateMachine`] for a whole operating channel.
//! It knows which 20 MHz sub-channel is primary, which energy-detection
//! thresholds apply to the primary and secondary sub-channels, and how long
//! PIFS and a channel switch last. Channel-bonding managers and OBSS-PD work
//! against this type.
//!
//! ## Energy sensing
//!
//! Received energy is computed elsewhere (interference helper, propagation
//! models). The PHY asks an [`EnergySensor`] how long the energy on a band
//! stays above a threshold, then records that on the matching key.

use crate::constants::{DEFAULT_CHANNEL_SWITCH_DELAY, DEFAULT_PIFS};
use crate::error::PhyError;
use crate::phy::band::{Band, CcaThreshold};
use crate::phy::channel::ChannelLayout;
use crate::phy::frame::{Psdu, RxSignalInfo, TxVector};
use crate::phy::listener::{ListenerId, PhyListener};
use crate::phy::state::PhyState;
use crate::phy::state_machine::PhyStateMachine;
use crate::phy::trace::StateTraceSink;
use crate::time::{Clock, SimTime};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::time::Duration;

/// Source of sensed energy.
pub trait EnergySensor {
    /// How long the energy on `band` stays at or above `threshold`, from now.
    fn energy_duration(&self, threshold: CcaThreshold, band: Band) -> Duration;
}

impl<F> EnergySensor for F
where
    F: Fn(CcaThreshold, Band) -> Duration,
{
    fn energy_duration(&self, threshold: CcaThreshold, band: Band) -> Duration {
        self(threshold, band)
    }
}

/// A medium with no energy on any band
#[derive(Debug, Default, Clone, Copy)]
pub struct QuietMedium;

impl EnergySensor for QuietMedium {
    fn energy_duration(&self, _threshold: CcaThreshold, _band: Band) -> Duration {
        Duration::ZERO
    }
}

/// One signal occupying part of the spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub band: Band,
    pub power_dbm: f64,
    #[serde(with = "crate::phy::trace::duration_nanos")]
    pub remaining: Duration,
}

/// Energy sensor over a fixed set of signals, as seen at one instant.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    pub signals: Vec<Signal>,
}

impl SignalSet {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self { signals }
    }
}

impl EnergySensor for SignalSet {
    fn energy_duration(&self, threshold: CcaThreshold, band: Band) -> Duration {
        self.signals
            .iter()
            .filter(|signal| signal.band.overlaps(&band) && threshold.is_exceeded_by(signal.power_dbm))
            .map(|signal| signal.remaining)
            .max()
            .unwrap_or_default()
    }
}

/// Transmit power cap imposed by a spatial-reuse decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerRestriction {
    pub max_siso_dbm: f64,
    pub max_mimo_dbm: f64,
}

pub struct WifiPhy {
    state: PhyStateMachine,
    layout: ChannelLayout,
    primary_threshold: CcaThreshold,
    /// Ordered and free of duplicates.
    secondary_thresholds: Vec<CcaThreshold>,
    default_secondary_threshold: Option<CcaThreshold>,
    pifs: Duration,
    channel_switch_delay: Duration,
    power_restriction: Option<PowerRestriction>,
}

impl WifiPhy {
    pub fn new(
        clock: Rc<dyn Clock>,
        trace: Rc<dyn StateTraceSink>,
        layout: ChannelLayout,
        primary_threshold: CcaThreshold,
    ) -> Result<Self, PhyError> {
        layout.validate()?;
        let mut phy = Self {
            state: PhyStateMachine::new(clock, trace),
            layout,
            primary_threshold,
            secondary_thresholds: Vec::new(),
            default_secondary_threshold: None,
            pifs: DEFAULT_PIFS,
            channel_switch_delay: DEFAULT_CHANNEL_SWITCH_DELAY,
            power_restriction: None,
        };
        phy.track_channel();
        Ok(phy)
    }

    pub fn set_pifs(&mut self, pifs: Duration) {
        self.pifs = pifs;
    }

    pub fn pifs(&self) -> Duration {
        self.pifs
    }

    pub fn set_channel_switch_delay(&mut self, delay: Duration) {
        self.channel_switch_delay = delay;
    }

    pub fn channel_switch_delay(&self) -> Duration {
        self.channel_switch_delay
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn channel_width(&self) -> u16 {
        self.layout.channel_width
    }

    pub fn primary_band(&self) -> Band {
        self.layout.primary_band()
    }

    pub fn primary_threshold(&self) -> CcaThreshold {
        self.primary_threshold
    }

    pub fn now(&self) -> SimTime {
        self.state.now()
    }

    /// The underlying state machine, for per-key queries.
    pub fn state_machine(&self) -> &PhyStateMachine {
        &self.state
    }

    pub fn state_machine_mut(&mut self) -> &mut PhyStateMachine {
        &mut self.state
    }

    pub fn register_listener<L: PhyListener + 'static>(&mut self, listener: &Rc<L>) -> ListenerId {
        self.state.register_listener(listener)
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> bool {
        self.state.unregister_listener(id)
    }

    fn track_channel(&mut self) {
        self.state.track(self.primary_band(), self.primary_threshold);
        for band in self.layout.secondary_bands() {
            for threshold in &self.secondary_thresholds {
                self.state.track(band, *threshold);
            }
        }
    }

    // ----- secondary thresholds -----

    /// Start evaluating secondary channels at `threshold`. Returns false if
    /// it was already registered.
    pub fn add_secondary_threshold(&mut self, threshold: CcaThreshold) -> bool {
        match self.secondary_thresholds.binary_search(&threshold) {
            Ok(_) => false,
            Err(position) => {
                self.secondary_thresholds.insert(position, threshold);
                for band in self.layout.secondary_bands() {
                    self.state.track(band, threshold);
                }
                debug!("secondary CCA threshold {threshold} added");
                true
            }
        }
    }

    pub fn remove_secondary_threshold(&mut self, threshold: CcaThreshold) -> bool {
        match self.secondary_thresholds.binary_search(&threshold) {
            Ok(position) => {
                self.secondary_thresholds.remove(position);
                for band in self.layout.secondary_bands() {
                    self.state.untrack(band, threshold);
                }
                if self.default_secondary_threshold == Some(threshold) {
                    self.default_secondary_threshold = None;
                }
                debug!("secondary CCA threshold {threshold} removed");
                true
            }
            Err(_) => false,
        }
    }

    pub fn secondary_thresholds(&self) -> &[CcaThreshold] {
        &self.secondary_thresholds
    }

    /// Make `threshold` the default secondary threshold, registering it if needed.
    pub fn set_default_secondary_threshold(&mut self, threshold: CcaThreshold) {
        self.add_secondary_threshold(threshold);
        self.default_secondary_threshold = Some(threshold);
    }

    /// Threshold used for secondary channels when no per-mode value applies.
    pub fn default_secondary_threshold(&self) -> CcaThreshold {
        self.default_secondary_threshold
            .or_else(|| self.secondary_thresholds.first().copied())
            .unwrap_or(self.primary_threshold)
    }

    // ----- primary channel queries -----

    pub fn phy_state(&self) -> PhyState {
        self.state.state(self.primary_band(), self.primary_threshold)
    }

    pub fn is_state_idle(&self) -> bool {
        self.phy_state() == PhyState::Idle
    }

    pub fn is_state_cca_busy(&self) -> bool {
        self.phy_state() == PhyState::CcaBusy
    }

    pub fn is_state_tx(&self) -> bool {
        self.phy_state() == PhyState::Tx
    }

    pub fn is_state_rx(&self) -> bool {
        self.phy_state() == PhyState::Rx
    }

    pub fn is_state_switching(&self) -> bool {
        self.phy_state() == PhyState::Switching
    }

    pub fn is_state_sleep(&self) -> bool {
        self.phy_state() == PhyState::Sleep
    }

    pub fn is_state_off(&self) -> bool {
        self.phy_state() == PhyState::Off
    }

    pub fn delay_until_idle(&self) -> Result<Duration, PhyError> {
        self.state
            .delay_until_idle(self.primary_band(), self.primary_threshold)
    }

    pub fn last_rx_start_time(&self) -> SimTime {
        self.state.last_rx_start_time()
    }

    fn check_width(&self, width: u16) -> Result<(), PhyError> {
        if width > self.layout.channel_width {
            return Err(PhyError::ChannelWidthExceeded {
                requested: width,
                operating: self.layout.channel_width,
            });
        }
        Ok(())
    }

    fn threshold_for(&self, band: Band, secondary_threshold: CcaThreshold) -> CcaThreshold {
        if band == self.primary_band() {
            self.primary_threshold
        } else {
            secondary_threshold
        }
    }

    /// How long the `width`-wide block around the primary channel has been
    /// idle: the shortest idle time among its 20 MHz sub-channels. The primary
    /// is always evaluated at the primary threshold, the others at `threshold`.
    pub fn delay_since_channel_is_idle(&self, width: u16, threshold: CcaThreshold) -> Result<Duration, PhyError> {
        self.check_width(width)?;
        let delay = self
            .layout
            .subchannels_of_block(width)
            .into_iter()
            .map(|band| {
                self.state
                    .delay_since_idle(band, self.threshold_for(band, threshold))
            })
            .min()
            .unwrap_or_default();
        Ok(delay)
    }

    /// True if every 20 MHz sub-channel of the `width`-wide block is IDLE.
    pub fn is_channel_idle(&self, width: u16, threshold: CcaThreshold) -> Result<bool, PhyError> {
        self.check_width(width)?;
        Ok(self
            .layout
            .subchannels_of_block(width)
            .into_iter()
            .all(|band| self.state.is_state_idle(band, self.threshold_for(band, threshold))))
    }

    // ----- energy detection -----

    /// Record the energy currently reported by `sensor` on the primary
    /// channel and on every secondary channel at every secondary threshold.
    pub fn maybe_cca_busy(&mut self, sensor: &impl EnergySensor) {
        let primary = self.primary_band();
        let duration = sensor.energy_duration(self.primary_threshold, primary);
        if !duration.is_zero() {
            self.state
                .switch_maybe_to_cca_busy(duration, primary, true, self.primary_threshold);
        }
        self.sense_secondaries(sensor);
    }

    fn sense_secondaries(&mut self, sensor: &impl EnergySensor) {
        for band in self.layout.secondary_bands() {
            for threshold in self.secondary_thresholds.clone() {
                let duration = sensor.energy_duration(threshold, band);
                if !duration.is_zero() {
                    self.state
                        .switch_maybe_to_cca_busy(duration, band, false, threshold);
                }
            }
        }
    }

    // ----- own activity -----

    /// Start a transmission. Returns the power actually used, after any
    /// spatial-reuse restriction.
    pub fn start_tx(&mut self, duration: Duration, tx_vector: &TxVector, requested_power_dbm: f64) -> Result<f64, PhyError> {
        let power = self.tx_power_for(requested_power_dbm, tx_vector.nss);
        self.state
            .switch_to_tx(duration, power, self.primary_band(), self.primary_threshold)?;
        debug!(
            "TX {} on {} MHz for {duration:?} at {power} dBm",
            tx_vector.mode, tx_vector.channel_width
        );
        Ok(power)
    }

    pub fn start_rx(&mut self, duration: Duration) -> Result<(), PhyError> {
        self.state
            .switch_to_rx(duration, self.primary_band(), self.primary_threshold)
    }

    pub fn end_rx_ok(
        &mut self,
        psdu: &Psdu,
        signal: &RxSignalInfo,
        tx_vector: &TxVector,
        sta_id: u16,
        status_per_mpdu: &[bool],
    ) -> Result<(), PhyError> {
        self.state
            .switch_from_rx_end_ok(psdu, signal, tx_vector, sta_id, status_per_mpdu)
    }

    pub fn end_rx_error(&mut self, psdu: &Psdu, snr: f64) -> Result<(), PhyError> {
        self.state.switch_from_rx_end_error(psdu, snr)
    }

    pub fn continue_rx_next_mpdu(&mut self, psdu: &Psdu, signal: &RxSignalInfo, tx_vector: &TxVector) {
        self.state.continue_rx_next_mpdu(psdu, signal, tx_vector);
    }

    pub fn abort_rx(&mut self, failure: bool) -> Result<(), PhyError> {
        self.state.switch_from_rx_abort(failure)
    }

    /// Retune to `layout`. The radio is SWITCHING for the channel-switch delay
    /// and the CCA history of the old channel is discarded.
    pub fn switch_channel(&mut self, layout: ChannelLayout) -> Result<(), PhyError> {
        layout.validate()?;
        self.state.switch_to_channel_switching(
            self.channel_switch_delay,
            self.primary_band(),
            self.primary_threshold,
        )?;
        info!(
            "switching channel to {} MHz / {} MHz, primary index {}",
            layout.center_frequency_mhz, layout.channel_width, layout.primary20_index
        );
        self.layout = layout;
        self.state.reset_cca_history();
        self.track_channel();
        Ok(())
    }

    // ----- power management -----

    pub fn sleep(&mut self) -> Result<(), PhyError> {
        self.state
            .switch_to_sleep(self.primary_band(), self.primary_threshold)
    }

    /// Wake up and pick up any energy already present on the medium.
    pub fn resume_from_sleep(&mut self, sensor: &impl EnergySensor) -> Result<(), PhyError> {
        let primary = self.primary_band();
        let duration = sensor.energy_duration(self.primary_threshold, primary);
        self.state
            .switch_from_sleep(duration, primary, true, self.primary_threshold)?;
        self.sense_secondaries(sensor);
        Ok(())
    }

    pub fn off(&mut self) -> Result<(), PhyError> {
        self.state
            .switch_to_off(self.primary_band(), self.primary_threshold)
    }

    /// Power on and pick up any energy already present on the medium.
    pub fn resume_from_off(&mut self, sensor: &impl EnergySensor) -> Result<(), PhyError> {
        let primary = self.primary_band();
        let duration = sensor.energy_duration(self.primary_threshold, primary);
        self.state
            .switch_from_off(duration, primary, true, self.primary_threshold)?;
        self.sense_secondaries(sensor);
        Ok(())
    }

    // ----- spatial reuse -----

    /// Drop the ongoing reception, if any, and optionally cap the transmit
    /// power until [`WifiPhy::clear_power_restriction`].
    pub fn reset_cca(&mut self, power_restricted: bool, max_siso_dbm: f64, max_mimo_dbm: f64) -> Result<(), PhyError> {
        if self.is_state_rx() {
            // The frame is ignored, not lost: no EIFS on the MAC side.
            self.state.switch_from_rx_abort(false)?;
        }
        self.power_restriction = power_restricted.then_some(PowerRestriction {
            max_siso_dbm,
            max_mimo_dbm,
        });
        debug!("CCA reset, power restriction {:?}", self.power_restriction);
        Ok(())
    }

    pub fn clear_power_restriction(&mut self) {
        self.power_restriction = None;
    }

    pub fn power_restriction(&self) -> Option<PowerRestriction> {
        self.power_restriction
    }

    /// Power to use for a transmission with `nss` spatial streams.
    pub fn tx_power_for(&self, requested_dbm: f64, nss: u8) -> f64 {
        match self.power_restriction {
            Some(restriction) if nss > 1 => requested_dbm.min(restriction.max_mimo_dbm),
            Some(restriction) => requested_dbm.min(restriction.max_siso_dbm),
            None => requested_dbm,
        }
    }
}

impl std::fmt::Debug for WifiPhy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WifiPhy")
            .field("layout", &self.layout)
            .field("primary_threshold", &self.primary_threshold)
            .field("secondary_thresholds", &self.secondary_thresholds)
            .field("pifs", &self.pifs)
            .field("state", &self.state)
            .finish()
    }
}
