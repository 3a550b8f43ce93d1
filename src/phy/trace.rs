//! # State Trace
//!
//! Every completed state interval of the primary channel is reported to a
//! [`StateTraceSink`] injected at construction. This is the externally
//! observable ground truth of the state machine: consecutive intervals tile
//! the timeline with no gaps and no overlaps.
//!
//! ## Sinks
//!
//! - [`LogTraceSink`] forwards intervals to the `log` facade at trace level
//! - [`RecordingTraceSink`] keeps every interval in memory for tests and reports
//! - [`NullTraceSink`] discards everything

use crate::phy::frame::{Psdu, TxVector};
use crate::phy::state::PhyState;
use crate::time::SimTime;
use log::trace;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Duration;

/// One logged `(start, duration, state)` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInterval {
    pub start: SimTime,
    #[serde(with = "duration_nanos")]
    pub duration: Duration,
    pub state: PhyState,
}

impl StateInterval {
    pub fn end(&self) -> SimTime {
        self.start + self.duration
    }
}

/// Receiver of state intervals and frame events.
pub trait StateTraceSink {
    /// A state interval of the primary channel has been closed (or, for TX and
    /// SWITCHING, opened with a known duration).
    fn state(&self, start: SimTime, duration: Duration, state: PhyState);

    /// A forward-logged interval of `state` that began at `start` was cut
    /// short and now ends at `end`.
    fn truncate(&self, _start: SimTime, _end: SimTime, _state: PhyState) {}

    /// A transmission starts.
    fn tx_start(&self, _duration: Duration, _power_dbm: f64) {}

    /// A PSDU has been received successfully.
    fn rx_ok(&self, _psdu: &Psdu, _snr: f64, _tx_vector: &TxVector, _sta_id: u16) {}

    /// A PSDU has been received with errors.
    fn rx_error(&self, _psdu: &Psdu, _snr: f64) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTraceSink;

impl StateTraceSink for NullTraceSink {
    fn state(&self, _start: SimTime, _duration: Duration, _state: PhyState) {}
}

/// Emits every event through the `log` facade.
#[derive(Debug, Default, Clone)]
pub struct LogTraceSink {
    device: String,
}

impl LogTraceSink {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl StateTraceSink for LogTraceSink {
    fn state(&self, start: SimTime, duration: Duration, state: PhyState) {
        trace!("[{}] {state} start={start} duration={duration:?}", self.device);
    }

    fn truncate(&self, start: SimTime, end: SimTime, state: PhyState) {
        trace!("[{}] {state} start={start} cut short at {end}", self.device);
    }

    fn tx_start(&self, duration: Duration, power_dbm: f64) {
        trace!("[{}] tx duration={duration:?} power={power_dbm} dBm", self.device);
    }

    fn rx_ok(&self, psdu: &Psdu, snr: f64, tx_vector: &TxVector, sta_id: u16) {
        trace!(
            "[{}] rx ok size={} snr={snr:.2} mode={}",
            self.device,
            psdu.size(),
            tx_vector.mode_for(sta_id)
        );
    }

    fn rx_error(&self, psdu: &Psdu, snr: f64) {
        trace!("[{}] rx error size={} snr={snr:.2}", self.device, psdu.size());
    }
}

/// Frame-level counters kept by [`RecordingTraceSink`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameCounters {
    pub tx: u64,
    pub rx_ok: u64,
    pub rx_error: u64,
}

/// Captures every interval in memory.
#[derive(Debug, Default)]
pub struct RecordingTraceSink {
    intervals: RefCell<Vec<StateInterval>>,
    counters: RefCell<FrameCounters>,
}

impl RecordingTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all intervals in emission order.
    pub fn intervals(&self) -> Vec<StateInterval> {
        self.intervals.borrow().clone()
    }

    pub fn last(&self) -> Option<StateInterval> {
        self.intervals.borrow().last().copied()
    }

    pub fn counters(&self) -> FrameCounters {
        *self.counters.borrow()
    }

    /// Total logged time per state, ignoring zero-length intervals.
    pub fn time_per_state(&self) -> BTreeMap<PhyState, Duration> {
        let mut totals = BTreeMap::new();
        for interval in self.intervals.borrow().iter() {
            if interval.duration.is_zero() {
                continue;
            }
            *totals.entry(interval.state).or_insert(Duration::ZERO) += interval.duration;
        }
        totals
    }

    /// Total logged time in `state`.
    pub fn time_in_state(&self, state: PhyState) -> Duration {
        self.time_per_state().get(&state).copied().unwrap_or_default()
    }

    /// Returns the first pair of consecutive intervals that do not tile the
    /// timeline, if any.
    pub fn find_tiling_violation(&self) -> Option<(StateInterval, StateInterval)> {
        self.intervals
            .borrow()
            .windows(2)
            .find(|pair| pair[0].end() != pair[1].start)
            .map(|pair| (pair[0], pair[1]))
    }

    pub fn clear(&self) {
        self.intervals.borrow_mut().clear();
        *self.counters.borrow_mut() = FrameCounters::default();
    }
}

impl StateTraceSink for RecordingTraceSink {
    fn state(&self, start: SimTime, duration: Duration, state: PhyState) {
        self.intervals.borrow_mut().push(StateInterval {
            start,
            duration,
            state,
        });
    }

    fn truncate(&self, start: SimTime, end: SimTime, state: PhyState) {
        let mut intervals = self.intervals.borrow_mut();
        if let Some(interval) = intervals
            .iter_mut()
            .rev()
            .find(|interval| interval.start == start && interval.state == state)
        {
            interval.duration = end.saturating_duration_since(start);
        }
    }

    fn tx_start(&self, _duration: Duration, _power_dbm: f64) {
        self.counters.borrow_mut().tx += 1;
    }

    fn rx_ok(&self, _psdu: &Psdu, _snr: f64, _tx_vector: &TxVector, _sta_id: u16) {
        self.counters.borrow_mut().rx_ok += 1;
    }

    fn rx_error(&self, _psdu: &Psdu, _snr: f64) {
        self.counters.borrow_mut().rx_error += 1;
    }
}

/// Serde adapter storing a `Duration` as integer nanoseconds.
pub(crate) mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_nanos(u64::deserialize(deserializer)?))
    }
}
