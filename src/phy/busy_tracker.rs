//! A [`PhyListener`] that keeps track of how long the medium is busy, the way
//! a channel-access manager does before deciding to contend.

use crate::phy::listener::PhyListener;
use crate::time::{Clock, SimTime};
use log::trace;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Number of notifications received, per kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCounters {
    pub tx_start: u64,
    pub rx_start: u64,
    pub rx_end_ok: u64,
    pub rx_end_error: u64,
    pub maybe_cca_busy: u64,
    pub switching: u64,
    pub sleep: u64,
    pub off: u64,
    pub wakeup: u64,
    pub on: u64,
}

pub struct MediumBusyTracker {
    clock: Rc<dyn Clock>,
    busy_until: Cell<SimTime>,
    sleeping: Cell<bool>,
    off: Cell<bool>,
    counters: Cell<NotificationCounters>,
}

impl MediumBusyTracker {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            busy_until: Cell::new(SimTime::ZERO),
            sleeping: Cell::new(false),
            off: Cell::new(false),
            counters: Cell::new(NotificationCounters::default()),
        }
    }

    /// Latest time up to which the PHY reported activity.
    pub fn busy_until(&self) -> SimTime {
        self.busy_until.get()
    }

    /// True while reported activity is still ongoing.
    pub fn is_busy(&self) -> bool {
        self.busy_until.get() > self.clock.now()
    }

    /// False while the PHY sleeps or is off.
    pub fn is_available(&self) -> bool {
        !self.sleeping.get() && !self.off.get()
    }

    pub fn counters(&self) -> NotificationCounters {
        self.counters.get()
    }

    fn extend(&self, duration: Duration) {
        let end = self.clock.now() + duration;
        if end > self.busy_until.get() {
            self.busy_until.set(end);
        }
        trace!("medium busy until {}", self.busy_until.get());
    }

    fn count(&self, bump: impl FnOnce(&mut NotificationCounters)) {
        let mut counters = self.counters.get();
        bump(&mut counters);
        self.counters.set(counters);
    }

    /// Reception over: the medium is free from now unless other energy keeps it busy.
    fn end_reception(&self) {
        let now = self.clock.now();
        if self.busy_until.get() > now {
            self.busy_until.set(now);
        }
    }
}

impl PhyListener for MediumBusyTracker {
    fn notify_tx_start(&self, duration: Duration, _power_dbm: f64) {
        self.count(|c| c.tx_start += 1);
        self.extend(duration);
    }

    fn notify_rx_start(&self, duration: Duration) {
        self.count(|c| c.rx_start += 1);
        self.extend(duration);
    }

    fn notify_rx_end_ok(&self) {
        self.count(|c| c.rx_end_ok += 1);
        self.end_reception();
    }

    fn notify_rx_end_error(&self) {
        self.count(|c| c.rx_end_error += 1);
        self.end_reception();
    }

    fn notify_maybe_cca_busy_start(&self, duration: Duration) {
        self.count(|c| c.maybe_cca_busy += 1);
        self.extend(duration);
    }

    fn notify_switching_start(&self, duration: Duration) {
        self.count(|c| c.switching += 1);
        self.extend(duration);
    }

    fn notify_sleep(&self) {
        self.count(|c| c.sleep += 1);
        self.sleeping.set(true);
    }

    fn notify_off(&self) {
        self.count(|c| c.off += 1);
        self.off.set(true);
    }

    fn notify_wakeup(&self) {
        self.count(|c| c.wakeup += 1);
        self.sleeping.set(false);
    }

    fn notify_on(&self) {
        self.count(|c| c.on += 1);
        self.off.set(false);
    }
}

impl std::fmt::Debug for MediumBusyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediumBusyTracker")
            .field("busy_until", &self.busy_until.get())
            .field("sleeping", &self.sleeping.get())
            .field("off", &self.off.get())
            .field("counters", &self.counters.get())
            .finish()
    }
}
