//! Property-based tests for `PhyStateMachine` over random, valid-by-construction
//! sequences of medium events, driven like a scheduler would drive them.

use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use proptest::prelude::*;
use wifi_phy_cca::phy::{
    Band, CcaThreshold, PhyState, PhyStateMachine, Preamble, Psdu, RecordingTraceSink, RxSignalInfo,
    TxVector, WifiMode, SU_STA_ID,
};
use wifi_phy_cca::time::{Clock, ManualClock, SimTime};
use wifi_phy_cca::PhyError;

const PRIMARY: Band = Band::new(5170, 5190);
const SECONDARY: Band = Band::new(5190, 5210);

fn primary_thr() -> CcaThreshold {
    CcaThreshold::from_dbm(-82.0)
}

fn secondary_thr() -> CcaThreshold {
    CcaThreshold::from_dbm(-72.0)
}

#[derive(Debug, Clone)]
enum Op {
    Advance(u64),
    Energy { us: u64, secondary: bool },
    Tx(u64),
    Rx(u64),
    Switch(u64),
    Sleep,
    Wake(u64),
    Off,
    On(u64),
    Abort(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1u64..2_000).prop_map(Op::Advance),
        3 => (0u64..1_000, any::<bool>()).prop_map(|(us, secondary)| Op::Energy { us, secondary }),
        2 => (1u64..1_000).prop_map(Op::Tx),
        2 => (1u64..1_000).prop_map(Op::Rx),
        1 => (1u64..500).prop_map(Op::Switch),
        1 => Just(Op::Sleep),
        1 => (0u64..500).prop_map(Op::Wake),
        1 => Just(Op::Off),
        1 => (0u64..500).prop_map(Op::On),
        1 => any::<bool>().prop_map(Op::Abort),
    ]
}

struct Driver {
    clock: Rc<ManualClock>,
    trace: Rc<RecordingTraceSink>,
    phy: PhyStateMachine,
}

impl Driver {
    fn new() -> Self {
        let clock = Rc::new(ManualClock::new());
        let trace = Rc::new(RecordingTraceSink::new());
        let mut phy = PhyStateMachine::new(clock.clone(), trace.clone());
        phy.track(PRIMARY, primary_thr());
        phy.track(SECONDARY, secondary_thr());
        Self { clock, trace, phy }
    }

    /// Move time forward, completing a reception whose end falls in between.
    fn advance(&mut self, delta: Duration) -> Result<(), PhyError> {
        let target = self.clock.now() + delta;
        if let Some(end) = self.phy.pending_rx_end() {
            if end <= target {
                self.clock.advance_to(end);
                let psdu = Psdu::single(Bytes::from_static(b"mpdu"));
                let tx_vector = TxVector::new(WifiMode::new("HeMcs0"), Preamble::HeSu, 20);
                let signal = RxSignalInfo {
                    snr: 10.0,
                    rssi_dbm: -70.0,
                };
                self.phy
                    .switch_from_rx_end_ok(&psdu, &signal, &tx_vector, SU_STA_ID, &[true])?;
            }
        }
        self.clock.advance_to(target);
        Ok(())
    }

    fn apply(&mut self, op: &Op) -> Result<(), PhyError> {
        let us = Duration::from_micros;
        match *op {
            Op::Advance(delta) => self.advance(us(delta)),
            Op::Energy { us: d, secondary } => {
                if secondary {
                    self.phy
                        .switch_maybe_to_cca_busy(us(d), SECONDARY, false, secondary_thr());
                } else {
                    self.phy
                        .switch_maybe_to_cca_busy(us(d), PRIMARY, true, primary_thr());
                }
                Ok(())
            }
            Op::Tx(d) => self.phy.switch_to_tx(us(d), 20.0, PRIMARY, primary_thr()),
            Op::Rx(d) => self.phy.switch_to_rx(us(d), PRIMARY, primary_thr()),
            Op::Switch(d) => self
                .phy
                .switch_to_channel_switching(us(d), PRIMARY, primary_thr()),
            Op::Sleep => self.phy.switch_to_sleep(PRIMARY, primary_thr()),
            Op::Wake(d) => self.phy.switch_from_sleep(us(d), PRIMARY, true, primary_thr()),
            Op::Off => self.phy.switch_to_off(PRIMARY, primary_thr()),
            Op::On(d) => self.phy.switch_from_off(us(d), PRIMARY, true, primary_thr()),
            Op::Abort(failure) => self.phy.switch_from_rx_abort(failure),
        }
    }

    fn keys() -> [(Band, CcaThreshold); 2] {
        [(PRIMARY, primary_thr()), (SECONDARY, secondary_thr())]
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The state is derived purely from stored timestamps: asking twice gives the same answer.
    #[test]
    fn prop_state_is_referentially_transparent(ops in prop::collection::vec(op(), 1..60)) {
        let mut driver = Driver::new();
        for op in &ops {
            let _ = driver.apply(op);
            for (band, threshold) in Driver::keys() {
                let first = driver.phy.state(band, threshold);
                prop_assert_eq!(first, driver.phy.state(band, threshold));
                prop_assert!(PhyState::ALL.contains(&first));
            }
        }
    }

    /// Sleep and off are never observed together.
    #[test]
    fn prop_sleep_and_off_exclusive(ops in prop::collection::vec(op(), 1..60)) {
        let mut driver = Driver::new();
        for op in &ops {
            let _ = driver.apply(op);
            for (band, threshold) in Driver::keys() {
                prop_assert!(!(driver.phy.is_state_sleep(band, threshold) && driver.phy.is_state_off(band, threshold)));
            }
        }
    }

    /// The delay until idle is defined outside sleep/off, and waiting for it
    /// leads to IDLE.
    #[test]
    fn prop_delay_until_idle_reaches_idle(ops in prop::collection::vec(op(), 1..60)) {
        let mut driver = Driver::new();
        for op in &ops {
            let _ = driver.apply(op);
        }
        let state = driver.phy.state(PRIMARY, primary_thr());
        match driver.phy.delay_until_idle(PRIMARY, primary_thr()) {
            Ok(delay) => {
                prop_assert!(!matches!(state, PhyState::Sleep | PhyState::Off));
                driver.clock.advance_by(delay);
                prop_assert_eq!(driver.phy.state(PRIMARY, primary_thr()), PhyState::Idle);
                prop_assert_eq!(driver.phy.delay_until_idle(PRIMARY, primary_thr()), Ok(Duration::ZERO));
            }
            Err(err) => {
                prop_assert_eq!(err, PhyError::UndefinedIdleDelay(state));
            }
        }
    }

    /// Logged intervals tile the timeline from time zero with no gaps or overlaps.
    #[test]
    fn prop_trace_tiles_timeline(ops in prop::collection::vec(op(), 1..80)) {
        let mut driver = Driver::new();
        for op in &ops {
            let _ = driver.apply(op);
        }
        let intervals = driver.trace.intervals();
        if let Some(first) = intervals.first() {
            prop_assert_eq!(first.start, SimTime::ZERO);
        }
        prop_assert!(
            driver.trace.find_tiling_violation().is_none(),
            "violation {:?} in {:?}",
            driver.trace.find_tiling_violation(),
            intervals
        );
        if let Some(last) = intervals.last() {
            prop_assert!(last.end() <= driver.clock.now() || matches!(last.state, PhyState::Tx | PhyState::Switching));
        }
    }

    /// Every other tracked key reads CCA_BUSY for the whole transmission.
    #[test]
    fn prop_transmission_blocks_other_bands(
        start_us in 0u64..500,
        tx_us in 1u64..1_000,
        prior_us in 0u64..2_000,
        fraction in 0.0f64..1.0,
    ) {
        let mut driver = Driver::new();
        driver
            .phy
            .switch_maybe_to_cca_busy(Duration::from_micros(prior_us), SECONDARY, false, secondary_thr());
        driver.clock.advance_to(SimTime::from_micros(start_us));
        driver
            .phy
            .switch_to_tx(Duration::from_micros(tx_us), 20.0, PRIMARY, primary_thr())
            .unwrap();

        let offset = ((tx_us * 1_000) as f64 * fraction) as u64;
        driver.clock.advance_to(SimTime::from_micros(start_us) + Duration::from_nanos(offset));
        prop_assert!(driver.phy.is_state_tx(PRIMARY, primary_thr()));
        prop_assert!(driver.phy.is_state_cca_busy(SECONDARY, secondary_thr()));
        prop_assert_eq!(driver.phy.delay_since_idle(SECONDARY, secondary_thr()), Duration::ZERO);
    }
}
