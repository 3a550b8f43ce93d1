//! Unit tests for the logging functionality in the `wifi-phy-cca` crate.

use std::rc::Rc;
use std::time::Duration;

use std::path::Path;

use wifi_phy_cca::logging::{init_logger_with_default, log_replay_outcome, log_replay_start, log_step_rejected};
use wifi_phy_cca::phy::{Band, CcaThreshold, PhyStateMachine};
use wifi_phy_cca::time::{ManualClock, SimTime};
use wifi_phy_cca::{PhyError, Scenario};

/// Tests that the replay logging helpers run with every level enabled.
#[test]
fn test_replay_logging() {
    init_logger_with_default("trace");
    let scenario = Scenario::from_json_str(
        r#"{ "steps": [
            { "at_us": 0, "action": "rx", "duration_us": 40 },
            { "at_us": 60, "action": "rx_end_ok" }
        ] }"#,
    )
    .unwrap();
    log_replay_start(scenario.steps.len(), Path::new("stale.json"));
    let report = scenario.run().unwrap();
    assert_eq!(report.error.as_ref().map(|error| error.step), Some(1));
    log_replay_outcome(&report);
    log_step_rejected(1, SimTime::from_micros(60), &PhyError::NoReceptionInProgress);
}

/// Tests that the logger can be initialized more than once.
#[test]
fn test_init_logger_with_default() {
    init_logger_with_default("trace");
    init_logger_with_default("debug");
}

/// Tests that a state machine tracing through the `log` facade runs with logging enabled.
#[test]
fn test_log_trace_sink() {
    init_logger_with_default("trace");
    let clock = Rc::new(ManualClock::new());
    let mut phy = PhyStateMachine::with_log_trace(clock.clone(), "sta1");
    let band = Band::new(5170, 5190);
    let threshold = CcaThreshold::from_dbm(-82.0);
    phy.switch_to_tx(Duration::from_micros(100), 18.0, band, threshold)
        .unwrap();
    assert!(phy.switch_to_tx(Duration::from_micros(100), 18.0, band, threshold).is_err());
    clock.advance_by(Duration::from_micros(100));
    assert!(phy.is_state_idle(band, threshold));
}
