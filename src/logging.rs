use std::path::Path;

use log::{debug, error, info, log_enabled, warn, Level};

use crate::error::PhyError;
use crate::scenario::ScenarioReport;
use crate::time::SimTime;

/// Initializes the logger with the `env_logger` crate.
///
/// Verbosity is controlled through `RUST_LOG`; state intervals emitted by
/// [`LogTraceSink`](crate::phy::LogTraceSink) appear at `trace` level.
pub fn init_logger() {
    env_logger::init();
}

/// Like [`init_logger`], but falls back to `default_filter` when `RUST_LOG`
/// is unset. Safe to call more than once.
pub fn init_logger_with_default(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Logs the start of a scenario replay read from `source`.
pub fn log_replay_start(steps: usize, source: &Path) {
    if log_enabled!(Level::Info) {
        info!("replaying {steps} steps from {}", source.display());
    }
}

/// Logs a scenario step the PHY refused. Replay stops at that step.
pub fn log_step_rejected(step: usize, at: SimTime, error: &PhyError) {
    if log_enabled!(Level::Warn) {
        warn!("step {step} at {at} rejected: {error}");
    }
}

/// Logs how a replay ended: the final state, or the step that stopped it.
pub fn log_replay_outcome(report: &ScenarioReport) {
    match &report.error {
        Some(stopped) => {
            if log_enabled!(Level::Error) {
                error!("replay stopped at step {} ({}): {}", stopped.step, stopped.at, stopped.message);
            }
        }
        None => {
            if log_enabled!(Level::Debug) {
                debug!(
                    "replay finished in {} with {} intervals, {} ok / {} failed receptions",
                    report.final_state,
                    report.intervals.len(),
                    report.counters.rx_ok,
                    report.counters.rx_error
                );
            }
        }
    }
}
