//! # Scenario Replay
//!
//! A scenario is a JSON list of timed actions applied to one PHY. Time is
//! driven by a [`ManualClock`] advanced to each step's timestamp, so a
//! scenario plays the role of the event scheduler in a single-device test.
//!
//! Replay stops at the first rejected action: PHY errors are caller bugs and
//! every later step would run against a state the author did not expect.

use crate::bonding::ChannelBondingManager;
use crate::config::PhyConfig;
use crate::error::PhyError;
use crate::logging::log_step_rejected;
use crate::obss_pd::{HePreambleParameters, ObssPdDecision};
use crate::phy::{
    Band, ChannelLayout, FrameCounters, PhyState, Preamble, Psdu, RecordingTraceSink, RxSignalInfo,
    Signal, SignalSet, StateInterval, TxVector, WifiMode, WifiPhy, SU_STA_ID,
};
use crate::time::{Clock, ManualClock, SimTime};
use bytes::Bytes;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

/// Energy on one band, as seen at the time of the step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergySpec {
    pub low_mhz: u32,
    pub high_mhz: u32,
    pub power_dbm: f64,
    pub duration_us: u64,
}

impl From<&EnergySpec> for Signal {
    fn from(spec: &EnergySpec) -> Self {
        Signal {
            band: Band::new(spec.low_mhz, spec.high_mhz),
            power_dbm: spec.power_dbm,
            remaining: Duration::from_micros(spec.duration_us),
        }
    }
}

fn signal_set(specs: &[EnergySpec]) -> SignalSet {
    SignalSet::new(specs.iter().map(Signal::from).collect())
}

fn default_nss() -> u8 {
    1
}

fn default_status() -> Vec<bool> {
    vec![true]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Energy {
        signals: Vec<EnergySpec>,
    },
    Tx {
        duration_us: u64,
        power_dbm: f64,
        mode: String,
        #[serde(default = "default_nss")]
        nss: u8,
        /// Defaults to the operating channel width.
        #[serde(default)]
        channel_width: Option<u16>,
    },
    Rx {
        duration_us: u64,
    },
    RxEndOk {
        #[serde(default = "default_status")]
        status_per_mpdu: Vec<bool>,
        #[serde(default)]
        snr: f64,
        #[serde(default)]
        rssi_dbm: f64,
    },
    RxEndError {
        #[serde(default)]
        snr: f64,
    },
    RxAbort {
        failure: bool,
    },
    SwitchChannel {
        channel: ChannelLayout,
    },
    Sleep,
    Wake {
        #[serde(default)]
        signals: Vec<EnergySpec>,
    },
    Off,
    On {
        #[serde(default)]
        signals: Vec<EnergySpec>,
    },
    /// Ask the bonding manager for the usable width.
    UsableWidth {
        mode: String,
    },
    /// HE-SIG-A of an incoming PPDU, evaluated by OBSS-PD.
    HeSigA {
        rssi_dbm: f64,
        bss_color: u8,
        own_bss_color: u8,
        #[serde(default = "associated_default")]
        associated: bool,
    },
}

fn associated_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub at_us: u64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: PhyConfig,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondingDecision {
    pub at: SimTime,
    pub mode: String,
    pub width_mhz: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObssPdOutcome {
    pub at: SimTime,
    pub decision: ObssPdDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    pub step: usize,
    pub at: SimTime,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub intervals: Vec<StateInterval>,
    /// Nanoseconds spent in each state
    pub time_per_state_ns: BTreeMap<PhyState, u64>,
    pub counters: FrameCounters,
    pub bonding: Vec<BondingDecision>,
    pub obss_pd: Vec<ObssPdOutcome>,
    pub final_state: PhyState,
    pub error: Option<StepError>,
}

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self, PhyError> {
        let scenario: Scenario = serde_json::from_str(json)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PhyError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), PhyError> {
        self.config.validate()?;
        if let Some(pair) = self.steps.windows(2).find(|pair| pair[1].at_us < pair[0].at_us) {
            return Err(PhyError::Config(format!(
                "steps go back in time: {} us after {} us",
                pair[1].at_us, pair[0].at_us
            )));
        }
        Ok(())
    }

    /// Replay every step and collect the resulting trace.
    pub fn run(&self) -> Result<ScenarioReport, PhyError> {
        self.validate()?;
        let clock = Rc::new(ManualClock::new());
        let trace = Rc::new(RecordingTraceSink::new());
        let (mut phy, manager) = self.config.build(clock.clone(), trace.clone())?;
        let mut runner = Runner {
            phy: &mut phy,
            manager: manager.as_ref(),
            config: &self.config,
            bonding: Vec::new(),
            obss_pd: Vec::new(),
        };

        let mut error = None;
        for (index, step) in self.steps.iter().enumerate() {
            clock.advance_to(SimTime::from_micros(step.at_us));
            debug!("step {index} at {}: {:?}", clock.now(), step.action);
            if let Err(err) = runner.apply(&step.action) {
                log_step_rejected(index, clock.now(), &err);
                error = Some(StepError {
                    step: index,
                    at: clock.now(),
                    message: err.to_string(),
                });
                break;
            }
        }
        let Runner { bonding, obss_pd, .. } = runner;

        let time_per_state_ns = trace
            .time_per_state()
            .into_iter()
            .map(|(state, duration)| (state, u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)))
            .collect();
        Ok(ScenarioReport {
            intervals: trace.intervals(),
            time_per_state_ns,
            counters: trace.counters(),
            bonding,
            obss_pd,
            final_state: phy.phy_state(),
            error,
        })
    }
}

struct Runner<'a> {
    phy: &'a mut WifiPhy,
    manager: &'a dyn ChannelBondingManager,
    config: &'a PhyConfig,
    bonding: Vec<BondingDecision>,
    obss_pd: Vec<ObssPdOutcome>,
}

impl Runner<'_> {
    fn apply(&mut self, action: &Action) -> Result<(), PhyError> {
        let phy = &mut *self.phy;
        match action {
            Action::Energy { signals } => phy.maybe_cca_busy(&signal_set(signals)),
            Action::Tx {
                duration_us,
                power_dbm,
                mode,
                nss,
                channel_width,
            } => {
                let mut tx_vector = TxVector::new(
                    WifiMode::new(mode.as_str()),
                    Preamble::HeSu,
                    channel_width.unwrap_or(phy.channel_width()),
                );
                tx_vector.nss = *nss;
                phy.start_tx(Duration::from_micros(*duration_us), &tx_vector, *power_dbm)?;
            }
            Action::Rx { duration_us } => phy.start_rx(Duration::from_micros(*duration_us))?,
            Action::RxEndOk {
                status_per_mpdu,
                snr,
                rssi_dbm,
            } => {
                let psdu = Psdu::new(vec![Bytes::new(); status_per_mpdu.len()]);
                let tx_vector = TxVector::new(WifiMode::new("unknown"), Preamble::HeSu, phy.channel_width());
                let signal = RxSignalInfo {
                    snr: *snr,
                    rssi_dbm: *rssi_dbm,
                };
                phy.end_rx_ok(&psdu, &signal, &tx_vector, SU_STA_ID, status_per_mpdu)?;
            }
            Action::RxEndError { snr } => phy.end_rx_error(&Psdu::new(Vec::new()), *snr)?,
            Action::RxAbort { failure } => phy.abort_rx(*failure)?,
            Action::SwitchChannel { channel } => phy.switch_channel(*channel)?,
            Action::Sleep => phy.sleep()?,
            Action::Wake { signals } => phy.resume_from_sleep(&signal_set(signals))?,
            Action::Off => phy.off()?,
            Action::On { signals } => phy.resume_from_off(&signal_set(signals))?,
            Action::UsableWidth { mode } => {
                let width_mhz = self
                    .manager
                    .usable_channel_width(phy, &WifiMode::new(mode.as_str()));
                self.bonding.push(BondingDecision {
                    at: phy.now(),
                    mode: mode.clone(),
                    width_mhz,
                });
            }
            Action::HeSigA {
                rssi_dbm,
                bss_color,
                own_bss_color,
                associated,
            } => {
                let Some(algorithm) = self.config.obss_pd else {
                    return Err(PhyError::Config("OBSS-PD is not configured".to_string()));
                };
                let params = HePreambleParameters {
                    rssi_dbm: *rssi_dbm,
                    bss_color: *bss_color,
                };
                let decision = algorithm.apply(phy, &params, *own_bss_color, *associated)?;
                self.obss_pd.push(ObssPdOutcome {
                    at: phy.now(),
                    decision,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_must_be_ordered() {
        let json = r#"{"steps":[{"at_us":10,"action":"sleep"},{"at_us":5,"action":"off"}]}"#;
        assert!(matches!(Scenario::from_json_str(json), Err(PhyError::Config(_))));
    }

    #[test]
    fn test_replay_stops_at_first_error() {
        let json = r#"{"steps":[
            {"at_us":0,"action":"sleep"},
            {"at_us":5,"action":"rx","duration_us":10},
            {"at_us":6,"action":"wake"}
        ]}"#;
        let report = Scenario::from_json_str(json).unwrap().run().unwrap();
        let error = report.error.unwrap();
        assert_eq!(error.step, 1);
        assert_eq!(report.final_state, PhyState::Sleep);
    }
}
