// wurlink - Wake-up radio link power analysis
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Scenarios and the power engine
//!
//! The three firmware variants differ only in their phrase tables, initial
//! radio states, time format and sleep accounting. Each is a preset
//! [`ScenarioConfig`]; [`PowerEngine`] runs any of them through the same
//! read → track/correlate → account pipeline.

use crate::capture::PacketLengthIndex;
use crate::comparator::ScenarioSeries;
use crate::correlator::{PacketCorrelator, DEFAULT_LENGTH_TOLERANCE};
use crate::error::{Result, WurlinkError};
use crate::event::{EventLog, LogEvent, TimeFormat};
use crate::metrics::RunMetrics;
use crate::power::{LinkBudget, PowerAccountant, PowerParams, PowerSeries, ScenarioTotals, SleepAccounting};
use crate::rules::{phrases, FrameCatalog, LinkAction, RuleTable, WurAction};
use crate::timeline::{FillPolicy, Timeline};
use crate::tracker::{DurationAttribution, InitialStates, RadioState, SleepSpan, StateTracker, TrackerRules};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Fixed length of one duty-cycled BLE sleep phase, in seconds
pub const DEFAULT_SLEEP_DURATION: f64 = 10.0;

/// Operating strategy of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Wake-up radio listens continuously, BLE sleeps until woken
    AlwaysOnWur,
    /// Wake-up radio alternates listening windows and sleep
    DutyCycledWur,
    /// No wake-up radio; BLE wakes on a fixed schedule
    DutyCycledBle,
}

impl Scenario {
    /// All scenarios, in comparison order
    pub const ALL: [Scenario; 3] = [
        Scenario::AlwaysOnWur,
        Scenario::DutyCycledWur,
        Scenario::DutyCycledBle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::AlwaysOnWur => "always-on-wur",
            Scenario::DutyCycledWur => "duty-cycled-wur",
            Scenario::DutyCycledBle => "duty-cycled-ble",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Scenario::AlwaysOnWur => "Always-On WUR",
            Scenario::DutyCycledWur => "Duty-Cycled WUR",
            Scenario::DutyCycledBle => "Duty-Cycled BLE",
        }
    }

    /// Preset configuration for this scenario
    pub fn config(self) -> ScenarioConfig {
        match self {
            Scenario::AlwaysOnWur => ScenarioConfig::always_on_wur(),
            Scenario::DutyCycledWur => ScenarioConfig::duty_cycled_wur(),
            Scenario::DutyCycledBle => ScenarioConfig::duty_cycled_ble(),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = WurlinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "always-on-wur" | "aow" => Ok(Scenario::AlwaysOnWur),
            "duty-cycled-wur" | "dcw" => Ok(Scenario::DutyCycledWur),
            "duty-cycled-ble" | "dcb" => Ok(Scenario::DutyCycledBle),
            other => Err(WurlinkError::InvalidConfig(format!(
                "unknown scenario '{other}'"
            ))),
        }
    }
}

/// Complete description of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub scenario: Scenario,
    pub time_format: TimeFormat,
    pub budget: LinkBudget,
    pub params: PowerParams,
    /// ± bytes between expected and captured frame length
    pub length_tolerance: u32,
    pub initial: InitialStates,
    pub rules: TrackerRules,
    pub catalog: FrameCatalog,
    /// Events containing one of these phrases get no BLE sample and are not
    /// correlated
    pub skip_phrases: Vec<String>,
    pub sleep_accounting: SleepAccounting,
    /// Gap fill policy of the output table
    pub fill_policy: FillPolicy,
}

impl ScenarioConfig {
    /// Always-on wake-up radio
    pub fn always_on_wur() -> Self {
        Self {
            scenario: Scenario::AlwaysOnWur,
            time_format: TimeFormat::Integer,
            budget: LinkBudget::default(),
            params: PowerParams::default(),
            length_tolerance: DEFAULT_LENGTH_TOLERANCE,
            initial: InitialStates {
                wur: RadioState::Listening,
                ble_asleep: true,
                sleep_start: 0.0,
            },
            rules: TrackerRules {
                wur: Some(
                    RuleTable::new()
                        .with_rule(phrases::WUR_CHECKING, WurAction::Enter(RadioState::Listening))
                        .with_rule(
                            phrases::BLE_AWAKE_COMMUNICATING,
                            WurAction::Enter(RadioState::Sleeping),
                        )
                        .with_rule(
                            phrases::WUR_SIGNAL_DETECTED,
                            WurAction::Enter(RadioState::Active),
                        ),
                ),
                // BLE goes back to sleep as soon as the WuR resumes listening
                link: RuleTable::new()
                    .with_rule(phrases::WUR_CHECKING, LinkAction::Sleep)
                    .with_rule(phrases::BLE_AWAKE_COMMUNICATING, LinkAction::Wake),
                attribution: DurationAttribution::PreviousEvent,
                sleep_phase_phrase: None,
            },
            catalog: FrameCatalog::heart_rate_profile(),
            skip_phrases: Vec::new(),
            sleep_accounting: SleepAccounting::Spans,
            fill_policy: FillPolicy::Zero,
        }
    }

    /// Duty-cycled wake-up radio
    pub fn duty_cycled_wur() -> Self {
        Self {
            scenario: Scenario::DutyCycledWur,
            rules: TrackerRules {
                wur: Some(
                    RuleTable::new()
                        .with_rule(
                            phrases::WUR_AWAKE_CHECKING,
                            WurAction::Enter(RadioState::Listening),
                        )
                        .with_rule(phrases::WUR_NO_SIGNAL, WurAction::Hold)
                        .with_rule(
                            phrases::WUR_BACK_TO_SLEEP,
                            WurAction::Enter(RadioState::Sleeping),
                        )
                        .with_rule(
                            phrases::BLE_AWAKE_COMMUNICATING,
                            WurAction::Enter(RadioState::Sleeping),
                        )
                        .with_rule(
                            phrases::WUR_SIGNAL_DETECTED,
                            WurAction::Enter(RadioState::Active),
                        ),
                ),
                // Every "back to sleep" restarts the span, even while asleep
                link: RuleTable::new()
                    .with_rule(phrases::BLE_AWAKE, LinkAction::Wake)
                    .with_rule(phrases::BLE_BACK_TO_SLEEP, LinkAction::RestartSleep),
                attribution: DurationAttribution::PreviousEvent,
                sleep_phase_phrase: None,
            },
            fill_policy: FillPolicy::CarryForward,
            ..Self::always_on_wur()
        }
    }

    /// Duty-cycled BLE without a wake-up radio
    pub fn duty_cycled_ble() -> Self {
        Self {
            scenario: Scenario::DutyCycledBle,
            time_format: TimeFormat::Real,
            // The link starts awake; sleep is counted in fixed phases
            initial: InitialStates {
                wur: RadioState::Sleeping,
                ble_asleep: false,
                sleep_start: 0.0,
            },
            rules: TrackerRules {
                wur: None,
                link: RuleTable::new(),
                attribution: DurationAttribution::CurrentEvent,
                sleep_phase_phrase: Some(phrases::BLE_SLEEP_AFTER_NOTIFICATION.to_string()),
            },
            catalog: FrameCatalog::heart_rate_profile_with_advertising("advertisement indication"),
            skip_phrases: vec![phrases::BLE_WAKING_FOR_NOTIFICATION.to_string()],
            sleep_accounting: SleepAccounting::FixedDuration {
                seconds: DEFAULT_SLEEP_DURATION,
            },
            fill_policy: FillPolicy::Zero,
            ..Self::always_on_wur()
        }
    }

    /// Check every numeric setting is usable
    pub fn validate(&self) -> Result<()> {
        let budget = &self.budget;
        if !(budget.operating_voltage.is_finite() && budget.operating_voltage > 0.0) {
            return Err(WurlinkError::InvalidConfig(format!(
                "operating voltage must be positive, got {}",
                budget.operating_voltage
            )));
        }
        if !(budget.comm_window.is_finite() && budget.comm_window > 0.0) {
            return Err(WurlinkError::InvalidConfig(format!(
                "communication window must be positive, got {}",
                budget.comm_window
            )));
        }
        if budget.channel_count == 0 {
            return Err(WurlinkError::InvalidConfig(
                "channel count must be at least 1".to_string(),
            ));
        }
        if !self.params.is_valid() {
            return Err(WurlinkError::InvalidConfig(
                "current draw constants must be finite and non-negative".to_string(),
            ));
        }
        if let SleepAccounting::FixedDuration { seconds } = self.sleep_accounting {
            if !(seconds.is_finite() && seconds >= 0.0) {
                return Err(WurlinkError::InvalidConfig(format!(
                    "sleep duration must be non-negative, got {seconds}"
                )));
            }
        }
        if !(self.initial.sleep_start.is_finite() && self.initial.sleep_start >= 0.0) {
            return Err(WurlinkError::InvalidConfig(format!(
                "initial sleep start must be non-negative, got {}",
                self.initial.sleep_start
            )));
        }
        Ok(())
    }

    /// Seconds per sleep phase, when sleep is counted in fixed phases
    pub fn sleep_duration(&self) -> Option<f64> {
        match self.sleep_accounting {
            SleepAccounting::FixedDuration { seconds } => Some(seconds),
            SleepAccounting::Spans => None,
        }
    }

    /// Override the fixed sleep-phase length; ignored for span accounting
    pub fn set_sleep_duration(&mut self, seconds: f64) {
        if let SleepAccounting::FixedDuration { seconds: current } = &mut self.sleep_accounting {
            *current = seconds;
        }
    }

    fn is_excluded(&self, event: &LogEvent) -> bool {
        self.skip_phrases.iter().any(|phrase| event.contains(phrase))
    }
}

/// Output of one engine run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub totals: ScenarioTotals,
    pub ble_power: PowerSeries,
    /// Microamps; `None` without a wake-up radio
    pub wur_power: Option<PowerSeries>,
    pub per_packet_power: PowerSeries,
    pub sleep_spans: Vec<SleepSpan>,
    pub elapsed: f64,
    pub metrics: RunMetrics,
}

impl ScenarioReport {
    /// Merged output table
    pub fn timeline(&self, policy: FillPolicy) -> Timeline {
        Timeline::merge(&self.ble_power, self.wur_power.as_ref(), policy)
    }

    /// BLE column as a comparison input
    pub fn comparison_series(&self, policy: FillPolicy) -> ScenarioSeries {
        ScenarioSeries::from_timeline(self.scenario.label(), &self.timeline(policy))
    }

    /// Console summary
    pub fn summary(&self) -> String {
        self.totals.report()
    }
}

/// Runs a scenario over an event log and a capture index
#[derive(Debug, Clone)]
pub struct PowerEngine {
    config: ScenarioConfig,
}

impl PowerEngine {
    /// Create an engine, rejecting unusable configurations
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Engine with a preset configuration
    pub fn for_scenario(scenario: Scenario) -> Self {
        Self {
            config: scenario.config(),
        }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Read a log file using this scenario's time format
    pub fn read_log(&self, path: impl AsRef<Path>) -> Result<EventLog> {
        EventLog::from_path(path, self.config.time_format)
    }

    /// Read a log file and run it
    pub fn run_path(&self, path: impl AsRef<Path>, index: &PacketLengthIndex) -> Result<ScenarioReport> {
        let log = self.read_log(path)?;
        Ok(self.run(&log, index))
    }

    /// Process every event in order. Correlation misses degrade to idle
    /// power; nothing here fails.
    pub fn run(&self, log: &EventLog, index: &PacketLengthIndex) -> ScenarioReport {
        let config = &self.config;
        let mut tracker = StateTracker::new(config.rules.clone(), config.initial);
        let mut correlator = PacketCorrelator::new(index, &config.catalog, config.length_tolerance);
        let mut accountant =
            PowerAccountant::new(config.params, config.budget, config.rules.wur.is_some());

        let mut metrics = RunMetrics::new();
        metrics.lines_skipped = log.skipped_lines() as u64;
        metrics.frames_available = index.len() as u64;

        for event in log.events() {
            metrics.events_processed += 1;

            let step = tracker.observe(event);
            if let Some(state) = step.wur_state {
                accountant.record_wur(event.timestamp, state);
            }

            if config.is_excluded(event) {
                metrics.events_excluded += 1;
                continue;
            }

            let result = correlator.correlate(&event.description);
            if !result.is_matched() {
                log::debug!(
                    "No frame for event at {}s ({:?}), counted at idle power",
                    event.timestamp,
                    event.description
                );
            }
            metrics.record_match(&result);
            accountant.record_ble(event, &result);
        }
        metrics.final_packet_counter = correlator.counter();

        let summary = tracker.finish();
        let run = accountant.finish(&summary, config.sleep_accounting);

        log::info!(
            "{}: {} events, {}/{} correlated, {} sleep phases",
            config.scenario,
            metrics.events_processed,
            metrics.matched,
            metrics.matched + metrics.unmatched,
            run.totals.sleep_phases
        );

        ScenarioReport {
            scenario: config.scenario,
            totals: run.totals,
            ble_power: run.ble_power,
            wur_power: run.wur_power,
            per_packet_power: run.per_packet_power,
            sleep_spans: summary.sleep_spans,
            elapsed: summary.elapsed,
            metrics,
        }
    }
}
