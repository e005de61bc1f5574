// wurlink - Wake-up radio link power analysis
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Power accounting
//!
//! Turns correlated events into an instantaneous BLE power sample per event,
//! a wake-up radio current sample per event, and aggregate totals built from
//! the tracker's durations and sleep record.
//!
//! Idle samples are a flat `ble_idle × V` per event, independent of how long
//! the radio actually idled, while transmit/receive samples scale with the
//! captured frame length.

use crate::correlator::MatchResult;
use crate::event::LogEvent;
use crate::rules::phrases;
use crate::tracker::{LinkDurations, RadioState, TrackerSummary, WurDurations};
use serde::{Deserialize, Serialize};

/// Microamps per amp, used for the WuR series and console figures
pub const MICRO: f64 = 1e6;

/// Milliamps per amp, used for the BLE console figure
pub const MILLI: f64 = 1e3;

/// Current draw per radio state, in amperes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerParams {
    pub wur_active: f64,
    pub wur_listen: f64,
    pub wur_sleep: f64,
    pub transmit: f64,
    pub receive: f64,
    /// Also used for BLE sleep
    pub ble_idle: f64,
}

impl Default for PowerParams {
    fn default() -> Self {
        Self {
            wur_active: 5.3e-6,
            wur_listen: 2.7e-6,
            wur_sleep: 0.4e-6,
            transmit: 3.4e-3,
            receive: 3.7e-3,
            ble_idle: 1.5e-6,
        }
    }
}

impl PowerParams {
    /// Draw of the wake-up radio in a state
    pub fn wur_current(&self, state: RadioState) -> f64 {
        match state {
            RadioState::Listening => self.wur_listen,
            RadioState::Active => self.wur_active,
            RadioState::Sleeping => self.wur_sleep,
        }
    }

    /// All six constants are finite and non-negative
    pub fn is_valid(&self) -> bool {
        [
            self.wur_active,
            self.wur_listen,
            self.wur_sleep,
            self.transmit,
            self.receive,
            self.ble_idle,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Electrical setting of the link
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkBudget {
    /// Volts
    pub operating_voltage: f64,
    /// BLE channels used per exchange
    pub channel_count: u32,
    /// Seconds over which a frame's energy is spread
    pub comm_window: f64,
}

impl Default for LinkBudget {
    fn default() -> Self {
        Self {
            operating_voltage: 3.0,
            channel_count: 7,
            comm_window: 10.0,
        }
    }
}

/// How BLE sleep energy is computed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum SleepAccounting {
    /// From the tracker's explicit sleep spans
    Spans,
    /// A fixed duration per counted sleep phase
    ///
    /// Charged as `phases × seconds × ble_idle × V`, the same per-second
    /// rate as [`SleepAccounting::Spans`]. The duty-cycled BLE firmware's own
    /// report leaves out the operating voltage, so its sleep figure is
    /// smaller than this one by a factor of V (3× at the default 3.0 V).
    FixedDuration { seconds: f64 },
}

/// One point of a power series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSample {
    pub timestamp: f64,
    pub power: f64,
}

/// Power samples keyed by timestamp
///
/// Samples stay sorted; inserting at an existing timestamp replaces the
/// earlier value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerSeries {
    samples: Vec<PowerSample>,
}

impl PowerSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the sample at `timestamp`
    pub fn insert(&mut self, timestamp: f64, power: f64) {
        match self.position(timestamp) {
            Ok(i) => self.samples[i].power = power,
            Err(i) => self.samples.insert(i, PowerSample { timestamp, power }),
        }
    }

    /// Sample at exactly `timestamp`
    pub fn get(&self, timestamp: f64) -> Option<f64> {
        self.position(timestamp).ok().map(|i| self.samples[i].power)
    }

    fn position(&self, timestamp: f64) -> Result<usize, usize> {
        self.samples
            .binary_search_by(|s| s.timestamp.total_cmp(&timestamp))
    }

    pub fn samples(&self) -> &[PowerSample] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &PowerSample> {
        self.samples.iter()
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn powers(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.power).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Aggregate results of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTotals {
    /// Σ(state duration × state current) × V; `None` without a wake-up radio
    pub wur_energy: Option<f64>,
    /// Σ of every per-event BLE sample, including overwritten ones
    pub ble_energy: f64,
    pub ble_sleep_energy: f64,
    pub sleep_phases: u32,
    pub wur_durations: Option<WurDurations>,
    pub link_durations: LinkDurations,
}

impl ScenarioTotals {
    /// Console summary in the customary units
    pub fn report(&self) -> String {
        let mut report = String::new();
        if let Some(wur) = self.wur_energy {
            report.push_str(&format!(
                "Total Power Consumption (WuR): {:.2} µA\n",
                wur * MICRO
            ));
        }
        report.push_str(&format!(
            "Total Power Consumption (BLE): {:.3} mA\n",
            self.ble_energy * MILLI
        ));
        report.push_str(&format!(
            "Total Power Consumption (BLE Sleep): {:.2} µA\n",
            self.ble_sleep_energy * MICRO
        ));
        report.push_str(&format!("Number of sleep phases: {}\n", self.sleep_phases));
        report
    }
}

/// Everything the accountant produced for one run
#[derive(Debug, Clone, PartialEq)]
pub struct AccountedRun {
    pub totals: ScenarioTotals,
    pub ble_power: PowerSeries,
    /// Microamps; `None` without a wake-up radio
    pub wur_power: Option<PowerSeries>,
    /// Only events that matched a captured frame
    pub per_packet_power: PowerSeries,
}

/// Converts events into power samples and totals
#[derive(Debug, Clone)]
pub struct PowerAccountant {
    params: PowerParams,
    budget: LinkBudget,
    ble_power: PowerSeries,
    wur_power: Option<PowerSeries>,
    per_packet_power: PowerSeries,
    ble_energy: f64,
}

impl PowerAccountant {
    /// Create an accountant; `track_wur` enables the WuR series
    pub fn new(params: PowerParams, budget: LinkBudget, track_wur: bool) -> Self {
        Self {
            params,
            budget,
            ble_power: PowerSeries::new(),
            wur_power: track_wur.then(PowerSeries::new),
            per_packet_power: PowerSeries::new(),
            ble_energy: 0.0,
        }
    }

    fn frame_power(&self, current: f64, frame_length: u32) -> f64 {
        current
            * f64::from(frame_length)
            * f64::from(self.budget.channel_count)
            * self.budget.operating_voltage
            / self.budget.comm_window
    }

    /// Power of transmitting a frame of `frame_length` bytes
    pub fn transmit_power(&self, frame_length: u32) -> f64 {
        self.frame_power(self.params.transmit, frame_length)
    }

    /// Power of receiving a frame of `frame_length` bytes
    pub fn receive_power(&self, frame_length: u32) -> f64 {
        self.frame_power(self.params.receive, frame_length)
    }

    /// Flat per-event idle draw
    pub fn idle_power(&self) -> f64 {
        self.params.ble_idle * self.budget.operating_voltage
    }

    /// BLE sample for an event and its correlation result
    pub fn ble_sample(&self, description: &str, result: &MatchResult) -> f64 {
        match result.frame_length() {
            Some(len) if description.contains(phrases::TRANSMITTING) => self.transmit_power(len),
            Some(len) if description.contains(phrases::RECEIVING) => self.receive_power(len),
            _ => self.idle_power(),
        }
    }

    /// Record the BLE sample of an event; returns the sample
    pub fn record_ble(&mut self, event: &LogEvent, result: &MatchResult) -> f64 {
        let power = self.ble_sample(&event.description, result);
        self.ble_energy += power;
        self.ble_power.insert(event.timestamp, power);
        if result.is_matched() {
            self.per_packet_power.insert(event.timestamp, power);
        }
        power
    }

    /// Record the WuR current (µA) in effect after an event
    pub fn record_wur(&mut self, timestamp: f64, state: RadioState) {
        let current = self.params.wur_current(state) * MICRO;
        if let Some(series) = self.wur_power.as_mut() {
            series.insert(timestamp, current);
        }
    }

    fn wur_energy(&self, durations: &WurDurations) -> f64 {
        (durations.active * self.params.wur_active
            + durations.listening * self.params.wur_listen
            + durations.sleeping * self.params.wur_sleep)
            * self.budget.operating_voltage
    }

    fn sleep_energy(&self, summary: &TrackerSummary, accounting: SleepAccounting) -> (f64, u32) {
        let per_second = self.params.ble_idle * self.budget.operating_voltage;
        match accounting {
            SleepAccounting::Spans => {
                let seconds: f64 = summary.sleep_spans.iter().map(|s| s.duration()).sum();
                (seconds * per_second, summary.sleep_spans.len() as u32)
            }
            SleepAccounting::FixedDuration { seconds } => (
                f64::from(summary.sleep_phases) * seconds * per_second,
                summary.sleep_phases,
            ),
        }
    }

    /// Combine the per-event series with the tracker's totals
    pub fn finish(self, summary: &TrackerSummary, accounting: SleepAccounting) -> AccountedRun {
        let wur_energy = summary.wur_durations.as_ref().map(|d| self.wur_energy(d));
        let (ble_sleep_energy, sleep_phases) = self.sleep_energy(summary, accounting);

        AccountedRun {
            totals: ScenarioTotals {
                wur_energy,
                ble_energy: self.ble_energy,
                ble_sleep_energy,
                sleep_phases,
                wur_durations: summary.wur_durations,
                link_durations: summary.link_durations,
            },
            ble_power: self.ble_power,
            wur_power: self.wur_power,
            per_packet_power: self.per_packet_power,
        }
    }
}
