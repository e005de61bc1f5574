//! Merged output table
//!
//! One row per distinct timestamp across the BLE and WuR series. When one
//! series has no sample at a row's timestamp the gap is filled according to
//! a [`FillPolicy`].

use crate::error::WurlinkError;
use crate::power::PowerSeries;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Header of the time column
pub const TIME_COLUMN: &str = "Time (s)";
/// Header of the BLE column
pub const BLE_COLUMN: &str = "BLE Power (mA)";
/// Header of the WuR column
pub const WUR_COLUMN: &str = "WuR Power (µA)";

/// How a missing sample is filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillPolicy {
    /// Repeat the last known value of that column (0 before the first one)
    CarryForward,
    /// Write zero
    Zero,
}

impl FillPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillPolicy::CarryForward => "carry-forward",
            FillPolicy::Zero => "zero",
        }
    }
}

impl fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FillPolicy {
    type Err = WurlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "carry-forward" | "carry" => Ok(FillPolicy::CarryForward),
            "zero" => Ok(FillPolicy::Zero),
            other => Err(WurlinkError::InvalidConfig(format!(
                "unknown fill policy '{other}' (expected carry-forward or zero)"
            ))),
        }
    }
}

/// One output row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineRow {
    pub time: f64,
    pub ble_power: f64,
    pub wur_power: f64,
}

/// Column filler for one series
struct Filler<'a> {
    series: Option<&'a PowerSeries>,
    policy: FillPolicy,
    last: f64,
}

impl Filler<'_> {
    fn value_at(&mut self, time: f64) -> f64 {
        match self.series.and_then(|s| s.get(time)) {
            Some(value) => {
                self.last = value;
                value
            }
            None => match self.policy {
                FillPolicy::CarryForward => self.last,
                FillPolicy::Zero => 0.0,
            },
        }
    }
}

/// Sorted table of merged samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    rows: Vec<TimelineRow>,
}

impl Timeline {
    /// Merge the BLE series with an optional WuR series
    pub fn merge(ble: &PowerSeries, wur: Option<&PowerSeries>, policy: FillPolicy) -> Self {
        let mut times: Vec<f64> = ble.timestamps();
        if let Some(wur) = wur {
            times.extend(wur.iter().map(|s| s.timestamp));
        }
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();

        let mut ble_column = Filler {
            series: Some(ble),
            policy,
            last: 0.0,
        };
        let mut wur_column = Filler {
            series: wur,
            policy,
            last: 0.0,
        };

        let rows = times
            .into_iter()
            .map(|time| TimelineRow {
                time,
                ble_power: ble_column.value_at(time),
                wur_power: wur_column.value_at(time),
            })
            .collect();

        Self { rows }
    }

    /// Rebuild a table from rows already in time order
    pub fn from_rows(rows: Vec<TimelineRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[TimelineRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Time column
    pub fn times(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.time).collect()
    }

    /// BLE column
    pub fn ble_powers(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.ble_power).collect()
    }
}
