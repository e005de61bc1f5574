// wurlink - Wake-up radio link power analysis
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Scenario comparison
//!
//! Integrates the BLE power column of several scenario runs into cumulative
//! energy and reports the final value per scenario. Each step uses the
//! power at the *end* of the interval:
//!
//! ```text
//! energy[0] = 0
//! energy[i] = energy[i-1] + (power[i] / unit_scale × V) × (t[i] - t[i-1])
//! ```
//!
//! Timestamps must already be ascending; nothing is re-sorted here.

use crate::error::{Result, WurlinkError};
use crate::timeline::Timeline;
use serde::{Deserialize, Serialize};

/// Supply voltage assumed by the comparison
pub const DEFAULT_COMPARISON_VOLTAGE: f64 = 3.3;

/// Power column is in milliunits
pub const DEFAULT_UNIT_SCALE: f64 = 1000.0;

/// Comparison settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparatorConfig {
    pub voltage: f64,
    pub unit_scale: f64,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            voltage: DEFAULT_COMPARISON_VOLTAGE,
            unit_scale: DEFAULT_UNIT_SCALE,
        }
    }
}

/// A named `(time, power)` series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSeries {
    pub name: String,
    pub times: Vec<f64>,
    pub powers: Vec<f64>,
}

impl ScenarioSeries {
    /// Build a series, checking both columns have the same length
    pub fn new(name: impl Into<String>, times: Vec<f64>, powers: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if times.len() != powers.len() {
            return Err(WurlinkError::SeriesLengthMismatch {
                name,
                times: times.len(),
                powers: powers.len(),
            });
        }
        Ok(Self {
            name,
            times,
            powers,
        })
    }

    /// BLE column of an output table
    pub fn from_timeline(name: impl Into<String>, timeline: &Timeline) -> Self {
        Self {
            name: name.into(),
            times: timeline.times(),
            powers: timeline.ble_powers(),
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Cumulative energy of one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeEnergy {
    pub name: String,
    pub times: Vec<f64>,
    pub energy: Vec<f64>,
}

impl CumulativeEnergy {
    /// Final cumulative value (0 for an empty series)
    pub fn total(&self) -> f64 {
        self.energy.last().copied().unwrap_or(0.0)
    }
}

/// Integrate a power series into cumulative energy
pub fn cumulative_energy(times: &[f64], powers: &[f64], config: &ComparatorConfig) -> Vec<f64> {
    let mut energy = Vec::with_capacity(times.len());
    if times.is_empty() {
        return energy;
    }

    let mut total = 0.0;
    energy.push(total);
    for i in 1..times.len().min(powers.len()) {
        let interval = times[i] - times[i - 1];
        let watts = powers[i] / config.unit_scale * config.voltage;
        total += watts * interval;
        energy.push(total);
    }
    energy
}

/// Result of comparing several scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    results: Vec<CumulativeEnergy>,
}

impl Comparison {
    /// Per-scenario curves in insertion order
    pub fn results(&self) -> &[CumulativeEnergy] {
        &self.results
    }

    /// `(name, total)` in insertion order
    pub fn totals(&self) -> Vec<(&str, f64)> {
        self.results
            .iter()
            .map(|r| (r.name.as_str(), r.total()))
            .collect()
    }

    /// `(name, total)`, cheapest scenario first
    pub fn ranking(&self) -> Vec<(&str, f64)> {
        let mut totals = self.totals();
        totals.sort_by(|a, b| a.1.total_cmp(&b.1));
        totals
    }

    /// Human-readable summary
    pub fn report(&self) -> String {
        let mut report = String::new();
        for (name, total) in self.totals() {
            report.push_str(&format!("Total Cumulative Energy for {}: {:.6} J\n", name, total));
        }
        if let Some((best, _)) = self.ranking().first() {
            report.push_str(&format!("Lowest energy: {}\n", best));
        }
        report
    }
}

/// Compares the cumulative energy of scenario runs
#[derive(Debug, Clone, Default)]
pub struct ScenarioComparator {
    config: ComparatorConfig,
    series: Vec<ScenarioSeries>,
}

impl ScenarioComparator {
    /// Create a comparator with default voltage and scale
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a comparator with custom settings
    pub fn with_config(config: ComparatorConfig) -> Self {
        Self {
            config,
            series: Vec::new(),
        }
    }

    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Add a scenario to the comparison
    pub fn add_series(&mut self, series: ScenarioSeries) {
        if series.times.windows(2).any(|w| w[1] <= w[0]) {
            log::warn!(
                "Series '{}' is not strictly ascending; cumulative energy may decrease",
                series.name
            );
        }
        self.series.push(series);
    }

    /// Number of scenarios added
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Integrate every series
    pub fn compare(&self) -> Comparison {
        let results = self
            .series
            .iter()
            .map(|s| CumulativeEnergy {
                name: s.name.clone(),
                times: s.times.clone(),
                energy: cumulative_energy(&s.times, &s.powers, &self.config),
            })
            .collect();
        Comparison { results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cumulative_energy() {
        let config = ComparatorConfig::default();
        let energy = cumulative_energy(&[0.0, 2.0, 5.0], &[9.0, 1.0, 2.0], &config);

        assert_eq!(energy.len(), 3);
        assert_eq!(energy[0], 0.0);
        // power[0] never contributes
        assert_relative_eq!(energy[1], 1.0 / 1000.0 * 3.3 * 2.0, epsilon = 1e-12);
        assert_relative_eq!(energy[2], energy[1] + 2.0 / 1000.0 * 3.3 * 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_series() {
        let config = ComparatorConfig::default();
        assert!(cumulative_energy(&[], &[], &config).is_empty());

        let mut comparator = ScenarioComparator::new();
        comparator.add_series(ScenarioSeries::new("empty", vec![], vec![]).unwrap());
        assert_eq!(comparator.compare().totals(), vec![("empty", 0.0)]);
    }

    #[test]
    fn test_length_mismatch() {
        let err = ScenarioSeries::new("bad", vec![0.0, 1.0], vec![1.0]).unwrap_err();
        assert!(matches!(err, WurlinkError::SeriesLengthMismatch { times: 2, powers: 1, .. }));
    }

    #[test]
    fn test_zero_series_are_equal() {
        let mut comparator = ScenarioComparator::new();
        for name in ["always-on-wur", "duty-cycled-wur", "duty-cycled-ble"] {
            let times: Vec<f64> = (0..10).map(f64::from).collect();
            comparator.add_series(ScenarioSeries::new(name, times, vec![0.0; 10]).unwrap());
        }
        let comparison = comparator.compare();
        let totals = comparison.totals();
        assert_eq!(totals.len(), 3);
        assert!(totals.iter().all(|(_, total)| *total == 0.0));
    }

    #[test]
    fn test_ranking() {
        let mut comparator = ScenarioComparator::with_config(ComparatorConfig {
            voltage: 3.0,
            unit_scale: 1.0,
        });
        comparator.add_series(ScenarioSeries::new("high", vec![0.0, 1.0], vec![0.0, 2.0]).unwrap());
        comparator.add_series(ScenarioSeries::new("low", vec![0.0, 1.0], vec![0.0, 1.0]).unwrap());

        let comparison = comparator.compare();
        assert_eq!(comparison.ranking()[0].0, "low");
        assert_relative_eq!(comparison.ranking()[1].1, 6.0);
        assert!(comparison.report().contains("Lowest energy: low"));
    }
}
