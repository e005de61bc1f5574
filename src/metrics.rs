//! Run statistics
//!
//! Counts how much of a run was backed by captured frames. Every event that
//! fails to correlate is still accounted (at idle power), so a low match rate
//! means lower confidence in the BLE figures, not missing data.

use crate::correlator::MatchResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Correlation and parsing statistics for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Events taken from the log
    pub events_processed: u64,
    /// Non-blank log lines that were not events
    pub lines_skipped: u64,
    /// Events excluded from BLE accounting by a skip phrase
    pub events_excluded: u64,
    /// Events correlated to a captured frame
    pub matched: u64,
    /// Events that fell back to idle power
    pub unmatched: u64,
    /// Frames in the capture index
    pub frames_available: u64,
    /// Packet counter at the end of the run
    pub final_packet_counter: u32,
    /// Matched frames per dissector operation
    pub operation_distribution: HashMap<String, u64>,
}

impl RunMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a correlation result
    pub fn record_match(&mut self, result: &MatchResult) {
        match result.operation() {
            Some(operation) => {
                self.matched += 1;
                *self
                    .operation_distribution
                    .entry(operation.to_string())
                    .or_insert(0) += 1;
            }
            None => self.unmatched += 1,
        }
    }

    /// Share of correlated events that matched a frame (0.0 - 1.0)
    pub fn match_rate(&self) -> f64 {
        let total = self.matched + self.unmatched;
        if total == 0 {
            return 0.0;
        }
        self.matched as f64 / total as f64
    }

    /// Captured frames never attributed to an event
    pub fn frames_unused(&self) -> u64 {
        self.frames_available.saturating_sub(self.matched)
    }

    /// Most frequently matched operation
    pub fn most_matched_operation(&self) -> Option<&str> {
        self.operation_distribution
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(operation, _)| operation.as_str())
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a human-readable report
    pub fn report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Correlation Metrics ===\n\n");
        report.push_str(&format!("Events processed: {}\n", self.events_processed));
        report.push_str(&format!("Log lines skipped: {}\n", self.lines_skipped));
        if self.events_excluded > 0 {
            report.push_str(&format!("Events excluded: {}\n", self.events_excluded));
        }
        report.push_str(&format!(
            "Matched: {} / {} ({:.1}%)\n",
            self.matched,
            self.matched + self.unmatched,
            self.match_rate() * 100.0
        ));
        report.push_str(&format!(
            "Frames used: {} of {} (counter stopped at {})\n",
            self.matched, self.frames_available, self.final_packet_counter
        ));

        if !self.operation_distribution.is_empty() {
            report.push_str("\nOperations:\n");
            let mut operations: Vec<_> = self.operation_distribution.iter().collect();
            operations.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (operation, count) in operations {
                report.push_str(&format!("  {}: {}\n", operation, count));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::PacketMatch;

    fn matched(operation: &str) -> MatchResult {
        MatchResult::Matched(PacketMatch {
            frame_length: 20,
            protocol: "ATT".to_string(),
            operation: operation.to_string(),
            sequence_number: 1,
        })
    }

    #[test]
    fn test_match_rate() {
        let mut metrics = RunMetrics::new();
        metrics.record_match(&matched("Write Request"));
        metrics.record_match(&matched("Write Response"));
        metrics.record_match(&MatchResult::Unmatched);

        assert!((metrics.match_rate() - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_operation_distribution() {
        let mut metrics = RunMetrics::new();
        metrics.record_match(&matched("Handle Value Notification"));
        metrics.record_match(&matched("Handle Value Notification"));
        metrics.record_match(&matched("Write Request"));

        assert_eq!(metrics.most_matched_operation(), Some("Handle Value Notification"));
        assert_eq!(metrics.matched, 3);
    }

    #[test]
    fn test_frames_unused() {
        let mut metrics = RunMetrics::new();
        metrics.frames_available = 5;
        metrics.record_match(&matched("Write Request"));
        assert_eq!(metrics.frames_unused(), 4);
    }

    #[test]
    fn test_report_generation() {
        let mut metrics = RunMetrics::new();
        metrics.events_processed = 4;
        metrics.record_match(&matched("Read By Type Request"));
        metrics.record_match(&MatchResult::Unmatched);

        let report = metrics.report();
        assert!(report.contains("Matched: 1 / 2"));
        assert!(report.contains("Read By Type Request"));
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = RunMetrics::new();
        assert_eq!(metrics.match_rate(), 0.0);
        assert_eq!(metrics.most_matched_operation(), None);
        assert!(!metrics.report().contains("Operations"));
    }

    #[test]
    fn test_reset() {
        let mut metrics = RunMetrics::new();
        metrics.record_match(&matched("Write Request"));
        metrics.reset();
        assert_eq!(metrics.matched, 0);
        assert!(metrics.operation_distribution.is_empty());
    }
}
