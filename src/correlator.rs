//! Log-to-capture correlation
//!
//! The log and the capture are two independent sequences. The correlator
//! walks them together: a single packet counter, starting at 1, advances
//! only when an event's description names a catalogued frame whose expected
//! length agrees with the captured frame at the counter. A spurious or
//! dropped frame therefore shifts every later correlation; this is not
//! corrected.

use crate::capture::PacketLengthIndex;
use crate::rules::FrameCatalog;
use serde::{Deserialize, Serialize};

/// Default ± window, in bytes, between expected and captured length
pub const DEFAULT_LENGTH_TOLERANCE: u32 = 2;

/// First sequence number of a capture
pub const FIRST_SEQUENCE_NUMBER: u32 = 1;

/// A frame attributed to an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketMatch {
    /// Captured length, not the catalog's nominal one
    pub frame_length: u32,
    pub protocol: String,
    pub operation: String,
    /// Sequence number of the frame that matched
    pub sequence_number: u32,
}

/// Outcome of correlating one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Matched(PacketMatch),
    /// Treated as idle for power purposes
    Unmatched,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched(_))
    }

    pub fn frame_length(&self) -> Option<u32> {
        match self {
            MatchResult::Matched(m) => Some(m.frame_length),
            MatchResult::Unmatched => None,
        }
    }

    pub fn protocol(&self) -> Option<&str> {
        match self {
            MatchResult::Matched(m) => Some(m.protocol.as_str()),
            MatchResult::Unmatched => None,
        }
    }

    pub fn operation(&self) -> Option<&str> {
        match self {
            MatchResult::Matched(m) => Some(m.operation.as_str()),
            MatchResult::Unmatched => None,
        }
    }
}

/// Sequential matcher between log events and captured frames
#[derive(Debug)]
pub struct PacketCorrelator<'a> {
    index: &'a PacketLengthIndex,
    catalog: &'a FrameCatalog,
    tolerance: u32,
    counter: u32,
    exhaustion_reported: bool,
}

impl<'a> PacketCorrelator<'a> {
    /// Create a correlator positioned at the first captured frame
    pub fn new(index: &'a PacketLengthIndex, catalog: &'a FrameCatalog, tolerance: u32) -> Self {
        Self {
            index,
            catalog,
            tolerance,
            counter: FIRST_SEQUENCE_NUMBER,
            exhaustion_reported: false,
        }
    }

    /// Sequence number the next event will be compared against
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// The counter is past the last captured frame
    pub fn is_exhausted(&self) -> bool {
        self.counter > self.index.last_sequence().unwrap_or(0)
    }

    /// Correlate the next event description
    pub fn correlate(&mut self, description: &str) -> MatchResult {
        let Some(observed) = self.index.length(self.counter) else {
            if self.is_exhausted() && !self.exhaustion_reported {
                log::warn!(
                    "Capture exhausted at packet {} ({} frames captured); remaining events fall back to idle power",
                    self.counter,
                    self.index.len()
                );
                self.exhaustion_reported = true;
            }
            return MatchResult::Unmatched;
        };

        match self.catalog.find(description, observed, self.tolerance) {
            Some(signature) => {
                let matched = PacketMatch {
                    frame_length: observed,
                    protocol: signature.protocol.clone(),
                    operation: signature.operation.clone(),
                    sequence_number: self.counter,
                };
                self.counter += 1;
                MatchResult::Matched(matched)
            }
            None => MatchResult::Unmatched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CapturedPacket;

    fn index(lengths: &[u32]) -> PacketLengthIndex {
        lengths
            .iter()
            .enumerate()
            .map(|(i, &len)| CapturedPacket::new(i as u32 + 1, len))
            .collect()
    }

    #[test]
    fn test_sequential_matching() {
        let index = index(&[20, 21]);
        let catalog = FrameCatalog::heart_rate_profile();
        let mut correlator = PacketCorrelator::new(&index, &catalog, DEFAULT_LENGTH_TOLERANCE);

        let first = correlator.correlate("BLE device is receiving service discovery request");
        assert_eq!(first.operation(), Some("Read By Group Type Request"));
        assert_eq!(first.frame_length(), Some(20));
        assert_eq!(correlator.counter(), 2);

        let second = correlator.correlate("BLE device is transmitting service discovery response");
        assert_eq!(second.operation(), Some("Read By Group Type Response"));
        assert_eq!(second.protocol(), Some("ATT"));
        assert_eq!(correlator.counter(), 3);
        assert!(correlator.is_exhausted());
    }

    #[test]
    fn test_counter_holds_on_miss() {
        let index = index(&[22]);
        let catalog = FrameCatalog::heart_rate_profile();
        let mut correlator = PacketCorrelator::new(&index, &catalog, DEFAULT_LENGTH_TOLERANCE);

        assert_eq!(correlator.correlate("Wake-up signal detected"), MatchResult::Unmatched);
        assert_eq!(correlator.counter(), 1);

        let m = correlator.correlate("Transmitting heart rate measurement notification");
        assert!(m.is_matched());
        assert_eq!(correlator.counter(), 2);
    }

    #[test]
    fn test_length_outside_tolerance() {
        let index = index(&[30]);
        let catalog = FrameCatalog::heart_rate_profile();
        let mut correlator = PacketCorrelator::new(&index, &catalog, DEFAULT_LENGTH_TOLERANCE);

        let m = correlator.correlate("Transmitting heart rate measurement notification");
        assert_eq!(m, MatchResult::Unmatched);
        assert_eq!(correlator.counter(), 1);
    }

    #[test]
    fn test_empty_capture() {
        let index = PacketLengthIndex::new();
        let catalog = FrameCatalog::heart_rate_profile();
        let mut correlator = PacketCorrelator::new(&index, &catalog, DEFAULT_LENGTH_TOLERANCE);

        for _ in 0..5 {
            assert!(!correlator.correlate("Transmitting advertising indication").is_matched());
        }
        assert_eq!(correlator.counter(), FIRST_SEQUENCE_NUMBER);
        assert!(correlator.is_exhausted());
    }

    #[test]
    fn test_gap_in_capture_is_a_miss() {
        let index: PacketLengthIndex = vec![CapturedPacket::new(2, 19)].into_iter().collect();
        let catalog = FrameCatalog::heart_rate_profile();
        let mut correlator = PacketCorrelator::new(&index, &catalog, DEFAULT_LENGTH_TOLERANCE);

        assert!(!correlator.correlate("Transmitting advertising indication").is_matched());
        assert!(!correlator.is_exhausted());
    }

    #[test]
    fn test_zero_tolerance() {
        let index = index(&[23]);
        let catalog = FrameCatalog::heart_rate_profile();
        let mut strict = PacketCorrelator::new(&index, &catalog, 0);
        assert!(!strict.correlate("heart rate measurement notification").is_matched());

        let mut loose = PacketCorrelator::new(&index, &catalog, 1);
        assert!(loose.correlate("heart rate measurement notification").is_matched());
    }
}
