//! Captured packet index
//!
//! Capture decoding happens outside this crate. Whatever reads the capture
//! hands over `(sequence number, frame length)` pairs, and the correlator
//! only ever asks "how long was frame N?".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One frame of the capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedPacket {
    /// 1-based position in the capture
    pub sequence_number: u32,
    /// Frame length in bytes
    pub frame_length: u32,
}

impl CapturedPacket {
    /// Create a new packet record
    pub fn new(sequence_number: u32, frame_length: u32) -> Self {
        Self {
            sequence_number,
            frame_length,
        }
    }

    /// Sequence numbers and lengths are both positive
    pub fn is_valid(&self) -> bool {
        self.sequence_number > 0 && self.frame_length > 0
    }
}

/// Lookup from sequence number to frame length
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketLengthIndex {
    lengths: BTreeMap<u32, u32>,
}

impl PacketLengthIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame. A later frame with the same sequence number replaces the
    /// earlier one. Returns false (and stores nothing) for zero-valued records.
    pub fn insert(&mut self, packet: CapturedPacket) -> bool {
        if !packet.is_valid() {
            log::warn!(
                "Ignoring captured packet with zero sequence number or length: {:?}",
                packet
            );
            return false;
        }
        self.lengths
            .insert(packet.sequence_number, packet.frame_length);
        true
    }

    /// Frame length at a sequence number
    pub fn length(&self, sequence_number: u32) -> Option<u32> {
        self.lengths.get(&sequence_number).copied()
    }

    /// Highest sequence number present
    pub fn last_sequence(&self) -> Option<u32> {
        self.lengths.keys().next_back().copied()
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    /// True when no frame was captured
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Frames in sequence order
    pub fn iter(&self) -> impl Iterator<Item = CapturedPacket> + '_ {
        self.lengths
            .iter()
            .map(|(&sequence_number, &frame_length)| CapturedPacket::new(sequence_number, frame_length))
    }
}

impl FromIterator<CapturedPacket> for PacketLengthIndex {
    fn from_iter<I: IntoIterator<Item = CapturedPacket>>(iter: I) -> Self {
        let mut index = Self::new();
        index.extend(iter);
        index
    }
}

impl Extend<CapturedPacket> for PacketLengthIndex {
    fn extend<I: IntoIterator<Item = CapturedPacket>>(&mut self, iter: I) {
        for packet in iter {
            self.insert(packet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let index: PacketLengthIndex = [(1, 19), (2, 39), (3, 20)]
            .into_iter()
            .map(|(n, len)| CapturedPacket::new(n, len))
            .collect();

        assert_eq!(index.len(), 3);
        assert_eq!(index.length(2), Some(39));
        assert_eq!(index.length(4), None);
        assert_eq!(index.last_sequence(), Some(3));
    }

    #[test]
    fn test_rejects_zero_records() {
        let mut index = PacketLengthIndex::new();
        assert!(!index.insert(CapturedPacket::new(0, 20)));
        assert!(!index.insert(CapturedPacket::new(1, 0)));
        assert!(index.is_empty());
        assert_eq!(index.last_sequence(), None);
    }

    #[test]
    fn test_duplicate_sequence_replaces() {
        let mut index = PacketLengthIndex::new();
        index.insert(CapturedPacket::new(5, 20));
        index.insert(CapturedPacket::new(5, 22));
        assert_eq!(index.len(), 1);
        assert_eq!(index.length(5), Some(22));
    }

    #[test]
    fn test_iter_is_ordered() {
        let index: PacketLengthIndex = vec![
            CapturedPacket::new(3, 14),
            CapturedPacket::new(1, 19),
            CapturedPacket::new(2, 39),
        ]
        .into_iter()
        .collect();

        let numbers: Vec<u32> = index.iter().map(|p| p.sequence_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
