// wurlink CLI - Capture index loading
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Loads a packet capture exported as CSV (one row per frame, as written by
//! the dissector's "Export Packet Dissections" command) into a
//! [`PacketLengthIndex`]. Only the frame number and length columns are read.

use crate::error::CliError;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};
use wurlink::{CapturedPacket, PacketLengthIndex};

/// Accepted headers of the frame number column.
const SEQUENCE_HEADERS: [&str; 3] = ["No.", "number", "No"];

/// Accepted headers of the frame length column.
const LENGTH_HEADERS: [&str; 2] = ["Length", "length"];

fn find_column(headers: &csv::ByteRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|field| {
        std::str::from_utf8(field)
            .map(|h| names.contains(&h.trim()))
            .unwrap_or(false)
    })
}

fn parse_field(record: &csv::ByteRecord, column: usize) -> Option<u32> {
    let field = record.get(column)?;
    std::str::from_utf8(field).ok()?.trim().parse().ok()
}

/// Load a capture index from a CSV file.
pub fn load_capture(path: &Path) -> Result<PacketLengthIndex, CliError> {
    let file = std::fs::File::open(path)?;
    let index = read_capture(file)?;
    debug!("Loaded {} frames from {}", index.len(), path.display());
    Ok(index)
}

/// Read a capture index from any CSV source.
pub fn read_capture<R: Read>(source: R) -> Result<PacketLengthIndex, CliError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);

    let headers = reader.byte_headers()?.clone();
    let sequence_column = find_column(&headers, &SEQUENCE_HEADERS).ok_or_else(|| {
        CliError::InvalidFormat("capture CSV has no 'No.' column".to_string())
    })?;
    let length_column = find_column(&headers, &LENGTH_HEADERS).ok_or_else(|| {
        CliError::InvalidFormat("capture CSV has no 'Length' column".to_string())
    })?;

    let mut index = PacketLengthIndex::new();
    for (row, record) in reader.byte_records().enumerate() {
        let record = record?;
        match (
            parse_field(&record, sequence_column),
            parse_field(&record, length_column),
        ) {
            (Some(sequence), Some(length)) => {
                index.insert(CapturedPacket::new(sequence, length));
            }
            _ => warn!("Skipping capture row {}: unreadable frame number or length", row + 2),
        }
    }

    Ok(index)
}
