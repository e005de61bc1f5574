// wurlink CLI - Output tables
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! CSV output of the merged power table and the comparison curves, and
//! reading a power table back as a comparison input.

use crate::error::CliError;
use std::io::{Read, Write};
use std::path::Path;
use wurlink::timeline::{BLE_COLUMN, TIME_COLUMN, WUR_COLUMN};
use wurlink::{Comparison, PowerSeries, ScenarioSeries, Timeline};

/// Header of the cumulative energy column.
pub const ENERGY_COLUMN: &str = "Cumulative Energy (J)";

/// Header of the per-packet power column.
pub const PER_PACKET_COLUMN: &str = "Power Per Packet (mA)";

/// Write the merged table: BLE column with 6 decimals, WuR with 2.
pub fn write_timeline<W: Write>(writer: W, timeline: &Timeline) -> Result<(), CliError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record([TIME_COLUMN, BLE_COLUMN, WUR_COLUMN])?;
    for row in timeline.rows() {
        writer.write_record([
            row.time.to_string(),
            format!("{:.6}", row.ble_power),
            format!("{:.2}", row.wur_power),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the merged table to a file.
pub fn save_timeline(path: &Path, timeline: &Timeline) -> Result<(), CliError> {
    let file = std::fs::File::create(path)?;
    write_timeline(file, timeline)
}

/// Write the samples of matched events only.
pub fn save_per_packet(path: &Path, series: &PowerSeries) -> Result<(), CliError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([TIME_COLUMN, PER_PACKET_COLUMN])?;
    for sample in series.iter() {
        writer.write_record([sample.timestamp.to_string(), format!("{:.6}", sample.power)])?;
    }
    writer.flush()?;
    Ok(())
}

/// Read the time and BLE columns of a power table.
///
/// Headers are compared as bytes so a table written with a non-UTF-8
/// encoding of the WuR header still loads.
pub fn read_series<R: Read>(name: &str, source: R) -> Result<ScenarioSeries, CliError> {
    let mut reader = csv::Reader::from_reader(source);
    let headers = reader.byte_headers()?.clone();

    let column = |wanted: &str| {
        headers
            .iter()
            .position(|h| h == wanted.as_bytes())
            .ok_or_else(|| CliError::InvalidFormat(format!("'{name}' has no '{wanted}' column")))
    };
    let time_column = column(TIME_COLUMN)?;
    let ble_column = column(BLE_COLUMN)?;

    let mut times = Vec::new();
    let mut powers = Vec::new();
    for (row, record) in reader.byte_records().enumerate() {
        let record = record?;
        let value = |col: usize| -> Result<f64, CliError> {
            record
                .get(col)
                .and_then(|f| std::str::from_utf8(f).ok())
                .and_then(|f| f.trim().parse().ok())
                .ok_or_else(|| {
                    CliError::InvalidFormat(format!("'{name}' row {}: not a number", row + 2))
                })
        };
        times.push(value(time_column)?);
        powers.push(value(ble_column)?);
    }

    Ok(ScenarioSeries::new(name, times, powers)?)
}

/// Read a power table file.
pub fn load_series(name: &str, path: &Path) -> Result<ScenarioSeries, CliError> {
    let file = std::fs::File::open(path)?;
    read_series(name, file)
}

/// Write every comparison curve in long format.
pub fn save_comparison(path: &Path, comparison: &Comparison) -> Result<(), CliError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Scenario", TIME_COLUMN, ENERGY_COLUMN])?;
    for result in comparison.results() {
        for (time, energy) in result.times.iter().zip(&result.energy) {
            writer.write_record([result.name.clone(), time.to_string(), format!("{energy:.9}")])?;
        }
    }
    writer.flush()?;
    Ok(())
}
