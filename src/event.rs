// wurlink - Wake-up radio link power analysis
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Event log reading
//!
//! The firmware traces state changes as lines of the form
//! `Time <seconds>s: <description>`. This module turns such a log into an
//! ordered sequence of [`LogEvent`]s. Lines that do not parse are skipped,
//! since real logs carry incidental output between event lines.

use crate::error::{Result, WurlinkError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// First token of every event line
pub const TIME_MARKER: &str = "Time";

/// Separator between the time field and the description
pub const DESCRIPTION_SEPARATOR: &str = ": ";

/// A timestamped state-transition event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Seconds since the start of the trace
    pub timestamp: f64,
    /// Free-text description as written by the firmware
    pub description: String,
}

impl LogEvent {
    /// Create a new event
    pub fn new(timestamp: f64, description: impl Into<String>) -> Self {
        Self {
            timestamp,
            description: description.into(),
        }
    }

    /// Case-sensitive substring test against the description
    pub fn contains(&self, phrase: &str) -> bool {
        self.description.contains(phrase)
    }
}

/// Numeric type of the time field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    /// Whole seconds only; a fractional value makes the line malformed
    #[default]
    Integer,
    /// Integer or fractional seconds
    Real,
}

impl TimeFormat {
    /// Parse a time field such as `12s` or `3.5s`
    pub fn parse_field(self, field: &str) -> Option<f64> {
        let digits: String = field.chars().filter(|c| *c != 's').collect();
        let value = match self {
            TimeFormat::Integer => digits.parse::<i64>().ok()? as f64,
            TimeFormat::Real => digits.parse::<f64>().ok()?,
        };
        (value.is_finite() && value >= 0.0).then_some(value)
    }
}

/// Parse one log line, returning `None` for anything that is not an event
pub fn parse_line(line: &str, format: TimeFormat) -> Option<LogEvent> {
    let line = line.trim();
    let (head, description) = line.split_once(DESCRIPTION_SEPARATOR)?;

    let mut tokens = head.split_whitespace();
    if tokens.next()? != TIME_MARKER {
        return None;
    }
    let timestamp = format.parse_field(tokens.next()?)?;

    Some(LogEvent::new(timestamp, description.trim()))
}

/// Lazy, single-pass reader over a line-oriented event log
///
/// Re-open the source to iterate again.
pub struct EventLogReader<R> {
    lines: Lines<R>,
    format: TimeFormat,
    line_number: usize,
    skipped: usize,
}

impl<R: BufRead> EventLogReader<R> {
    /// Wrap a buffered source
    pub fn new(source: R, format: TimeFormat) -> Self {
        Self {
            lines: source.lines(),
            format,
            line_number: 0,
            skipped: 0,
        }
    }

    /// Number of non-blank lines skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Number of lines consumed so far
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl EventLogReader<BufReader<File>> {
    /// Open a log file
    pub fn from_path(path: impl AsRef<Path>, format: TimeFormat) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), format))
    }
}

impl<R: BufRead> Iterator for EventLogReader<R> {
    type Item = Result<LogEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;

            if let Some(event) = parse_line(&line, self.format) {
                return Some(Ok(event));
            }
            if !line.trim().is_empty() {
                self.skipped += 1;
                log::trace!("Skipping log line {}: {:?}", self.line_number, line);
            }
        }
    }
}

/// A fully read, validated event sequence
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    events: Vec<LogEvent>,
    skipped_lines: usize,
}

impl EventLog {
    /// Drain a reader into a validated log
    pub fn from_reader<R: BufRead>(mut reader: EventLogReader<R>) -> Result<Self> {
        let mut events = Vec::new();
        for event in reader.by_ref() {
            events.push(event?);
        }
        let mut log = Self::from_events(events)?;
        log.skipped_lines = reader.skipped();
        log::debug!(
            "Read {} events ({} lines skipped)",
            log.events.len(),
            log.skipped_lines
        );
        Ok(log)
    }

    /// Read and validate a log file
    pub fn from_path(path: impl AsRef<Path>, format: TimeFormat) -> Result<Self> {
        Self::from_reader(EventLogReader::from_path(path, format)?)
    }

    /// Parse a log held in memory
    pub fn parse(text: &str, format: TimeFormat) -> Result<Self> {
        Self::from_reader(EventLogReader::new(text.as_bytes(), format))
    }

    /// Validate an already-built event sequence
    pub fn from_events(events: Vec<LogEvent>) -> Result<Self> {
        if events.is_empty() {
            return Err(WurlinkError::EmptyLog);
        }
        for (index, pair) in events.windows(2).enumerate() {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(WurlinkError::TimestampRegression {
                    previous: pair[0].timestamp,
                    current: pair[1].timestamp,
                    index: index + 1,
                });
            }
        }
        Ok(Self {
            events,
            skipped_lines: 0,
        })
    }

    /// Events in log order
    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Always false for a validated log
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Lines that were not recognised as events
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Time between the first and last event
    pub fn elapsed(&self) -> f64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }
}
