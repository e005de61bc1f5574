//! Error types for wurlink
//!
//! Only malformed input is fatal. Unparseable log lines, correlation misses
//! and an exhausted capture index are absorbed where they happen and never
//! surface as errors.

use thiserror::Error;

/// Result type alias for wurlink operations
pub type Result<T> = std::result::Result<T, WurlinkError>;

/// Main error type for wurlink operations
#[derive(Error, Debug)]
pub enum WurlinkError {
    /// The event log (or another input) could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No line of the log carried a recognisable time marker
    #[error("Event log contains no recognisable events")]
    EmptyLog,

    /// Events must arrive in non-decreasing time order
    #[error("Timestamp regression at event {index}: {current}s follows {previous}s")]
    TimestampRegression {
        previous: f64,
        current: f64,
        index: usize,
    },

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A power series has a different number of timestamps and values
    #[error("Series '{name}' has {times} timestamps but {powers} power values")]
    SeriesLengthMismatch {
        name: String,
        times: usize,
        powers: usize,
    },
}
