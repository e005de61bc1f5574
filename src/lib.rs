//! # wurlink - Wake-up radio link power analysis
//!
//! Reconstructs the energy profile of a BLE link that is woken by a
//! wake-up receiver (WuR), from two independent artifacts of one run:
//!
//! - the firmware event log (`Time <n>s: <description>` lines)
//! - the packet capture, reduced to sequence number → frame length
//!
//! ## Key Features
//!
//! - **Three scenarios**: always-on WuR, duty-cycled WuR, duty-cycled BLE,
//!   all driven by the same engine with different phrase tables
//! - **Sequential correlation**: log events are attributed to captured
//!   frames by phrase and length tolerance
//! - **Power accounting**: per-event BLE power, WuR current series, sleep
//!   and state-duration totals
//! - **Comparison**: cumulative energy across scenario outputs
//!
//! ## Quick Start
//!
//! ```rust
//! use wurlink::{CapturedPacket, EventLog, PacketLengthIndex, PowerEngine, Scenario};
//!
//! let engine = PowerEngine::for_scenario(Scenario::AlwaysOnWur);
//! let log = EventLog::parse(
//!     "Time 0s: Wake-up radio is checking for a signal\n\
//!      Time 5s: Wake-up signal detected\n\
//!      Time 6s: BLE device is now awake and communicating\n",
//!     engine.config().time_format,
//! )
//! .unwrap();
//! let index: PacketLengthIndex = vec![CapturedPacket::new(1, 19)].into_iter().collect();
//!
//! let report = engine.run(&log, &index);
//! assert_eq!(report.sleep_spans.len(), 1);
//! println!("{}", report.summary());
//! ```
//!
//! ## Modules
//!
//! - [`event`]: Log line parsing and validation
//! - [`capture`]: Packet length index
//! - [`rules`]: Phrase tables and the frame catalog
//! - [`tracker`]: WuR and BLE state automata
//! - [`correlator`]: Log-to-capture matching
//! - [`power`]: Power samples and totals
//! - [`timeline`]: Merged output table
//! - [`scenario`]: Scenario presets and the power engine
//! - [`comparator`]: Cumulative energy comparison
//! - [`metrics`]: Run statistics

// Modules
pub mod capture;
pub mod comparator;
pub mod correlator;
pub mod error;
pub mod event;
pub mod metrics;
pub mod power;
pub mod rules;
pub mod scenario;
pub mod timeline;
pub mod tracker;

// Re-exports for convenient access
pub use capture::{CapturedPacket, PacketLengthIndex};
pub use comparator::{
    cumulative_energy, ComparatorConfig, Comparison, CumulativeEnergy, ScenarioComparator,
    ScenarioSeries,
};
pub use correlator::{MatchResult, PacketCorrelator, PacketMatch, DEFAULT_LENGTH_TOLERANCE};
pub use error::{Result, WurlinkError};
pub use event::{EventLog, EventLogReader, LogEvent, TimeFormat};
pub use metrics::RunMetrics;
pub use power::{
    AccountedRun, LinkBudget, PowerAccountant, PowerParams, PowerSample, PowerSeries,
    ScenarioTotals, SleepAccounting,
};
pub use rules::{FrameCatalog, FrameSignature, LinkAction, PhraseRule, RuleTable, WurAction};
pub use scenario::{PowerEngine, Scenario, ScenarioConfig, ScenarioReport};
pub use timeline::{FillPolicy, Timeline, TimelineRow};
pub use tracker::{
    DurationAttribution, InitialStates, LinkDurations, LinkState, RadioState, SleepSpan,
    StateTracker, TrackerRules, TrackerSummary, WurDurations,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
