// wurlink - Wake-up radio link power analysis
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Phrase rule tables
//!
//! State transitions and frame recognition are driven by substrings of the
//! event description. Each table is plain data: an ordered list of
//! `(phrase, action)` pairs where the first matching phrase wins, so a
//! scenario is described by which tables it loads rather than by code.

use crate::tracker::RadioState;
use serde::{Deserialize, Serialize};

/// Phrases written by the heart-rate implant firmware
pub mod phrases {
    /// WuR starts listening (always-on firmware)
    pub const WUR_CHECKING: &str = "Wake-up radio is checking for a signal";
    /// WuR starts listening (duty-cycled firmware)
    pub const WUR_AWAKE_CHECKING: &str = "Wake-up radio is awake and checking for a signal";
    /// Listening window closed without a wake-up
    pub const WUR_NO_SIGNAL: &str = "No wake-up signal detected";
    /// Duty-cycled WuR leaves its listening window
    pub const WUR_BACK_TO_SLEEP: &str = "Wake-up radio is going back to sleep";
    /// Wake-up pattern received
    pub const WUR_SIGNAL_DETECTED: &str = "Wake-up signal detected";
    /// Host radio takes over
    pub const BLE_AWAKE_COMMUNICATING: &str = "BLE device is now awake and communicating";
    /// Host radio woke up
    pub const BLE_AWAKE: &str = "BLE device is now awake";
    /// Host radio goes back to sleep
    pub const BLE_BACK_TO_SLEEP: &str = "Putting BLE device back to sleep";
    /// End of a notification burst in the duty-cycled BLE firmware
    pub const BLE_SLEEP_AFTER_NOTIFICATION: &str =
        "Putting BLE device back to sleep after notification.";
    /// Announces a notification burst; carries no frame of its own
    pub const BLE_WAKING_FOR_NOTIFICATION: &str =
        "BLE device is waking up to send heart rate measurement notification";
    /// Marks an event as a transmission
    pub const TRANSMITTING: &str = "transmitting";
    /// Marks an event as a reception
    pub const RECEIVING: &str = "receiving";
}

/// What a WuR rule does to the wake-up-radio automaton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WurAction {
    /// Move to the given state
    Enter(RadioState),
    /// Claim the event without changing state
    Hold,
}

/// What a link rule does to the BLE automaton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAction {
    /// Open a sleep span if the radio is awake
    Sleep,
    /// Open a sleep span, or move the start of the open one to this event
    RestartSleep,
    /// Close the open sleep span if the radio is asleep
    Wake,
}

/// A phrase and the action it triggers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseRule<A> {
    pub phrase: String,
    pub action: A,
}

impl<A> PhraseRule<A> {
    /// Create a new rule
    pub fn new(phrase: impl Into<String>, action: A) -> Self {
        Self {
            phrase: phrase.into(),
            action,
        }
    }

    /// Case-sensitive substring match
    pub fn matches(&self, description: &str) -> bool {
        description.contains(self.phrase.as_str())
    }
}

/// Ordered rule list, first match wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable<A> {
    rules: Vec<PhraseRule<A>>,
}

impl<A> Default for RuleTable<A> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<A: Copy> RuleTable<A> {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append
    pub fn with_rule(mut self, phrase: impl Into<String>, action: A) -> Self {
        self.push(phrase, action);
        self
    }

    /// Append a rule at the lowest precedence
    pub fn push(&mut self, phrase: impl Into<String>, action: A) {
        self.rules.push(PhraseRule::new(phrase, action));
    }

    /// Action of the first rule whose phrase occurs in the description
    pub fn first_match(&self, description: &str) -> Option<A> {
        self.rules
            .iter()
            .find(|rule| rule.matches(description))
            .map(|rule| rule.action)
    }

    /// Rules in precedence order
    pub fn rules(&self) -> &[PhraseRule<A>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Expected frame for a phrase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSignature {
    /// Matched case-insensitively against the description
    pub phrase: String,
    /// Protocol layer as shown by the dissector (`LE LL`, `ATT`)
    pub protocol: String,
    /// Operation as shown by the dissector
    pub operation: String,
    /// Nominal frame length in bytes
    pub expected_length: u32,
}

impl FrameSignature {
    /// Create a new signature
    pub fn new(
        phrase: impl Into<String>,
        protocol: impl Into<String>,
        operation: impl Into<String>,
        expected_length: u32,
    ) -> Self {
        Self {
            phrase: phrase.into(),
            protocol: protocol.into(),
            operation: operation.into(),
            expected_length,
        }
    }

    /// `description_lower` must already be lowercase
    fn matches_lowercase(&self, description_lower: &str) -> bool {
        description_lower.contains(self.phrase.to_lowercase().as_str())
    }

    /// Observed length within `tolerance` bytes of the expected one
    pub fn accepts_length(&self, observed: u32, tolerance: u32) -> bool {
        observed.abs_diff(self.expected_length) <= tolerance
    }
}

/// Catalog of recognisable BLE frames
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameCatalog {
    signatures: Vec<FrameSignature>,
}

impl FrameCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Heart Rate profile exchange: advertising, connection setup, GATT
    /// discovery and notifications
    pub fn heart_rate_profile() -> Self {
        Self::heart_rate_profile_with_advertising("advertising indication")
    }

    /// Same catalog with a different spelling of the advertising phrase
    /// (the duty-cycled BLE firmware logs "advertisement indication")
    pub fn heart_rate_profile_with_advertising(advertising_phrase: &str) -> Self {
        const CHANNEL_MAP: &str = "Control Opcode: LL_CHANNEL_MAP_IND";
        Self::new()
            .with_signature(FrameSignature::new(advertising_phrase, "LE LL", CHANNEL_MAP, 19))
            .with_signature(FrameSignature::new("connection indication", "LE LL", CHANNEL_MAP, 39))
            .with_signature(FrameSignature::new(
                "service discovery request",
                "ATT",
                "Read By Group Type Request",
                20,
            ))
            .with_signature(FrameSignature::new(
                "transmitting service discovery",
                "ATT",
                "Read By Group Type Response",
                21,
            ))
            .with_signature(FrameSignature::new(
                "receiving characteristic discovery request",
                "ATT",
                "Read By Type Request",
                20,
            ))
            .with_signature(FrameSignature::new(
                "transmitting characteristic discovery",
                "ATT",
                "Read By Type Response",
                22,
            ))
            .with_signature(FrameSignature::new(
                "receiving all available characteristic descriptors request",
                "ATT",
                "Find Information Request",
                18,
            ))
            .with_signature(FrameSignature::new(
                "transmitting characteristic descriptor discovery",
                "ATT",
                "Find Information Response",
                19,
            ))
            .with_signature(FrameSignature::new(
                "enable notification request",
                "ATT",
                "Write Request",
                18,
            ))
            .with_signature(FrameSignature::new(
                "enable notifications response",
                "ATT",
                "Write Response",
                14,
            ))
            .with_signature(FrameSignature::new(
                "heart rate measurement notification",
                "ATT",
                "Handle Value Notification",
                22,
            ))
    }

    /// Builder-style append
    pub fn with_signature(mut self, signature: FrameSignature) -> Self {
        self.signatures.push(signature);
        self
    }

    /// First signature whose phrase occurs in the description and whose
    /// expected length is within `tolerance` of `observed`
    pub fn find(&self, description: &str, observed: u32, tolerance: u32) -> Option<&FrameSignature> {
        let lower = description.to_lowercase();
        self.signatures
            .iter()
            .find(|sig| sig.matches_lowercase(&lower) && sig.accepts_length(observed, tolerance))
    }

    pub fn signatures(&self) -> &[FrameSignature] {
        &self.signatures
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}
