// wurlink - Wake-up radio link power analysis
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Radio state tracking
//!
//! Two automata share the event clock:
//!
//! - the wake-up radio (`Listening`, `Active`, `Sleeping`), whose elapsed
//!   time is charged to the state in effect at the *start* of each interval;
//! - the BLE link, whose transmit/receive/idle time is charged according to
//!   a configurable [`DurationAttribution`], and whose sleep is recorded as
//!   explicit [`SleepSpan`]s rather than as a duration bucket.

use crate::event::LogEvent;
use crate::rules::{phrases, LinkAction, RuleTable, WurAction};
use serde::{Deserialize, Serialize};

/// Wake-up radio state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioState {
    Listening,
    Active,
    Sleeping,
}

impl RadioState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RadioState::Listening => "listening",
            RadioState::Active => "active",
            RadioState::Sleeping => "sleeping",
        }
    }
}

/// BLE link state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Idle,
    Transmitting,
    Receiving,
    Asleep,
}

impl LinkState {
    /// Activity implied by a description: transmitting, receiving or idle
    pub fn activity_of(description: &str) -> Self {
        if description.contains(phrases::TRANSMITTING) {
            LinkState::Transmitting
        } else if description.contains(phrases::RECEIVING) {
            LinkState::Receiving
        } else {
            LinkState::Idle
        }
    }
}

/// A closed interval of BLE sleep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepSpan {
    pub start: f64,
    pub end: f64,
}

impl SleepSpan {
    /// Create a span, clamping `end` so that it never precedes `start`
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Seconds spent in each wake-up radio state
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WurDurations {
    pub listening: f64,
    pub active: f64,
    pub sleeping: f64,
}

impl WurDurations {
    pub fn add(&mut self, state: RadioState, seconds: f64) {
        match state {
            RadioState::Listening => self.listening += seconds,
            RadioState::Active => self.active += seconds,
            RadioState::Sleeping => self.sleeping += seconds,
        }
    }

    pub fn get(&self, state: RadioState) -> f64 {
        match state {
            RadioState::Listening => self.listening,
            RadioState::Active => self.active,
            RadioState::Sleeping => self.sleeping,
        }
    }

    pub fn total(&self) -> f64 {
        self.listening + self.active + self.sleeping
    }
}

/// Seconds charged to each BLE activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkDurations {
    pub transmit: f64,
    pub receive: f64,
    pub idle: f64,
}

impl LinkDurations {
    fn add(&mut self, activity: LinkState, seconds: f64) {
        match activity {
            LinkState::Transmitting => self.transmit += seconds,
            LinkState::Receiving => self.receive += seconds,
            LinkState::Idle | LinkState::Asleep => self.idle += seconds,
        }
    }

    pub fn total(&self) -> f64 {
        self.transmit + self.receive + self.idle
    }
}

/// Which event decides the BLE activity an interval is charged to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationAttribution {
    /// The event that opened the interval
    #[default]
    PreviousEvent,
    /// The event that closes the interval
    CurrentEvent,
}

/// Transition tables for both automata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerRules {
    /// `None` when the scenario has no wake-up radio
    pub wur: Option<RuleTable<WurAction>>,
    pub link: RuleTable<LinkAction>,
    pub attribution: DurationAttribution,
    /// Each event containing this phrase counts one fixed-duration sleep phase
    pub sleep_phase_phrase: Option<String>,
}

/// Starting point of both automata
///
/// No `Default`: the firmware variants disagree on whether the radios start
/// awake, so every scenario states it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialStates {
    pub wur: RadioState,
    pub ble_asleep: bool,
    /// Start of the initial sleep span when `ble_asleep` is set
    pub sleep_start: f64,
}

/// States in effect after one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackStep {
    /// `None` when the scenario has no wake-up radio
    pub wur_state: Option<RadioState>,
    pub link_state: LinkState,
}

/// Everything the tracker accumulated over a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSummary {
    pub wur_durations: Option<WurDurations>,
    pub link_durations: LinkDurations,
    /// Closed spans in arrival order
    pub sleep_spans: Vec<SleepSpan>,
    pub sleep_phases: u32,
    pub elapsed: f64,
}

/// Event-driven tracker for the wake-up radio and BLE automata
#[derive(Debug, Clone)]
pub struct StateTracker {
    rules: TrackerRules,
    wur_state: RadioState,
    open_sleep: Option<f64>,
    previous_activity: LinkState,
    first_timestamp: Option<f64>,
    last_timestamp: Option<f64>,
    wur_durations: WurDurations,
    link_durations: LinkDurations,
    sleep_spans: Vec<SleepSpan>,
    sleep_phases: u32,
}

impl StateTracker {
    /// Create a tracker from its rules and explicit initial states
    pub fn new(rules: TrackerRules, initial: InitialStates) -> Self {
        Self {
            rules,
            wur_state: initial.wur,
            open_sleep: initial.ble_asleep.then_some(initial.sleep_start),
            previous_activity: LinkState::Idle,
            first_timestamp: None,
            last_timestamp: None,
            wur_durations: WurDurations::default(),
            link_durations: LinkDurations::default(),
            sleep_spans: Vec::new(),
            sleep_phases: 0,
        }
    }

    /// Consume the next event in log order
    ///
    /// The first event's transitions apply too; only the interval charge
    /// needs a previous event.
    pub fn observe(&mut self, event: &LogEvent) -> TrackStep {
        let now = event.timestamp;
        let activity = LinkState::activity_of(&event.description);

        // Charge the interval before applying this event's transitions
        if let Some(previous) = self.last_timestamp {
            let elapsed = now - previous;
            if self.rules.wur.is_some() {
                self.wur_durations.add(self.wur_state, elapsed);
            }
            let charged = match self.rules.attribution {
                DurationAttribution::PreviousEvent => self.previous_activity,
                DurationAttribution::CurrentEvent => activity,
            };
            self.link_durations.add(charged, elapsed);
        }

        if let Some(table) = &self.rules.wur {
            if let Some(WurAction::Enter(next)) = table.first_match(&event.description) {
                if next != self.wur_state {
                    log::trace!(
                        "WuR {} -> {} at {}s",
                        self.wur_state.as_str(),
                        next.as_str(),
                        now
                    );
                }
                self.wur_state = next;
            }
        }

        match self.rules.link.first_match(&event.description) {
            Some(LinkAction::Wake) => {
                if let Some(start) = self.open_sleep.take() {
                    let span = SleepSpan::new(start, now);
                    log::trace!("BLE sleep span {}s..{}s closed", span.start, span.end);
                    self.sleep_spans.push(span);
                }
            }
            Some(LinkAction::Sleep) => {
                if self.open_sleep.is_none() {
                    self.open_sleep = Some(now);
                }
            }
            Some(LinkAction::RestartSleep) => {
                if let Some(start) = self.open_sleep.replace(now) {
                    log::trace!("BLE sleep span restarted: {}s -> {}s", start, now);
                }
            }
            None => {}
        }

        if let Some(phrase) = &self.rules.sleep_phase_phrase {
            if event.contains(phrase) {
                self.sleep_phases += 1;
            }
        }

        self.previous_activity = activity;
        self.first_timestamp.get_or_insert(now);
        self.last_timestamp = Some(now);

        TrackStep {
            wur_state: self.rules.wur.as_ref().map(|_| self.wur_state),
            link_state: self.link_state(),
        }
    }

    /// Current wake-up radio state (meaningless without a WuR table)
    pub fn wur_state(&self) -> RadioState {
        self.wur_state
    }

    /// Current BLE state
    pub fn link_state(&self) -> LinkState {
        if self.open_sleep.is_some() {
            LinkState::Asleep
        } else {
            self.previous_activity
        }
    }

    /// Spans closed so far
    pub fn sleep_spans(&self) -> &[SleepSpan] {
        &self.sleep_spans
    }

    /// Close any open span at the last event and hand back the totals
    pub fn finish(mut self) -> TrackerSummary {
        if let Some(start) = self.open_sleep.take() {
            let end = self.last_timestamp.unwrap_or(start);
            log::debug!("Closing BLE sleep span open at end of log ({}s..{}s)", start, end);
            self.sleep_spans.push(SleepSpan::new(start, end));
        }

        let elapsed = match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        };

        TrackerSummary {
            wur_durations: self.rules.wur.as_ref().map(|_| self.wur_durations),
            link_durations: self.link_durations,
            sleep_spans: self.sleep_spans,
            sleep_phases: self.sleep_phases,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_on_rules() -> TrackerRules {
        TrackerRules {
            wur: Some(
                RuleTable::new()
                    .with_rule(phrases::WUR_CHECKING, WurAction::Enter(RadioState::Listening))
                    .with_rule(
                        phrases::BLE_AWAKE_COMMUNICATING,
                        WurAction::Enter(RadioState::Sleeping),
                    )
                    .with_rule(phrases::WUR_SIGNAL_DETECTED, WurAction::Enter(RadioState::Active)),
            ),
            link: RuleTable::new()
                .with_rule(phrases::WUR_CHECKING, LinkAction::Sleep)
                .with_rule(phrases::BLE_AWAKE_COMMUNICATING, LinkAction::Wake),
            attribution: DurationAttribution::PreviousEvent,
            sleep_phase_phrase: None,
        }
    }

    fn asleep_at_zero() -> InitialStates {
        InitialStates {
            wur: RadioState::Listening,
            ble_asleep: true,
            sleep_start: 0.0,
        }
    }

    fn run(tracker: &mut StateTracker, events: &[(f64, &str)]) {
        for (t, desc) in events {
            tracker.observe(&LogEvent::new(*t, *desc));
        }
    }

    #[test]
    fn test_wake_cycle() {
        let mut tracker = StateTracker::new(always_on_rules(), asleep_at_zero());
        run(
            &mut tracker,
            &[
                (0.0, "Wake-up radio is checking for a signal"),
                (5.0, "Wake-up signal detected"),
                (6.0, "BLE device is now awake and communicating"),
                (16.0, "Putting BLE device back to sleep"),
            ],
        );
        let summary = tracker.finish();
        let wur = summary.wur_durations.unwrap();

        assert_eq!(wur.listening, 5.0);
        assert_eq!(wur.active, 1.0);
        assert_eq!(wur.sleeping, 10.0);
        assert_eq!(wur.total(), summary.elapsed);
        assert_eq!(summary.sleep_spans, vec![SleepSpan::new(0.0, 6.0)]);
    }

    #[test]
    fn test_transitions_apply_to_next_interval() {
        let mut tracker = StateTracker::new(always_on_rules(), asleep_at_zero());
        let step = tracker.observe(&LogEvent::new(0.0, "Wake-up signal detected"));
        assert_eq!(step.wur_state, Some(RadioState::Active));
        assert_eq!(tracker.wur_durations.active, 0.0);

        tracker.observe(&LogEvent::new(4.0, "Wake-up radio is checking for a signal"));
        assert_eq!(tracker.wur_durations.active, 4.0);
        assert_eq!(tracker.wur_state(), RadioState::Listening);
    }

    #[test]
    fn test_previous_event_attribution() {
        let mut tracker = StateTracker::new(always_on_rules(), asleep_at_zero());
        run(
            &mut tracker,
            &[
                (0.0, "BLE device is now awake and communicating"),
                (1.0, "BLE device is transmitting service discovery response"),
                (3.0, "BLE device is receiving characteristic discovery request"),
                (7.0, "idle"),
            ],
        );
        let link = tracker.finish().link_durations;

        assert_eq!(link.idle, 1.0);
        assert_eq!(link.transmit, 2.0);
        assert_eq!(link.receive, 4.0);
    }

    #[test]
    fn test_current_event_attribution() {
        let mut rules = always_on_rules();
        rules.attribution = DurationAttribution::CurrentEvent;
        let mut tracker = StateTracker::new(rules, asleep_at_zero());
        run(
            &mut tracker,
            &[
                (0.0, "BLE device is now awake and communicating"),
                (1.0, "BLE device is transmitting service discovery response"),
                (3.0, "BLE device is receiving characteristic discovery request"),
                (7.0, "idle"),
            ],
        );
        let link = tracker.finish().link_durations;

        assert_eq!(link.transmit, 1.0);
        assert_eq!(link.receive, 2.0);
        assert_eq!(link.idle, 4.0);
    }

    #[test]
    fn test_open_span_closed_at_end() {
        let mut tracker = StateTracker::new(always_on_rules(), asleep_at_zero());
        run(
            &mut tracker,
            &[
                (0.0, "BLE device is now awake and communicating"),
                (10.0, "Wake-up radio is checking for a signal"),
                (25.0, "No wake-up signal detected"),
            ],
        );
        assert_eq!(tracker.link_state(), LinkState::Asleep);

        let spans = tracker.finish().sleep_spans;
        assert_eq!(spans, vec![SleepSpan::new(0.0, 0.0), SleepSpan::new(10.0, 25.0)]);
    }

    #[test]
    fn test_repeated_sleep_keeps_first_start() {
        let mut tracker = StateTracker::new(always_on_rules(), asleep_at_zero());
        run(
            &mut tracker,
            &[
                (2.0, "BLE device is now awake and communicating"),
                (4.0, "Wake-up radio is checking for a signal"),
                (8.0, "Wake-up radio is checking for a signal"),
                (9.0, "BLE device is now awake and communicating"),
            ],
        );
        let spans = tracker.finish().sleep_spans;
        assert_eq!(spans, vec![SleepSpan::new(0.0, 2.0), SleepSpan::new(4.0, 9.0)]);
    }

    #[test]
    fn test_restart_sleep_moves_open_start() {
        let mut rules = always_on_rules();
        rules.link = RuleTable::new()
            .with_rule(phrases::BLE_AWAKE, LinkAction::Wake)
            .with_rule(phrases::BLE_BACK_TO_SLEEP, LinkAction::RestartSleep);
        let mut tracker = StateTracker::new(rules, asleep_at_zero());
        run(
            &mut tracker,
            &[
                (0.0, "Wake-up radio is awake and checking for a signal"),
                (10.0, "Putting BLE device back to sleep"),
                (12.0, "BLE device is now awake and communicating"),
                (20.0, "Putting BLE device back to sleep"),
                (25.0, "Putting BLE device back to sleep"),
            ],
        );
        assert_eq!(tracker.link_state(), LinkState::Asleep);
        tracker.observe(&LogEvent::new(30.0, "BLE device is now awake and communicating"));

        let spans = tracker.finish().sleep_spans;
        assert_eq!(spans, vec![SleepSpan::new(10.0, 12.0), SleepSpan::new(25.0, 30.0)]);
    }

    #[test]
    fn test_first_event_transitions_apply() {
        let mut tracker = StateTracker::new(always_on_rules(), asleep_at_zero());
        let step = tracker.observe(&LogEvent::new(
            3.0,
            "BLE device is now awake and communicating",
        ));
        assert_eq!(step.wur_state, Some(RadioState::Sleeping));
        assert_ne!(step.link_state, LinkState::Asleep);
        assert_eq!(tracker.sleep_spans(), &[SleepSpan::new(0.0, 3.0)]);

        tracker.observe(&LogEvent::new(8.0, "Sensor sampled"));
        let summary = tracker.finish();
        assert_eq!(summary.sleep_spans, vec![SleepSpan::new(0.0, 3.0)]);
        assert_eq!(summary.wur_durations.unwrap().sleeping, 5.0);
    }

    #[test]
    fn test_no_wur_table() {
        let rules = TrackerRules {
            wur: None,
            link: RuleTable::new(),
            attribution: DurationAttribution::CurrentEvent,
            sleep_phase_phrase: Some(phrases::BLE_SLEEP_AFTER_NOTIFICATION.to_string()),
        };
        let initial = InitialStates {
            wur: RadioState::Sleeping,
            ble_asleep: false,
            sleep_start: 0.0,
        };
        let mut tracker = StateTracker::new(rules, initial);
        let step = tracker.observe(&LogEvent::new(
            0.5,
            "Putting BLE device back to sleep after notification.",
        ));
        tracker.observe(&LogEvent::new(
            10.5,
            "Putting BLE device back to sleep after notification.",
        ));

        assert_eq!(step.wur_state, None);
        let summary = tracker.finish();
        assert!(summary.wur_durations.is_none());
        assert_eq!(summary.sleep_phases, 2);
        assert!(summary.sleep_spans.is_empty());
    }

    #[test]
    fn test_span_never_inverted() {
        let initial = InitialStates {
            wur: RadioState::Listening,
            ble_asleep: true,
            sleep_start: 20.0,
        };
        let mut tracker = StateTracker::new(always_on_rules(), initial);
        tracker.observe(&LogEvent::new(5.0, "BLE device is now awake and communicating"));
        let span = tracker.finish().sleep_spans[0];
        assert!(span.end >= span.start);
        assert_eq!(span.duration(), 0.0);
    }
}
