//! Charging cycle state machine
//!
//! Tracks whether a charging cycle is open and detects its end:
//! - `Idle -> InCycle` on a start state (`Charging`/`Preparing`)
//! - `InCycle -> Idle` on `Ready` directly after `Charging`/`Finished`
//!
//! Every other state change is either appended to the open cycle or ignored.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::types::{seconds_between, ChargingCycle, SessionPhase};

/// Shortest duration a completed cycle can have; `end_time` is always after
/// `start_time` even when the closing timestamp does not advance
pub const MIN_CYCLE_DURATION_MS: i64 = 1;

/// Cycle detection rules
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// States that open a cycle when none is open
    pub start_states: Vec<String>,
    /// State that closes a cycle
    pub end_state: String,
    /// States that must immediately precede `end_state`
    pub end_predecessors: Vec<String>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            start_states: vec!["Charging".to_string(), "Preparing".to_string()],
            end_state: "Ready".to_string(),
            end_predecessors: vec!["Charging".to_string(), "Finished".to_string()],
        }
    }
}

/// Cycle state
#[derive(Debug, Clone, PartialEq)]
pub enum CycleState {
    /// No open cycle
    Idle,
    /// Open cycle with the states seen since it began
    InCycle {
        start_time: DateTime<Utc>,
        state_sequence: Vec<String>,
    },
}

/// Result of feeding one state change to the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Idle and the state does not open a cycle
    Ignored,
    /// A new cycle was opened
    Started,
    /// State appended to the open cycle
    Appended,
    /// The open cycle was closed
    Completed(ChargingCycle),
}

/// Charging cycle tracker
#[derive(Debug, Clone)]
pub struct CycleTracker {
    config: CycleConfig,
    state: CycleState,
    last_state: Option<String>,
}

impl Default for CycleTracker {
    fn default() -> Self {
        Self::new(CycleConfig::default())
    }
}

impl CycleTracker {
    pub fn new(config: CycleConfig) -> Self {
        Self {
            config,
            state: CycleState::Idle,
            last_state: None,
        }
    }

    /// Current cycle state
    pub fn state(&self) -> &CycleState {
        &self.state
    }

    /// Most recent state seen, in or out of a cycle
    pub fn last_state(&self) -> Option<&str> {
        self.last_state.as_deref()
    }

    pub fn is_in_cycle(&self) -> bool {
        matches!(self.state, CycleState::InCycle { .. })
    }

    /// Phase label for records produced at this point
    pub fn phase(&self) -> SessionPhase {
        match (&self.state, &self.last_state) {
            (CycleState::InCycle { .. }, _) => SessionPhase::InCycle,
            (CycleState::Idle, Some(_)) => SessionPhase::Idle,
            (CycleState::Idle, None) => SessionPhase::Initialization,
        }
    }

    /// Feed a state change observed at `now`
    pub fn observe(&mut self, state: &str, now: DateTime<Utc>) -> Transition {
        let current = std::mem::replace(&mut self.state, CycleState::Idle);
        let (next, transition) = self.step(current, state, now);
        self.state = next;
        self.last_state = Some(state.to_string());

        debug!("Cycle tracker: state={} -> {:?}", state, transition_name(&transition));
        transition
    }

    /// Pure transition function
    fn step(&self, current: CycleState, state: &str, now: DateTime<Utc>) -> (CycleState, Transition) {
        match current {
            CycleState::Idle => {
                if self.is_start_state(state) {
                    let next = CycleState::InCycle {
                        start_time: now,
                        state_sequence: vec![state.to_string()],
                    };
                    (next, Transition::Started)
                } else {
                    (CycleState::Idle, Transition::Ignored)
                }
            }

            CycleState::InCycle { start_time, mut state_sequence } => {
                state_sequence.push(state.to_string());

                if self.closes_cycle(state) {
                    let earliest_end = start_time + Duration::milliseconds(MIN_CYCLE_DURATION_MS);
                    if now < earliest_end {
                        warn!("Cycle closed at {} but started at {}, clamping end time", now, start_time);
                    }
                    let end_time = now.max(earliest_end);
                    let cycle = ChargingCycle {
                        start_time,
                        end_time,
                        duration_seconds: seconds_between(start_time, end_time),
                        state_sequence,
                    };
                    (CycleState::Idle, Transition::Completed(cycle))
                } else {
                    (CycleState::InCycle { start_time, state_sequence }, Transition::Appended)
                }
            }
        }
    }

    fn is_start_state(&self, state: &str) -> bool {
        self.config.start_states.iter().any(|s| s == state)
    }

    fn closes_cycle(&self, state: &str) -> bool {
        state == self.config.end_state
            && self
                .last_state
                .as_deref()
                .is_some_and(|prev| self.config.end_predecessors.iter().any(|p| p == prev))
    }
}

fn transition_name(transition: &Transition) -> &'static str {
    match transition {
        Transition::Ignored => "ignored",
        Transition::Started => "started",
        Transition::Appended => "appended",
        Transition::Completed(_) => "completed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(tracker: &mut CycleTracker, states: &[&str], start: DateTime<Utc>, step_secs: i64) -> Vec<Transition> {
        states
            .iter()
            .enumerate()
            .map(|(i, s)| tracker.observe(s, start + Duration::seconds(step_secs * i as i64)))
            .collect()
    }

    #[test]
    fn test_full_cycle() {
        let mut tracker = CycleTracker::default();
        let start = Utc::now();

        let transitions = feed(&mut tracker, &["Preparing", "Charging", "Finished", "Ready"], start, 2);

        assert_eq!(transitions[0], Transition::Started);
        assert_eq!(transitions[1], Transition::Appended);
        assert_eq!(transitions[2], Transition::Appended);
        let Transition::Completed(cycle) = &transitions[3] else {
            panic!("expected completed cycle, got {:?}", transitions[3]);
        };
        assert_eq!(cycle.state_sequence, vec!["Preparing", "Charging", "Finished", "Ready"]);
        assert_eq!(cycle.duration_seconds, 6.0);
        assert_eq!(cycle.start_time, start);
        assert_eq!(cycle.end_time, start + Duration::seconds(6));
        assert_eq!(tracker.state(), &CycleState::Idle);
    }

    #[test]
    fn test_repeated_start_does_not_restart() {
        let mut tracker = CycleTracker::default();
        let start = Utc::now();

        tracker.observe("Charging", start);
        let second = tracker.observe("Charging", start + Duration::seconds(5));

        assert_eq!(second, Transition::Appended);
        match tracker.state() {
            CycleState::InCycle { start_time, state_sequence } => {
                assert_eq!(*start_time, start);
                assert_eq!(state_sequence, &vec!["Charging".to_string(), "Charging".to_string()]);
            }
            CycleState::Idle => panic!("cycle should still be open"),
        }
    }

    #[test]
    fn test_lone_ready_ignored() {
        let mut tracker = CycleTracker::default();
        assert_eq!(tracker.observe("Ready", Utc::now()), Transition::Ignored);
        assert_eq!(tracker.state(), &CycleState::Idle);
    }

    #[test]
    fn test_ready_after_charging_without_open_cycle() {
        let mut tracker = CycleTracker::new(CycleConfig {
            start_states: vec!["Preparing".to_string()],
            ..CycleConfig::default()
        });
        let now = Utc::now();

        assert_eq!(tracker.observe("Charging", now), Transition::Ignored);
        assert_eq!(tracker.observe("Ready", now), Transition::Ignored);
    }

    #[test]
    fn test_ready_with_wrong_predecessor_keeps_cycle_open() {
        let mut tracker = CycleTracker::default();
        let start = Utc::now();

        let transitions = feed(&mut tracker, &["Preparing", "Ready", "Charging", "Ready"], start, 1);

        assert_eq!(transitions[1], Transition::Appended);
        assert!(matches!(transitions[3], Transition::Completed(ref c)
            if c.state_sequence == vec!["Preparing", "Ready", "Charging", "Ready"]));
    }

    #[test]
    fn test_phase_labels() {
        let mut tracker = CycleTracker::default();
        let now = Utc::now();

        assert_eq!(tracker.phase(), SessionPhase::Initialization);
        tracker.observe("Idle", now);
        assert_eq!(tracker.phase(), SessionPhase::Idle);
        tracker.observe("Preparing", now);
        assert_eq!(tracker.phase(), SessionPhase::InCycle);
        tracker.observe("Charging", now);
        tracker.observe("Ready", now);
        assert_eq!(tracker.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_second_cycle_after_completion() {
        let mut tracker = CycleTracker::default();
        let start = Utc::now();

        feed(&mut tracker, &["Charging", "Ready"], start, 10);
        let transitions = feed(&mut tracker, &["Preparing", "Charging", "Ready"], start + Duration::seconds(100), 3);

        let Transition::Completed(cycle) = &transitions[2] else {
            panic!("expected second cycle");
        };
        assert_eq!(cycle.state_sequence, vec!["Preparing", "Charging", "Ready"]);
        assert_eq!(cycle.duration_seconds, 6.0);
    }

    #[test]
    fn test_same_timestamp_close_keeps_end_after_start() {
        let mut tracker = CycleTracker::default();
        let now = Utc::now();

        tracker.observe("Charging", now);
        let Transition::Completed(cycle) = tracker.observe("Ready", now) else {
            panic!("expected completed cycle");
        };
        assert!(cycle.end_time > cycle.start_time);
        assert_eq!(cycle.end_time, now + Duration::milliseconds(MIN_CYCLE_DURATION_MS));
        assert_eq!(cycle.duration_seconds, 0.001);
    }

    #[test]
    fn test_backwards_clock_keeps_end_after_start() {
        let mut tracker = CycleTracker::default();
        let start = Utc::now();

        tracker.observe("Preparing", start);
        tracker.observe("Charging", start);
        let Transition::Completed(cycle) = tracker.observe("Ready", start - Duration::seconds(5)) else {
            panic!("expected completed cycle");
        };
        assert!(cycle.end_time > cycle.start_time);
        assert!(cycle.duration_seconds > 0.0);
    }
}
