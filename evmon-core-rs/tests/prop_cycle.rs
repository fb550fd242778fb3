//! Property tests for the charging cycle tracker
//!
//! Tests state machine invariants for:
//! - Idempotent start: repeated start states never restart an open cycle
//! - Completion: every completed cycle has a non-empty sequence and
//!   `end > start` and `duration == end - start`
//! - A lone `Ready` never completes anything

use chrono::{Duration, TimeZone, Utc};
use evmon_core::*;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn state_name() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("Unplugged"),
        Just("Preparing"),
        Just("Charging"),
        Just("Finished"),
        Just("Ready"),
        Just("PausedByEV"),
        Just("Error"),
    ]
}

fn state_sequence() -> impl Strategy<Value = Vec<(&'static str, i64)>> {
    prop::collection::vec((state_name(), 0i64..10_000), 0..40)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Repeated start states keep the original start time and sequence
    #[test]
    fn repeated_start_is_idempotent(repeats in 1usize..10, step_ms in 1i64..5_000) {
        let mut tracker = CycleTracker::default();
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();

        tracker.observe("Charging", start);
        for i in 1..=repeats {
            let t = tracker.observe("Charging", start + Duration::milliseconds(step_ms * i as i64));
            prop_assert_eq!(t, Transition::Appended);
        }

        match tracker.state() {
            CycleState::InCycle { start_time, state_sequence } => {
                prop_assert_eq!(*start_time, start);
                prop_assert_eq!(state_sequence.len(), repeats + 1);
            }
            CycleState::Idle => prop_assert!(false, "cycle closed unexpectedly"),
        }
    }

    /// Completed cycles are well formed, whatever the input
    #[test]
    fn completed_cycles_well_formed(states in state_sequence()) {
        let mut tracker = CycleTracker::default();
        let mut now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        for (state, gap_ms) in states {
            now += Duration::milliseconds(gap_ms);
            if let Transition::Completed(cycle) = tracker.observe(state, now) {
                prop_assert!(!cycle.state_sequence.is_empty());
                prop_assert!(cycle.end_time > cycle.start_time);
                prop_assert_eq!(cycle.state_sequence.last().map(String::as_str), Some("Ready"));
                let expected = (cycle.end_time - cycle.start_time).num_milliseconds() as f64 / 1000.0;
                prop_assert_eq!(cycle.duration_seconds, expected);
                prop_assert_eq!(tracker.state(), &CycleState::Idle);
            }
        }
    }

    /// Ready states on their own never complete a cycle
    #[test]
    fn lone_ready_never_completes(count in 1usize..20) {
        let mut tracker = CycleTracker::default();
        let now = Utc::now();
        for _ in 0..count {
            prop_assert_eq!(tracker.observe("Ready", now), Transition::Ignored);
        }
    }
}

#[test]
fn test_cycle_completion_law() {
    let mut tracker = CycleTracker::default();
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();

    let mut cycles = Vec::new();
    for (i, state) in ["Preparing", "Charging", "Finished", "Ready"].into_iter().enumerate() {
        if let Transition::Completed(cycle) = tracker.observe(state, start + Duration::seconds(2 * i as i64)) {
            cycles.push(cycle);
        }
    }

    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].state_sequence, vec!["Preparing", "Charging", "Finished", "Ready"]);
    assert_eq!(
        cycles[0].duration_seconds,
        (cycles[0].end_time - cycles[0].start_time).num_seconds() as f64
    );
}
