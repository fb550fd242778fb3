//! Append-only session log
//!
//! Owns every classified record and completed cycle of a monitoring
//! session. All queries are reads over the log; statistics are recomputed
//! on demand.

use chrono::{DateTime, Utc};

use crate::stats::{CycleStats, RecordCounts, SessionStats};
use crate::types::*;

/// Session recorder
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    started_at: DateTime<Utc>,
    message_count: u64,
    dropped_count: u64,
    state_changes: Vec<StateChange>,
    errors: Vec<ErrorRecord>,
    phases: Vec<PhaseEvent>,
    cycles: Vec<ChargingCycle>,
}

impl SessionRecorder {
    /// Create an empty recorder for a session starting at `started_at`
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            message_count: 0,
            dropped_count: 0,
            state_changes: Vec::new(),
            errors: Vec::new(),
            phases: Vec::new(),
            cycles: Vec::new(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Count an inbound message, before classification
    pub fn count_message(&mut self) {
        self.message_count += 1;
    }

    /// Count a message that was received but could not be processed
    pub fn count_dropped(&mut self) {
        self.dropped_count += 1;
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// Append a classified record
    pub fn record(&mut self, record: Record) {
        match record {
            Record::StateChange(r) => self.state_changes.push(r),
            Record::Error(r) => self.errors.push(r),
            Record::Phase(r) => self.phases.push(r),
        }
    }

    /// Append a completed cycle
    pub fn complete_cycle(&mut self, cycle: ChargingCycle) {
        self.cycles.push(cycle);
    }

    pub fn state_changes(&self) -> &[StateChange] {
        &self.state_changes
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    pub fn phases(&self) -> &[PhaseEvent] {
        &self.phases
    }

    pub fn cycles(&self) -> &[ChargingCycle] {
        &self.cycles
    }

    /// Last `n` state changes, oldest first
    pub fn recent_state_changes(&self, n: usize) -> &[StateChange] {
        tail(&self.state_changes, n)
    }

    /// Last `n` errors, oldest first
    pub fn recent_errors(&self, n: usize) -> &[ErrorRecord] {
        tail(&self.errors, n)
    }

    /// Last `n` phase events, oldest first
    pub fn recent_phases(&self, n: usize) -> &[PhaseEvent] {
        tail(&self.phases, n)
    }

    pub fn last_cycle(&self) -> Option<&ChargingCycle> {
        self.cycles.last()
    }

    pub fn counts(&self) -> RecordCounts {
        RecordCounts {
            messages: self.message_count,
            dropped: self.dropped_count,
            state_changes: self.state_changes.len(),
            errors: self.errors.len(),
            phases: self.phases.len(),
            cycles: self.cycles.len(),
        }
    }

    pub fn cycle_stats(&self) -> CycleStats {
        CycleStats::from_cycles(&self.cycles)
    }

    /// Snapshot of the session as of `now`
    pub fn stats(&self, now: DateTime<Utc>) -> SessionStats {
        SessionStats::new(
            seconds_between(self.started_at, now),
            self.counts(),
            self.cycle_stats(),
        )
    }
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}
