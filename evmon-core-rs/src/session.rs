//! Per-message processing pipeline
//!
//! `MonitorSession` is the single writer for a monitoring session: it
//! classifies each message, drives the cycle tracker and appends the
//! results to the recorder.

use chrono::{DateTime, Utc};

use crate::classifier::{Classifier, ClassifierConfig};
use crate::cycle::{CycleConfig, CycleTracker, Transition};
use crate::recorder::SessionRecorder;
use crate::types::*;

/// What happened while ingesting one message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    /// Message was counted but not classified
    pub dropped: bool,
    /// State value, when the message was a state change
    pub state: Option<String>,
    /// Cycle tracker transition caused by the state change
    pub transition: Option<Transition>,
    pub is_error: bool,
    pub is_phase: bool,
}

impl Outcome {
    /// The cycle completed by this message, if any
    pub fn completed_cycle(&self) -> Option<&ChargingCycle> {
        match &self.transition {
            Some(Transition::Completed(cycle)) => Some(cycle),
            _ => None,
        }
    }

    pub fn cycle_started(&self) -> bool {
        matches!(self.transition, Some(Transition::Started))
    }
}

/// Classifier, cycle tracker and recorder for one session
#[derive(Debug, Clone)]
pub struct MonitorSession {
    classifier: Classifier,
    tracker: CycleTracker,
    recorder: SessionRecorder,
}

impl MonitorSession {
    pub fn new(classifier: ClassifierConfig, cycle: CycleConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            classifier: Classifier::new(classifier),
            tracker: CycleTracker::new(cycle),
            recorder: SessionRecorder::new(started_at),
        }
    }

    /// Session with default rules starting now
    pub fn start_now() -> Self {
        Self::new(ClassifierConfig::default(), CycleConfig::default(), Utc::now())
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    pub fn tracker(&self) -> &CycleTracker {
        &self.tracker
    }

    pub fn phase(&self) -> SessionPhase {
        self.tracker.phase()
    }

    /// Process raw bus data received at `now`
    pub fn ingest_raw(&mut self, topic: &str, payload: &[u8], now: DateTime<Utc>) -> Outcome {
        self.ingest(Event::new(now, topic, payload))
    }

    /// Process one event
    ///
    /// The state change is applied to the tracker first, so every record
    /// from this event carries the resulting phase label.
    pub fn ingest(&mut self, event: Event) -> Outcome {
        self.recorder.count_message();

        // A message without a topic cannot be attributed to anything
        if event.topic.is_empty() {
            self.recorder.count_dropped();
            return Outcome {
                dropped: true,
                ..Outcome::default()
            };
        }

        let signals = self.classifier.signals(&event.topic, &event.payload);

        let transition = signals
            .state
            .as_deref()
            .map(|state| self.tracker.observe(state, event.timestamp));

        let outcome = Outcome {
            dropped: false,
            state: signals.state.clone(),
            transition,
            is_error: signals.is_error,
            is_phase: signals.is_phase,
        };

        for record in signals.into_records(&event, self.tracker.phase()) {
            self.recorder.record(record);
        }

        if let Some(cycle) = outcome.completed_cycle() {
            self.recorder.complete_cycle(cycle.clone());
        }

        outcome
    }
}
