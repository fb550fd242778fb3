//! Message classification
//!
//! Turns a `(topic, payload)` pair into typed records. Three independent
//! checks run on every message:
//! - state change: session-info topic with a `state` field
//! - error: topic not on the deny-list, and a truthy fault-like field
//! - phase: charging keywords anywhere in the serialized payload
//!
//! A single message may produce all three.

use serde_json::Value;

use crate::types::*;

/// Classifier configuration
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Topic substring marking session information
    pub session_marker: String,
    /// Topic substrings never classified as errors
    pub deny_list: Vec<String>,
    /// Lowercase key fragments that mark a field as an error indicator
    pub error_indicators: Vec<String>,
    /// Lowercase keywords that mark a payload as charging-related
    pub phase_keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            session_marker: "session_info".to_string(),
            deny_list: vec![
                "error_history/cmd".to_string(),
                "errors/var/active_errors".to_string(),
                "evse_manager/var/session_info".to_string(),
            ],
            error_indicators: vec![
                "fault".to_string(),
                "failure".to_string(),
                "critical".to_string(),
                "emergency".to_string(),
            ],
            phase_keywords: vec![
                "charging".to_string(),
                "plug".to_string(),
                "power".to_string(),
                "session".to_string(),
            ],
        }
    }
}

impl ClassifierConfig {
    /// Add a topic substring to the deny-list
    pub fn with_denied_topic(mut self, pattern: impl Into<String>) -> Self {
        self.deny_list.push(pattern.into());
        self
    }

    /// Replace the session-info topic marker
    pub fn with_session_marker(mut self, marker: impl Into<String>) -> Self {
        self.session_marker = marker.into();
        self
    }
}

/// What the checks found in one message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signals {
    /// Value of the `state` field, when the state check matched
    pub state: Option<String>,
    pub is_error: bool,
    pub is_phase: bool,
}

impl Signals {
    /// Whether no check matched
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && !self.is_error && !self.is_phase
    }

    /// Build the records for `event`, labelled with `phase_label`
    ///
    /// Order is state change, error, phase.
    pub fn into_records(self, event: &Event, phase_label: SessionPhase) -> Vec<Record> {
        let mut records = Vec::new();
        let raw_payload = event.payload.to_value();

        if let Some(state) = self.state {
            records.push(Record::StateChange(StateChange {
                timestamp: event.timestamp,
                topic: event.topic.clone(),
                state,
                raw_payload: raw_payload.clone(),
                phase_label,
            }));
        }

        if self.is_error {
            records.push(Record::Error(ErrorRecord {
                timestamp: event.timestamp,
                topic: event.topic.clone(),
                raw_payload: raw_payload.clone(),
                phase_label,
            }));
        }

        if self.is_phase {
            records.push(Record::Phase(PhaseEvent {
                timestamp: event.timestamp,
                topic: event.topic.clone(),
                raw_payload,
                phase_label,
            }));
        }

        records
    }
}

/// Stateless message classifier
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Run all checks on a message
    pub fn signals(&self, topic: &str, payload: &Payload) -> Signals {
        Signals {
            state: self.detect_state(topic, payload),
            is_error: self.is_real_error(topic, payload),
            is_phase: self.is_phase_event(payload),
        }
    }

    /// Classify an event into records labelled with `phase_label`
    pub fn classify(&self, event: &Event, phase_label: SessionPhase) -> Vec<Record> {
        self.signals(&event.topic, &event.payload)
            .into_records(event, phase_label)
    }

    /// Extract the `state` value from a session-info message
    ///
    /// Non-string states are rendered as compact JSON.
    pub fn detect_state(&self, topic: &str, payload: &Payload) -> Option<String> {
        if !topic.contains(&self.config.session_marker) {
            return None;
        }

        let state = payload.as_object()?.get("state")?;
        Some(match state {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Two-stage error filter: deny-list on topic, then indicator fields
    pub fn is_real_error(&self, topic: &str, payload: &Payload) -> bool {
        if self.is_denied_topic(topic) {
            return false;
        }

        let Some(map) = payload.as_object() else {
            return false;
        };

        map.iter().any(|(key, value)| {
            let key = key.to_lowercase();
            self.config
                .error_indicators
                .iter()
                .any(|indicator| key.contains(indicator.as_str()))
                && is_alarming(value)
        })
    }

    /// Whether the topic is suppressed from error classification
    pub fn is_denied_topic(&self, topic: &str) -> bool {
        self.config
            .deny_list
            .iter()
            .any(|pattern| topic.contains(pattern.as_str()))
    }

    /// Coarse keyword match on the serialized payload
    pub fn is_phase_event(&self, payload: &Payload) -> bool {
        let text = payload.text().to_lowercase();
        self.config
            .phase_keywords
            .iter()
            .any(|keyword| text.contains(keyword.as_str()))
    }
}

/// Truthy, and not the literal strings `"None"` or `"false"`
fn is_alarming(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty() && s != "None" && s != "false",
        other => is_truthy(other),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
