//! Core types for bus monitoring

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded message payload
///
/// Decoding never fails: a payload that is not valid JSON is kept as its
/// (lossily decoded) text so that keyword checks can still inspect it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Zero-length payload
    Empty,
    /// Valid JSON document
    Structured(Value),
    /// Anything that failed to parse as JSON
    Unparsed(String),
}

impl Payload {
    /// Decode raw bytes from the bus
    pub fn decode(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Payload::Empty;
        }

        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Payload::Structured(value),
            Err(_) => Payload::Unparsed(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    /// String-keyed mapping view, if the payload is a JSON object
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Payload::Structured(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Textual form used for keyword matching
    ///
    /// An empty payload renders as `{}`, the same as an empty mapping.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Payload::Empty => Cow::Borrowed("{}"),
            Payload::Structured(value) => Cow::Owned(value.to_string()),
            Payload::Unparsed(raw) => Cow::Borrowed(raw.as_str()),
        }
    }

    /// JSON value stored alongside records
    pub fn to_value(&self) -> Value {
        match self {
            Payload::Empty => Value::Object(Map::new()),
            Payload::Structured(value) => value.clone(),
            Payload::Unparsed(raw) => Value::String(raw.clone()),
        }
    }

    /// Whether decoding produced structured content
    pub fn is_structured(&self) -> bool {
        matches!(self, Payload::Structured(_))
    }
}

/// A message received from the bus
#[derive(Debug, Clone)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub payload: Payload,
}

impl Event {
    /// Create an event from raw bus data
    pub fn new(timestamp: DateTime<Utc>, topic: impl Into<String>, payload: &[u8]) -> Self {
        Self {
            timestamp,
            topic: topic.into(),
            payload: Payload::decode(payload),
        }
    }

    /// Create an event stamped with the current time
    pub fn now(topic: impl Into<String>, payload: &[u8]) -> Self {
        Self::new(Utc::now(), topic, payload)
    }
}

/// Session phase label attached to every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No state change seen yet
    Initialization,
    /// No charging cycle open
    Idle,
    /// A charging cycle is open
    InCycle,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Initialization => write!(f, "Initialization"),
            SessionPhase::Idle => write!(f, "Idle"),
            SessionPhase::InCycle => write!(f, "InCycle"),
        }
    }
}

/// A recognised state update on a session-info topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub state: String,
    pub raw_payload: Value,
    pub phase_label: SessionPhase,
}

/// A payload that passed the error heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub raw_payload: Value,
    pub phase_label: SessionPhase,
}

/// A loosely matched charging-related message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseEvent {
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub raw_payload: Value,
    pub phase_label: SessionPhase,
}

/// Any record produced by the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    StateChange(StateChange),
    Error(ErrorRecord),
    Phase(PhaseEvent),
}

impl Record {
    pub fn topic(&self) -> &str {
        match self {
            Record::StateChange(r) => &r.topic,
            Record::Error(r) => &r.topic,
            Record::Phase(r) => &r.topic,
        }
    }

    pub fn phase_label(&self) -> SessionPhase {
        match self {
            Record::StateChange(r) => r.phase_label,
            Record::Error(r) => r.phase_label,
            Record::Phase(r) => r.phase_label,
        }
    }
}

/// A completed charging cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingCycle {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    /// States seen from cycle start up to and including the closing state
    pub state_sequence: Vec<String>,
}

/// Seconds between two timestamps with millisecond precision, never negative
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let millis = end.signed_duration_since(start).num_milliseconds();
    millis.max(0) as f64 / 1000.0
}
