//! EVerest monitor core
//!
//! Turns a raw stream of bus messages into session-level facts for an
//! EV charging stack: state changes, genuine errors, charging-phase
//! activity and completed charging cycles.
//!
//! ```text
//! (topic, payload)
//!       │
//!       ▼
//! ┌──────────────┐  state   ┌──────────────┐
//! │  Classifier  │─────────►│ CycleTracker │
//! └──────┬───────┘          └──────┬───────┘
//!        │ records                 │ cycles
//!        ▼                         ▼
//! ┌──────────────────────────────────────┐
//! │           SessionRecorder            │
//! └──────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate performs I/O; the MQTT listener and operator
//! reporting live in `evmon-adapter-mqtt`.

pub mod types;
pub mod classifier;
pub mod cycle;
pub mod recorder;
pub mod stats;
pub mod session;

pub use types::*;
pub use classifier::{Classifier, ClassifierConfig, Signals};
pub use cycle::{CycleConfig, CycleState, CycleTracker, Transition, MIN_CYCLE_DURATION_MS};
pub use recorder::SessionRecorder;
pub use stats::{ActivityRating, Assessment, Criterion, CycleStats, RecordCounts, SessionStats, Verdict};
pub use session::{MonitorSession, Outcome};
