//! Operator-facing reports
//!
//! Every function renders a snapshot of the session recorder as plain text.
//! Nothing here mutates session state.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use evmon_core::{SessionPhase, SessionRecorder, SessionStats};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::control::StopReason;

/// Phase events shown in the session info report
pub const RECENT_PHASES: usize = 5;
/// Payload fields shown per phase event
pub const PAYLOAD_FIELDS: usize = 3;
/// Errors shown in the error report
pub const RECENT_ERRORS: usize = 3;
/// States shown per cycle in the cycle report
pub const CYCLE_STATES: usize = 5;

const RULE: &str = "============================================================";

fn clock(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Interactive menu shown at session start
pub fn render_menu(nodered_url: &str, auto_stop: bool, grace_secs: u64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", RULE);
    let _ = writeln!(out, "INTERACTIVE TEST CONTROL");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Actions during the test:");
    let _ = writeln!(out, "   In the Node-RED UI ({}):", nodered_url);
    let _ = writeln!(out, "      - plug in the vehicle");
    let _ = writeln!(out, "      - start charging");
    let _ = writeln!(out, "      - unplug the vehicle");
    let _ = writeln!(out, "      - adjust the charging power");
    let _ = writeln!(out, "   In this terminal (confirm with ENTER):");
    let _ = writeln!(out, "      - ENTER: live statistics");
    let _ = writeln!(out, "      - 's': session details");
    let _ = writeln!(out, "      - 'c': charging cycle report");
    let _ = writeln!(out, "      - 'e': error report");
    let _ = writeln!(out, "      - 'p': performance report");
    let _ = writeln!(out, "      - 'a': toggle auto-stop (currently {})", on_off(auto_stop));
    let _ = writeln!(out, "      - 'q': stop the test");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(
        out,
        "Hint: with auto-stop on, the test ends {}s after a completed charging cycle",
        grace_secs
    );
    let _ = write!(out, "{}", RULE);
    out
}

pub fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}

/// Live statistics
pub fn render_live_stats(recorder: &SessionRecorder, phase: SessionPhase, now: DateTime<Utc>) -> String {
    let stats = recorder.stats(now);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\nLIVE STATISTICS [{}] - runtime: {}s",
        clock(now),
        stats.elapsed_seconds as u64
    );
    let _ = writeln!(out, "   Messages:          {}", stats.counts.messages);
    let _ = writeln!(out, "   State changes:     {}", stats.counts.state_changes);
    let _ = writeln!(out, "   Real errors:       {}", stats.counts.errors);
    let _ = writeln!(out, "   Charging phases:   {}", stats.counts.phases);
    let _ = writeln!(out, "   Complete cycles:   {}", stats.counts.cycles);
    let _ = write!(out, "   Current phase:     {}", phase);
    if let Some(last) = stats.cycles.last_seconds {
        let _ = write!(out, "\n   Last cycle:        {:.1}s", last);
    }
    out
}

/// Last phase events with a few payload fields each
pub fn render_session_info(recorder: &SessionRecorder) -> String {
    let mut out = String::from("\nSESSION DETAILS:");
    let phases = recorder.recent_phases(RECENT_PHASES);

    if phases.is_empty() {
        out.push_str("\n   No session information available");
        return out;
    }

    let _ = write!(out, "\n   Last {} charging phases:", phases.len());
    for phase in phases {
        let _ = write!(out, "\n      {} - {}", clock(phase.timestamp), phase.topic);
        if let Value::Object(map) = &phase.raw_payload {
            for (key, value) in map.iter().take(PAYLOAD_FIELDS) {
                let _ = write!(out, "\n         {}: {}", key, value);
            }
        }
    }
    out
}

/// Completed cycles with their trailing states
pub fn render_cycle_report(recorder: &SessionRecorder) -> String {
    let mut out = String::from("\nCHARGING CYCLE REPORT:");
    let cycles = recorder.cycles();

    if cycles.is_empty() {
        out.push_str("\n   No complete charging cycles captured yet");
        return out;
    }

    for (i, cycle) in cycles.iter().enumerate() {
        let tail = &cycle.state_sequence[cycle.state_sequence.len().saturating_sub(CYCLE_STATES)..];
        let _ = write!(out, "\n   Cycle {}: {:.1}s", i + 1, cycle.duration_seconds);
        let _ = write!(out, "\n      States: {}", tail.join(" → "));
    }
    out
}

/// Error count and the most recent errors
pub fn render_error_report(recorder: &SessionRecorder) -> String {
    let mut out = String::from("\nERROR REPORT:");
    let errors = recorder.errors();

    if errors.is_empty() {
        out.push_str("\n   No real errors detected");
        return out;
    }

    let _ = write!(out, "\n   Real errors detected: {}", errors.len());
    for error in recorder.recent_errors(RECENT_ERRORS) {
        let _ = write!(out, "\n   {} - {} [{}]", clock(error.timestamp), error.topic, error.phase_label);
    }
    out
}

/// Rate and activity rating
pub fn render_performance_report(recorder: &SessionRecorder, now: DateTime<Utc>) -> String {
    let stats = recorder.stats(now);
    let mut out = String::from("\nPERFORMANCE REPORT:");
    let _ = write!(out, "\n   Runtime:           {} seconds", stats.elapsed_seconds as u64);
    let _ = write!(out, "\n   Messages:          {}", stats.counts.messages);
    let _ = write!(out, "\n   Messages/second:   {:.2}", stats.message_rate);
    let _ = write!(out, "\n   State changes:     {}", stats.counts.state_changes);
    let _ = write!(out, "\n   Charging cycles:   {}", stats.counts.cycles);
    let _ = write!(out, "\n   RATING: {}", stats.rating.to_string().to_uppercase());
    out
}

/// Final session summary, also written as JSON on request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub stop_reason: StopReason,
    pub stats: SessionStats,
    pub assessment: evmon_core::Assessment,
    pub cycles: Vec<evmon_core::ChargingCycle>,
}

impl SessionSummary {
    pub fn new(recorder: &SessionRecorder, stop_reason: StopReason, now: DateTime<Utc>) -> Self {
        let stats = recorder.stats(now);
        let assessment = stats.assess();
        Self {
            started_at: recorder.started_at(),
            ended_at: now,
            stop_reason,
            stats,
            assessment,
            cycles: recorder.cycles().to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Whether every assessment criterion passed
    pub fn passed(&self) -> bool {
        self.assessment.passed == self.assessment.total
    }
}

/// Final report printed on every exit path
pub fn render_final_report(summary: &SessionSummary) -> String {
    let stats = &summary.stats;
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", RULE);
    let _ = writeln!(out, "FINAL REPORT - INTERACTIVE TEST ({})", summary.stop_reason);
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "TEST STATISTICS:");
    let _ = writeln!(out, "   Total duration:           {} seconds", stats.elapsed_seconds as u64);
    let _ = writeln!(out, "   Messages received:        {}", stats.counts.messages);
    let _ = writeln!(out, "   Average messages/second:  {:.2}", stats.message_rate);
    let _ = writeln!(out, "   State changes:            {}", stats.counts.state_changes);
    let _ = writeln!(out, "   Real errors:              {}", stats.counts.errors);
    let _ = writeln!(out, "   Charging phases:          {}", stats.counts.phases);
    let _ = writeln!(out, "   Complete cycles:          {}", stats.counts.cycles);
    if stats.counts.dropped > 0 {
        let _ = writeln!(out, "   Dropped messages:         {}", stats.counts.dropped);
    }

    if stats.cycles.count > 0 {
        let _ = writeln!(out, "\nCHARGING CYCLE ANALYSIS:");
        let _ = writeln!(out, "   Average cycle duration:   {:.1}s", stats.cycles.average_seconds);
        let _ = writeln!(out, "   Total charging time:      {:.1}s", stats.cycles.total_seconds);
    }

    let _ = writeln!(out, "\nASSESSMENT:");
    for criterion in &summary.assessment.criteria {
        let mark = if criterion.passed { "[ok]  " } else { "[FAIL]" };
        let _ = writeln!(out, "   {} {}", mark, criterion.name);
    }
    let _ = writeln!(
        out,
        "\nRESULT: {}/{} criteria met",
        summary.assessment.passed, summary.assessment.total
    );
    let _ = write!(out, "{}", summary.assessment.verdict);
    out
}
