//! Derived session statistics
//!
//! Everything here is computed from the recorder's log and never stored
//! independently of it.

use serde::{Deserialize, Serialize};

use crate::types::ChargingCycle;

/// Rate above which activity is considered very high
pub const RATE_VERY_HIGH: f64 = 50.0;
/// Rate above which activity is considered optimal
pub const RATE_OPTIMAL: f64 = 20.0;
/// Rate above which activity is considered normal
pub const RATE_NORMAL: f64 = 10.0;

/// Counts by record kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub messages: u64,
    pub dropped: u64,
    pub state_changes: usize,
    pub errors: usize,
    pub phases: usize,
    pub cycles: usize,
}

/// Aggregate over completed cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    pub count: usize,
    pub total_seconds: f64,
    pub average_seconds: f64,
    pub last_seconds: Option<f64>,
}

impl CycleStats {
    pub fn from_cycles(cycles: &[ChargingCycle]) -> Self {
        let total_seconds: f64 = cycles.iter().map(|c| c.duration_seconds).sum();
        let average_seconds = if cycles.is_empty() {
            0.0
        } else {
            total_seconds / cycles.len() as f64
        };

        Self {
            count: cycles.len(),
            total_seconds,
            average_seconds,
            last_seconds: cycles.last().map(|c| c.duration_seconds),
        }
    }
}

/// Message-rate based activity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityRating {
    VeryHigh,
    Optimal,
    Normal,
    Low,
}

impl ActivityRating {
    pub fn from_rate(rate: f64) -> Self {
        if rate > RATE_VERY_HIGH {
            ActivityRating::VeryHigh
        } else if rate > RATE_OPTIMAL {
            ActivityRating::Optimal
        } else if rate > RATE_NORMAL {
            ActivityRating::Normal
        } else {
            ActivityRating::Low
        }
    }
}

impl std::fmt::Display for ActivityRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityRating::VeryHigh => write!(f, "very high activity"),
            ActivityRating::Optimal => write!(f, "optimal activity"),
            ActivityRating::Normal => write!(f, "normal activity"),
            ActivityRating::Low => write!(f, "low activity"),
        }
    }
}

/// Point-in-time session summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub elapsed_seconds: f64,
    pub counts: RecordCounts,
    /// Messages per second; zero when no time has elapsed
    pub message_rate: f64,
    pub rating: ActivityRating,
    pub cycles: CycleStats,
}

impl SessionStats {
    pub fn new(elapsed_seconds: f64, counts: RecordCounts, cycles: CycleStats) -> Self {
        let message_rate = message_rate(counts.messages, elapsed_seconds);
        Self {
            elapsed_seconds,
            counts,
            message_rate,
            rating: ActivityRating::from_rate(message_rate),
            cycles,
        }
    }

    /// Evaluate the session against the acceptance criteria
    pub fn assess(&self) -> Assessment {
        Assessment::evaluate(&self.counts)
    }
}

/// `messages / elapsed`, or zero for a non-positive interval
pub fn message_rate(messages: u64, elapsed_seconds: f64) -> f64 {
    if elapsed_seconds > 0.0 {
        messages as f64 / elapsed_seconds
    } else {
        0.0
    }
}

/// A single pass/fail criterion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    pub passed: bool,
}

/// Overall verdict of an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Every criterion met
    Excellent,
    /// At least 70 % of criteria met
    Good,
    Limited,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Excellent => write!(f, "EXCELLENT - system behaves as expected"),
            Verdict::Good => write!(f, "GOOD - system shows the expected behaviour"),
            Verdict::Limited => write!(f, "LIMITED - check the system configuration"),
        }
    }
}

/// Session acceptance evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub criteria: Vec<Criterion>,
    pub passed: usize,
    pub total: usize,
    pub verdict: Verdict,
}

impl Assessment {
    pub fn evaluate(counts: &RecordCounts) -> Self {
        let criteria = vec![
            Criterion {
                name: "Message flow".to_string(),
                passed: counts.messages > 100,
            },
            Criterion {
                name: "State changes".to_string(),
                passed: counts.state_changes > 5,
            },
            Criterion {
                name: "Charging cycles captured".to_string(),
                passed: counts.cycles > 0,
            },
            Criterion {
                name: "Error detection".to_string(),
                passed: counts.errors == 0,
            },
        ];

        let passed = criteria.iter().filter(|c| c.passed).count();
        let total = criteria.len();
        // passed/total >= 0.7, kept in integers
        let verdict = if passed == total {
            Verdict::Excellent
        } else if passed * 10 >= total * 7 {
            Verdict::Good
        } else {
            Verdict::Limited
        };

        Self {
            criteria,
            passed,
            total,
            verdict,
        }
    }
}
