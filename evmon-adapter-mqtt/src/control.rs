//! Session control flags
//!
//! The control loop is the only writer of session state. The two flags here
//! are the only values shared across tasks: the stop request, which the
//! auto-stop timer may set, and the operator's auto-stop toggle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StopReason {
    /// Operator pressed `q`
    OperatorQuit,
    /// Grace delay elapsed after a completed cycle
    AutoStop,
    /// Ctrl-C
    Interrupted,
    /// The listener closed its channel
    ListenerClosed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::OperatorQuit => write!(f, "stopped by operator"),
            StopReason::AutoStop => write!(f, "automatic stop after charging cycle"),
            StopReason::Interrupted => write!(f, "interrupted"),
            StopReason::ListenerClosed => write!(f, "listener closed"),
        }
    }
}

/// Cooperative stop request, polled by the control loop
///
/// The first request wins; later requests keep its reason.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<OnceLock<StopReason>>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop, returning false if one was already requested
    pub fn request_stop(&self, reason: StopReason) -> bool {
        self.requested.set(reason).is_ok()
    }

    /// Reason of the first stop request, if any
    pub fn requested(&self) -> Option<StopReason> {
        self.requested.get().copied()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.get().is_some()
    }

    /// Request an auto-stop after `delay`, leaving time for trailing messages
    pub fn request_stop_after(&self, delay: Duration) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if signal.request_stop(StopReason::AutoStop) {
                info!("Auto-stop grace period elapsed, stopping session");
            }
        })
    }
}

/// Operator-togglable auto-stop setting
#[derive(Debug, Clone)]
pub struct AutoStop {
    enabled: Arc<AtomicBool>,
}

impl AutoStop {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flip the setting, returning the new value
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::SeqCst)
    }
}
