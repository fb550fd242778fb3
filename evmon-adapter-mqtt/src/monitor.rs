//! Monitor control loop
//!
//! ## Message Flow
//!
//! 1. The MQTT listener forwards each publish over a channel
//! 2. The loop feeds it to the `MonitorSession` (classify, track, record)
//! 3. A completed cycle with auto-stop on schedules a delayed stop request
//! 4. Operator commands render reports from the recorder
//! 5. On any exit path the final summary is built from what was recorded
//!
//! The loop is the only task that touches session state.

use chrono::Utc;
use evmon_core::{Event, MonitorSession, Outcome, Transition};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::console::{OperatorCommand, COMMAND_HELP};
use crate::control::{AutoStop, StopReason, StopSignal};
use crate::listener::InboundMessage;
use crate::report::{self, SessionSummary};

/// The interactive bus monitor
pub struct Monitor {
    config: MonitorConfig,
    session: MonitorSession,
    stop: StopSignal,
    auto_stop: AutoStop,
    pending_stop: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Create a monitor; the session clock starts now
    pub fn new(config: MonitorConfig) -> Self {
        let session = MonitorSession::new(config.classifier.clone(), config.cycle.clone(), Utc::now());
        let auto_stop = AutoStop::new(config.auto_stop);

        Self {
            config,
            session,
            stop: StopSignal::new(),
            auto_stop,
            pending_stop: None,
        }
    }

    /// Handle to request a stop from another task
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Handle to the auto-stop toggle
    pub fn auto_stop(&self) -> AutoStop {
        self.auto_stop.clone()
    }

    pub fn session(&self) -> &MonitorSession {
        &self.session
    }

    /// Run until stopped, then return the final summary
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<InboundMessage>,
        mut commands: mpsc::Receiver<OperatorCommand>,
    ) -> SessionSummary {
        println!(
            "{}",
            report::render_menu(
                &self.config.readiness.nodered_url,
                self.auto_stop.is_enabled(),
                self.config.auto_stop_grace.as_secs()
            )
        );
        println!("\nTEST RUNNING... perform actions in the Node-RED UI now");
        info!("Monitor main loop started");

        let mut stats_tick = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.stats_interval,
            self.config.stats_interval,
        );
        let mut poll_tick = tokio::time::interval(self.config.poll_interval);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut commands_open = true;

        let reason = loop {
            tokio::select! {
                msg = inbound.recv() => {
                    match msg {
                        Some(msg) => {
                            self.handle_message(msg);
                        }
                        None => {
                            warn!("Listener channel closed");
                            break StopReason::ListenerClosed;
                        }
                    }
                }

                cmd = commands.recv(), if commands_open => {
                    match cmd {
                        Some(cmd) => {
                            self.handle_command(cmd);
                            if let Some(reason) = self.take_stop() {
                                break reason;
                            }
                        }
                        None => {
                            debug!("Operator input closed");
                            commands_open = false;
                        }
                    }
                }

                _ = stats_tick.tick() => {
                    println!("{}", report::render_live_stats(self.session.recorder(), self.session.phase(), Utc::now()));
                }

                _ = poll_tick.tick() => {
                    if let Some(reason) = self.take_stop() {
                        break reason;
                    }
                }

                _ = &mut ctrl_c => {
                    println!("\nTest interrupted by operator");
                    break StopReason::Interrupted;
                }
            }
        };

        if let Some(pending) = self.pending_stop.take() {
            pending.abort();
        }

        info!("Monitor stopped: {}", reason);
        let summary = SessionSummary::new(self.session.recorder(), reason, Utc::now());
        println!("{}", report::render_final_report(&summary));
        summary
    }

    /// Stop reason if a stop was requested, announcing an automatic stop
    fn take_stop(&self) -> Option<StopReason> {
        let reason = self.stop.requested()?;
        if reason == StopReason::AutoStop {
            println!("\n{}", "=".repeat(60));
            println!("AUTOMATIC STOP AFTER CHARGING CYCLE");
            println!("{}", "=".repeat(60));
        }
        Some(reason)
    }

    /// Process one inbound message
    pub fn handle_message(&mut self, msg: InboundMessage) -> Outcome {
        let event = Event::new(msg.received_at, msg.topic, &msg.payload);
        let topic = event.topic.clone();
        let outcome = self.session.ingest(event);

        if outcome.dropped {
            warn!("Dropped message without topic");
            return outcome;
        }

        if let Some(state) = &outcome.state {
            info!("STATE CHANGE: {}", state);
        }

        match &outcome.transition {
            Some(Transition::Started) => info!("CHARGING CYCLE STARTED"),
            Some(Transition::Completed(cycle)) => {
                info!("CHARGING CYCLE FINISHED - duration: {:.1}s", cycle.duration_seconds);
                self.on_cycle_completed();
            }
            _ => {}
        }

        if outcome.is_error {
            warn!("REAL ERROR DETECTED: {}", topic);
        }
        if outcome.is_phase {
            debug!("Charging phase activity on {}", topic);
        }

        outcome
    }

    /// Schedule the automatic stop if enabled
    fn on_cycle_completed(&mut self) {
        if !self.auto_stop.is_enabled() {
            return;
        }
        if self.pending_stop.is_some() {
            debug!("Auto-stop already scheduled");
            return;
        }

        let grace = self.config.auto_stop_grace;
        info!("Stopping test in {}s...", grace.as_secs());
        self.pending_stop = Some(self.stop.request_stop_after(grace));
    }

    /// Execute an operator command; quit only requests the stop
    pub fn handle_command(&mut self, cmd: OperatorCommand) {
        let recorder = self.session.recorder();
        let now = Utc::now();

        let output = match cmd {
            OperatorCommand::LiveStats => report::render_live_stats(recorder, self.session.phase(), now),
            OperatorCommand::SessionInfo => report::render_session_info(recorder),
            OperatorCommand::CycleReport => report::render_cycle_report(recorder),
            OperatorCommand::ErrorReport => report::render_error_report(recorder),
            OperatorCommand::PerformanceReport => report::render_performance_report(recorder, now),
            OperatorCommand::ToggleAutoStop => {
                let enabled = self.auto_stop.toggle();
                info!("Auto-stop after cycle: {}", report::on_off(enabled));
                format!("\nAuto-stop after cycle: {}", report::on_off(enabled))
            }
            OperatorCommand::Quit => {
                self.stop.request_stop(StopReason::OperatorQuit);
                "\nStopping test...".to_string()
            }
            OperatorCommand::Unknown(input) => {
                format!("\nUnknown command: '{}'\n   {}", input, COMMAND_HELP)
            }
        };

        println!("{}", output);
    }
}
