//! Control loop tests driven through in-memory channels

use std::time::Duration;

use chrono::{DateTime, Utc};
use evmon_adapter_mqtt::{InboundMessage, Monitor, MonitorConfig, OperatorCommand, StopReason};
use tokio::sync::mpsc;

const SESSION_TOPIC: &str = "everest_api/evse_manager/var/session_info";

fn state_message(state: &str, at: DateTime<Utc>) -> InboundMessage {
    InboundMessage {
        topic: SESSION_TOPIC.to_string(),
        payload: format!(r#"{{"state":"{}"}}"#, state).into_bytes(),
        received_at: at,
    }
}

fn charging_cycle(start: DateTime<Utc>) -> Vec<InboundMessage> {
    ["Preparing", "Charging", "Finished", "Ready"]
        .iter()
        .enumerate()
        .map(|(i, s)| state_message(s, start + chrono::Duration::seconds(2 * i as i64)))
        .collect()
}

fn test_config(auto_stop: bool) -> MonitorConfig {
    MonitorConfig::default()
        .without_readiness_checks()
        .with_auto_stop(auto_stop, Duration::from_secs(10))
}

#[tokio::test(start_paused = true)]
async fn test_auto_stop_after_cycle() {
    let (msg_tx, msg_rx) = mpsc::channel(16);
    let (_cmd_tx, cmd_rx) = mpsc::channel::<OperatorCommand>(4);

    for msg in charging_cycle(Utc::now()) {
        msg_tx.send(msg).await.unwrap();
    }

    let summary = Monitor::new(test_config(true)).run(msg_rx, cmd_rx).await;

    assert_eq!(summary.stop_reason, StopReason::AutoStop);
    assert_eq!(summary.stats.counts.cycles, 1);
    assert_eq!(summary.stats.counts.state_changes, 4);
    assert_eq!(summary.stats.counts.errors, 0);
    assert_eq!(summary.cycles[0].duration_seconds, 6.0);
    assert_eq!(
        summary.cycles[0].state_sequence,
        vec!["Preparing", "Charging", "Finished", "Ready"]
    );
    drop(msg_tx);
}

#[tokio::test(start_paused = true)]
async fn test_no_auto_stop_when_disabled() {
    let (msg_tx, msg_rx) = mpsc::channel(16);
    let (_cmd_tx, cmd_rx) = mpsc::channel::<OperatorCommand>(4);

    for msg in charging_cycle(Utc::now()) {
        msg_tx.send(msg).await.unwrap();
    }
    drop(msg_tx);

    let summary = Monitor::new(test_config(false)).run(msg_rx, cmd_rx).await;

    // Only the closed channel ends the session
    assert_eq!(summary.stop_reason, StopReason::ListenerClosed);
    assert_eq!(summary.stats.counts.cycles, 1);
}

#[tokio::test(start_paused = true)]
async fn test_error_classification_through_loop() {
    let (msg_tx, msg_rx) = mpsc::channel(16);
    let (_cmd_tx, cmd_rx) = mpsc::channel::<OperatorCommand>(4);

    msg_tx
        .send(InboundMessage::new("errors/var/active_errors", r#"{"fault":"true"}"#))
        .await
        .unwrap();
    msg_tx
        .send(InboundMessage::new("some/other/topic", r#"{"fault_detected":"true"}"#))
        .await
        .unwrap();
    msg_tx
        .send(InboundMessage::new("some/other/topic", "not json"))
        .await
        .unwrap();
    drop(msg_tx);

    let summary = Monitor::new(test_config(true)).run(msg_rx, cmd_rx).await;

    assert_eq!(summary.stats.counts.messages, 3);
    assert_eq!(summary.stats.counts.errors, 1);
    assert_eq!(summary.stats.counts.cycles, 0);
    assert_eq!(summary.stop_reason, StopReason::ListenerClosed);
}

#[tokio::test(start_paused = true)]
async fn test_operator_quit() {
    let (_msg_tx, msg_rx) = mpsc::channel::<InboundMessage>(4);
    let (cmd_tx, cmd_rx) = mpsc::channel(4);

    cmd_tx.send(OperatorCommand::Quit).await.unwrap();

    let summary = Monitor::new(test_config(true)).run(msg_rx, cmd_rx).await;
    assert_eq!(summary.stop_reason, StopReason::OperatorQuit);
    assert_eq!(summary.stats.counts.messages, 0);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_disables_scheduled_stop() {
    let mut monitor = Monitor::new(test_config(true));
    let stop = monitor.stop_signal();

    monitor.handle_command(OperatorCommand::ToggleAutoStop);
    assert!(!monitor.auto_stop().is_enabled());

    for msg in charging_cycle(Utc::now()) {
        monitor.handle_message(msg);
    }
    assert_eq!(monitor.session().recorder().cycles().len(), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!stop.is_stop_requested());
}

#[tokio::test(start_paused = true)]
async fn test_cycle_schedules_stop_after_grace() {
    let mut monitor = Monitor::new(test_config(true));
    let stop = monitor.stop_signal();

    let outcomes: Vec<_> = charging_cycle(Utc::now())
        .into_iter()
        .map(|msg| monitor.handle_message(msg))
        .collect();
    assert!(outcomes[3].completed_cycle().is_some());

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(!stop.is_stop_requested());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(stop.is_stop_requested());
}

#[tokio::test(start_paused = true)]
async fn test_quit_while_auto_stop_pending() {
    let (msg_tx, msg_rx) = mpsc::channel(16);
    let (cmd_tx, cmd_rx) = mpsc::channel(4);

    for msg in charging_cycle(Utc::now()) {
        msg_tx.send(msg).await.unwrap();
    }
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        cmd_tx.send(OperatorCommand::Quit).await.unwrap();
    });

    let summary = Monitor::new(test_config(true)).run(msg_rx, cmd_rx).await;

    assert_eq!(summary.stats.counts.cycles, 1);
    assert_eq!(summary.stop_reason, StopReason::OperatorQuit);
    drop(msg_tx);
}

#[tokio::test(start_paused = true)]
async fn test_external_stop_while_auto_stop_pending() {
    let mut monitor = Monitor::new(test_config(true));
    let stop = monitor.stop_signal();

    for msg in charging_cycle(Utc::now()) {
        monitor.handle_message(msg);
    }
    assert!(stop.request_stop(StopReason::Interrupted));

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(stop.requested(), Some(StopReason::Interrupted));

    let (_msg_tx, msg_rx) = mpsc::channel::<InboundMessage>(4);
    let (_cmd_tx, cmd_rx) = mpsc::channel::<OperatorCommand>(4);
    let summary = monitor.run(msg_rx, cmd_rx).await;
    assert_eq!(summary.stop_reason, StopReason::Interrupted);
}

#[tokio::test(start_paused = true)]
async fn test_live_stats_ticks_keep_loop_running() {
    let (msg_tx, msg_rx) = mpsc::channel(16);
    let (cmd_tx, cmd_rx) = mpsc::channel(4);
    let config = test_config(false).with_stats_interval(Duration::from_secs(30));

    msg_tx
        .send(InboundMessage::new("everest_api/evse_manager/var/power", r#"{"power_w":7400}"#))
        .await
        .unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(95)).await;
        cmd_tx.send(OperatorCommand::LiveStats).await.unwrap();
        cmd_tx.send(OperatorCommand::Quit).await.unwrap();
    });

    let started = tokio::time::Instant::now();
    let summary = Monitor::new(config).run(msg_rx, cmd_rx).await;

    // Three stats ticks elapsed before the operator quit
    assert!(started.elapsed() >= Duration::from_secs(95));
    assert_eq!(summary.stop_reason, StopReason::OperatorQuit);
    assert_eq!(summary.stats.counts.messages, 1);
    assert_eq!(summary.stats.counts.phases, 1);
    drop(msg_tx);
}

