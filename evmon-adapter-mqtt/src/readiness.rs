//! Pre-start system checks
//!
//! Before a session starts, three services must answer:
//! - Node-RED UI: HTTP 200 on the dashboard URL
//! - MQTT broker: accepts a connection
//! - Charging stack: publishes at least one message within the activity window

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, QoS};
use tracing::{debug, info, warn};

use crate::config::{MqttConfig, ReadinessConfig};
use crate::listener::{mqtt_options, wait_for_connack};

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub ready: bool,
}

/// Outcome of all checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessReport {
    pub checks: Vec<CheckResult>,
}

impl ReadinessReport {
    pub fn push(&mut self, name: impl Into<String>, ready: bool) {
        self.checks.push(CheckResult {
            name: name.into(),
            ready,
        });
    }

    /// True when every check passed
    pub fn all_ready(&self) -> bool {
        self.checks.iter().all(|c| c.ready)
    }

    /// Names of the failed checks
    pub fn failed(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.ready)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Operator-facing summary, one line per check
    pub fn render(&self) -> String {
        let mut out = String::from("Checking system status...\n");
        for check in &self.checks {
            let mark = if check.ready { "[ok]  " } else { "[FAIL]" };
            let status = if check.ready { "ready" } else { "not ready" };
            out.push_str(&format!("   {} {}: {}\n", mark, check.name, status));
        }
        out
    }
}

/// Run all checks concurrently
pub async fn check_system(mqtt: &MqttConfig, readiness: &ReadinessConfig) -> ReadinessReport {
    let (nodered, broker, stack) = tokio::join!(
        check_nodered(&readiness.nodered_url, readiness.http_timeout),
        check_broker(mqtt, readiness.broker_timeout),
        check_stack_activity(mqtt, readiness),
    );

    let mut report = ReadinessReport::default();
    report.push("Node-RED UI", nodered);
    report.push("MQTT broker", broker);
    report.push("EVerest core", stack);

    if report.all_ready() {
        info!("All readiness checks passed");
    } else {
        warn!("Readiness checks failed: {:?}", report.failed());
    }
    report
}

/// Node-RED dashboard answers with 200
pub async fn check_nodered(url: &str, timeout: Duration) -> bool {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to build HTTP client: {}", e);
            return false;
        }
    };

    match client.get(url).send().await {
        Ok(resp) => resp.status() == reqwest::StatusCode::OK,
        Err(e) => {
            debug!("Node-RED check failed: {}", e);
            false
        }
    }
}

/// Broker accepts a connection
pub async fn check_broker(config: &MqttConfig, timeout: Duration) -> bool {
    let client_id = format!("{}-probe", config.client_id);
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(config, &client_id), 4);

    let connected = match wait_for_connack(&mut eventloop, timeout, &config.address()).await {
        Ok(()) => true,
        Err(e) => {
            debug!("Broker check failed: {}", e);
            false
        }
    };

    if connected {
        close_probe(&client, &mut eventloop).await;
    }
    connected
}

/// At least one message arrives on the activity topic within the window
pub async fn check_stack_activity(config: &MqttConfig, readiness: &ReadinessConfig) -> bool {
    let client_id = format!("{}-activity", config.client_id);
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(config, &client_id), 4);

    if let Err(e) = wait_for_connack(&mut eventloop, readiness.broker_timeout, &config.address()).await {
        debug!("Activity check could not connect: {}", e);
        return false;
    }

    if let Err(e) = client.try_subscribe(readiness.activity_topic.as_str(), QoS::AtMostOnce) {
        debug!("Activity check could not subscribe: {}", e);
        return false;
    }

    let first_publish = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!("Activity seen on {}", publish.topic);
                    return true;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Activity check connection error: {}", e);
                    return false;
                }
            }
        }
    };

    let active = tokio::time::timeout(readiness.activity_window, first_publish)
        .await
        .unwrap_or(false);

    close_probe(&client, &mut eventloop).await;
    active
}

/// Upper bound on flushing the DISCONNECT of a probe connection
const PROBE_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Queue a DISCONNECT and poll the event loop until it is written
///
/// Returns once the packet is out, the connection fails, or the close
/// timeout elapses.
pub async fn close_probe(client: &AsyncClient, eventloop: &mut EventLoop) {
    if let Err(e) = client.try_disconnect() {
        debug!("Probe disconnect not queued: {}", e);
        return;
    }

    let flushed = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return true,
                Ok(_) => {}
                Err(e) => {
                    debug!("Probe connection closed: {}", e);
                    return false;
                }
            }
        }
    };

    match tokio::time::timeout(PROBE_CLOSE_TIMEOUT, flushed).await {
        Ok(true) => debug!("Probe disconnected cleanly"),
        Ok(false) => {}
        Err(_) => debug!("Probe disconnect timed out"),
    }
}
