//! MQTT listener
//!
//! Runs the rumqttc event loop in a background task and forwards every
//! publish to the control loop over a channel. Subscriptions are (re)issued
//! on each ConnAck so they survive broker restarts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::MqttConfig;
use crate::error::MonitorError;

/// Capacity of the rumqttc request channel
const REQUEST_CAPACITY: usize = 16;

/// A publish received from the broker
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

/// Handle to a running listener
pub struct ListenerHandle {
    client: AsyncClient,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Disconnect from the broker and stop the background task
    pub async fn stop(self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT disconnect failed: {}", e);
        }
        self.task.abort();
        info!("MQTT listener stopped");
    }
}

/// Build client options from config
pub fn mqtt_options(config: &MqttConfig, client_id: &str) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
    options.set_keep_alive(config.keep_alive);
    options
}

/// Poll the event loop until the broker acknowledges the connection
pub async fn wait_for_connack(
    eventloop: &mut EventLoop,
    timeout: Duration,
    address: &str,
) -> Result<(), MonitorError> {
    let connack = async {
        loop {
            match eventloop.poll().await? {
                Event::Incoming(Packet::ConnAck(ack)) => {
                    debug!("ConnAck from {}: {:?}", address, ack.code);
                    return Ok::<(), MonitorError>(());
                }
                other => debug!("Waiting for ConnAck: {:?}", other),
            }
        }
    };

    tokio::time::timeout(timeout, connack)
        .await
        .map_err(|_| MonitorError::ConnectTimeout(address.to_string()))?
}

/// Connect to the broker and start forwarding publishes
///
/// Fails if the broker does not acknowledge within `connect_timeout`.
pub async fn start(
    config: &MqttConfig,
    connect_timeout: Duration,
) -> Result<(ListenerHandle, mpsc::Receiver<InboundMessage>), MonitorError> {
    let options = mqtt_options(config, &config.client_id);
    let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

    wait_for_connack(&mut eventloop, connect_timeout, &config.address()).await?;
    info!("MQTT broker connected at {}", config.address());
    subscribe_all(&client, &config.topics);

    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let task = tokio::spawn(run_event_loop(
        eventloop,
        client.clone(),
        config.topics.clone(),
        config.reconnect_delay,
        tx,
    ));

    Ok((ListenerHandle { client, task }, rx))
}

fn subscribe_all(client: &AsyncClient, topics: &[String]) {
    for topic in topics {
        match client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
            Ok(()) => debug!("Subscribed to {}", topic),
            Err(e) => warn!("Failed to subscribe to {}: {}", topic, e),
        }
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topics: Vec<String>,
    reconnect_delay: Duration,
    tx: mpsc::Sender<InboundMessage>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let msg = InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                    received_at: Utc::now(),
                };
                if tx.send(msg).await.is_err() {
                    debug!("Control loop gone, stopping listener");
                    break;
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT broker reconnected, resubscribing");
                subscribe_all(&client, &topics);
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {}", e);
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}
