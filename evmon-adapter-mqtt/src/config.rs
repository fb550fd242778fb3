//! Configuration for the bus monitor
//!
//! Combines settings for the MQTT listener, the readiness checks and the
//! classification rules.

use std::time::Duration;

use evmon_core::{ClassifierConfig, CycleConfig};

/// Complete monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    // Transport
    pub mqtt: MqttConfig,

    // Pre-start checks
    pub readiness: ReadinessConfig,

    // Classification rules
    pub classifier: ClassifierConfig,
    pub cycle: CycleConfig,

    /// Stop the session after a completed cycle
    pub auto_stop: bool,

    /// Delay between cycle completion and the automatic stop
    pub auto_stop_grace: Duration,

    /// Interval for unsolicited live statistics
    pub stats_interval: Duration,

    /// How often the control loop checks the stop flag
    pub poll_interval: Duration,
}

/// MQTT broker configuration
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,

    /// Client identifier presented to the broker
    pub client_id: String,

    pub keep_alive: Duration,

    /// Topic filters subscribed on every (re)connect
    pub topics: Vec<String>,

    /// Capacity of the listener-to-loop channel
    pub channel_capacity: usize,

    /// Pause before polling again after a connection error
    pub reconnect_delay: Duration,
}

/// Readiness check configuration
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Skip all checks when false
    pub enabled: bool,

    /// Node-RED dashboard URL, must answer 200
    pub nodered_url: String,

    pub http_timeout: Duration,

    /// Time allowed for the broker to acknowledge a connection
    pub broker_timeout: Duration,

    /// How long to listen for traffic from the charging stack
    pub activity_window: Duration,

    /// Topic filter used for the activity check
    pub activity_topic: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            readiness: ReadinessConfig::default(),
            classifier: ClassifierConfig::default(),
            cycle: CycleConfig::default(),
            auto_stop: true,
            auto_stop_grace: Duration::from_secs(10),
            stats_interval: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: default_client_id(),
            keep_alive: Duration::from_secs(60),
            topics: vec![
                "everest_api/#".to_string(),
                "everest/modules/#".to_string(),
                "everest_external/#".to_string(),
            ],
            channel_capacity: 256,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            nodered_url: "http://localhost:1880/ui".to_string(),
            http_timeout: Duration::from_secs(5),
            broker_timeout: Duration::from_secs(5),
            activity_window: Duration::from_secs(3),
            activity_topic: "everest_api/#".to_string(),
        }
    }
}

impl MqttConfig {
    /// `host:port` for log messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Unique client id so several monitors can share a broker
pub fn default_client_id() -> String {
    format!("evmon-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
}

impl MonitorConfig {
    /// Create config for a broker
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            mqtt: MqttConfig {
                host: host.into(),
                port,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Replace the subscribed topic filters
    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        if !topics.is_empty() {
            self.mqtt.topics = topics;
        }
        self
    }

    /// Set the Node-RED dashboard URL
    pub fn with_nodered_url(mut self, url: impl Into<String>) -> Self {
        self.readiness.nodered_url = url.into();
        self
    }

    /// Set auto-stop and its grace delay
    pub fn with_auto_stop(mut self, enabled: bool, grace: Duration) -> Self {
        self.auto_stop = enabled;
        self.auto_stop_grace = grace;
        self
    }

    /// Set the live statistics interval
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Disable readiness checks
    pub fn without_readiness_checks(mut self) -> Self {
        self.readiness.enabled = false;
        self
    }
}
