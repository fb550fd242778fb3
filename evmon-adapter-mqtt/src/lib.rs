//! # EVerest MQTT Monitor Adapter
//!
//! Connects the `evmon-core` classification pipeline to a running EVerest
//! charging stack over MQTT and reports to an operator in real time.
//!
//! ## Architecture
//!
//! ```text
//! EVerest / Node-RED
//!       │ MQTT (everest_api/#, everest/modules/#, everest_external/#)
//!       ▼
//! ┌─────────────────────────────────┐
//! │    evmon-adapter-mqtt           │
//! │  ┌───────────┐  ┌────────────┐  │
//! │  │ Listener  │─►│  Monitor   │◄─┼── operator commands (stdin)
//! │  │ (rumqttc) │  │ (loop)     │──┼─► reports (stdout)
//! │  └───────────┘  └─────┬──────┘  │
//! └───────────────────────┼─────────┘
//!                         ▼
//! ┌─────────────────────────────────┐
//! │    evmon-core                   │
//! │  Classifier │ CycleTracker │ Recorder
//! └─────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use evmon_adapter_mqtt::{console, listener, Monitor, MonitorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfig::new("localhost", 1883);
//!
//!     let (handle, inbound) = listener::start(&config.mqtt, config.readiness.broker_timeout).await?;
//!     let summary = Monitor::new(config)
//!         .run(inbound, console::spawn_stdin_reader())
//!         .await;
//!     handle.stop().await;
//!
//!     println!("{} cycles", summary.stats.counts.cycles);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod console;
pub mod control;
pub mod error;
pub mod listener;
pub mod monitor;
pub mod readiness;
pub mod report;

pub use config::{MonitorConfig, MqttConfig, ReadinessConfig};
pub use console::OperatorCommand;
pub use control::{AutoStop, StopReason, StopSignal};
pub use error::MonitorError;
pub use listener::{InboundMessage, ListenerHandle};
pub use monitor::Monitor;
pub use readiness::{check_system, ReadinessReport};
pub use report::SessionSummary;
