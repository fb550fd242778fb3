//! evmon - interactive EVerest test monitor
//!
//! Watches the MQTT bus of a running EVerest stack while an operator drives
//! charging sessions from the Node-RED UI.
//!
//! # Usage
//!
//! ```bash
//! # Local stack with defaults
//! evmon
//!
//! # Remote broker, keep running after a cycle
//! evmon --host 192.168.1.20 --no-auto-stop
//!
//! # Only the API topics, write a JSON summary at the end
//! evmon --topic 'everest_api/#' --summary-file results/summary.json
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use evmon_adapter_mqtt::{
    check_system, console, listener, Monitor, MonitorConfig, MonitorError,
};
use evmon_core::ClassifierConfig;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Interactive monitor for an EVerest charging stack
#[derive(Parser, Debug)]
#[command(name = "evmon", author, version, about, long_about = None)]
struct Args {
    /// MQTT broker host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// MQTT broker port
    #[arg(short, long, default_value = "1883")]
    port: u16,

    /// Topic filter to subscribe (can be repeated, replaces the defaults)
    #[arg(short, long)]
    topic: Vec<String>,

    /// Extra topic substring never classified as an error (can be repeated)
    #[arg(long)]
    deny_topic: Vec<String>,

    /// Node-RED dashboard URL
    #[arg(long, default_value = "http://localhost:1880/ui")]
    nodered_url: String,

    /// Skip the readiness checks
    #[arg(long)]
    skip_checks: bool,

    /// Keep running after a completed charging cycle
    #[arg(long)]
    no_auto_stop: bool,

    /// Seconds between cycle completion and automatic stop
    #[arg(long, default_value = "10")]
    grace_secs: u64,

    /// Seconds between unsolicited live statistics
    #[arg(long, default_value = "30")]
    stats_interval_secs: u64,

    /// Path to write the final summary as JSON
    #[arg(long)]
    summary_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    // Build configuration
    let mut classifier = ClassifierConfig::default();
    for pattern in &args.deny_topic {
        classifier = classifier.with_denied_topic(pattern);
    }

    let mut config = MonitorConfig::new(&args.host, args.port)
        .with_topics(args.topic.clone())
        .with_nodered_url(&args.nodered_url)
        .with_auto_stop(!args.no_auto_stop, Duration::from_secs(args.grace_secs))
        .with_stats_interval(Duration::from_secs(args.stats_interval_secs.max(1)));
    config.classifier = classifier;
    if args.skip_checks {
        config = config.without_readiness_checks();
    }

    println!("STARTING INTERACTIVE EVEREST TEST");
    println!("{}", "=".repeat(60));

    if config.readiness.enabled {
        let report = check_system(&config.mqtt, &config.readiness).await;
        println!("{}", report.render());
        if !report.all_ready() {
            println!("System not ready - test aborted");
            return Err(MonitorError::NotReady(report.failed()).into());
        }
    }

    let (handle, inbound) = match listener::start(&config.mqtt, config.readiness.broker_timeout).await {
        Ok(started) => started,
        Err(e) => {
            error!("MQTT listener could not be started: {}", e);
            return Err(e.into());
        }
    };
    info!("Subscribed to {:?}", config.mqtt.topics);

    let summary = Monitor::new(config)
        .run(inbound, console::spawn_stdin_reader())
        .await;
    handle.stop().await;

    if let Some(path) = &args.summary_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, summary.to_json()?)?;
        info!("Summary written to: {}", path.display());
    }

    println!("\nTest finished ({})", summary.stop_reason);
    Ok(())
}
