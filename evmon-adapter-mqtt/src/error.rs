//! Adapter errors

use thiserror::Error;

/// Errors surfaced by the monitor adapter
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("MQTT connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("Timed out connecting to MQTT broker at {0}")]
    ConnectTimeout(String),

    #[error("System not ready: {}", .0.join(", "))]
    NotReady(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_lists_checks() {
        let err = MonitorError::NotReady(vec!["Node-RED UI".to_string(), "EVerest core".to_string()]);
        assert_eq!(err.to_string(), "System not ready: Node-RED UI, EVerest core");
    }
}
