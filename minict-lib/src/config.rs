use crate::command::Baud;
use crate::constants::{DEFAULT_ACK_TIMEOUT, DEFAULT_BAUD_SETTLE, DEFAULT_READ_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for opening and driving a miniCT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0` or `COM4`
    pub port: String,
    pub baud: Baud,
    /// Upper bound on a single blocking read in the receiver
    #[serde(with = "millis")]
    pub read_timeout: Duration,
    /// How long a command waits for its echo or a mode change
    #[serde(with = "millis")]
    pub ack_timeout: Duration,
    /// Pause after requesting a baud change before the port is reopened
    #[serde(with = "millis")]
    pub baud_settle: Duration,
    /// XON/XOFF software flow control
    pub flow_control: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud: Baud::default(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            baud_settle: DEFAULT_BAUD_SETTLE,
            flow_control: true,
        }
    }
}

impl DriverConfig {
    /// Default settings for the device on `port`.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    pub fn with_baud(mut self, baud: Baud) -> Self {
        self.baud = baud;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_baud_settle(mut self, settle: Duration) -> Self {
        self.baud_settle = settle;
        self
    }

    /// Disable XON/XOFF, e.g. for USB adapters that mangle it
    pub fn without_flow_control(mut self) -> Self {
        self.flow_control = false;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_BAUD;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::new("/dev/ttyUSB0");
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud.as_bps(), DEFAULT_BAUD);
        assert_eq!(config.read_timeout, Duration::from_millis(500));
        assert!(config.flow_control);
    }

    #[test]
    fn test_builder() {
        let config = DriverConfig::new("COM4")
            .with_baud(Baud::B38400)
            .with_ack_timeout(Duration::from_millis(250))
            .without_flow_control();
        assert_eq!(config.baud.as_bps(), 38400);
        assert_eq!(config.ack_timeout, Duration::from_millis(250));
        assert!(!config.flow_control);
    }

    #[test]
    fn test_deserialize_from_json() {
        let config: DriverConfig =
            serde_json::from_str(r#"{"port": "COM4", "baud": 9600, "ack_timeout": 100}"#).unwrap();
        assert_eq!(config.port, "COM4");
        assert_eq!(config.baud, Baud::B9600);
        assert_eq!(config.ack_timeout, Duration::from_millis(100));
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
    }

    #[test]
    fn test_deserialize_rejects_unknown_baud() {
        assert!(serde_json::from_str::<DriverConfig>(r#"{"baud": 115200}"#).is_err());
    }
}
