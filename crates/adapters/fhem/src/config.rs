//! FHEM controller configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the FHEM controller connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FhemConfig {
    /// Controller hostname or IP address.
    pub host: String,
    /// Controller telnet port.
    pub port: u16,
    /// Upper bound for opening a connection, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Longest wait for a command response, in milliseconds.
    pub response_timeout_ms: u64,
    /// Shortest wait for a command response, in milliseconds.
    pub min_response_timeout_ms: u64,
    /// Pause between opening a connection and the `version` handshake, in
    /// milliseconds.
    pub settle_delay_ms: u64,
    /// Never talk to the controller; switching always succeeds.
    pub dry_run: bool,
}

impl Default for FhemConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7072,
            connect_timeout_ms: 5000,
            response_timeout_ms: 5000,
            min_response_timeout_ms: 50,
            settle_delay_ms: 1000,
            dry_run: false,
        }
    }
}

impl FhemConfig {
    /// `host:port` of the controller.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    #[must_use]
    pub fn min_response_timeout(&self) -> Duration {
        Duration::from_millis(self.min_response_timeout_ms)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Wait for a command response given the measured response floor:
    /// twice the floor, kept within the configured bounds.
    #[must_use]
    pub fn command_timeout(&self, floor: Duration) -> Duration {
        (floor * 2)
            .max(self.min_response_timeout())
            .min(self.response_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = FhemConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 7072);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.response_timeout(), Duration::from_secs(5));
        assert!(!config.dry_run);
        assert_eq!(config.address(), "localhost:7072");
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            host = "fhem.local"
            port = 7073
            connect_timeout_ms = 2000
            response_timeout_ms = 3000
            min_response_timeout_ms = 20
            settle_delay_ms = 0
            dry_run = true
        "#;
        let config: FhemConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.host, "fhem.local");
        assert_eq!(config.port, 7073);
        assert_eq!(config.connect_timeout_ms, 2000);
        assert_eq!(config.response_timeout_ms, 3000);
        assert_eq!(config.min_response_timeout_ms, 20);
        assert_eq!(config.settle_delay_ms, 0);
        assert!(config.dry_run);
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let config: FhemConfig = toml::from_str(r#"host = "10.0.0.2""#).unwrap();
        assert_eq!(config.host, "10.0.0.2");
        assert_eq!(config.port, 7072);
        assert_eq!(config.settle_delay_ms, 1000);
    }

    #[test]
    fn should_clamp_command_timeout() {
        let config = FhemConfig {
            min_response_timeout_ms: 100,
            response_timeout_ms: 1000,
            ..FhemConfig::default()
        };
        assert_eq!(
            config.command_timeout(Duration::from_millis(10)),
            Duration::from_millis(100)
        );
        assert_eq!(
            config.command_timeout(Duration::from_millis(300)),
            Duration::from_millis(600)
        );
        assert_eq!(
            config.command_timeout(Duration::from_secs(2)),
            Duration::from_secs(1)
        );
    }
}
