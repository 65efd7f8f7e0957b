//! Stream Configuration Settings
//!
//! Configuration types for the copy-trading stream, loaded from environment
//! variables.

use std::time::Duration;

use crate::domain::channel::{DEFAULT_DOMAIN, Network};

/// Connection lifecycle settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    /// Interval between application-level pings.
    pub ping_interval: Duration,
    /// Time to wait for a pong before declaring the transport dead.
    pub pong_timeout: Duration,
    /// Upper bound on transport establishment.
    pub connect_timeout: Duration,
    /// Upper bound on the auth round-trip.
    pub auth_timeout: Duration,
    /// Lifetime of the `expires` value in auth requests.
    pub auth_expires_after: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Consecutive failed attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Consecutive auth rejections before giving up (0 = unlimited).
    pub max_auth_failures: u32,
    /// Reconnect after a transport failure instead of closing.
    pub restart_on_error: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(10),
            auth_expires_after: Duration::from_secs(1),
            reconnect_delay_initial: Duration::from_secs(1),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0, // Unlimited
            max_auth_failures: 0,      // Unlimited
            restart_on_error: true,
        }
    }
}

/// Complete stream configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Requested channel type, validated when the stream is built.
    pub channel_type: String,
    /// API key, if any.
    pub api_key: Option<String>,
    /// API secret, if any.
    pub api_secret: Option<String>,
    /// Venue environment.
    pub network: Network,
    /// Venue domain substituted into the endpoint template.
    pub domain: String,
    /// Explicit endpoint URL replacing the resolved one.
    pub endpoint_override: Option<String>,
    /// Connection lifecycle settings.
    pub connection: ConnectionSettings,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_type: "private".to_string(),
            api_key: None,
            api_secret: None,
            network: Network::default(),
            domain: DEFAULT_DOMAIN.to_string(),
            endpoint_override: None,
            connection: ConnectionSettings::default(),
            metrics_port: 9090,
        }
    }
}

impl StreamConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `COPYTRADE_NETWORK` names an unknown network.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if `COPYTRADE_NETWORK` names an unknown network.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let conn = ConnectionSettings::default();

        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let network = match non_empty("COPYTRADE_NETWORK") {
            Some(raw) => Network::parse(&raw).ok_or(ConfigError::InvalidValue {
                key: "COPYTRADE_NETWORK".to_string(),
                value: raw,
            })?,
            None => defaults.network,
        };

        let connection = ConnectionSettings {
            ping_interval: parse_duration_secs(
                &lookup,
                "COPYTRADE_STREAM_PING_INTERVAL_SECS",
                conn.ping_interval,
            ),
            pong_timeout: parse_duration_secs(
                &lookup,
                "COPYTRADE_STREAM_PONG_TIMEOUT_SECS",
                conn.pong_timeout,
            ),
            connect_timeout: parse_duration_secs(
                &lookup,
                "COPYTRADE_STREAM_CONNECT_TIMEOUT_SECS",
                conn.connect_timeout,
            ),
            auth_timeout: parse_duration_secs(
                &lookup,
                "COPYTRADE_STREAM_AUTH_TIMEOUT_SECS",
                conn.auth_timeout,
            ),
            auth_expires_after: parse_duration_millis(
                &lookup,
                "COPYTRADE_STREAM_AUTH_EXPIRES_MS",
                conn.auth_expires_after,
            ),
            reconnect_delay_initial: parse_duration_millis(
                &lookup,
                "COPYTRADE_STREAM_RECONNECT_DELAY_INITIAL_MS",
                conn.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_duration_secs(
                &lookup,
                "COPYTRADE_STREAM_RECONNECT_DELAY_MAX_SECS",
                conn.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_or(
                &lookup,
                "COPYTRADE_STREAM_RECONNECT_DELAY_MULTIPLIER",
                conn.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_or(
                &lookup,
                "COPYTRADE_STREAM_MAX_RECONNECT_ATTEMPTS",
                conn.max_reconnect_attempts,
            ),
            max_auth_failures: parse_or(
                &lookup,
                "COPYTRADE_STREAM_MAX_AUTH_FAILURES",
                conn.max_auth_failures,
            ),
            restart_on_error: parse_bool(
                &lookup,
                "COPYTRADE_STREAM_RESTART_ON_ERROR",
                conn.restart_on_error,
            ),
        };

        Ok(Self {
            channel_type: non_empty("COPYTRADE_CHANNEL_TYPE")
                .map_or(defaults.channel_type, |v| v.trim().to_string()),
            api_key: non_empty("BYBIT_API_KEY"),
            api_secret: non_empty("BYBIT_API_SECRET"),
            network,
            domain: non_empty("COPYTRADE_DOMAIN").unwrap_or(defaults.domain),
            endpoint_override: non_empty("COPYTRADE_ENDPOINT"),
            connection,
            metrics_port: parse_or(&lookup, "COPYTRADE_STREAM_METRICS_PORT", defaults.metrics_port),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable holds a value outside the accepted set.
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Rejected value.
        value: String,
    },
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|v| v.trim().to_lowercase()).as_deref() {
        Some("true" | "1" | "yes") => true,
        Some("false" | "0" | "no") => false,
        _ => default,
    }
}

fn parse_duration_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<StreamConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StreamConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn connection_settings_defaults() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.ping_interval, Duration::from_secs(20));
        assert_eq!(settings.pong_timeout, Duration::from_secs(10));
        assert_eq!(settings.auth_expires_after, Duration::from_secs(1));
        assert_eq!(settings.reconnect_delay_initial, Duration::from_secs(1));
        assert_eq!(settings.reconnect_delay_max, Duration::from_secs(30));
        assert!((settings.reconnect_delay_multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(settings.max_reconnect_attempts, 0);
        assert_eq!(settings.max_auth_failures, 0);
        assert!(settings.restart_on_error);
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.channel_type, "private");
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.domain, "bybit");
        assert!(config.api_key.is_none());
        assert!(config.endpoint_override.is_none());
        assert_eq!(config.connection, ConnectionSettings::default());
        assert_eq!(config.metrics_port, 9090);
    }

    #[test]
    fn reads_all_variables() {
        let config = config_from(&[
            ("BYBIT_API_KEY", "K"),
            ("BYBIT_API_SECRET", "S"),
            ("COPYTRADE_NETWORK", "testnet"),
            ("COPYTRADE_DOMAIN", "bytick"),
            ("COPYTRADE_ENDPOINT", "ws://127.0.0.1:9000/realtime_private"),
            ("COPYTRADE_STREAM_PING_INTERVAL_SECS", "5"),
            ("COPYTRADE_STREAM_AUTH_EXPIRES_MS", "2500"),
            ("COPYTRADE_STREAM_RECONNECT_DELAY_INITIAL_MS", "250"),
            ("COPYTRADE_STREAM_RECONNECT_DELAY_MULTIPLIER", "1.5"),
            ("COPYTRADE_STREAM_MAX_AUTH_FAILURES", "3"),
            ("COPYTRADE_STREAM_RESTART_ON_ERROR", "false"),
            ("COPYTRADE_STREAM_METRICS_PORT", "0"),
        ])
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("K"));
        assert_eq!(config.api_secret.as_deref(), Some("S"));
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.domain, "bytick");
        assert_eq!(
            config.endpoint_override.as_deref(),
            Some("ws://127.0.0.1:9000/realtime_private")
        );
        assert_eq!(config.connection.ping_interval, Duration::from_secs(5));
        assert_eq!(
            config.connection.auth_expires_after,
            Duration::from_millis(2500)
        );
        assert_eq!(
            config.connection.reconnect_delay_initial,
            Duration::from_millis(250)
        );
        assert!((config.connection.reconnect_delay_multiplier - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.connection.max_auth_failures, 3);
        assert!(!config.connection.restart_on_error);
        assert_eq!(config.metrics_port, 0);
    }

    #[test]
    fn empty_credentials_count_as_absent() {
        let config = config_from(&[("BYBIT_API_KEY", ""), ("BYBIT_API_SECRET", "  ")]).unwrap();
        assert!(config.api_key.is_none());
        assert!(config.api_secret.is_none());
    }

    #[test]
    fn unparseable_numbers_fall_back() {
        let config = config_from(&[
            ("COPYTRADE_STREAM_PONG_TIMEOUT_SECS", "soon"),
            ("COPYTRADE_STREAM_MAX_RECONNECT_ATTEMPTS", "-1"),
            ("COPYTRADE_STREAM_RESTART_ON_ERROR", "maybe"),
        ])
        .unwrap();
        assert_eq!(config.connection.pong_timeout, Duration::from_secs(10));
        assert_eq!(config.connection.max_reconnect_attempts, 0);
        assert!(config.connection.restart_on_error);
    }

    #[test]
    fn unknown_network_is_rejected() {
        let err = config_from(&[("COPYTRADE_NETWORK", "staging")]).unwrap_err();
        assert!(err.to_string().contains("COPYTRADE_NETWORK"));
    }
}
