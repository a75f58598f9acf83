//! Endpoint configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use svcwire_core::{ConnectionParams, CredentialParams};

/// Configuration of one HTTP endpoint.
///
/// Deserializes from the `connection`, `connections`, `credential` and
/// `options` sections; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Address the endpoint listens on.
    pub connection: Option<ConnectionParams>,
    /// Additional connections; only the first resolvable one is served.
    pub connections: Vec<ConnectionParams>,
    /// TLS material for `https` listeners.
    pub credential: Option<CredentialParams>,
    pub options: EndpointOptions,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            connection: Some(ConnectionParams::new("http", "0.0.0.0", 3000)),
            connections: Vec::new(),
            credential: None,
            options: EndpointOptions::default(),
        }
    }
}

impl EndpointConfig {
    /// Endpoint listening on `protocol://host:port` with default options.
    #[must_use]
    pub fn new(protocol: &str, host: &str, port: u16) -> Self {
        Self {
            connection: Some(ConnectionParams::new(protocol, host, port)),
            ..Self::default()
        }
    }

    /// `connection` followed by `connections`.
    #[must_use]
    pub fn connection_list(&self) -> Vec<ConnectionParams> {
        self.connection
            .iter()
            .chain(self.connections.iter())
            .cloned()
            .collect()
    }
}

/// Tuning knobs of an endpoint. Durations are milliseconds on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointOptions {
    /// Largest accepted request body in bytes.
    pub request_max_size: usize,
    /// Longest time a request may take before it is answered with 408.
    pub request_timeout: u64,
    /// Longest time `close` waits for in-flight requests.
    pub close_timeout: u64,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            request_max_size: 1024 * 1024,
            request_timeout: 60_000,
            close_timeout: 5_000,
        }
    }
}

impl EndpointOptions {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    #[must_use]
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn endpoint_config_defaults() {
        let config = EndpointConfig::default();
        assert_eq!(
            config.connection,
            Some(ConnectionParams::new("http", "0.0.0.0", 3000))
        );
        assert_eq!(config.options.request_max_size, 1_048_576);
        assert_eq!(config.options.close_timeout(), Duration::from_secs(5));
        assert_eq!(config.options.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: EndpointConfig = serde_json::from_value(json!({
            "connection": {"protocol": "http", "host": "localhost", "port": 8080},
            "options": {"request_max_size": 64}
        }))
        .unwrap();
        assert_eq!(config.options.request_max_size, 64);
        assert_eq!(config.options.close_timeout, 5_000);
        assert_eq!(config.connection_list().len(), 1);
    }
}
