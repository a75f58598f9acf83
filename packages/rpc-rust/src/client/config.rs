//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use svcwire_core::{ConnectionParams, CredentialParams};

/// Configuration of a REST or commandable HTTP client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestClientConfig {
    /// Prefix of every route the client calls.
    pub base_route: Option<String>,
    pub connection: Option<ConnectionParams>,
    pub connections: Vec<ConnectionParams>,
    pub credential: Option<CredentialParams>,
    pub options: RestClientOptions,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            base_route: None,
            connection: Some(ConnectionParams::new("http", "0.0.0.0", 3000)),
            connections: Vec::new(),
            credential: None,
            options: RestClientOptions::default(),
        }
    }
}

impl RestClientConfig {
    /// Client of `protocol://host:port` with default options.
    #[must_use]
    pub fn new(protocol: &str, host: &str, port: u16) -> Self {
        Self {
            connection: Some(ConnectionParams::new(protocol, host, port)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_base_route(mut self, base_route: impl Into<String>) -> Self {
        self.base_route = Some(base_route.into());
        self
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

/// Retry and timeout settings. Durations are milliseconds on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestClientOptions {
    /// Attempts per call, counting the first one.
    pub retries: u32,
    pub connect_timeout: u64,
    /// Bound on a whole request, including reading the response.
    pub timeout: u64,
}

impl Default for RestClientOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            connect_timeout: 10_000,
            timeout: 10_000,
        }
    }
}

impl RestClientOptions {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}
