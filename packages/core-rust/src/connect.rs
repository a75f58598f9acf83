//! Connection and credential parameters as they appear in configuration.

use serde::{Deserialize, Serialize};

/// Where a component listens or connects.
///
/// Either `uri` is set, or `protocol`/`host`/`port` together describe the
/// target. The HTTP connection resolver keeps both forms in sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionParams {
    /// Scheme, e.g. `http` or `https`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Full URI, e.g. `http://localhost:3000`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Key used to look the connection up in a discovery service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_key: Option<String>,
}

impl ConnectionParams {
    /// Connection described by protocol, host and port.
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: Some(protocol.into()),
            host: Some(host.into()),
            port: Some(port),
            ..Self::default()
        }
    }

    /// Connection described by a URI only.
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Connection resolved through discovery.
    pub fn from_discovery_key(key: impl Into<String>) -> Self {
        Self {
            discovery_key: Some(key.into()),
            ..Self::default()
        }
    }

    /// Protocol, or `default` when none is configured.
    #[must_use]
    pub fn protocol_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.protocol.as_deref().filter(|p| !p.is_empty()).unwrap_or(default)
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().filter(|h| !h.is_empty())
    }

    /// Port, with `0` treated as unset.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port.filter(|p| *p != 0)
    }

    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref().filter(|u| !u.is_empty())
    }

    #[must_use]
    pub fn use_discovery(&self) -> bool {
        self.discovery_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// References to TLS material. Files are only read by the listener that
/// serves `https`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialParams {
    /// Private key in PEM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_key_file: Option<String>,
    /// Certificate chain in PEM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_crt_file: Option<String>,
    /// Certificate authorities in PEM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_ca_file: Option<String>,
}
