//! HTTP connection resolver.
//!
//! Turns configured [`ConnectionParams`] into a validated connection whose
//! `uri` and `protocol`/`host`/`port` components agree. Connections that
//! carry a discovery key are looked up through an attached [`Discovery`].

use std::sync::Arc;

use http::Uri;
use svcwire_core::{ApplicationError, ConnectionParams, CredentialParams};

use crate::traits::Discovery;

const SUPPORTED_PROTOCOLS: [&str; 2] = ["http", "https"];

/// Resolves HTTP connections for endpoints and clients.
#[derive(Clone, Default)]
pub struct HttpConnectionResolver {
    connections: Vec<ConnectionParams>,
    credential: Option<CredentialParams>,
    discovery: Option<Arc<dyn Discovery>>,
    require_ssl_files: bool,
}

impl HttpConnectionResolver {
    #[must_use]
    pub fn new(connections: Vec<ConnectionParams>) -> Self {
        Self {
            connections,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_credential(mut self, credential: Option<CredentialParams>) -> Self {
        self.credential = credential;
        self
    }

    #[must_use]
    pub fn with_discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Requires key and certificate files for `https` connections. Set by
    /// listeners; clients connect over `https` without them.
    #[must_use]
    pub fn require_ssl_files(mut self, require: bool) -> Self {
        self.require_ssl_files = require;
        self
    }

    #[must_use]
    pub fn connections(&self) -> &[ConnectionParams] {
        &self.connections
    }

    #[must_use]
    pub fn credential(&self) -> Option<&CredentialParams> {
        self.credential.as_ref()
    }

    /// Resolves the first configured connection.
    ///
    /// # Errors
    ///
    /// Configuration errors: `NO_CONNECTION`, `CANNOT_RESOLVE`,
    /// `WRONG_PROTOCOL`, `NO_HOST`, `NO_PORT`, `INVALID_URI`,
    /// `NO_SSL_KEY_FILE`, `NO_SSL_CRT_FILE`.
    pub async fn resolve(
        &self,
        correlation_id: Option<&str>,
    ) -> Result<ConnectionParams, ApplicationError> {
        let Some(configured) = self.connections.first() else {
            return Err(no_connection(correlation_id));
        };
        let connection = self.lookup_one(correlation_id, configured).await?;
        self.finish(correlation_id, connection)
    }

    /// Resolves every configured connection, expanding discovery keys.
    ///
    /// # Errors
    ///
    /// Same as [`HttpConnectionResolver::resolve`], for any of the connections.
    pub async fn resolve_all(
        &self,
        correlation_id: Option<&str>,
    ) -> Result<Vec<ConnectionParams>, ApplicationError> {
        let mut resolved = Vec::with_capacity(self.connections.len());
        for configured in &self.connections {
            if configured.use_discovery() {
                let discovery = self.discovery(correlation_id, configured)?;
                let key = configured.discovery_key.as_deref().unwrap_or_default();
                for connection in discovery.resolve_all(correlation_id, key).await? {
                    resolved.push(self.finish(correlation_id, connection)?);
                }
            } else {
                resolved.push(self.finish(correlation_id, configured.clone())?);
            }
        }
        Ok(resolved)
    }

    /// Publishes the first configured connection to discovery under its key.
    /// Does nothing when the connection has no discovery key.
    ///
    /// # Errors
    ///
    /// Validation errors, or whatever the discovery service returns.
    pub async fn register(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        let Some(configured) = self.connections.first() else {
            return Err(no_connection(correlation_id));
        };
        let (Some(key), Some(discovery)) = (configured.discovery_key.as_deref(), &self.discovery)
        else {
            return Ok(());
        };
        let mut published = configured.clone();
        published.discovery_key = None;
        let published = self.finish(correlation_id, published)?;
        discovery.register(correlation_id, key, published).await
    }

    async fn lookup_one(
        &self,
        correlation_id: Option<&str>,
        configured: &ConnectionParams,
    ) -> Result<ConnectionParams, ApplicationError> {
        if !configured.use_discovery() {
            return Ok(configured.clone());
        }
        let discovery = self.discovery(correlation_id, configured)?;
        let key = configured.discovery_key.as_deref().unwrap_or_default();
        discovery
            .resolve_one(correlation_id, key)
            .await?
            .ok_or_else(|| cannot_resolve(correlation_id, key))
    }

    fn discovery(
        &self,
        correlation_id: Option<&str>,
        configured: &ConnectionParams,
    ) -> Result<&Arc<dyn Discovery>, ApplicationError> {
        self.discovery.as_ref().ok_or_else(|| {
            cannot_resolve(
                correlation_id,
                configured.discovery_key.as_deref().unwrap_or_default(),
            )
        })
    }

    fn finish(
        &self,
        correlation_id: Option<&str>,
        connection: ConnectionParams,
    ) -> Result<ConnectionParams, ApplicationError> {
        let credential = if self.require_ssl_files {
            Some(self.credential.clone().unwrap_or_default())
        } else {
            None
        };
        validate_connection(correlation_id, &connection, credential.as_ref())?;
        update_connection(correlation_id, connection)
    }
}

impl std::fmt::Debug for HttpConnectionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnectionResolver")
            .field("connections", &self.connections)
            .field("credential", &self.credential)
            .field("discovery", &self.discovery.is_some())
            .field("require_ssl_files", &self.require_ssl_files)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Validation and canonicalization
// ---------------------------------------------------------------------------

/// Checks that a connection can be served or called over HTTP.
///
/// With a URI, its scheme and host are checked. Without one, protocol
/// (default `http`), host and a nonzero port must be present. When
/// `credential` is given and the protocol is `https`, key and certificate
/// file references are required as well.
///
/// # Errors
///
/// A `Misconfiguration` error naming the first problem found.
pub fn validate_connection(
    correlation_id: Option<&str>,
    connection: &ConnectionParams,
    credential: Option<&CredentialParams>,
) -> Result<(), ApplicationError> {
    let protocol = if let Some(uri) = connection.uri() {
        let parsed = parse_uri(correlation_id, uri)?;
        let scheme = parsed.scheme_str().unwrap_or_default().to_string();
        check_protocol(correlation_id, &scheme)?;
        if parsed.host().is_none_or(str::is_empty) {
            return Err(no_host(correlation_id));
        }
        scheme
    } else {
        let protocol = connection.protocol_or("http");
        check_protocol(correlation_id, protocol)?;
        if connection.host().is_none() {
            return Err(no_host(correlation_id));
        }
        if connection.port().is_none() {
            return Err(ApplicationError::configuration(
                correlation_id,
                "NO_PORT",
                "Connection port is not set",
            ));
        }
        protocol.to_string()
    };

    if protocol == "https" {
        if let Some(credential) = credential {
            if credential.ssl_key_file.as_deref().is_none_or(str::is_empty) {
                return Err(ApplicationError::configuration(
                    correlation_id,
                    "NO_SSL_KEY_FILE",
                    "SSL key file is not configured in credentials",
                ));
            }
            if credential.ssl_crt_file.as_deref().is_none_or(str::is_empty) {
                return Err(ApplicationError::configuration(
                    correlation_id,
                    "NO_SSL_CRT_FILE",
                    "SSL crt file is not configured in credentials",
                ));
            }
        }
    }
    Ok(())
}

/// Brings `uri` and `protocol`/`host`/`port` in sync.
///
/// Without a URI one is composed as `protocol://host[:port]`; with a URI it
/// is decomposed into its components. The discovery key is kept.
///
/// # Errors
///
/// `INVALID_URI` when the URI cannot be parsed, `NO_HOST` when neither
/// form names a host.
pub fn update_connection(
    correlation_id: Option<&str>,
    mut connection: ConnectionParams,
) -> Result<ConnectionParams, ApplicationError> {
    if let Some(uri) = connection.uri() {
        let parsed = parse_uri(correlation_id, uri)?;
        let host = parsed
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| no_host(correlation_id))?;
        connection.protocol = parsed.scheme_str().map(str::to_string);
        connection.host = Some(host.to_string());
        connection.port = parsed.port_u16();
    } else {
        let protocol = connection.protocol_or("http").to_string();
        let host = connection.host().ok_or_else(|| no_host(correlation_id))?;
        let uri = match connection.port() {
            Some(port) => format!("{protocol}://{host}:{port}"),
            None => format!("{protocol}://{host}"),
        };
        connection.protocol = Some(protocol);
        connection.uri = Some(uri);
    }
    Ok(connection)
}

fn parse_uri(correlation_id: Option<&str>, uri: &str) -> Result<Uri, ApplicationError> {
    uri.parse::<Uri>().map_err(|e| {
        ApplicationError::configuration(correlation_id, "INVALID_URI", "Connection URI is invalid")
            .with_details("uri", uri)
            .wrap(e)
    })
}

fn check_protocol(correlation_id: Option<&str>, protocol: &str) -> Result<(), ApplicationError> {
    if SUPPORTED_PROTOCOLS.contains(&protocol) {
        Ok(())
    } else {
        Err(ApplicationError::configuration(
            correlation_id,
            "WRONG_PROTOCOL",
            "Protocol is not supported by REST connection",
        )
        .with_details("protocol", protocol))
    }
}

fn no_connection(correlation_id: Option<&str>) -> ApplicationError {
    ApplicationError::configuration(correlation_id, "NO_CONNECTION", "HTTP connection is not set")
}

fn no_host(correlation_id: Option<&str>) -> ApplicationError {
    ApplicationError::configuration(correlation_id, "NO_HOST", "Connection host is not set")
}

fn cannot_resolve(correlation_id: Option<&str>, key: &str) -> ApplicationError {
    ApplicationError::configuration(
        correlation_id,
        "CANNOT_RESOLVE",
        format!("Connection with discovery key {key} was not resolved"),
    )
    .with_details("discovery_key", key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use svcwire_core::ErrorCategory;

    use super::*;
    use crate::connect::MemoryDiscovery;

    #[tokio::test]
    async fn composes_uri_from_components() {
        let resolver =
            HttpConnectionResolver::new(vec![ConnectionParams::new("http", "somewhere.com", 123)]);
        let connection = resolver.resolve(None).await.unwrap();
        assert_eq!(connection.uri.as_deref(), Some("http://somewhere.com:123"));
    }

    #[tokio::test]
    async fn decomposes_uri_into_components() {
        let resolver = HttpConnectionResolver::new(vec![ConnectionParams::from_uri(
            "https://somewhere.com:123",
        )]);
        let connection = resolver.resolve(Some("c1")).await.unwrap();
        assert_eq!(connection.protocol.as_deref(), Some("https"));
        assert_eq!(connection.host.as_deref(), Some("somewhere.com"));
        assert_eq!(connection.port, Some(123));
    }

    #[tokio::test]
    async fn uri_without_port_keeps_port_unset() {
        let connection =
            update_connection(None, ConnectionParams::from_uri("http://localhost")).unwrap();
        assert_eq!(connection.port, None);
        assert_eq!(connection.host.as_deref(), Some("localhost"));
    }

    #[tokio::test]
    async fn missing_connection_is_configuration_error() {
        let err = HttpConnectionResolver::default().resolve(Some("c1")).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Misconfiguration);
        assert_eq!(err.code, "NO_CONNECTION");
        assert_eq!(err.correlation_id.as_deref(), Some("c1"));
    }

    #[test]
    fn validation_reports_each_missing_part() {
        let code =
            |conn: ConnectionParams| validate_connection(None, &conn, None).unwrap_err().code;

        assert_eq!(code(ConnectionParams::new("tcp", "localhost", 80)), "WRONG_PROTOCOL");
        assert_eq!(code(ConnectionParams::from_uri("ftp://localhost:21")), "WRONG_PROTOCOL");
        assert_eq!(code(ConnectionParams::new("http", "", 80)), "NO_HOST");
        assert_eq!(code(ConnectionParams::new("http", "localhost", 0)), "NO_PORT");
        assert_eq!(code(ConnectionParams::from_uri("not a uri")), "INVALID_URI");
    }

    #[test]
    fn https_listener_requires_ssl_files() {
        let conn = ConnectionParams::new("https", "localhost", 8443);
        let err = validate_connection(None, &conn, Some(&CredentialParams::default())).unwrap_err();
        assert_eq!(err.code, "NO_SSL_KEY_FILE");

        let key_only = CredentialParams {
            ssl_key_file: Some("key.pem".into()),
            ..CredentialParams::default()
        };
        let err = validate_connection(None, &conn, Some(&key_only)).unwrap_err();
        assert_eq!(err.code, "NO_SSL_CRT_FILE");

        assert!(validate_connection(None, &conn, None).is_ok());
    }

    #[tokio::test]
    async fn resolves_and_registers_through_discovery() {
        let discovery = Arc::new(MemoryDiscovery::new());
        let mut configured = ConnectionParams::new("http", "localhost", 3000);
        configured.discovery_key = Some("dummy".into());

        let publisher =
            HttpConnectionResolver::new(vec![configured]).with_discovery(discovery.clone());
        publisher.register(None).await.unwrap();

        let consumer =
            HttpConnectionResolver::new(vec![ConnectionParams::from_discovery_key("dummy")])
                .with_discovery(discovery.clone());
        let connection = consumer.resolve(None).await.unwrap();
        assert_eq!(connection.uri.as_deref(), Some("http://localhost:3000"));
        assert_eq!(consumer.resolve_all(None).await.unwrap().len(), 1);

        let missing =
            HttpConnectionResolver::new(vec![ConnectionParams::from_discovery_key("other")])
                .with_discovery(discovery);
        assert_eq!(missing.resolve(None).await.unwrap_err().code, "CANNOT_RESOLVE");
    }

    #[tokio::test]
    async fn register_without_discovery_key_is_noop() {
        let resolver =
            HttpConnectionResolver::new(vec![ConnectionParams::new("http", "localhost", 3000)])
                .with_discovery(Arc::new(MemoryDiscovery::new()));
        resolver.register(None).await.unwrap();
    }

    proptest! {
        #[test]
        fn compose_then_decompose_recovers_components(
            https in any::<bool>(),
            host in "[a-z][a-z0-9]{0,10}(\\.[a-z]{2,5})?",
            port in 1u16..,
        ) {
            let protocol = if https { "https" } else { "http" };
            let params = ConnectionParams::new(protocol, host.clone(), port);
            let composed = update_connection(None, params).unwrap();
            prop_assert_eq!(composed.uri.clone(), Some(format!("{protocol}://{host}:{port}")));

            let params = ConnectionParams::from_uri(composed.uri.unwrap());
            let decomposed = update_connection(None, params).unwrap();
            prop_assert_eq!(decomposed.protocol.as_deref(), Some(protocol));
            prop_assert_eq!(decomposed.host, Some(host));
            prop_assert_eq!(decomposed.port, Some(port));
        }
    }
}
