//! Service configuration.

use serde::{Deserialize, Serialize};

use crate::network::EndpointConfig;

/// Configuration of a REST or commandable service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestServiceConfig {
    /// Prefix of every route the service registers.
    pub base_route: Option<String>,
    /// Used only when the service creates its own endpoint.
    #[serde(flatten)]
    pub endpoint: EndpointConfig,
    pub swagger: SwaggerConfig,
}

impl RestServiceConfig {
    /// Service under `base_route` on a private endpoint at
    /// `protocol://host:port`.
    #[must_use]
    pub fn new(base_route: &str, protocol: &str, host: &str, port: u16) -> Self {
        Self {
            base_route: Some(base_route.to_string()),
            endpoint: EndpointConfig::new(protocol, host, port),
            swagger: SwaggerConfig::default(),
        }
    }
}

/// OpenAPI document served next to the service routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwaggerConfig {
    pub enable: bool,
    /// Route of the document, relative to the base route.
    pub route: String,
    /// Inline YAML document; wins over `path`.
    pub content: Option<String>,
    /// File holding the YAML document.
    pub path: Option<String>,
}

impl Default for SwaggerConfig {
    fn default() -> Self {
        Self {
            enable: false,
            route: "swagger".to_string(),
            content: None,
            path: None,
        }
    }
}
