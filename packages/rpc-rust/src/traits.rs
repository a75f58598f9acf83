//! Lifecycle and discovery seams shared by endpoints, services and clients.

use async_trait::async_trait;
use svcwire_core::{ApplicationError, ConnectionParams};

/// Component with an explicit open/close lifecycle.
///
/// Endpoints, services and clients all implement this. `open` on an open
/// component and `close` on a closed one are no-ops.
#[async_trait]
pub trait Openable: Send + Sync {
    /// Whether the component is currently open.
    fn is_open(&self) -> bool;

    /// Opens the component.
    async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError>;

    /// Closes the component and releases its resources.
    async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError>;
}

/// Registry that maps discovery keys to connection parameters.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Publishes a connection under `key`.
    async fn register(
        &self,
        correlation_id: Option<&str>,
        key: &str,
        connection: ConnectionParams,
    ) -> Result<(), ApplicationError>;

    /// First connection registered under `key`.
    async fn resolve_one(
        &self,
        correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Option<ConnectionParams>, ApplicationError>;

    /// Every connection registered under `key`.
    async fn resolve_all(
        &self,
        correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Vec<ConnectionParams>, ApplicationError>;
}
