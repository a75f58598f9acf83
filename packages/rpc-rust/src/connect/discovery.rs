//! In-process discovery registry.

use async_trait::async_trait;
use dashmap::DashMap;
use svcwire_core::{ApplicationError, ConnectionParams};
use tracing::debug;

use crate::traits::Discovery;

/// [`Discovery`] backed by a concurrent map. Useful for tests and for
/// single-process deployments where services find each other by key.
#[derive(Debug, Default)]
pub struct MemoryDiscovery {
    entries: DashMap<String, Vec<ConnectionParams>>,
}

impl MemoryDiscovery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with at least one connection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Discovery for MemoryDiscovery {
    async fn register(
        &self,
        correlation_id: Option<&str>,
        key: &str,
        connection: ConnectionParams,
    ) -> Result<(), ApplicationError> {
        debug!(correlation_id, key, "registering connection in discovery");
        let mut list = self.entries.entry(key.to_string()).or_default();
        if !list.contains(&connection) {
            list.push(connection);
        }
        Ok(())
    }

    async fn resolve_one(
        &self,
        _correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Option<ConnectionParams>, ApplicationError> {
        Ok(self.entries.get(key).and_then(|list| list.first().cloned()))
    }

    async fn resolve_all(
        &self,
        _correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Vec<ConnectionParams>, ApplicationError> {
        Ok(self.entries.get(key).map(|list| list.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_resolve() {
        let discovery = MemoryDiscovery::new();
        let conn = ConnectionParams::new("http", "localhost", 8080);

        discovery.register(None, "dummy", conn.clone()).await.unwrap();
        discovery.register(None, "dummy", conn.clone()).await.unwrap();

        assert_eq!(discovery.resolve_one(None, "dummy").await.unwrap(), Some(conn.clone()));
        assert_eq!(discovery.resolve_all(None, "dummy").await.unwrap(), vec![conn]);
        assert!(discovery.resolve_one(None, "other").await.unwrap().is_none());
        assert_eq!(discovery.len(), 1);
    }
}
