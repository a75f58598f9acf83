//! Client side of the commandable protocol.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use svcwire_core::{ApplicationError, Counters, Tracer};

use super::config::RestClientConfig;
use super::rest::RestClient;
use crate::traits::{Discovery, Openable};

/// Calls commands of a remote commandable service with
/// `POST {base_route}/{command}`.
pub struct CommandableHttpClient {
    base_route: String,
    client: RestClient,
}

impl CommandableHttpClient {
    /// Client of the commands served under `base_route`.
    #[must_use]
    pub fn new(base_route: &str, config: RestClientConfig) -> Self {
        let base_route = base_route.trim_matches('/').to_string();
        Self {
            client: RestClient::new(base_route.clone(), config.with_base_route(base_route.clone())),
            base_route,
        }
    }

    #[must_use]
    pub fn with_discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.client = self.client.with_discovery(discovery);
        self
    }

    #[must_use]
    pub fn with_counters(mut self, counters: Arc<dyn Counters>) -> Self {
        self.client = self.client.with_counters(counters);
        self
    }

    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.client = self.client.with_tracer(tracer);
        self
    }

    #[must_use]
    pub fn rest_client(&self) -> &RestClient {
        &self.client
    }

    /// Calls command `name` with `params` as the body, instrumented as
    /// `{base_route}.{name}`.
    ///
    /// # Errors
    ///
    /// See [`RestClient::call`].
    pub async fn call_command<T: DeserializeOwned>(
        &self,
        name: &str,
        correlation_id: Option<&str>,
        params: Value,
    ) -> Result<Option<T>, ApplicationError> {
        let operation = format!("{}.{name}", self.base_route);
        self.client
            .instrumentation()
            .run(
                correlation_id,
                &operation,
                self.client
                    .call(Method::POST, name, correlation_id, &[], Some(&params)),
            )
            .await
    }
}

#[async_trait]
impl Openable for CommandableHttpClient {
    fn is_open(&self) -> bool {
        self.client.is_open()
    }

    async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        self.client.open(correlation_id).await
    }

    async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        self.client.close(correlation_id).await
    }
}
