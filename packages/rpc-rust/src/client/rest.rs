//! REST client: resolves the remote endpoint once on open and performs JSON
//! calls against it with retries and uniform error translation.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use svcwire_core::{ApplicationError, Counters, ErrorDescription, IdGenerator, Tracer};
use tracing::debug;

use super::config::RestClientConfig;
use crate::connect::HttpConnectionResolver;
use crate::instrument::{Instrumentation, InstrumentTiming, CALL};
use crate::network::CORRELATION_ID;
use crate::service::fix_route;
use crate::traits::{Discovery, Openable};

#[derive(Clone)]
struct Connected {
    http: reqwest::Client,
    uri: String,
}

/// Client of a remote REST service.
///
/// ```no_run
/// # async fn run() -> Result<(), svcwire_core::ApplicationError> {
/// use axum::http::Method;
/// use svcwire_rpc::{Openable, RestClient, RestClientConfig};
///
/// let client = RestClient::new("dummy", RestClientConfig::new("http", "localhost", 3000));
/// client.open(None).await?;
/// let dummy: Option<serde_json::Value> =
///     client.call(Method::GET, "/dummies/1", None, &[], None).await?;
/// # Ok(())
/// # }
/// ```
pub struct RestClient {
    config: RestClientConfig,
    resolver: HttpConnectionResolver,
    instrumentation: Instrumentation,
    connected: RwLock<Option<Connected>>,
}

impl RestClient {
    #[must_use]
    pub fn new(name: impl Into<String>, config: RestClientConfig) -> Self {
        let resolver = HttpConnectionResolver::new(config.connection_list())
            .with_credential(config.credential.clone());
        Self {
            config,
            resolver,
            instrumentation: Instrumentation::new(name, CALL),
            connected: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.resolver = self.resolver.with_discovery(discovery);
        self
    }

    #[must_use]
    pub fn with_counters(mut self, counters: Arc<dyn Counters>) -> Self {
        self.instrumentation = self.instrumentation.with_counters(counters);
        self
    }

    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.instrumentation = self.instrumentation.with_tracer(tracer);
        self
    }

    #[must_use]
    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    #[must_use]
    pub fn instrumentation(&self) -> &Instrumentation {
        &self.instrumentation
    }

    /// Base URI resolved on open.
    #[must_use]
    pub fn uri(&self) -> Option<String> {
        self.connected.read().as_ref().map(|c| c.uri.clone())
    }

    /// Starts instrumenting the client operation `name`.
    #[must_use]
    pub fn instrument(&self, correlation_id: Option<&str>, name: &str) -> InstrumentTiming {
        self.instrumentation.instrument(correlation_id, name)
    }

    /// Calls `route` under the base route.
    ///
    /// `correlation_id` is always sent as a query parameter; a short id is
    /// generated when none is given. 204 and 404 responses yield `None`.
    ///
    /// # Errors
    ///
    /// - InvalidState `NOT_OPENED` when the client is closed
    /// - FailedInvocation `REST_ERROR` for transport failures, after retries
    /// - the decoded error envelope, with the response status, for 4xx/5xx
    /// - Unknown `UNKNOWN` for 4xx/5xx responses without an envelope
    /// - Unknown `FORMAT_ERROR` for a success body that is not the expected JSON
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        route: &str,
        correlation_id: Option<&str>,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Option<T>, ApplicationError> {
        let Some(Connected { http, uri }) = self.connected.read().clone() else {
            return Err(ApplicationError::invalid_state(
                correlation_id,
                "NOT_OPENED",
                "REST client is not opened",
            ));
        };
        let correlation_id = correlation_id.map_or_else(IdGenerator::next_short, str::to_string);
        let cid = Some(correlation_id.as_str());
        let url = format!("{uri}{}", fix_route(self.config.base_route.as_deref(), route));

        let mut params: Vec<(&str, &str)> = query
            .iter()
            .filter(|(k, _)| k != CORRELATION_ID)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        params.push((CORRELATION_ID, correlation_id.as_str()));

        let attempts = self.config.options.retries.max(1);
        let mut attempt = 1;
        let response = loop {
            let mut request = http.request(method.clone(), &url).query(&params);
            if let Some(body) = body {
                request = request.json(body);
            }
            match request.send().await {
                Ok(response) => break response,
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < attempts => {
                    debug!(correlation_id = cid, attempt, %url, "retrying REST call: {e}");
                    attempt += 1;
                }
                Err(e) => return Err(rest_error(cid, e)),
            }
        };

        let status = response.status().as_u16();
        if status == 204 || status == 404 {
            return Ok(None);
        }
        let text = response.text().await.map_err(|e| rest_error(cid, e))?;

        if status >= 400 {
            let err = match serde_json::from_str::<ErrorDescription>(&text) {
                Ok(description) => ApplicationError::from(description),
                Err(_) => ApplicationError::unknown(
                    cid,
                    "UNKNOWN",
                    format!("Unknown error occurred: {text}"),
                )
                .with_details("response", text),
            };
            return Err(err.with_status(status).or_correlation_id(cid));
        }

        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<Option<T>>(&text).map_err(|e| {
            ApplicationError::format(cid, format!("Failed to deserialize JSON data: {text}"))
                .with_details("response", text.clone())
                .wrap(e)
        })
    }
}

fn rest_error(correlation_id: Option<&str>, err: reqwest::Error) -> ApplicationError {
    ApplicationError::invocation(
        correlation_id,
        "REST_ERROR",
        format!("REST operation failed: {err}"),
    )
    .wrap(err)
}

#[async_trait]
impl Openable for RestClient {
    fn is_open(&self) -> bool {
        self.connected.read().is_some()
    }

    /// Resolves the remote URI. No connection is made until the first call.
    async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        if self.is_open() {
            return Ok(());
        }
        let connection = self.resolver.resolve(correlation_id).await?;
        let uri = connection
            .uri()
            .map(|uri| uri.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                ApplicationError::configuration(
                    correlation_id,
                    "NO_URI",
                    "Connection URI is not resolved",
                )
            })?;
        let options = &self.config.options;
        let http = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout())
            .timeout(options.timeout())
            .build()
            .map_err(|e| {
                ApplicationError::connection(
                    correlation_id,
                    "CANNOT_CONNECT",
                    "Failed to create HTTP client",
                )
                .wrap(e)
            })?;

        debug!(correlation_id, %uri, "Connected via REST to {uri}");
        *self.connected.write() = Some(Connected { http, uri });
        Ok(())
    }

    async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        if let Some(connected) = self.connected.write().take() {
            debug!(correlation_id, "Disconnected from {}", connected.uri);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use svcwire_core::ErrorCategory;

    use super::*;

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn call_before_open_is_invalid_state() {
        let client = RestClient::new("dummy", RestClientConfig::default());
        let err = client
            .call::<Value>(Method::GET, "/dummies", Some("c1"), &[], None)
            .await
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::InvalidState);
        assert_eq!(err.code, "NOT_OPENED");
    }

    #[tokio::test]
    async fn open_resolves_uri_and_close_clears_it() {
        let client = RestClient::new("dummy", RestClientConfig::new("http", "localhost", 3000));
        client.open(None).await.unwrap();
        assert!(client.is_open());
        assert_eq!(client.uri().as_deref(), Some("http://localhost:3000"));

        client.close(None).await.unwrap();
        client.close(None).await.unwrap();
        assert!(client.uri().is_none());
    }

    #[tokio::test]
    async fn open_with_invalid_connection_fails() {
        let client = RestClient::new("dummy", RestClientConfig::new("ftp", "localhost", 21));
        let err = client.open(None).await.unwrap_err();
        assert_eq!(err.code, "WRONG_PROTOCOL");
        assert!(!client.is_open());
    }

    #[tokio::test]
    async fn refused_connection_is_invocation_error_after_retries() {
        let config = RestClientConfig::new("http", "127.0.0.1", closed_port());
        let client = RestClient::new("dummy", config);
        client.open(None).await.unwrap();

        let err = client
            .call::<Value>(Method::GET, "/dummies", Some("c2"), &[], None)
            .await
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::FailedInvocation);
        assert_eq!(err.code, "REST_ERROR");
        assert_eq!(err.correlation_id.as_deref(), Some("c2"));
        assert!(err.cause.is_some());
        assert!(std::error::Error::source(&err).is_some());
    }
}
