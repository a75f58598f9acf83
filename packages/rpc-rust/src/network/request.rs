//! Request view handed to route handlers, interceptors and authorizers.

use std::collections::HashMap;

use axum::http::{Extensions, HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use svcwire_core::ApplicationError;

/// Query parameter and header that carry the correlation id.
pub const CORRELATION_ID: &str = "correlation_id";

/// A fully read HTTP request: decoded query, matched path parameters and
/// parsed JSON body.
#[derive(Debug)]
pub struct HttpRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: HashMap<String, String>,
    path_params: HashMap<String, String>,
    body: Value,
    extensions: Extensions,
}

impl HttpRequest {
    /// Assembles a request. `body` is `Value::Null` when the request had none.
    #[must_use]
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        query: HashMap<String, String>,
        body: Value,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            query,
            path_params: HashMap::new(),
            body,
            extensions: Extensions::new(),
        }
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text; non-UTF-8 values count as absent.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub(crate) fn set_path_params(&mut self, params: HashMap<String, String>) {
        self.path_params = params;
    }

    pub(crate) fn set_body(&mut self, body: Value) {
        self.body = body;
    }

    /// Parsed JSON body.
    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Decodes the body into `T`.
    ///
    /// # Errors
    ///
    /// `BadRequest` / `INVALID_BODY` when the body does not match `T`.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, ApplicationError> {
        serde_json::from_value(self.body.clone()).map_err(|e| {
            ApplicationError::bad_request(
                self.correlation_id(),
                "INVALID_BODY",
                "Request body has an unexpected shape",
            )
            .wrap(e)
        })
    }

    /// Correlation id from the query string, falling back to the header of
    /// the same name.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.query_param(CORRELATION_ID)
            .or_else(|| self.header(CORRELATION_ID))
            .filter(|cid| !cid.is_empty())
    }

    /// Parameters validated against route schemas: path parameters and query
    /// parameters as strings, plus the parsed body under `"body"`.
    #[must_use]
    pub fn params(&self) -> Value {
        let mut params: Map<String, Value> = self
            .path_params
            .iter()
            .chain(self.query.iter())
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        params.insert("body".to_string(), self.body.clone());
        Value::Object(params)
    }

    /// Typed request-scoped values, e.g. the authenticated user.
    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}
