//! REST services: a set of routes mounted under a base route on an endpoint.
//!
//! A service either shares an endpoint handed to it with
//! [`RestService::with_endpoint`] or creates a private one from its own
//! configuration when opened. Only a private endpoint is opened and closed
//! by the service; the lifecycle of a shared endpoint belongs to whoever
//! created it.

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use axum::http::Method;
use axum::response::Response;
use parking_lot::Mutex;
use svcwire_core::{ApplicationError, Counters, ObjectSchema, Tracer};
use tracing::debug;

use super::config::{RestServiceConfig, SwaggerConfig};
use crate::instrument::{Instrumentation, EXEC};
use crate::network::{Authorizer, HttpEndpoint, HttpRequest, HttpResponseSender, Registration};
use crate::traits::{Discovery, Openable};

const YAML: &str = "application/x-yaml";

/// Joins route parts with exactly one `/` between them and a leading `/`.
/// Empty parts disappear.
#[must_use]
pub fn fix_route(base_route: Option<&str>, route: &str) -> String {
    let mut joined = String::new();
    for part in [base_route.unwrap_or_default(), route] {
        let part = part.trim_matches('/');
        if !part.is_empty() {
            joined.push('/');
            joined.push_str(part);
        }
    }
    if joined.is_empty() {
        joined.push('/');
    }
    joined
}

// ---------------------------------------------------------------------------
// RestRoutes
// ---------------------------------------------------------------------------

/// The routes of one service. Called every time the service opens.
pub trait RestRoutes: Send + Sync + 'static {
    /// Registers the service routes.
    ///
    /// # Errors
    ///
    /// Any error aborts opening the service.
    fn register(&self, routes: &ServiceRoutes<'_>) -> Result<(), ApplicationError>;
}

/// Registration context handed to [`RestRoutes::register`]. Every path is
/// prefixed with the service base route.
pub struct ServiceRoutes<'a> {
    endpoint: &'a Arc<HttpEndpoint>,
    registration: &'a Registration,
    base_route: Option<&'a str>,
    instrumentation: &'a Instrumentation,
    swagger: &'a SwaggerConfig,
}

impl ServiceRoutes<'_> {
    #[must_use]
    pub fn base_route(&self) -> Option<&str> {
        self.base_route
    }

    #[must_use]
    pub fn instrumentation(&self) -> &Instrumentation {
        self.instrumentation
    }

    /// Non-owning handle to the endpoint the routes are registered on.
    #[must_use]
    pub fn endpoint(&self) -> Weak<HttpEndpoint> {
        Arc::downgrade(self.endpoint)
    }

    /// Full path of `route` under the base route.
    #[must_use]
    pub fn route(&self, route: &str) -> String {
        fix_route(self.base_route, route)
    }

    pub fn register_route<F, Fut>(
        &self,
        method: Method,
        route: &str,
        schema: Option<ObjectSchema>,
        handler: F,
    ) where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, ApplicationError>> + Send + 'static,
    {
        self.endpoint.register_route(
            self.registration,
            method,
            &self.route(route),
            schema,
            handler,
        );
    }

    pub fn register_route_with_auth<F, Fut>(
        &self,
        method: Method,
        route: &str,
        schema: Option<ObjectSchema>,
        authorize: Authorizer,
        handler: F,
    ) where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, ApplicationError>> + Send + 'static,
    {
        self.endpoint.register_route_with_auth(
            self.registration,
            method,
            &self.route(route),
            schema,
            authorize,
            handler,
        );
    }

    /// Registers a route whose handler runs as the instrumented operation
    /// `operation`, with the request correlation id.
    pub fn register_operation<F, Fut>(
        &self,
        method: Method,
        route: &str,
        schema: Option<ObjectSchema>,
        operation: &str,
        handler: F,
    ) where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, ApplicationError>> + Send + 'static,
    {
        let instrumentation = self.instrumentation.clone();
        let operation = operation.to_string();
        self.register_route(method, route, schema, move |req: HttpRequest| {
            let instrumentation = instrumentation.clone();
            let operation = operation.clone();
            let correlation_id = req.correlation_id().map(str::to_string);
            let call = handler(req);
            async move {
                instrumentation
                    .run(correlation_id.as_deref(), &operation, call)
                    .await
            }
        });
    }

    pub fn register_interceptor<F>(&self, prefix: &str, action: F)
    where
        F: Fn(&mut HttpRequest) -> Result<(), ApplicationError> + Send + Sync + 'static,
    {
        self.endpoint
            .register_interceptor(self.registration, &self.route(prefix), action);
    }

    /// Serves `content` as the OpenAPI document of the service, when enabled.
    pub fn register_open_api_spec(&self, content: impl Into<String>) {
        if !self.swagger.enable {
            return;
        }
        let content: Arc<str> = Arc::from(content.into());
        self.register_route(Method::GET, &self.swagger.route, None, move |_req| {
            let content = Arc::clone(&content);
            async move { Ok(HttpResponseSender::send_text(YAML, content.as_ref())) }
        });
    }

    /// Reads the OpenAPI document from `path` and serves it, when enabled.
    ///
    /// # Errors
    ///
    /// Misconfiguration / `CANNOT_READ_OPENAPI` when the file cannot be read.
    pub fn register_open_api_spec_from_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(), ApplicationError> {
        if !self.swagger.enable {
            return Ok(());
        }
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ApplicationError::configuration(
                None,
                "CANNOT_READ_OPENAPI",
                "Failed to read OpenAPI document",
            )
            .with_details("path", path.display().to_string())
            .wrap(e)
        })?;
        self.register_open_api_spec(content);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RestService
// ---------------------------------------------------------------------------

/// A named set of [`RestRoutes`] with an open/close lifecycle.
///
/// ```no_run
/// # use svcwire_core::ApplicationError;
/// # async fn run(routes: impl svcwire_rpc::RestRoutes) -> Result<(), ApplicationError> {
/// use svcwire_rpc::{Openable, RestService, RestServiceConfig};
///
/// let config = RestServiceConfig::new("/api/v1", "http", "localhost", 3000);
/// let service = RestService::new("dummy", config, routes);
/// service.open(None).await?;
/// # Ok(())
/// # }
/// ```
pub struct RestService<R> {
    name: String,
    config: RestServiceConfig,
    routes: R,
    instrumentation: Instrumentation,
    discovery: Option<Arc<dyn Discovery>>,
    endpoint: Mutex<Option<Arc<HttpEndpoint>>>,
    local_endpoint: AtomicBool,
    registration: Mutex<Option<Registration>>,
    opened: AtomicBool,
    lifecycle: tokio::sync::Mutex<()>,
}

impl<R: RestRoutes> RestService<R> {
    #[must_use]
    pub fn new(name: impl Into<String>, config: RestServiceConfig, routes: R) -> Self {
        let name = name.into();
        Self {
            instrumentation: Instrumentation::new(name.clone(), EXEC),
            name,
            config,
            routes,
            discovery: None,
            endpoint: Mutex::new(None),
            local_endpoint: AtomicBool::new(false),
            registration: Mutex::new(None),
            opened: AtomicBool::new(false),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Mounts the service on a shared endpoint instead of a private one.
    #[must_use]
    pub fn with_endpoint(self, endpoint: Arc<HttpEndpoint>) -> Self {
        *self.endpoint.lock() = Some(endpoint);
        self.local_endpoint.store(false, Ordering::SeqCst);
        self
    }

    /// Discovery used by a private endpoint.
    #[must_use]
    pub fn with_discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
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
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &RestServiceConfig {
        &self.config
    }

    #[must_use]
    pub fn routes(&self) -> &R {
        &self.routes
    }

    #[must_use]
    pub fn instrumentation(&self) -> &Instrumentation {
        &self.instrumentation
    }

    /// The endpoint the service is mounted on, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<Arc<HttpEndpoint>> {
        self.endpoint.lock().clone()
    }

    /// Whether the endpoint was created by, and belongs to, this service.
    #[must_use]
    pub fn is_local_endpoint(&self) -> bool {
        self.local_endpoint.load(Ordering::SeqCst)
    }

    /// Detaches the service from its endpoint, removing its routes.
    pub fn unset_endpoint(&self) {
        let endpoint = self.endpoint.lock().take();
        let registration = self.registration.lock().take();
        if let (Some(endpoint), Some(registration)) = (endpoint, registration) {
            endpoint.unregister(&registration);
        }
    }

    fn create_endpoint(&self) -> HttpEndpoint {
        let endpoint = HttpEndpoint::new(self.config.endpoint.clone());
        match &self.discovery {
            Some(discovery) => endpoint.with_discovery(Arc::clone(discovery)),
            None => endpoint,
        }
    }

    /// Shared endpoint, or a freshly created private one.
    fn acquire_endpoint(&self) -> Arc<HttpEndpoint> {
        let mut guard = self.endpoint.lock();
        if let Some(endpoint) = guard.as_ref() {
            return Arc::clone(endpoint);
        }
        let endpoint = Arc::new(self.create_endpoint());
        *guard = Some(Arc::clone(&endpoint));
        self.local_endpoint.store(true, Ordering::SeqCst);
        endpoint
    }

    fn register_routes(
        &self,
        endpoint: &Arc<HttpEndpoint>,
        registration: &Registration,
    ) -> Result<(), ApplicationError> {
        let routes = ServiceRoutes {
            endpoint,
            registration,
            base_route: self.config.base_route.as_deref(),
            instrumentation: &self.instrumentation,
            swagger: &self.config.swagger,
        };
        self.routes.register(&routes)?;

        let swagger = &self.config.swagger;
        if let Some(content) = &swagger.content {
            routes.register_open_api_spec(content.clone());
        } else if let Some(path) = &swagger.path {
            routes.register_open_api_spec_from_file(path)?;
        }
        Ok(())
    }
}

#[async_trait]
impl<R: RestRoutes> Openable for RestService<R> {
    fn is_open(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    /// Registers the routes and, for a private endpoint, opens it.
    async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_open() {
            return Ok(());
        }

        let endpoint = self.acquire_endpoint();
        let registration = endpoint.register(self.name.clone());
        if let Err(err) = self.register_routes(&endpoint, &registration) {
            endpoint.unregister(&registration);
            return Err(err.or_correlation_id(correlation_id));
        }
        if self.is_local_endpoint() {
            if let Err(err) = endpoint.open(correlation_id).await {
                endpoint.unregister(&registration);
                return Err(err);
            }
        }

        *self.registration.lock() = Some(registration);
        self.opened.store(true, Ordering::SeqCst);
        debug!(correlation_id, service = %self.name, "opened REST service");
        Ok(())
    }

    /// Removes the routes and, for a private endpoint, closes it.
    ///
    /// Fails with InvalidState / `NO_ENDPOINT` when the service is open but
    /// its endpoint was taken away; the service counts as closed afterwards.
    async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        let _lifecycle = self.lifecycle.lock().await;
        if !self.is_open() {
            return Ok(());
        }
        self.opened.store(false, Ordering::SeqCst);

        let Some(endpoint) = self.endpoint() else {
            return Err(ApplicationError::invalid_state(
                correlation_id,
                "NO_ENDPOINT",
                "HTTP endpoint is missing",
            ));
        };
        let registration = self.registration.lock().take();
        if let Some(registration) = registration {
            endpoint.unregister(&registration);
        }
        if self.is_local_endpoint() {
            endpoint.close(correlation_id).await?;
        }
        debug!(correlation_id, service = %self.name, "closed REST service");
        Ok(())
    }
}
