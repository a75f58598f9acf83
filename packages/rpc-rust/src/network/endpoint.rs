//! The shared HTTP endpoint.
//!
//! One [`HttpEndpoint`] owns one listener. Any number of services register
//! routes and interceptors on it; registration works whether or not the
//! listener is running and takes effect for the next request.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use async_trait::async_trait;
use axum::extract::{Query, Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use dashmap::DashMap;
use futures_util::FutureExt;
use serde_json::Value;
use svcwire_core::{ApplicationError, ErrorCategory, ObjectSchema};
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::config::EndpointConfig;
use super::lifecycle::{EndpointState, RunningServer, ShutdownSignal, StateCell};
use super::middleware::{build_http_layers, panic_error};
use super::request::HttpRequest;
use super::response::HttpResponseSender;
use super::routes::{
    split_path, Authorizer, HandlerFuture, Interceptor, RegistrationId, Route, RouteMatch,
    RoutePattern, RouteTable,
};
use crate::connect::HttpConnectionResolver;
use crate::traits::{Discovery, Openable};

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Handle returned by [`HttpEndpoint::register`]. Routes and interceptors
/// added with it are removed together by [`HttpEndpoint::unregister`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    id: RegistrationId,
    name: String,
}

impl Registration {
    #[must_use]
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// HttpEndpoint
// ---------------------------------------------------------------------------

/// HTTP listener shared by REST and commandable services.
///
/// ```no_run
/// # async fn run() -> Result<(), svcwire_core::ApplicationError> {
/// use svcwire_rpc::{EndpointConfig, HttpEndpoint, HttpResponseSender, Openable};
/// use axum::http::Method;
///
/// let endpoint = HttpEndpoint::new(EndpointConfig::new("http", "localhost", 3000));
/// let registration = endpoint.register("hello");
/// endpoint.register_route(&registration, Method::GET, "/hello", None, |_req| async {
///     Ok(HttpResponseSender::send_result(Some("world")))
/// });
/// endpoint.open(None).await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpEndpoint {
    config: EndpointConfig,
    resolver: HttpConnectionResolver,
    state: StateCell,
    routes: Arc<ArcSwap<RouteTable>>,
    registrations: DashMap<RegistrationId, String>,
    next_registration: AtomicU64,
    server: Mutex<Option<RunningServer>>,
    local_addr: ArcSwapOption<SocketAddr>,
}

impl HttpEndpoint {
    /// Creates a closed endpoint. Nothing is bound until [`Openable::open`].
    #[must_use]
    pub fn new(config: EndpointConfig) -> Self {
        let resolver = HttpConnectionResolver::new(config.connection_list())
            .with_credential(config.credential.clone())
            .require_ssl_files(true);
        Self {
            config,
            resolver,
            state: StateCell::new(),
            routes: Arc::new(ArcSwap::from_pointee(RouteTable::default())),
            registrations: DashMap::new(),
            next_registration: AtomicU64::new(1),
            server: Mutex::new(None),
            local_addr: ArcSwapOption::empty(),
        }
    }

    /// Resolves discovery keys through `discovery` and publishes the
    /// endpoint there once it is open.
    #[must_use]
    pub fn with_discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.resolver = self.resolver.with_discovery(discovery);
        self
    }

    #[must_use]
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> EndpointState {
        self.state.get()
    }

    /// Socket the listener is bound to while open.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.load_full().map(|addr| *addr)
    }

    /// Names of attached registrations in the order they were made.
    #[must_use]
    pub fn registration_names(&self) -> Vec<String> {
        let mut entries: Vec<(RegistrationId, String)> = self
            .registrations
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, name)| name).collect()
    }

    /// Number of registered routes across all registrations.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.load().len()
    }

    // -- registrations --------------------------------------------------------

    /// Attaches a new owner of routes.
    pub fn register(&self, name: impl Into<String>) -> Registration {
        let id = RegistrationId(self.next_registration.fetch_add(1, Ordering::Relaxed));
        let name = name.into();
        self.registrations.insert(id, name.clone());
        debug!(registration = %name, "registered on HTTP endpoint");
        Registration { id, name }
    }

    /// Detaches `registration` and removes every route and interceptor it added.
    pub fn unregister(&self, registration: &Registration) {
        if self.registrations.remove(&registration.id).is_some() {
            self.routes.rcu(|table| table.without_owner(registration.id));
            debug!(registration = %registration.name, "unregistered from HTTP endpoint");
        }
    }

    /// Registers a route. When `schema` is given, [`HttpRequest::params`] is
    /// validated against it before `handler` runs; any error, from validation
    /// or from the handler, is answered with the error envelope.
    pub fn register_route<F, Fut>(
        &self,
        registration: &Registration,
        method: Method,
        route: &str,
        schema: Option<ObjectSchema>,
        handler: F,
    ) where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, ApplicationError>> + Send + 'static,
    {
        self.add_route(registration, method, route, schema, None, handler);
    }

    /// Like [`HttpEndpoint::register_route`], with `authorize` run before
    /// validation.
    pub fn register_route_with_auth<F, Fut>(
        &self,
        registration: &Registration,
        method: Method,
        route: &str,
        schema: Option<ObjectSchema>,
        authorize: Authorizer,
        handler: F,
    ) where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, ApplicationError>> + Send + 'static,
    {
        self.add_route(registration, method, route, schema, Some(authorize), handler);
    }

    /// Registers an action run, in registration order, for every routed
    /// request whose path starts with `prefix`. The action may modify the
    /// request or fail it.
    pub fn register_interceptor<F>(&self, registration: &Registration, prefix: &str, action: F)
    where
        F: Fn(&mut HttpRequest) -> Result<(), ApplicationError> + Send + Sync + 'static,
    {
        if !self.is_registered(registration) {
            return;
        }
        let interceptor = Interceptor {
            owner: registration.id,
            prefix: split_path(prefix).map(str::to_string).collect(),
            action: Arc::new(action),
        };
        self.routes.rcu(|table| table.with_interceptor(interceptor.clone()));
    }

    fn add_route<F, Fut>(
        &self,
        registration: &Registration,
        method: Method,
        route: &str,
        schema: Option<ObjectSchema>,
        authorize: Option<Authorizer>,
        handler: F,
    ) where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, ApplicationError>> + Send + 'static,
    {
        if !self.is_registered(registration) {
            return;
        }
        let entry = Route {
            owner: registration.id,
            method,
            pattern: RoutePattern::parse(route),
            schema,
            authorize,
            handler: Arc::new(move |req| -> HandlerFuture { Box::pin(handler(req)) }),
        };

        let mut replaced = false;
        self.routes.rcu(|table| {
            let (next, was_replaced) = table.with_route(entry.clone());
            replaced = was_replaced;
            next
        });
        if replaced {
            warn!(
                method = %entry.method,
                route = entry.pattern.as_str(),
                "replaced previously registered route"
            );
        }
    }

    fn is_registered(&self, registration: &Registration) -> bool {
        let known = self.registrations.contains_key(&registration.id);
        if !known {
            warn!(registration = %registration.name, "ignoring route from detached registration");
        }
        known
    }

    // -- listener -------------------------------------------------------------

    fn build_router(&self) -> Router {
        let dispatcher = Dispatcher {
            routes: Arc::clone(&self.routes),
            request_max_size: self.config.options.request_max_size,
            request_timeout: self.config.options.request_timeout(),
        };
        Router::new()
            .fallback(dispatch)
            .layer(build_http_layers())
            .with_state(dispatcher)
    }

    async fn start(&self, correlation_id: Option<&str>) -> Result<RunningServer, ApplicationError> {
        let connection = self.resolver.resolve(correlation_id).await?;
        let https = connection.protocol_or("http") == "https";
        let host = connection.host().unwrap_or("0.0.0.0");
        let port = connection.port().unwrap_or(if https { 443 } else { 80 });
        let bind_addr = format!("{host}:{port}");

        let cannot_open = |e: std::io::Error| {
            ApplicationError::connection(
                correlation_id,
                "CANNOT_CONNECT",
                format!("Opening HTTP endpoint at {bind_addr} failed"),
            )
            .wrap(e)
        };

        let listener = TcpListener::bind(&bind_addr).await.map_err(cannot_open)?;
        let addr = listener.local_addr().map_err(cannot_open)?;
        let router = self.build_router();

        let running = if https {
            self.serve_tls(correlation_id, addr, listener, router).await?
        } else {
            serve_plain(addr, listener, router)
        };

        debug!(
            correlation_id,
            uri = connection.uri().unwrap_or_default(),
            %addr,
            "opened HTTP endpoint"
        );
        Ok(running)
    }

    /// Serves TLS connections using `axum-server` with rustls.
    ///
    /// Reuses the pre-bound TCP listener by converting it to a `std::net::TcpListener`.
    async fn serve_tls(
        &self,
        correlation_id: Option<&str>,
        addr: SocketAddr,
        listener: TcpListener,
        router: Router,
    ) -> Result<RunningServer, ApplicationError> {
        use axum_server::tls_rustls::RustlsConfig;

        let credential = self.resolver.credential().cloned().unwrap_or_default();
        let crt = credential.ssl_crt_file.unwrap_or_default();
        let key = credential.ssl_key_file.unwrap_or_default();
        let rustls_config = RustlsConfig::from_pem_file(&crt, &key).await.map_err(|e| {
            ApplicationError::configuration(
                correlation_id,
                "CANNOT_LOAD_CERTIFICATES",
                "Failed to load TLS certificates",
            )
            .with_details("ssl_crt_file", crt.clone())
            .wrap(e)
        })?;

        let std_listener = listener.into_std().map_err(|e| {
            ApplicationError::connection(
                correlation_id,
                "CANNOT_CONNECT",
                "Preparing TLS listener failed",
            )
            .wrap(e)
        })?;
        let handle = axum_server::Handle::new();
        let server_handle = handle.clone();

        info!("Serving TLS connections on {}", addr);

        let task = tokio::spawn(async move {
            axum_server::from_tcp_rustls(std_listener, rustls_config)
                .handle(server_handle)
                .serve(router.into_make_service())
                .await
        });
        Ok(RunningServer {
            addr,
            signal: ShutdownSignal::Tls(handle),
            task,
        })
    }
}

/// Serves plain HTTP connections using axum's built-in server.
fn serve_plain(addr: SocketAddr, listener: TcpListener, router: Router) -> RunningServer {
    let (tx, mut rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = rx.wait_for(|stop| *stop).await;
            })
            .await
    });
    RunningServer {
        addr,
        signal: ShutdownSignal::Plain(tx),
        task,
    }
}

#[async_trait]
impl Openable for HttpEndpoint {
    fn is_open(&self) -> bool {
        self.state.get() == EndpointState::Open
    }

    /// Binds the listener before returning. A second call while open is a
    /// no-op. On failure the endpoint stays closed.
    async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        let mut server = self.server.lock().await;
        if server.is_some() {
            return Ok(());
        }

        self.state.set(EndpointState::Opening);
        let running = match self.start(correlation_id).await {
            Ok(running) => running,
            Err(err) => {
                self.state.set(EndpointState::Closed);
                return Err(err);
            }
        };
        self.local_addr.store(Some(Arc::new(running.addr)));
        *server = Some(running);
        self.state.set(EndpointState::Open);
        drop(server);

        if let Err(err) = self.resolver.register(correlation_id).await {
            warn!(
                correlation_id,
                code = %err.code,
                "failed to publish endpoint to discovery: {err}"
            );
        }
        Ok(())
    }

    /// Stops the listener. Never fails: problems while stopping are logged
    /// and the endpoint ends up closed regardless.
    async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        let mut server = self.server.lock().await;
        let Some(running) = server.take() else {
            return Ok(());
        };

        if let Err(err) = running.stop(self.config.options.close_timeout()).await {
            warn!(correlation_id, "failed while closing HTTP endpoint: {err}");
        }
        self.local_addr.store(None);
        self.state.set(EndpointState::Closed);
        debug!(correlation_id, "closed HTTP endpoint");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Dispatcher {
    routes: Arc<ArcSwap<RouteTable>>,
    request_max_size: usize,
    request_timeout: Duration,
}

/// Fallback handler that routes every request through the route table.
async fn dispatch(State(dispatcher): State<Dispatcher>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    if parts.method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }

    let query = match Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
        Ok(Query(query)) => query,
        Err(e) => {
            return HttpResponseSender::send_error(
                &ApplicationError::bad_request(None, "INVALID_QUERY", "Query string is malformed")
                    .with_cause(e.body_text()),
            )
        }
    };
    let mut request = HttpRequest::new(parts.method, parts.uri, parts.headers, query, Value::Null);
    let correlation_id = request.correlation_id().map(str::to_string);
    let cid = correlation_id.as_deref();

    let path: Result<Vec<String>, _> = split_path(request.path())
        .map(|s| urlencoding::decode(s).map(|d| d.into_owned()))
        .collect();
    let Ok(path) = path else {
        return HttpResponseSender::send_error(&ApplicationError::bad_request(
            cid,
            "INVALID_PATH",
            "Request path is not valid UTF-8",
        ));
    };

    let table = dispatcher.routes.load_full();
    let (route, path_params) = match table.find(request.method(), &path) {
        RouteMatch::Found(route, params) => (route.clone(), params),
        RouteMatch::MethodNotAllowed => {
            return HttpResponseSender::send_error(
                &ApplicationError::new(
                    ErrorCategory::BadRequest,
                    cid,
                    "METHOD_NOT_ALLOWED",
                    format!("Method {} is not allowed on {}", request.method(), request.path()),
                )
                .with_status(405),
            )
        }
        RouteMatch::NotFound => {
            return HttpResponseSender::send_error(&ApplicationError::not_found(
                cid,
                "ROUTE_NOT_FOUND",
                format!("Route {} was not found", request.path()),
            ))
        }
    };
    let interceptors: Vec<Interceptor> = table.interceptors_for(&path).cloned().collect();
    drop(table);

    let bytes = match axum::body::to_bytes(body, dispatcher.request_max_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return HttpResponseSender::send_error(
                &ApplicationError::bad_request(
                    cid,
                    "REQUEST_TOO_LARGE",
                    format!(
                        "Request body exceeds {} bytes or cannot be read",
                        dispatcher.request_max_size
                    ),
                )
                .with_status(413)
                .with_cause(e.to_string()),
            )
        }
    };
    if !bytes.iter().all(u8::is_ascii_whitespace) {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => request.set_body(body),
            Err(e) => {
                return HttpResponseSender::send_error(
                    &ApplicationError::bad_request(
                        cid,
                        "INVALID_JSON",
                        "Request body is not valid JSON",
                    )
                    .wrap(e),
                )
            }
        }
    }
    request.set_path_params(path_params);

    let run = AssertUnwindSafe(run_route(&route, &interceptors, request)).catch_unwind();
    let result = match tokio::time::timeout(dispatcher.request_timeout, run).await {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => Err(panic_error(cid, payload.as_ref())),
        Err(_) => Err(ApplicationError::new(
            ErrorCategory::NoResponse,
            cid,
            "REQUEST_TIMEOUT",
            format!(
                "Request was not answered within {} ms",
                dispatcher.request_timeout.as_millis()
            ),
        )
        .with_status(408)),
    };
    match result {
        Ok(response) => response,
        Err(err) => HttpResponseSender::send_error(&err.or_correlation_id(cid)),
    }
}

async fn run_route(
    route: &Route,
    interceptors: &[Interceptor],
    mut request: HttpRequest,
) -> Result<Response, ApplicationError> {
    for interceptor in interceptors {
        (interceptor.action)(&mut request)?;
    }
    if let Some(authorize) = &route.authorize {
        authorize(&request)?;
    }
    if let Some(schema) = &route.schema {
        schema.validate_and_fail(request.correlation_id(), &request.params())?;
    }
    (route.handler)(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registrations_are_listed_in_order_and_removed() {
        let endpoint = HttpEndpoint::new(EndpointConfig::default());
        let first = endpoint.register("first");
        let second = endpoint.register("second");
        endpoint.register_route(&first, Method::GET, "/a", None, |_| async {
            Ok(HttpResponseSender::send_deleted_result())
        });
        endpoint.register_route(&second, Method::GET, "/b", None, |_| async {
            Ok(HttpResponseSender::send_deleted_result())
        });
        assert_eq!(endpoint.registration_names(), ["first", "second"]);
        assert_eq!(endpoint.route_count(), 2);

        endpoint.unregister(&first);
        assert_eq!(endpoint.registration_names(), ["second"]);
        assert_eq!(endpoint.route_count(), 1);

        // Routes from a detached registration are ignored.
        endpoint.register_route(&first, Method::GET, "/c", None, |_| async {
            Ok(HttpResponseSender::send_deleted_result())
        });
        assert_eq!(endpoint.route_count(), 1);
    }

    #[tokio::test]
    async fn close_on_unopened_endpoint_is_noop() {
        let endpoint = HttpEndpoint::new(EndpointConfig::default());
        endpoint.close(None).await.unwrap();
        assert_eq!(endpoint.state(), EndpointState::Closed);
        assert!(endpoint.local_addr().is_none());
    }

    #[tokio::test]
    async fn failed_resolution_leaves_endpoint_closed() {
        let endpoint = HttpEndpoint::new(EndpointConfig::new("ftp", "localhost", 21));
        let err = endpoint.open(Some("c1")).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Misconfiguration);
        assert_eq!(err.code, "WRONG_PROTOCOL");
        assert!(!endpoint.is_open());
        assert_eq!(endpoint.state(), EndpointState::Closed);
    }

    #[tokio::test]
    async fn bind_failure_is_connection_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let endpoint = HttpEndpoint::new(EndpointConfig::new("http", "127.0.0.1", port));
        let err = endpoint.open(None).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::NoResponse);
        assert_eq!(err.code, "CANNOT_CONNECT");
        assert!(err.cause.is_some());
        assert!(!endpoint.is_open());
    }

    #[tokio::test]
    async fn https_without_certificates_is_rejected() {
        let endpoint = HttpEndpoint::new(EndpointConfig::new("https", "127.0.0.1", 8443));
        let err = endpoint.open(None).await.unwrap_err();
        assert_eq!(err.code, "NO_SSL_KEY_FILE");
    }
}
