//! HTTP middleware stack applied to every endpoint.
//!
//! Middleware ordering follows the outer-to-inner convention: the first
//! layer listed is the outermost (processes the request first on the way
//! in, and the response last on the way out).

use std::any::Any;

use axum::http::header::{self, HeaderName, HeaderValue};
use axum::response::Response;
use svcwire_core::ApplicationError;
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::response::HttpResponseSender;

pub(crate) const ALLOW_ORIGIN: &str = "*";
pub(crate) const ALLOW_METHODS: &str = "PUT, GET, POST, DELETE, OPTIONS";
pub(crate) const ALLOW_HEADERS: &str =
    "Authorization, Origin, Accept, Content-Type, X-Requested-With";

type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

type CorsHeader = SetResponseHeaderLayer<HeaderValue>;

/// The composed Tower layer type produced by [`build_http_layers`].
///
/// Each layer wraps the next in a `Stack`, from outermost (first applied)
/// to innermost (last applied).
pub type HttpLayers = Stack<
    PropagateRequestIdLayer,
    Stack<
        CatchPanicLayer<PanicHandler>,
        Stack<
            CorsHeader,
            Stack<
                CorsHeader,
                Stack<
                    CorsHeader,
                    Stack<
                        TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
                        Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>,
                    >,
                >,
            >,
        >,
    >,
>;

/// Builds the HTTP-level Tower middleware stack of an endpoint.
///
/// **Middleware ordering (outermost to innermost):**
/// 1. `SetRequestId` -- assigns a UUID v4 `X-Request-Id` to every incoming request
/// 2. `Tracing` -- logs request/response with structured trace spans
/// 3. `CORS` -- permissive `Access-Control-Allow-*` headers on every response
/// 4. `CatchPanic` -- last-resort 500 envelope for panics outside route dispatch
/// 5. `PropagateRequestId` -- copies `X-Request-Id` from the request to the response
///
/// Body size limits, request timeouts and handler panics are handled by the
/// dispatcher, which knows the request's correlation id.
#[must_use]
pub fn build_http_layers() -> HttpLayers {
    let x_request_id = HeaderName::from_static("x-request-id");

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(cors_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN))
        .layer(cors_header(header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS))
        .layer(cors_header(header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS))
        .layer(CatchPanicLayer::custom(panic_response as PanicHandler))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

fn cors_header(name: HeaderName, value: &'static str) -> CorsHeader {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}

/// Converts a panic payload into the internal `HANDLER_PANICKED` error.
pub(crate) fn panic_error(
    correlation_id: Option<&str>,
    payload: &(dyn Any + Send + 'static),
) -> ApplicationError {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(correlation_id, detail, "request handler panicked");
    ApplicationError::internal(
        correlation_id,
        "HANDLER_PANICKED",
        "Request handler failed unexpectedly",
    )
    .with_cause(detail)
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    HttpResponseSender::send_error(&panic_error(None, payload.as_ref()))
}
