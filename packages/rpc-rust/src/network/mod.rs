//! The HTTP endpoint: listener lifecycle, route table, middleware, and the
//! request/response types handlers work with.

pub mod config;
pub mod endpoint;
pub mod lifecycle;
pub mod middleware;
pub mod request;
pub mod response;
pub mod routes;

pub use config::{EndpointConfig, EndpointOptions};
pub use endpoint::{HttpEndpoint, Registration};
pub use lifecycle::EndpointState;
pub use request::{HttpRequest, CORRELATION_ID};
pub use response::HttpResponseSender;
pub use routes::{Authorizer, HandlerFuture, RegistrationId};
