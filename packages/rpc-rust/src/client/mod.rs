//! Callers of remote and in-process services.
//!
//! - [`rest`]: REST client with retries and error-envelope decoding
//! - [`commandable`]: commandable protocol on top of the REST client
//! - [`direct`]: in-process controller calls with the same instrumentation

pub mod commandable;
pub mod config;
pub mod direct;
pub mod query;
pub mod rest;

pub use commandable::CommandableHttpClient;
pub use config::{RestClientConfig, RestClientOptions};
pub use direct::DirectClient;
pub use query::RestQueryParams;
pub use rest::RestClient;
