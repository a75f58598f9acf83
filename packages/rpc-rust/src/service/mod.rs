//! Services mounted on an [`HttpEndpoint`](crate::HttpEndpoint).
//!
//! - [`rest`]: base REST service and the route registration context
//! - [`commandable`]: one POST route per command of a command set
//! - [`status`]: status and heartbeat routes
//! - [`auth`]: basic authorization guards

pub mod auth;
pub mod commandable;
pub mod config;
pub mod rest;
pub mod status;

pub use auth::{BasicAuthorizer, UserInfo};
pub use commandable::{CommandableHttpService, CommandableRoutes};
pub use config::{RestServiceConfig, SwaggerConfig};
pub use rest::{fix_route, RestRoutes, RestService, ServiceRoutes};
pub use status::{
    HeartbeatRestService, HeartbeatRoutes, StatusInfo, StatusRestService, StatusRoutes,
};
