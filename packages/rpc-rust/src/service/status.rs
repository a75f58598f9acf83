//! Status and heartbeat routes.

use std::sync::Weak;

use axum::http::Method;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use svcwire_core::{ApplicationError, ContextInfo};

use super::config::RestServiceConfig;
use super::rest::{RestRoutes, RestService, ServiceRoutes};
use crate::network::{HttpEndpoint, HttpResponseSender};

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub id: String,
    pub pid: u32,
    pub name: String,
    pub description: String,
    pub start_time: String,
    pub current_time: String,
    /// Milliseconds since the service was created.
    pub uptime: i64,
    pub properties: Map<String, Value>,
    /// Services registered on the same endpoint.
    pub components: Vec<String>,
}

/// `GET {route}` (default `status`) describing the running process.
#[derive(Debug, Clone)]
pub struct StatusRoutes {
    context: ContextInfo,
    route: String,
    start_time: DateTime<Utc>,
}

impl StatusRoutes {
    #[must_use]
    pub fn new(context: ContextInfo) -> Self {
        Self {
            context,
            route: "status".to_string(),
            start_time: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    fn status(&self, endpoint: &Weak<HttpEndpoint>) -> StatusInfo {
        let now = Utc::now();
        StatusInfo {
            id: self.context.context_id.clone(),
            pid: std::process::id(),
            name: self.context.name.clone(),
            description: self.context.description.clone(),
            start_time: rfc3339(self.start_time),
            current_time: rfc3339(now),
            uptime: (now - self.start_time).num_milliseconds(),
            properties: self
                .context
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
            components: endpoint
                .upgrade()
                .map(|e| e.registration_names())
                .unwrap_or_default(),
        }
    }
}

impl RestRoutes for StatusRoutes {
    fn register(&self, routes: &ServiceRoutes<'_>) -> Result<(), ApplicationError> {
        let this = self.clone();
        let endpoint = routes.endpoint();
        routes.register_route(Method::GET, &self.route, None, move |_req| {
            let status = this.status(&endpoint);
            async move { Ok(HttpResponseSender::send_result(Some(status))) }
        });
        Ok(())
    }
}

pub type StatusRestService = RestService<StatusRoutes>;

impl RestService<StatusRoutes> {
    #[must_use]
    pub fn status(config: RestServiceConfig, context: ContextInfo) -> Self {
        Self::new("status", config, StatusRoutes::new(context))
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

/// `GET {route}` (default `heartbeat`) answering with the current time.
#[derive(Debug, Clone)]
pub struct HeartbeatRoutes {
    route: String,
}

impl Default for HeartbeatRoutes {
    fn default() -> Self {
        Self {
            route: "heartbeat".to_string(),
        }
    }
}

impl HeartbeatRoutes {
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }
}

impl RestRoutes for HeartbeatRoutes {
    fn register(&self, routes: &ServiceRoutes<'_>) -> Result<(), ApplicationError> {
        routes.register_route(Method::GET, &self.route, None, |_req| async {
            Ok(HttpResponseSender::send_result(Some(rfc3339(Utc::now()))))
        });
        Ok(())
    }
}

pub type HeartbeatRestService = RestService<HeartbeatRoutes>;

impl RestService<HeartbeatRoutes> {
    #[must_use]
    pub fn heartbeat(config: RestServiceConfig) -> Self {
        Self::new("heartbeat", config, HeartbeatRoutes::default())
    }
}
