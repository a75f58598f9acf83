//! Commandable HTTP services: one `POST {base_route}/{command}` route per
//! command of a [`CommandSet`].
//!
//! The request body is the command envelope: an optional `correlation_id`
//! plus the named command arguments. The response is the JSON result of the
//! command, 204 when it returns `null`, or the error envelope.

use std::sync::Arc;

use axum::http::Method;
use serde_json::Value;
use svcwire_core::{ApplicationError, CommandArgs, CommandSet, Commandable, IdGenerator};

use super::config::RestServiceConfig;
use super::rest::{RestRoutes, RestService, ServiceRoutes};
use crate::network::{HttpRequest, HttpResponseSender, CORRELATION_ID};

/// Routes exposing a [`CommandSet`] through the commandable protocol.
#[derive(Debug, Clone)]
pub struct CommandableRoutes {
    commands: Arc<CommandSet>,
}

impl CommandableRoutes {
    #[must_use]
    pub fn new(commands: CommandSet) -> Self {
        Self {
            commands: Arc::new(commands),
        }
    }

    #[must_use]
    pub fn from_commandable(commandable: &dyn Commandable) -> Self {
        Self::new(commandable.command_set())
    }

    #[must_use]
    pub fn commands(&self) -> &CommandSet {
        &self.commands
    }
}

impl RestRoutes for CommandableRoutes {
    fn register(&self, routes: &ServiceRoutes<'_>) -> Result<(), ApplicationError> {
        let prefix = routes
            .base_route()
            .unwrap_or_default()
            .trim_matches('/')
            .replace('/', ".");
        for command in self.commands.commands() {
            let name = command.name().to_string();
            let operation = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };
            let commands = Arc::clone(&self.commands);
            let instrumentation = routes.instrumentation().clone();
            let route = name.clone();

            routes.register_route(Method::POST, &route, None, move |req: HttpRequest| {
                let commands = Arc::clone(&commands);
                let instrumentation = instrumentation.clone();
                let operation = operation.clone();
                let name = name.clone();
                async move {
                    let (correlation_id, args) = command_envelope(&req);
                    let cid = Some(correlation_id.as_str());
                    instrumentation
                        .run(cid, &operation, commands.execute(cid, &name, args))
                        .await
                        .map(|result| {
                            HttpResponseSender::send_result((!result.is_null()).then_some(result))
                        })
                }
            });
        }
        Ok(())
    }
}

/// Splits the request body into the correlation id and the command
/// arguments. The id comes from the body, then the query string or header,
/// and is generated when absent.
fn command_envelope(request: &HttpRequest) -> (String, CommandArgs) {
    let mut body = match request.body() {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    let from_body = match body.remove(CORRELATION_ID) {
        Some(Value::String(cid)) if !cid.is_empty() => Some(cid),
        _ => None,
    };
    let correlation_id = from_body
        .or_else(|| request.correlation_id().map(str::to_string))
        .unwrap_or_else(IdGenerator::next_long);
    (correlation_id, CommandArgs::from(body))
}

/// REST service serving a command set.
pub type CommandableHttpService = RestService<CommandableRoutes>;

impl RestService<CommandableRoutes> {
    /// Service exposing the commands of `commandable` under `base_route`.
    #[must_use]
    pub fn commandable(
        name: impl Into<String>,
        mut config: RestServiceConfig,
        base_route: &str,
        commandable: &dyn Commandable,
    ) -> Self {
        config.base_route = Some(base_route.to_string());
        Self::new(name, config, CommandableRoutes::from_commandable(commandable))
    }
}
