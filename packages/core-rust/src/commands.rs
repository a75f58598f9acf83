//! Named commands: the transport-independent half of the commandable protocol.
//!
//! A controller exposes its operations as a [`CommandSet`]. Transports
//! (the commandable HTTP service, in-process callers) look commands up by
//! name and execute them with JSON arguments.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::ApplicationError;
use crate::schema::ObjectSchema;

/// Boxed future returned by command actions.
pub type CommandFuture = Pin<Box<dyn Future<Output = Result<Value, ApplicationError>> + Send>>;

type CommandAction = Arc<dyn Fn(Option<String>, CommandArgs) -> CommandFuture + Send + Sync>;

// ---------------------------------------------------------------------------
// CommandArgs
// ---------------------------------------------------------------------------

/// Named arguments of one command invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandArgs(Map<String, Value>);

impl CommandArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds arguments from a JSON value. Anything but an object yields no arguments.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Raw value of `key`; `null` counts as absent.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Decodes an optional argument.
    ///
    /// # Errors
    ///
    /// `BadRequest` / `INVALID_ARG` when the value has the wrong shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ApplicationError> {
        self.value(key)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|e| {
                    ApplicationError::bad_request(
                        None,
                        "INVALID_ARG",
                        format!("Argument {key} is invalid"),
                    )
                    .with_details("arg", key)
                    .wrap(e)
                })
            })
            .transpose()
    }

    /// Decodes a required argument.
    ///
    /// # Errors
    ///
    /// `BadRequest` / `MISSING_ARG` when absent, `INVALID_ARG` when malformed.
    pub fn required<T: DeserializeOwned>(&self, key: &str) -> Result<T, ApplicationError> {
        self.get(key)?.ok_or_else(|| {
            ApplicationError::bad_request(None, "MISSING_ARG", format!("Argument {key} is missing"))
                .with_details("arg", key)
        })
    }

    #[must_use]
    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for CommandArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// One named operation with an optional argument schema.
#[derive(Clone)]
pub struct Command {
    name: String,
    schema: Option<ObjectSchema>,
    action: CommandAction,
}

impl Command {
    /// Creates a command from an async action.
    ///
    /// ```
    /// use serde_json::json;
    /// use svcwire_core::{Command, CommandArgs};
    ///
    /// let cmd = Command::new("ping", None, |_cid, _args: CommandArgs| async {
    ///     Ok(json!("pong"))
    /// });
    /// assert_eq!(cmd.name(), "ping");
    /// ```
    pub fn new<F, Fut>(name: impl Into<String>, schema: Option<ObjectSchema>, action: F) -> Self
    where
        F: Fn(Option<String>, CommandArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApplicationError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            schema,
            action: Arc::new(move |cid, args| Box::pin(action(cid, args))),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn schema(&self) -> Option<&ObjectSchema> {
        self.schema.as_ref()
    }

    /// Validates the arguments against the schema, then runs the action.
    ///
    /// # Errors
    ///
    /// Validation failures and whatever the action returns. Errors without a
    /// correlation id inherit the caller's.
    pub async fn execute(
        &self,
        correlation_id: Option<&str>,
        args: CommandArgs,
    ) -> Result<Value, ApplicationError> {
        if let Some(schema) = &self.schema {
            schema.validate_and_fail(correlation_id, &args.as_value())?;
        }
        (self.action)(correlation_id.map(str::to_string), args)
            .await
            .map_err(|e| e.or_correlation_id(correlation_id))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("schema", &self.schema.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// CommandSet
// ---------------------------------------------------------------------------

/// Ordered collection of commands with lookup by name.
#[derive(Debug, Clone, Default)]
pub struct CommandSet {
    commands: Vec<Command>,
    index: HashMap<String, usize>,
}

impl CommandSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a command. A command with the same name is replaced in place.
    pub fn add_command(&mut self, command: Command) {
        if let Some(&pos) = self.index.get(command.name()) {
            self.commands[pos] = command;
        } else {
            self.index.insert(command.name().to_string(), self.commands.len());
            self.commands.push(command);
        }
    }

    /// Adds every command of another set.
    pub fn add_command_set(&mut self, other: &CommandSet) {
        for command in &other.commands {
            self.add_command(command.clone());
        }
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn find_command(&self, name: &str) -> Option<&Command> {
        self.index.get(name).map(|&pos| &self.commands[pos])
    }

    /// Executes the command `name`.
    ///
    /// # Errors
    ///
    /// `BadRequest` / `CMD_NOT_FOUND` for unknown names, otherwise whatever
    /// [`Command::execute`] returns.
    pub async fn execute(
        &self,
        correlation_id: Option<&str>,
        name: &str,
        args: CommandArgs,
    ) -> Result<Value, ApplicationError> {
        let Some(command) = self.find_command(name) else {
            return Err(ApplicationError::bad_request(
                correlation_id,
                "CMD_NOT_FOUND",
                format!("Requested command does not exist: {name}"),
            )
            .with_details("command", name));
        };
        command.execute(correlation_id, args).await
    }
}

/// Anything that exposes its operations as commands.
pub trait Commandable: Send + Sync {
    fn command_set(&self) -> CommandSet;
}
