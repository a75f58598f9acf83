//! Error taxonomy and the JSON error envelope.
//!
//! Every failure path, server side or client side, ends up as an
//! [`ApplicationError`]. On the wire it travels as an [`ErrorDescription`],
//! which decodes leniently so that any JSON error body can be turned back
//! into a structured error on the caller's side.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Boxed error kept as the wrapped cause of an [`ApplicationError`].
pub type SourceError = Arc<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad classification of an error, used to pick a default HTTP status and
/// to let callers branch without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Unclassified failure, including malformed responses.
    Unknown,
    /// Programming error or broken internal invariant.
    Internal,
    /// Missing or invalid configuration (bad connection, unsupported protocol).
    Misconfiguration,
    /// Remote side could not be reached or a listener could not be bound.
    NoResponse,
    /// A remote call failed in transit.
    FailedInvocation,
    /// Operation called on a component in the wrong lifecycle state.
    InvalidState,
    /// Request parameters failed validation.
    BadRequest,
    /// Caller is not allowed to perform the operation.
    Unauthorized,
    /// Concurrent modification or duplicate.
    Conflict,
    /// Requested object does not exist.
    NotFound,
    /// Operation is not supported.
    Unsupported,
}

impl ErrorCategory {
    /// Wire name of the category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Internal => "Internal",
            Self::Misconfiguration => "Misconfiguration",
            Self::NoResponse => "NoResponse",
            Self::FailedInvocation => "FailedInvocation",
            Self::InvalidState => "InvalidState",
            Self::BadRequest => "BadRequest",
            Self::Unauthorized => "Unauthorized",
            Self::Conflict => "Conflict",
            Self::NotFound => "NotFound",
            Self::Unsupported => "Unsupported",
        }
    }

    /// Parses a wire name. Unrecognized names fall back to `Unknown`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "Internal" => Self::Internal,
            "Misconfiguration" => Self::Misconfiguration,
            "NoResponse" => Self::NoResponse,
            "FailedInvocation" => Self::FailedInvocation,
            "InvalidState" => Self::InvalidState,
            "BadRequest" => Self::BadRequest,
            "Unauthorized" => Self::Unauthorized,
            "Conflict" => Self::Conflict,
            "NotFound" => Self::NotFound,
            "Unsupported" => Self::Unsupported,
            _ => Self::Unknown,
        }
    }

    /// HTTP status used when an error of this category carries no explicit status.
    #[must_use]
    pub fn default_status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Conflict => 409,
            _ => 500,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ApplicationError
// ---------------------------------------------------------------------------

/// Structured error shared by endpoints, services and clients.
///
/// Built with one of the category constructors and refined with the
/// `with_*` builders:
///
/// ```
/// use svcwire_core::ApplicationError;
///
/// let err = ApplicationError::configuration(Some("123"), "NO_HOST", "Connection host is not set")
///     .with_details("protocol", "http");
/// assert_eq!(err.status, 500);
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ApplicationError {
    /// Broad classification.
    pub category: ErrorCategory,
    /// Machine-readable error code, e.g. `NO_CONNECTION`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// HTTP status code reported for this error.
    pub status: u16,
    /// Correlation id of the call that failed.
    pub correlation_id: Option<String>,
    /// Optional structured details.
    pub details: Option<Map<String, Value>>,
    /// Text of the wrapped cause, preserved across the wire.
    pub cause: Option<String>,
    /// Optional stack trace text, preserved across the wire.
    pub stack_trace: Option<String>,
    #[source]
    source: Option<SourceError>,
}

impl ApplicationError {
    /// Creates an error of the given category with its default status.
    pub fn new(
        category: ErrorCategory,
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            status: category.default_status(),
            correlation_id: correlation_id.map(str::to_string),
            details: None,
            cause: None,
            stack_trace: None,
            source: None,
        }
    }

    pub fn unknown(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::Unknown, correlation_id, code, message)
    }

    pub fn internal(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::Internal, correlation_id, code, message)
    }

    /// Missing or unsupported configuration.
    pub fn configuration(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::Misconfiguration, correlation_id, code, message)
    }

    /// Bind or connect failure.
    pub fn connection(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::NoResponse, correlation_id, code, message)
    }

    /// Client-side transport failure.
    pub fn invocation(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::FailedInvocation, correlation_id, code, message)
    }

    pub fn invalid_state(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::InvalidState, correlation_id, code, message)
    }

    /// Request data failed validation.
    pub fn bad_request(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::BadRequest, correlation_id, code, message)
    }

    pub fn unauthorized(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::Unauthorized, correlation_id, code, message)
    }

    pub fn conflict(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::Conflict, correlation_id, code, message)
    }

    pub fn not_found(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::NotFound, correlation_id, code, message)
    }

    pub fn unsupported(
        correlation_id: Option<&str>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ErrorCategory::Unsupported, correlation_id, code, message)
    }

    /// Data that should have been JSON but was not, despite a success status.
    pub fn format(correlation_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::unknown(correlation_id, "FORMAT_ERROR", message)
    }

    /// Overrides the HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Option<&str>) -> Self {
        self.correlation_id = correlation_id.map(str::to_string);
        self
    }

    /// Adds a detail entry.
    #[must_use]
    pub fn with_details(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Records a cause message without a live error value.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    #[must_use]
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Wraps an underlying error: it becomes `source()` and its text the `cause`.
    #[must_use]
    pub fn wrap<E>(mut self, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(err.to_string());
        self.source = Some(Arc::new(err));
        self
    }

    /// Fills in the correlation id only when none is set yet.
    #[must_use]
    pub fn or_correlation_id(mut self, correlation_id: Option<&str>) -> Self {
        if self.correlation_id.is_none() {
            self.correlation_id = correlation_id.map(str::to_string);
        }
        self
    }

    /// Converts into the serializable envelope.
    #[must_use]
    pub fn to_description(&self) -> ErrorDescription {
        ErrorDescription::from(self)
    }
}

impl From<anyhow::Error> for ApplicationError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApplicationError>() {
            Ok(app) => app,
            Err(err) => {
                let message = err.to_string();
                let cause = err
                    .chain()
                    .skip(1)
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(": ");
                let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = err.into();
                let mut app = ApplicationError::unknown(None, "UNKNOWN", message);
                if !cause.is_empty() {
                    app.cause = Some(cause);
                }
                app.source = Some(Arc::from(boxed));
                app
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorDescription
// ---------------------------------------------------------------------------

/// Serializable form of an [`ApplicationError`].
///
/// Wire shape: `{correlation_id, code, category, message, status, details?,
/// cause?, stack_trace?}`. Every field defaults when missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorDescription {
    pub correlation_id: Option<String>,
    pub code: String,
    pub category: String,
    pub message: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl From<&ApplicationError> for ErrorDescription {
    fn from(err: &ApplicationError) -> Self {
        Self {
            correlation_id: err.correlation_id.clone(),
            code: err.code.clone(),
            category: err.category.as_str().to_string(),
            message: err.message.clone(),
            status: err.status,
            details: err.details.clone(),
            cause: err.cause.clone(),
            stack_trace: err.stack_trace.clone(),
        }
    }
}

impl From<ErrorDescription> for ApplicationError {
    fn from(desc: ErrorDescription) -> Self {
        let category = ErrorCategory::from_name(&desc.category);
        let code = if desc.code.is_empty() {
            "UNKNOWN".to_string()
        } else {
            desc.code
        };
        let status = if desc.status == 0 {
            category.default_status()
        } else {
            desc.status
        };
        Self {
            category,
            code,
            message: desc.message,
            status,
            correlation_id: desc.correlation_id,
            details: desc.details,
            cause: desc.cause,
            stack_trace: desc.stack_trace,
            source: None,
        }
    }
}
