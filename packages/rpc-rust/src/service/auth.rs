//! Basic authorization guards for routes registered with
//! [`HttpEndpoint::register_route_with_auth`](crate::HttpEndpoint::register_route_with_auth).
//!
//! Authentication itself is left to interceptors: an interceptor that
//! recognises the caller attaches a [`UserInfo`] to the request extensions,
//! and the guards here only check for it.

use std::sync::Arc;

use svcwire_core::ApplicationError;

use crate::network::{Authorizer, HttpRequest};

/// Authenticated caller, attached to a request by an interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user_id: String,
    pub roles: Vec<String>,
}

impl UserInfo {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Factory of the two basic guards.
pub struct BasicAuthorizer;

impl BasicAuthorizer {
    /// Lets every request through.
    #[must_use]
    pub fn anybody() -> Authorizer {
        Arc::new(|_| Ok(()))
    }

    /// Rejects requests without a [`UserInfo`] extension with 401 `NOT_SIGNED`.
    #[must_use]
    pub fn signed() -> Authorizer {
        Arc::new(|request: &HttpRequest| {
            if request.extensions().get::<UserInfo>().is_some() {
                return Ok(());
            }
            Err(ApplicationError::unauthorized(
                request.correlation_id(),
                "NOT_SIGNED",
                "User must be signed in to perform this operation",
            )
            .with_status(401))
        })
    }
}
