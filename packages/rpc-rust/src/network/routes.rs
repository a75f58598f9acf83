//! Route table shared by every service registered on an endpoint.
//!
//! The table is immutable once published; writers clone it, modify the
//! copy and swap it in, so request dispatch never waits on registration.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::http::Method;
use axum::response::Response;
use svcwire_core::{ApplicationError, ObjectSchema};

use super::request::HttpRequest;

/// Future returned by route handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response, ApplicationError>> + Send>>;

pub(crate) type Handler = Arc<dyn Fn(HttpRequest) -> HandlerFuture + Send + Sync>;

/// Authorization guard run before parameter validation.
pub type Authorizer = Arc<dyn Fn(&HttpRequest) -> Result<(), ApplicationError> + Send + Sync>;

pub(crate) type InterceptorAction =
    Arc<dyn Fn(&mut HttpRequest) -> Result<(), ApplicationError> + Send + Sync>;

/// Identifies the owner of routes and interceptors on an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(pub(crate) u64);

// ---------------------------------------------------------------------------
// RoutePattern
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    CatchAll(String),
}

/// Parsed path pattern: `/items/{id}` binds `id`, a final `{*rest}` binds
/// the remainder of the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub(crate) fn parse(path: &str) -> Self {
        let segments: Vec<Segment> = split_path(path)
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) if name.starts_with('*') => Segment::CatchAll(name[1..].to_string()),
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Static(s.to_string()),
            })
            .collect();
        let raw = if segments.is_empty() {
            "/".to_string()
        } else {
            split_path(path).fold(String::new(), |acc, s| acc + "/" + s)
        };
        Self { raw, segments }
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches already-decoded path segments, returning bound parameters.
    pub(crate) fn matches(&self, path: &[String]) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::CatchAll(name) => {
                    params.insert(name.clone(), path.get(i..).unwrap_or_default().join("/"));
                    return Some(params);
                }
                Segment::Static(expected) => {
                    if path.get(i) != Some(expected) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), path.get(i)?.clone());
                }
            }
        }
        (path.len() == self.segments.len()).then_some(params)
    }

    /// Higher is more specific: static segments first, then fewer catch-alls.
    fn specificity(&self) -> (usize, usize) {
        let statics = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Static(_)))
            .count();
        let catch_alls = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::CatchAll(_)))
            .count();
        (statics, usize::MAX - catch_alls)
    }
}

pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// RouteTable
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub(crate) struct Route {
    pub owner: RegistrationId,
    pub method: Method,
    pub pattern: RoutePattern,
    pub schema: Option<ObjectSchema>,
    pub authorize: Option<Authorizer>,
    pub handler: Handler,
}

#[derive(Clone)]
pub(crate) struct Interceptor {
    pub owner: RegistrationId,
    pub prefix: Vec<String>,
    pub action: InterceptorAction,
}

/// Outcome of looking a request up in the table.
pub(crate) enum RouteMatch<'a> {
    Found(&'a Route, HashMap<String, String>),
    MethodNotAllowed,
    NotFound,
}

#[derive(Clone, Default)]
pub(crate) struct RouteTable {
    routes: Vec<Route>,
    interceptors: Vec<Interceptor>,
}

impl RouteTable {
    /// Copy of the table with `route` added. Returns whether an existing
    /// route with the same method and pattern was replaced.
    pub(crate) fn with_route(&self, route: Route) -> (Self, bool) {
        let mut next = self.clone();
        let existing = next
            .routes
            .iter()
            .position(|r| r.method == route.method && r.pattern == route.pattern);
        let replaced = existing.is_some();
        match existing {
            Some(pos) => next.routes[pos] = route,
            None => next.routes.push(route),
        }
        (next, replaced)
    }

    pub(crate) fn with_interceptor(&self, interceptor: Interceptor) -> Self {
        let mut next = self.clone();
        next.interceptors.push(interceptor);
        next
    }

    pub(crate) fn without_owner(&self, owner: RegistrationId) -> Self {
        Self {
            routes: self
                .routes
                .iter()
                .filter(|r| r.owner != owner)
                .cloned()
                .collect(),
            interceptors: self
                .interceptors
                .iter()
                .filter(|i| i.owner != owner)
                .cloned()
                .collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }

    /// Finds the most specific route for `method` and `path`.
    pub(crate) fn find(&self, method: &Method, path: &[String]) -> RouteMatch<'_> {
        let mut path_matched = false;
        let mut best: Option<(&Route, HashMap<String, String>)> = None;

        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            path_matched = true;
            if route.method != method {
                continue;
            }
            let better = best
                .as_ref()
                .is_none_or(|(b, _)| route.pattern.specificity() > b.pattern.specificity());
            if better {
                best = Some((route, params));
            }
        }

        match best {
            Some((route, params)) => RouteMatch::Found(route, params),
            None if path_matched => RouteMatch::MethodNotAllowed,
            None => RouteMatch::NotFound,
        }
    }

    /// Interceptors whose prefix covers `path`, in registration order.
    pub(crate) fn interceptors_for<'a>(
        &'a self,
        path: &'a [String],
    ) -> impl Iterator<Item = &'a Interceptor> + 'a {
        self.interceptors
            .iter()
            .filter(move |i| path.starts_with(&i.prefix))
    }
}
