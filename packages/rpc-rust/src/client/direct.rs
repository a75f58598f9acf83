//! In-process client: calls a controller directly, with the same
//! instrumentation as the network clients.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use svcwire_core::{ApplicationError, Counters, Tracer};
use tracing::info;

use crate::instrument::{Instrumentation, CALL};
use crate::traits::Openable;

/// Client bound to a controller living in the same process.
///
/// ```
/// # async fn run() -> Result<(), svcwire_core::ApplicationError> {
/// use std::sync::Arc;
/// use svcwire_rpc::{DirectClient, Openable};
///
/// struct Greeter;
/// impl Greeter {
///     fn greet(&self, name: &str) -> String {
///         format!("hello {name}")
///     }
/// }
///
/// let client = DirectClient::new("greeter").with_controller(Arc::new(Greeter));
/// client.open(None).await?;
/// let greeting = client
///     .call(None, "greeter.greet", |greeter| async move { Ok(greeter.greet("bob")) })
///     .await?;
/// assert_eq!(greeting, "hello bob");
/// # Ok(())
/// # }
/// ```
pub struct DirectClient<C: ?Sized> {
    controller: Option<Arc<C>>,
    instrumentation: Instrumentation,
    opened: AtomicBool,
}

impl<C: ?Sized + Send + Sync> DirectClient<C> {
    /// Client without a controller; [`Openable::open`] fails until one is set.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            controller: None,
            instrumentation: Instrumentation::new(name, CALL),
            opened: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_controller(mut self, controller: Arc<C>) -> Self {
        self.controller = Some(controller);
        self
    }

    #[must_use]
    pub fn with_counters(mut self, counters: Arc<dyn Counters>) -> Self {
        self.instrumentation = self.instrumentation.with_counters(counters);
        self
    }

    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.instrumentation = self.instrumentation.with_tracer(tracer);
        self
    }

    #[must_use]
    pub fn controller(&self) -> Option<&Arc<C>> {
        self.controller.as_ref()
    }

    /// Runs `action` against the controller as the instrumented operation
    /// `name`.
    ///
    /// # Errors
    ///
    /// InvalidState `NOT_OPENED` when the client is closed, otherwise
    /// whatever `action` returns.
    pub async fn call<T, F, Fut>(
        &self,
        correlation_id: Option<&str>,
        name: &str,
        action: F,
    ) -> Result<T, ApplicationError>
    where
        F: FnOnce(Arc<C>) -> Fut,
        Fut: Future<Output = Result<T, ApplicationError>>,
    {
        let controller = match (&self.controller, self.is_open()) {
            (Some(controller), true) => Arc::clone(controller),
            _ => {
                return Err(ApplicationError::invalid_state(
                    correlation_id,
                    "NOT_OPENED",
                    "Direct client is not opened",
                ))
            }
        };
        self.instrumentation
            .run(correlation_id, name, action(controller))
            .await
            .map_err(|e| e.or_correlation_id(correlation_id))
    }
}

#[async_trait]
impl<C: ?Sized + Send + Sync> Openable for DirectClient<C> {
    fn is_open(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    /// Fails with a connection error `NO_CONTROLLER` when no controller is set.
    async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        if self.is_open() {
            return Ok(());
        }
        if self.controller.is_none() {
            return Err(ApplicationError::connection(
                correlation_id,
                "NO_CONTROLLER",
                "Controller reference is missing",
            ));
        }
        self.opened.store(true, Ordering::SeqCst);
        info!(correlation_id, "Opened direct client");
        Ok(())
    }

    async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError> {
        if self.opened.swap(false, Ordering::SeqCst) {
            info!(correlation_id, "Closed direct client");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use svcwire_core::{ErrorCategory, MemoryCounters};

    use super::*;

    trait Echo: Send + Sync {
        fn echo(&self, value: u32) -> u32;
    }

    struct Identity;

    impl Echo for Identity {
        fn echo(&self, value: u32) -> u32 {
            value
        }
    }

    #[tokio::test]
    async fn open_without_controller_is_connection_error() {
        let client: DirectClient<dyn Echo> = DirectClient::new("echo");
        let err = client.open(Some("c1")).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::NoResponse);
        assert_eq!(err.code, "NO_CONTROLLER");
        assert!(!client.is_open());
    }

    #[tokio::test]
    async fn calls_are_instrumented() {
        let counters = Arc::new(MemoryCounters::new());
        let controller: Arc<dyn Echo> = Arc::new(Identity);
        let client = DirectClient::new("echo")
            .with_controller(controller)
            .with_counters(counters.clone());
        client.open(None).await.unwrap();

        let value = client
            .call(None, "echo.echo", |c| async move { Ok(c.echo(7)) })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(counters.count("echo.echo.call_count"), 1);

        client.close(None).await.unwrap();
        let err = client
            .call(Some("c2"), "echo.echo", |c| async move { Ok(c.echo(1)) })
            .await
            .unwrap_err();
        assert_eq!(err.code, "NOT_OPENED");
        assert_eq!(counters.count("echo.echo.call_count"), 1);
    }
}
