//! Call tracing consumed by instrumented components.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::ApplicationError;

/// Receives one record per completed operation.
pub trait Tracer: Send + Sync {
    /// Records a successful operation.
    fn trace(
        &self,
        correlation_id: Option<&str>,
        component: &str,
        operation: &str,
        elapsed: Duration,
    );

    /// Records a failed operation.
    fn failure(
        &self,
        correlation_id: Option<&str>,
        component: &str,
        operation: &str,
        error: &ApplicationError,
        elapsed: Duration,
    );
}

/// Open trace span. Consumed by [`TraceTiming::end_trace`] or [`TraceTiming::end_failure`].
pub struct TraceTiming {
    tracer: Arc<dyn Tracer>,
    correlation_id: Option<String>,
    component: String,
    operation: String,
    start: Instant,
}

impl TraceTiming {
    #[must_use]
    pub fn begin(
        tracer: Arc<dyn Tracer>,
        correlation_id: Option<&str>,
        component: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            tracer,
            correlation_id: correlation_id.map(str::to_string),
            component: component.into(),
            operation: operation.into(),
            start: Instant::now(),
        }
    }

    pub fn end_trace(self) {
        self.tracer.trace(
            self.correlation_id.as_deref(),
            &self.component,
            &self.operation,
            self.start.elapsed(),
        );
    }

    pub fn end_failure(self, error: &ApplicationError) {
        self.tracer.failure(
            self.correlation_id.as_deref(),
            &self.component,
            &self.operation,
            error,
            self.start.elapsed(),
        );
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracer;

impl Tracer for NullTracer {
    fn trace(&self, _: Option<&str>, _: &str, _: &str, _: Duration) {}

    fn failure(&self, _: Option<&str>, _: &str, _: &str, _: &ApplicationError, _: Duration) {}
}

/// Writes records as `tracing` events on the `svcwire::trace` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn trace(
        &self,
        correlation_id: Option<&str>,
        component: &str,
        operation: &str,
        elapsed: Duration,
    ) {
        tracing::debug!(
            target: "svcwire::trace",
            correlation_id = correlation_id.unwrap_or_default(),
            component,
            operation,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "operation completed"
        );
    }

    fn failure(
        &self,
        correlation_id: Option<&str>,
        component: &str,
        operation: &str,
        error: &ApplicationError,
        elapsed: Duration,
    ) {
        tracing::error!(
            target: "svcwire::trace",
            correlation_id = correlation_id.unwrap_or_default(),
            component,
            operation,
            code = %error.code,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "operation failed: {error}"
        );
    }
}
