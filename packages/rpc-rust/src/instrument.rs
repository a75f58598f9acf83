//! Per-operation instrumentation shared by services and clients.
//!
//! Every instrumented operation logs `Executing <name> method`, bumps
//! `<name>.<verb>_count`, times itself into `<name>.<verb>_time` and opens a
//! trace record. Failures additionally bump `<name>.<verb>_errors` and log
//! the error. Services use the verb `exec`, clients `call`.

use std::future::Future;
use std::sync::Arc;

use svcwire_core::{
    ApplicationError, CounterTiming, Counters, LogTracer, NullCounters, TraceTiming, Tracer,
};
use tracing::{error, info_span, trace, Instrument};

/// Verb used in counter names of server-side operations.
pub const EXEC: &str = "exec";
/// Verb used in counter names of client-side calls.
pub const CALL: &str = "call";

/// Counters and tracer of one component.
#[derive(Clone)]
pub struct Instrumentation {
    component: String,
    verb: &'static str,
    counters: Arc<dyn Counters>,
    tracer: Arc<dyn Tracer>,
}

impl Instrumentation {
    /// No counters, trace records written to the log.
    #[must_use]
    pub fn new(component: impl Into<String>, verb: &'static str) -> Self {
        Self {
            component: component.into(),
            verb,
            counters: Arc::new(NullCounters),
            tracer: Arc::new(LogTracer),
        }
    }

    #[must_use]
    pub fn with_counters(mut self, counters: Arc<dyn Counters>) -> Self {
        self.counters = counters;
        self
    }

    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    #[must_use]
    pub fn verb(&self) -> &'static str {
        self.verb
    }

    /// Starts instrumenting operation `name`.
    #[must_use]
    pub fn instrument(&self, correlation_id: Option<&str>, name: &str) -> InstrumentTiming {
        trace!(correlation_id, component = %self.component, "Executing {name} method");
        self.counters
            .increment(&format!("{name}.{}_count", self.verb), 1);
        InstrumentTiming {
            correlation_id: correlation_id.map(str::to_string),
            name: name.to_string(),
            verb: self.verb,
            counters: Arc::clone(&self.counters),
            timing: Some(CounterTiming::begin(
                Arc::clone(&self.counters),
                format!("{name}.{}_time", self.verb),
            )),
            trace: Some(TraceTiming::begin(
                Arc::clone(&self.tracer),
                correlation_id,
                self.component.clone(),
                name,
            )),
        }
    }

    /// Runs `operation` inside an instrumented section and a tracing span.
    ///
    /// # Errors
    ///
    /// Whatever `operation` returns; it is reported as a failure first.
    pub async fn run<T, Fut>(
        &self,
        correlation_id: Option<&str>,
        name: &str,
        operation: Fut,
    ) -> Result<T, ApplicationError>
    where
        Fut: Future<Output = Result<T, ApplicationError>>,
    {
        let span = info_span!(
            "operation",
            component = %self.component,
            operation = name,
            correlation_id = correlation_id.unwrap_or_default(),
        );
        let timing = self.instrument(correlation_id, name);
        let result = operation.instrument(span).await;
        timing.end_timing(&result);
        result
    }
}

impl std::fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentation")
            .field("component", &self.component)
            .field("verb", &self.verb)
            .finish_non_exhaustive()
    }
}

/// One in-flight instrumented operation.
///
/// Ending consumes the value, so an operation is reported exactly once.
/// Dropping it without ending records the elapsed time but no outcome.
pub struct InstrumentTiming {
    correlation_id: Option<String>,
    name: String,
    verb: &'static str,
    counters: Arc<dyn Counters>,
    timing: Option<CounterTiming>,
    trace: Option<TraceTiming>,
}

impl InstrumentTiming {
    /// Reports success.
    pub fn end_success(mut self) {
        self.stop_timing();
        if let Some(trace) = self.trace.take() {
            trace.end_trace();
        }
    }

    /// Reports failure: error counter, error log, failed trace record.
    pub fn end_failure(mut self, err: &ApplicationError) {
        self.stop_timing();
        self.counters
            .increment(&format!("{}.{}_errors", self.name, self.verb), 1);
        error!(
            correlation_id = self.correlation_id.as_deref(),
            code = %err.code,
            "Failed to execute {} method: {err}",
            self.name
        );
        if let Some(trace) = self.trace.take() {
            trace.end_failure(err);
        }
    }

    /// Reports the outcome of `result`.
    pub fn end_timing<T>(self, result: &Result<T, ApplicationError>) {
        match result {
            Ok(_) => self.end_success(),
            Err(err) => self.end_failure(err),
        }
    }

    fn stop_timing(&mut self) {
        if let Some(timing) = self.timing.take() {
            timing.end_timing();
        }
    }
}

impl Drop for InstrumentTiming {
    fn drop(&mut self) {
        self.stop_timing();
    }
}
