//! Endpoint state and the handle of a running listener.
//!
//! State transitions are published through `ArcSwap` so readers never lock.
//! Stopping signals the listener, then waits a bounded time for in-flight
//! requests before aborting it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

/// Lifecycle of an endpoint.
///
/// State machine: Closed -> Opening -> Open -> Closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// No listener is bound.
    Closed,
    /// Resolving the connection and binding the listener.
    Opening,
    /// The listener is accepting connections.
    Open,
}

impl EndpointState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
        }
    }
}

/// Shared, lock-free holder of the current [`EndpointState`].
#[derive(Debug)]
pub(crate) struct StateCell(ArcSwap<EndpointState>);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(ArcSwap::from_pointee(EndpointState::Closed))
    }

    pub(crate) fn get(&self) -> EndpointState {
        **self.0.load()
    }

    pub(crate) fn set(&self, state: EndpointState) {
        self.0.store(Arc::new(state));
    }
}

/// Why a listener did not stop cleanly.
#[derive(Debug, thiserror::Error)]
pub(crate) enum StopError {
    #[error("listener did not stop within {0:?}")]
    Timeout(Duration),
    #[error("listener failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("listener task failed: {0}")]
    Join(#[from] JoinError),
}

/// How the running listener is told to stop.
pub(crate) enum ShutdownSignal {
    /// `axum::serve` with a graceful-shutdown future waiting on this channel.
    Plain(watch::Sender<bool>),
    /// `axum-server` TLS listener.
    Tls(axum_server::Handle),
}

/// A listener task bound to `addr`.
pub(crate) struct RunningServer {
    pub addr: SocketAddr,
    pub signal: ShutdownSignal,
    pub task: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    /// Signals shutdown and waits up to `timeout` for the listener to finish.
    /// On timeout the task is aborted.
    pub(crate) async fn stop(self, timeout: Duration) -> Result<(), StopError> {
        match self.signal {
            // Ignore send errors -- the listener may already have exited
            ShutdownSignal::Plain(tx) => {
                let _ = tx.send(true);
            }
            ShutdownSignal::Tls(handle) => handle.graceful_shutdown(Some(timeout)),
        }

        let mut task = self.task;
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => Ok(joined??),
            Err(_) => {
                task.abort();
                Err(StopError::Timeout(timeout))
            }
        }
    }
}
