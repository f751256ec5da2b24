use std::future::Future;
use std::time::Duration;

use crate::storage::{StoreError, StoreResult};

/// Per-call invocation context.
///
/// Carries the trace id handed to the logger and metrics publisher, and an
/// optional deadline applied to each store call made on its behalf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    trace_id: Option<String>,
    timeout: Option<Duration>,
}

impl Context {
    /// A context with no trace id and no timeout.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs a store call under this context's timeout.
    pub async fn run<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .unwrap_or(Err(StoreError::Timeout)),
            None => call.await,
        }
    }
}
