use std::fmt;

use crate::context::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Structured log sink used by the repository.
pub trait Logger: Send + Sync {
    fn log(&self, ctx: &Context, severity: Severity, table: &str, message: &str);
}

/// Discards everything. The default when no logger is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopLogger;

impl Logger for NopLogger {
    fn log(&self, _ctx: &Context, _severity: Severity, _table: &str, _message: &str) {}
}

/// Forwards log lines to `tracing` with `table` and `trace_id` fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, ctx: &Context, severity: Severity, table: &str, message: &str) {
        let trace_id = ctx.trace_id().unwrap_or_default();
        match severity {
            Severity::Info => tracing::info!(table, trace_id, "{message}"),
            Severity::Warn => tracing::warn!(table, trace_id, "{message}"),
            Severity::Error => tracing::error!(table, trace_id, "{message}"),
        }
    }
}
