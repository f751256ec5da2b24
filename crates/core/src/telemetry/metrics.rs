use async_trait::async_trait;
use thiserror::Error;

use crate::context::Context;

pub const METRIC_ITEMS_SAVED: &str = "ItemsSavedCount";
pub const METRIC_ITEMS_UPDATED: &str = "ItemsUpdatedCount";
pub const METRIC_ITEMS_DELETED: &str = "ItemsDeleteCount";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Metrics publish failed: {0}")]
pub struct MetricsError(pub String);

/// Sink for per-table counters.
#[async_trait]
pub trait MetricsPublisher: Send + Sync {
    async fn publish(
        &self,
        ctx: &Context,
        table: &str,
        metric_name: &str,
        value: f64,
    ) -> Result<(), MetricsError>;
}

/// Accepts and drops every metric. The default when no publisher is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopMetrics;

#[async_trait]
impl MetricsPublisher for NopMetrics {
    async fn publish(
        &self,
        _ctx: &Context,
        _table: &str,
        _metric_name: &str,
        _value: f64,
    ) -> Result<(), MetricsError> {
        Ok(())
    }
}

/// Emits each metric as a `tracing` event at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

#[async_trait]
impl MetricsPublisher for TracingMetrics {
    async fn publish(
        &self,
        ctx: &Context,
        table: &str,
        metric_name: &str,
        value: f64,
    ) -> Result<(), MetricsError> {
        tracing::debug!(
            table,
            metric = metric_name,
            value,
            trace_id = ctx.trace_id().unwrap_or_default(),
            "metric"
        );
        Ok(())
    }
}
