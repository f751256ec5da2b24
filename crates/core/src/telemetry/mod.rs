//! Logging and metrics collaborators injected into the repository.

mod log;
mod metrics;

pub use log::{Logger, NopLogger, Severity, TracingLogger};
pub use metrics::{
    MetricsError, MetricsPublisher, NopMetrics, TracingMetrics, METRIC_ITEMS_DELETED,
    METRIC_ITEMS_SAVED, METRIC_ITEMS_UPDATED,
};
