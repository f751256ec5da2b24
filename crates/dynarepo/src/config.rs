use std::{env, time::Duration};

use dynarepo_core::{BatchConfig, Context};
use serde::Serialize;

/// Store and repository configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Custom DynamoDB endpoint, e.g. a local DynamoDB (default: none)
    pub endpoint_url: Option<String>,
    /// AWS region (default: "us-east-1")
    pub region: String,
    /// Maximum entries per batch write request (default: 25)
    pub batch_write_chunk: usize,
    /// Maximum keys per batch get request (default: 100)
    pub batch_get_chunk: usize,
    /// Per-call store timeout in milliseconds (default: none)
    pub timeout_ms: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AWS_ENDPOINT_URL` - Custom endpoint URL (default: unset)
    /// - `AWS_REGION` - AWS region (default: "us-east-1")
    /// - `DYNAREPO_BATCH_WRITE_CHUNK` - Batch write chunk size (default: 25)
    /// - `DYNAREPO_BATCH_GET_CHUNK` - Batch get chunk size (default: 100)
    /// - `DYNAREPO_TIMEOUT_MS` - Per-call timeout in milliseconds (default: unset)
    pub fn from_env() -> Self {
        Self {
            endpoint_url: env::var("AWS_ENDPOINT_URL").ok().filter(|v| !v.is_empty()),
            region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            batch_write_chunk: env::var("DYNAREPO_BATCH_WRITE_CHUNK")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(BatchConfig::DEFAULT_WRITE_CHUNK),
            batch_get_chunk: env::var("DYNAREPO_BATCH_GET_CHUNK")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(BatchConfig::DEFAULT_GET_CHUNK),
            timeout_ms: env::var("DYNAREPO_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            write_chunk: self.batch_write_chunk,
            get_chunk: self.batch_get_chunk,
        }
    }

    /// Get the store timeout as a Duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// A call context carrying the configured timeout.
    pub fn context(&self, trace_id: impl Into<String>) -> Context {
        let ctx = Context::background().with_trace_id(trace_id);
        match self.timeout() {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }

    /// Returns a display string for the target environment.
    pub fn target_display(&self) -> String {
        match &self.endpoint_url {
            Some(url) => format!("Local DynamoDB ({})", url),
            None => format!("AWS DynamoDB (region: {})", self.region),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
