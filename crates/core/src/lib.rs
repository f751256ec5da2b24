//! Typed repository over a partitioned key-value store.
//!
//! The crate is store-agnostic: a [`Repository`] validates keys, compiles
//! update expressions and drives conditional writes, batches and scans
//! through a [`StoreClient`] implemented by an adapter crate.

pub mod attribute;
pub mod context;
pub mod error;
pub mod expression;
pub mod key;
pub mod model;
pub mod repository;
pub mod storage;
pub mod telemetry;
pub mod update;

pub use attribute::{AttributeMap, AttributeValue, CodecError, ItemCodec};
pub use context::Context;
pub use error::{RepositoryError, Result};
pub use expression::Condition;
pub use key::{Key, Query, RangeOperator};
pub use model::{Model, Versioned};
pub use repository::{BatchConfig, GlobalIndex, Repository, ScanIterator};
pub use storage::{StoreClient, StoreError};
pub use telemetry::{Logger, MetricsPublisher, Severity};
pub use update::{UpdateExpressions, UpdateKind};
