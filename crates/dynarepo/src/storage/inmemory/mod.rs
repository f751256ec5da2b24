//! In-memory store for testing.
//!
//! This module provides an in-memory implementation of `StoreClient` that
//! keeps every table in a map wrapped in `Arc<RwLock<_>>`. Conditions, key
//! conditions, filters and update directives are evaluated the way the
//! DynamoDB service evaluates them, so repositories behave the same against
//! either store.
//!
//! # Example
//!
//! ```rust,ignore
//! use dynarepo::storage::inmemory::{InMemoryStore, TableSchema};
//!
//! let store = InMemoryStore::with_tables([TableSchema::new("users", "UUID")]);
//! // Use store for testing...
//! ```

mod evaluator;
mod store;

pub use store::{InMemoryStore, KeySchema, TableSchema};
