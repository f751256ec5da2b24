//! Store adapters.
//!
//! This module provides concrete implementations of the `StoreClient` trait
//! defined in `dynarepo_core::storage`. The adapters are selected at compile
//! time via feature flags.
//!
//! # Feature Flags
//!
//! - `dynamodb` (default): AWS DynamoDB adapter using `aws-sdk-dynamodb`
//! - `inmemory` (default): in-memory adapter for tests and local development

#[cfg(not(any(feature = "inmemory", feature = "dynamodb")))]
compile_error!(
    "No store adapter selected. Enable 'inmemory' or 'dynamodb' feature. \
    Example: cargo build -p dynarepo --features dynamodb"
);

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbStore;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryStore;
