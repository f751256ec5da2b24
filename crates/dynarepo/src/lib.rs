//! Typed repositories over DynamoDB.
//!
//! Re-exports the store-agnostic repository layer from `dynarepo_core` and
//! adds the store adapters and environment configuration.

pub mod config;
pub mod storage;

pub use dynarepo_core::*;
