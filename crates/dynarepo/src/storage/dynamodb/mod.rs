//! DynamoDB store adapter.
//!
//! Implements `StoreClient` with `aws-sdk-dynamodb`. Parsed conditions and
//! update directives are rendered into placeholder-based expression strings.

mod conversions;
mod error;
mod expression;
mod store;

pub use store::DynamoDbStore;
