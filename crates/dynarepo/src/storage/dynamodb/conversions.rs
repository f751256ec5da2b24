//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between the SDK's `AttributeValue` and the
//! store-agnostic one. These are testable in isolation without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue as SdkValue;
use dynarepo_core::storage::{StoreError, StoreResult};
use dynarepo_core::{AttributeMap, AttributeValue};

pub type SdkItem = HashMap<String, SdkValue>;

/// Convert a value to its SDK form.
pub fn to_sdk(value: &AttributeValue) -> SdkValue {
    match value {
        AttributeValue::S(s) => SdkValue::S(s.clone()),
        AttributeValue::N(n) => SdkValue::N(n.clone()),
        AttributeValue::B(b) => SdkValue::B(Blob::new(b.clone())),
        AttributeValue::Bool(b) => SdkValue::Bool(*b),
        AttributeValue::Null => SdkValue::Null(true),
        AttributeValue::L(items) => SdkValue::L(items.iter().map(to_sdk).collect()),
        AttributeValue::M(map) => SdkValue::M(item_to_sdk(map)),
        AttributeValue::Ss(set) => SdkValue::Ss(set.clone()),
        AttributeValue::Ns(set) => SdkValue::Ns(set.clone()),
        AttributeValue::Bs(set) => SdkValue::Bs(set.iter().cloned().map(Blob::new).collect()),
    }
}

/// Convert an SDK value. Variants unknown to this client version are rejected.
pub fn from_sdk(value: SdkValue) -> StoreResult<AttributeValue> {
    Ok(match value {
        SdkValue::S(s) => AttributeValue::S(s),
        SdkValue::N(n) => AttributeValue::N(n),
        SdkValue::B(b) => AttributeValue::B(b.into_inner()),
        SdkValue::Bool(b) => AttributeValue::Bool(b),
        SdkValue::Null(_) => AttributeValue::Null,
        SdkValue::L(items) => {
            let items = items.into_iter().map(from_sdk);
            AttributeValue::L(items.collect::<StoreResult<_>>()?)
        }
        SdkValue::M(map) => AttributeValue::M(item_from_sdk(map)?),
        SdkValue::Ss(set) => AttributeValue::Ss(set),
        SdkValue::Ns(set) => AttributeValue::Ns(set),
        SdkValue::Bs(set) => AttributeValue::Bs(set.into_iter().map(Blob::into_inner).collect()),
        other => {
            return Err(StoreError::Validation(format!(
                "Unsupported attribute value: {:?}",
                other
            )))
        }
    })
}

/// Convert an item to its SDK form.
pub fn item_to_sdk(item: &AttributeMap) -> SdkItem {
    item.iter()
        .map(|(name, value)| (name.clone(), to_sdk(value)))
        .collect()
}

/// Convert an SDK item.
pub fn item_from_sdk(item: SdkItem) -> StoreResult<AttributeMap> {
    item.into_iter()
        .map(|(name, value)| Ok((name, from_sdk(value)?)))
        .collect()
}

/// Convert an optional SDK item, treating an empty map as no item.
pub fn optional_item_from_sdk(item: Option<SdkItem>) -> StoreResult<Option<AttributeMap>> {
    match item {
        Some(item) if !item.is_empty() => item_from_sdk(item).map(Some),
        _ => Ok(None),
    }
}
