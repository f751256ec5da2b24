//! Item codec and attribute conversion helpers.
//!
//! Item types implement [`ItemCodec`] by hand, using the `get_*` helpers to
//! read typed fields out of an [`AttributeMap`].

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use super::{AttributeMap, AttributeValue};

/// Errors raised while encoding or decoding an item.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Invalid field {field}: {message}")]
    InvalidField { field: String, message: String },
}

/// Converts an item type to and from the store's attribute map.
pub trait ItemCodec: Sized {
    fn encode(&self) -> Result<AttributeMap, CodecError>;

    fn decode(item: AttributeMap) -> Result<Self, CodecError>;
}

impl ItemCodec for AttributeMap {
    fn encode(&self) -> Result<AttributeMap, CodecError> {
        Ok(self.clone())
    }

    fn decode(item: AttributeMap) -> Result<Self, CodecError> {
        Ok(item)
    }
}

fn invalid(field: &str, message: impl Into<String>) -> CodecError {
    CodecError::InvalidField {
        field: field.to_string(),
        message: message.into(),
    }
}

fn type_mismatch(field: &str, expected: &str, found: &AttributeValue) -> CodecError {
    let message = format!("expected {expected}, got {}", found.type_name());
    invalid(field, message)
}

/// Get a required string attribute.
pub fn get_string(item: &AttributeMap, key: &str) -> Result<String, CodecError> {
    match item.get(key) {
        Some(AttributeValue::S(s)) => Ok(s.clone()),
        Some(other) => Err(type_mismatch(key, "S", other)),
        None => Err(CodecError::MissingField(key.to_string())),
    }
}

/// Get an optional string attribute.
pub fn get_optional_string(item: &AttributeMap, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s()).map(str::to_string)
}

/// Get a required number attribute parsed as `T`.
pub fn get_number<T>(item: &AttributeMap, key: &str) -> Result<T, CodecError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match item.get(key) {
        Some(AttributeValue::N(n)) => n.parse().map_err(|e: T::Err| invalid(key, e.to_string())),
        Some(other) => Err(type_mismatch(key, "N", other)),
        None => Err(CodecError::MissingField(key.to_string())),
    }
}

/// Get an optional number attribute. Present but unparsable values are errors.
pub fn get_optional_number<T>(item: &AttributeMap, key: &str) -> Result<Option<T>, CodecError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match item.get(key) {
        None | Some(AttributeValue::Null) => Ok(None),
        Some(_) => get_number(item, key).map(Some),
    }
}

/// Get a required boolean attribute.
pub fn get_bool(item: &AttributeMap, key: &str) -> Result<bool, CodecError> {
    match item.get(key) {
        Some(AttributeValue::Bool(b)) => Ok(*b),
        Some(other) => Err(type_mismatch(key, "BOOL", other)),
        None => Err(CodecError::MissingField(key.to_string())),
    }
}

/// Get an optional string-set attribute, empty when absent.
pub fn get_string_set(item: &AttributeMap, key: &str) -> Vec<String> {
    match item.get(key) {
        Some(AttributeValue::Ss(values)) => values.clone(),
        _ => Vec::new(),
    }
}

/// Encode a timestamp as a number of nanoseconds since the Unix epoch.
///
/// Timestamps before the epoch are clamped to zero.
pub fn datetime_to_attribute(value: &DateTime<Utc>) -> AttributeValue {
    let nanos = value.timestamp_nanos_opt().unwrap_or(0).max(0);
    AttributeValue::N(nanos.to_string())
}

/// Get a required timestamp stored as Unix nanoseconds.
pub fn get_datetime(item: &AttributeMap, key: &str) -> Result<DateTime<Utc>, CodecError> {
    let nanos: i64 = get_number(item, key)?;
    Ok(Utc.timestamp_nanos(nanos.max(0)))
}

/// Get an optional timestamp stored as Unix nanoseconds.
pub fn get_optional_datetime(
    item: &AttributeMap,
    key: &str,
) -> Result<Option<DateTime<Utc>>, CodecError> {
    let nanos = get_optional_number::<i64>(item, key)?;
    Ok(nanos.map(|nanos| Utc.timestamp_nanos(nanos.max(0))))
}

/// Insert an optional timestamp, skipping `None`.
pub fn put_optional_datetime(item: &mut AttributeMap, key: &str, value: Option<&DateTime<Utc>>) {
    if let Some(value) = value {
        item.insert(key.to_string(), datetime_to_attribute(value));
    }
}
