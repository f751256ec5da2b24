//! Pre-flight key checks, run before any store call.

use crate::attribute::AttributeValue;
use crate::error::{RepositoryError, Result};

use super::{Key, Query, RangeOperator};

/// Checks that the key names a table.
pub fn validate_table_name(key: &Key) -> Result<()> {
    if key.table_name().is_empty() {
        return Err(RepositoryError::InvalidTableName);
    }
    Ok(())
}

/// Checks that the key can address an item.
///
/// Violations are reported in order: table name, hash key name, hash key value.
pub fn validate_key(key: &Key) -> Result<()> {
    validate_table_name(key)?;
    if key.hash_key_name().is_none() {
        return Err(RepositoryError::InvalidHashKeyName);
    }
    if key.hash_key().is_none() {
        return Err(RepositoryError::InvalidHashKeyValue);
    }
    Ok(())
}

/// Checks the query key, then the shape of the range value for its operator.
pub fn validate_query(query: &Query) -> Result<()> {
    validate_key(query.key())?;

    let Some((_, value)) = query.key().range() else {
        return Ok(());
    };

    match query.range_op() {
        RangeOperator::Between => match value.as_l() {
            Some([_, _]) => Ok(()),
            _ => Err(RepositoryError::InvalidRangeValue {
                op: RangeOperator::Between,
                expected: "a list of two bounds",
            }),
        },
        RangeOperator::BeginsWith => match value {
            AttributeValue::S(_) | AttributeValue::B(_) => Ok(()),
            _ => Err(RepositoryError::InvalidRangeValue {
                op: RangeOperator::BeginsWith,
                expected: "a string or binary prefix",
            }),
        },
        _ => Ok(()),
    }
}
