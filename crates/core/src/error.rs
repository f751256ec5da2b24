use thiserror::Error;

use crate::attribute::CodecError;
use crate::expression::ExpressionError;
use crate::key::RangeOperator;
use crate::storage::StoreError;

/// Errors returned by repository operations.
///
/// Everything except [`RepositoryError::Store`] is detected before the store
/// is called. Not-found and failed preconditions are not errors; they are
/// reported through the operation's return value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("invalid table name")]
    InvalidTableName,
    #[error("invalid hash key name")]
    InvalidHashKeyName,
    #[error("invalid hash key value")]
    InvalidHashKeyValue,
    #[error("invalid type expected slice")]
    InvalidSliceType,
    #[error("all keys must belong to the same table: expected {expected}, found {found}")]
    CrossTableBatch { expected: String, found: String },
    #[error("all keys in a batch must use the same hash and range key names")]
    MixedBatchKeySchema,
    #[error("update has no field changes")]
    EmptyUpdate,
    #[error("field {path} appears under more than one update kind")]
    DuplicateUpdatePath { path: String },
    #[error("range operator {op} requires {expected}")]
    InvalidRangeValue {
        op: RangeOperator,
        expected: &'static str,
    },
    #[error("store returned no item for an update that requested one")]
    MissingReturnValue,
    #[error("invalid expression: {0}")]
    Expression(#[from] ExpressionError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RepositoryError {
    /// The store error carried by this error, if it came from the store.
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let message = RepositoryError::InvalidTableName.to_string();
        assert_eq!(message, "invalid table name");
        assert_eq!(
            RepositoryError::InvalidHashKeyName.to_string(),
            "invalid hash key name"
        );
        assert_eq!(
            RepositoryError::InvalidHashKeyValue.to_string(),
            "invalid hash key value"
        );
        assert_eq!(
            RepositoryError::InvalidSliceType.to_string(),
            "invalid type expected slice"
        );
    }

    #[test]
    fn test_cross_table_display() {
        let error = RepositoryError::CrossTableBatch {
            expected: "Users".to_string(),
            found: "Orders".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "all keys must belong to the same table: expected Users, found Orders"
        );
    }

    #[test]
    fn test_store_error_is_transparent() {
        let store = StoreError::Transport("connection reset".to_string());
        let error = RepositoryError::from(store.clone());
        assert_eq!(error.to_string(), store.to_string());
        assert_eq!(error.as_store_error(), Some(&store));
    }
}
