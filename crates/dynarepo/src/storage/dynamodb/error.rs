//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StoreError` from `dynarepo_core::storage`, by the
//! typed error variant the SDK reports.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use dynarepo_core::StoreError;

const VALIDATION_EXCEPTION: &str = "ValidationException";

/// Unwrap the modeled service error, or classify a transport-level failure.
fn service_error<E, R>(err: SdkError<E, R>) -> Result<E, StoreError>
where
    E: std::error::Error + 'static,
    R: Debug,
{
    match err {
        SdkError::ServiceError(context) => Ok(context.into_err()),
        SdkError::TimeoutError(_) => Err(StoreError::Timeout),
        other => Err(StoreError::Transport(
            DisplayErrorContext(&other).to_string(),
        )),
    }
}

fn message(err: &impl ProvideErrorMetadata) -> String {
    err.message().unwrap_or_default().to_string()
}

/// Fallback for variants without a dedicated `StoreError` classification.
fn unclassified(err: &impl ProvideErrorMetadata) -> StoreError {
    match err.code() {
        Some(VALIDATION_EXCEPTION) => StoreError::Validation(message(err)),
        code => StoreError::Service {
            code: code.unwrap_or("Unknown").to_string(),
            message: message(err),
        },
    }
}

/// Map a GetItem SDK error to StoreError.
pub fn map_get_item_error<R: Debug>(err: SdkError<GetItemError, R>) -> StoreError {
    match service_error(err) {
        Ok(GetItemError::ResourceNotFoundException(e)) => StoreError::ResourceNotFound(message(&e)),
        Ok(GetItemError::ProvisionedThroughputExceededException(e)) => {
            StoreError::Throughput(message(&e))
        }
        Ok(GetItemError::RequestLimitExceeded(e)) => StoreError::Throughput(message(&e)),
        Ok(err) => unclassified(&err),
        Err(err) => err,
    }
}

/// Map a PutItem SDK error to StoreError.
pub fn map_put_item_error<R: Debug>(err: SdkError<PutItemError, R>) -> StoreError {
    match service_error(err) {
        Ok(PutItemError::ConditionalCheckFailedException(e)) => {
            StoreError::ConditionalCheckFailed(message(&e))
        }
        Ok(PutItemError::ResourceNotFoundException(e)) => StoreError::ResourceNotFound(message(&e)),
        Ok(PutItemError::ProvisionedThroughputExceededException(e)) => {
            StoreError::Throughput(message(&e))
        }
        Ok(PutItemError::RequestLimitExceeded(e)) => StoreError::Throughput(message(&e)),
        Ok(err) => unclassified(&err),
        Err(err) => err,
    }
}

/// Map an UpdateItem SDK error to StoreError.
pub fn map_update_item_error<R: Debug>(err: SdkError<UpdateItemError, R>) -> StoreError {
    match service_error(err) {
        Ok(UpdateItemError::ConditionalCheckFailedException(e)) => {
            StoreError::ConditionalCheckFailed(message(&e))
        }
        Ok(UpdateItemError::ResourceNotFoundException(e)) => {
            StoreError::ResourceNotFound(message(&e))
        }
        Ok(UpdateItemError::ProvisionedThroughputExceededException(e)) => {
            StoreError::Throughput(message(&e))
        }
        Ok(UpdateItemError::RequestLimitExceeded(e)) => StoreError::Throughput(message(&e)),
        Ok(err) => unclassified(&err),
        Err(err) => err,
    }
}

/// Map a DeleteItem SDK error to StoreError.
pub fn map_delete_item_error<R: Debug>(err: SdkError<DeleteItemError, R>) -> StoreError {
    match service_error(err) {
        Ok(DeleteItemError::ConditionalCheckFailedException(e)) => {
            StoreError::ConditionalCheckFailed(message(&e))
        }
        Ok(DeleteItemError::ResourceNotFoundException(e)) => {
            StoreError::ResourceNotFound(message(&e))
        }
        Ok(DeleteItemError::ProvisionedThroughputExceededException(e)) => {
            StoreError::Throughput(message(&e))
        }
        Ok(DeleteItemError::RequestLimitExceeded(e)) => StoreError::Throughput(message(&e)),
        Ok(err) => unclassified(&err),
        Err(err) => err,
    }
}

/// Map a Query SDK error to StoreError.
pub fn map_query_error<R: Debug>(err: SdkError<QueryError, R>) -> StoreError {
    match service_error(err) {
        Ok(QueryError::ResourceNotFoundException(e)) => StoreError::ResourceNotFound(message(&e)),
        Ok(QueryError::ProvisionedThroughputExceededException(e)) => {
            StoreError::Throughput(message(&e))
        }
        Ok(QueryError::RequestLimitExceeded(e)) => StoreError::Throughput(message(&e)),
        Ok(err) => unclassified(&err),
        Err(err) => err,
    }
}

/// Map a Scan SDK error to StoreError.
pub fn map_scan_error<R: Debug>(err: SdkError<ScanError, R>) -> StoreError {
    match service_error(err) {
        Ok(ScanError::ResourceNotFoundException(e)) => StoreError::ResourceNotFound(message(&e)),
        Ok(ScanError::ProvisionedThroughputExceededException(e)) => {
            StoreError::Throughput(message(&e))
        }
        Ok(ScanError::RequestLimitExceeded(e)) => StoreError::Throughput(message(&e)),
        Ok(err) => unclassified(&err),
        Err(err) => err,
    }
}

/// Map a BatchWriteItem SDK error to StoreError.
pub fn map_batch_write_error<R: Debug>(err: SdkError<BatchWriteItemError, R>) -> StoreError {
    match service_error(err) {
        Ok(BatchWriteItemError::ResourceNotFoundException(e)) => {
            StoreError::ResourceNotFound(message(&e))
        }
        Ok(BatchWriteItemError::ProvisionedThroughputExceededException(e)) => {
            StoreError::Throughput(message(&e))
        }
        Ok(BatchWriteItemError::RequestLimitExceeded(e)) => StoreError::Throughput(message(&e)),
        Ok(err) => unclassified(&err),
        Err(err) => err,
    }
}

/// Map a BatchGetItem SDK error to StoreError.
pub fn map_batch_get_error<R: Debug>(err: SdkError<BatchGetItemError, R>) -> StoreError {
    match service_error(err) {
        Ok(BatchGetItemError::ResourceNotFoundException(e)) => {
            StoreError::ResourceNotFound(message(&e))
        }
        Ok(BatchGetItemError::ProvisionedThroughputExceededException(e)) => {
            StoreError::Throughput(message(&e))
        }
        Ok(BatchGetItemError::RequestLimitExceeded(e)) => StoreError::Throughput(message(&e)),
        Ok(err) => unclassified(&err),
        Err(err) => err,
    }
}

/// Map a request that could not be built (missing required fields) to StoreError.
pub fn map_build_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::Validation(err.to_string())
}
