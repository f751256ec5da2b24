use async_trait::async_trait;

use crate::attribute::AttributeMap;

use super::{
    BatchGetRequest, BatchWriteRequest, DeleteItemRequest, GetItemRequest, Page, PutItemRequest,
    QueryRequest, ScanRequest, StoreResult, UpdateItemRequest,
};

/// Client for a partitioned key-value store.
///
/// Each method is a single request/response round trip: no retries, no
/// paging beyond the one requested page.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Gets an item by key. `Ok(None)` when no item matches.
    async fn get_item(&self, request: GetItemRequest) -> StoreResult<Option<AttributeMap>>;

    /// Writes an item. A false condition yields `StoreError::ConditionalCheckFailed`.
    async fn put_item(&self, request: PutItemRequest) -> StoreResult<()>;

    /// Applies update directives. Returns the updated item when `return_new` is set.
    async fn update_item(&self, request: UpdateItemRequest) -> StoreResult<Option<AttributeMap>>;

    /// Deletes an item by key. Deleting a missing item is not an error.
    async fn delete_item(&self, request: DeleteItemRequest) -> StoreResult<()>;

    /// Reads one page of a key-condition query.
    async fn query(&self, request: QueryRequest) -> StoreResult<Page>;

    /// Reads one page of a table scan.
    async fn scan(&self, request: ScanRequest) -> StoreResult<Page>;

    /// Executes a batch of puts and deletes. Returns how many were processed.
    async fn batch_write(&self, request: BatchWriteRequest) -> StoreResult<usize>;

    /// Fetches many items by key. Missing keys are simply absent from the result.
    async fn batch_get(&self, request: BatchGetRequest) -> StoreResult<Vec<AttributeMap>>;
}
