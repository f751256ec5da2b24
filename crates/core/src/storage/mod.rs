mod error;
mod traits;
mod types;

pub use error::{StoreError, StoreResult};
pub use traits::StoreClient;
pub use types::{
    BatchGetRequest, BatchWriteRequest, DeleteItemRequest, GetItemRequest, KeyCondition, Page,
    PutItemRequest, QueryRequest, RangeCondition, ScanRequest, UpdateDirective, UpdateItemRequest,
};
