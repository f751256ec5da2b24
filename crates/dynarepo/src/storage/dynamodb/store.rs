//! DynamoDB store implementation.
//!
//! Implements `StoreClient` from `dynarepo_core::storage` using DynamoDB.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemOutput;
use aws_sdk_dynamodb::types::{
    DeleteRequest, KeysAndAttributes, PutRequest, ReturnValue, WriteRequest,
};
use aws_sdk_dynamodb::Client;

use dynarepo_core::storage::{
    BatchGetRequest, BatchWriteRequest, DeleteItemRequest, GetItemRequest, Page, PutItemRequest,
    QueryRequest, ScanRequest, StoreClient, StoreError, StoreResult, UpdateItemRequest,
};
use dynarepo_core::AttributeMap;

use crate::config::Config;

use super::conversions::{item_from_sdk, item_to_sdk, optional_item_from_sdk, SdkItem};
use super::error::{
    map_batch_get_error, map_batch_write_error, map_build_error, map_delete_item_error,
    map_get_item_error, map_put_item_error, map_query_error, map_scan_error, map_update_item_error,
};
use super::expression::ExpressionBuilder;

/// DynamoDB-based store.
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
}

impl DynamoDbStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds an SDK client for the configured region and endpoint.
    ///
    /// The configured timeout also bounds each SDK operation, retries included.
    pub async fn from_config(config: &Config) -> Self {
        let region = Region::new(config.region.clone());
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);
        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        if let Some(timeout) = config.timeout() {
            let timeouts = TimeoutConfig::builder().operation_timeout(timeout).build();
            loader = loader.timeout_config(timeouts);
        }
        Self::new(Client::new(&loader.load().await))
    }
}

/// Retries for keys a batch get leaves unprocessed.
const BATCH_GET_RETRIES: u32 = 5;
const RETRY_INITIAL_DELAY: Duration = Duration::from_millis(100);
const RETRY_MAX_DELAY: Duration = Duration::from_millis(1600);

/// Exponential backoff: 100ms, 200ms, 400ms, ... capped at `RETRY_MAX_DELAY`.
fn retry_delay(attempt: u32) -> Duration {
    RETRY_INITIAL_DELAY
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(RETRY_MAX_DELAY)
}

/// Splits a batch get response into the items found and the keys the
/// store left unprocessed, if any.
fn batch_get_output(
    output: BatchGetItemOutput,
    table_name: &str,
) -> StoreResult<(Vec<AttributeMap>, Option<KeysAndAttributes>)> {
    let items = output
        .responses
        .and_then(|mut responses| responses.remove(table_name));
    let unprocessed = output
        .unprocessed_keys
        .and_then(|mut unprocessed| unprocessed.remove(table_name))
        .filter(|keys| !keys.keys().is_empty());
    Ok((items_from_sdk(items)?, unprocessed))
}

fn limit(limit: Option<usize>) -> Option<i32> {
    limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX))
}

fn items_from_sdk(items: Option<Vec<SdkItem>>) -> StoreResult<Vec<AttributeMap>> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(item_from_sdk)
        .collect()
}

#[async_trait]
impl StoreClient for DynamoDbStore {
    async fn get_item(&self, request: GetItemRequest) -> StoreResult<Option<AttributeMap>> {
        let result = self
            .client
            .get_item()
            .table_name(request.table_name)
            .set_key(Some(item_to_sdk(&request.key)))
            .send()
            .await
            .map_err(map_get_item_error)?;

        optional_item_from_sdk(result.item)
    }

    async fn put_item(&self, request: PutItemRequest) -> StoreResult<()> {
        let mut expressions = ExpressionBuilder::new();
        let condition = request.condition.map(|c| expressions.condition(&c));

        self.client
            .put_item()
            .table_name(request.table_name)
            .set_item(Some(item_to_sdk(&request.item)))
            .set_condition_expression(condition)
            .set_expression_attribute_names(expressions.names())
            .set_expression_attribute_values(expressions.values())
            .send()
            .await
            .map_err(map_put_item_error)?;

        Ok(())
    }

    async fn update_item(&self, request: UpdateItemRequest) -> StoreResult<Option<AttributeMap>> {
        let mut expressions = ExpressionBuilder::new();
        let update = expressions.update(&request.directives);
        let condition = request.condition.map(|c| expressions.condition(&c));
        let return_values = request.return_new.then_some(ReturnValue::AllNew);

        let result = self
            .client
            .update_item()
            .table_name(request.table_name)
            .set_key(Some(item_to_sdk(&request.key)))
            .set_update_expression((!update.is_empty()).then_some(update))
            .set_condition_expression(condition)
            .set_expression_attribute_names(expressions.names())
            .set_expression_attribute_values(expressions.values())
            .set_return_values(return_values)
            .send()
            .await
            .map_err(map_update_item_error)?;

        optional_item_from_sdk(result.attributes)
    }

    async fn delete_item(&self, request: DeleteItemRequest) -> StoreResult<()> {
        self.client
            .delete_item()
            .table_name(request.table_name)
            .set_key(Some(item_to_sdk(&request.key)))
            .send()
            .await
            .map_err(map_delete_item_error)?;

        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> StoreResult<Page> {
        let mut expressions = ExpressionBuilder::new();
        let key_condition = expressions.key_condition(&request.key_condition);

        let result = self
            .client
            .query()
            .table_name(request.table_name)
            .set_index_name(request.index_name)
            .key_condition_expression(key_condition)
            .set_expression_attribute_names(expressions.names())
            .set_expression_attribute_values(expressions.values())
            .set_limit(limit(request.limit))
            .scan_index_forward(!request.descending)
            .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(item_to_sdk))
            .send()
            .await
            .map_err(map_query_error)?;

        Ok(Page {
            items: items_from_sdk(result.items)?,
            last_evaluated_key: optional_item_from_sdk(result.last_evaluated_key)?,
        })
    }

    async fn scan(&self, request: ScanRequest) -> StoreResult<Page> {
        let mut expressions = ExpressionBuilder::new();
        let filter = request.filter.as_ref().map(|f| expressions.condition(f));

        let result = self
            .client
            .scan()
            .table_name(request.table_name)
            .set_filter_expression(filter)
            .set_expression_attribute_names(expressions.names())
            .set_expression_attribute_values(expressions.values())
            .set_limit(limit(request.limit))
            .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(item_to_sdk))
            .send()
            .await
            .map_err(map_scan_error)?;

        Ok(Page {
            items: items_from_sdk(result.items)?,
            last_evaluated_key: optional_item_from_sdk(result.last_evaluated_key)?,
        })
    }

    async fn batch_write(&self, request: BatchWriteRequest) -> StoreResult<usize> {
        let submitted = request.len();
        let mut writes = Vec::with_capacity(submitted);
        for item in &request.puts {
            let put = PutRequest::builder()
                .set_item(Some(item_to_sdk(item)))
                .build()
                .map_err(map_build_error)?;
            writes.push(WriteRequest::builder().put_request(put).build());
        }
        for key in &request.deletes {
            let delete = DeleteRequest::builder()
                .set_key(Some(item_to_sdk(key)))
                .build()
                .map_err(map_build_error)?;
            writes.push(WriteRequest::builder().delete_request(delete).build());
        }

        let result = self
            .client
            .batch_write_item()
            .request_items(&request.table_name, writes)
            .send()
            .await
            .map_err(map_batch_write_error)?;

        let unprocessed = result
            .unprocessed_items
            .as_ref()
            .and_then(|items| items.get(&request.table_name))
            .map_or(0, Vec::len);

        if unprocessed > 0 {
            tracing::warn!(
                table = %request.table_name,
                unprocessed,
                "Batch write left unprocessed items"
            );
        }

        Ok(submitted.saturating_sub(unprocessed))
    }

    async fn batch_get(&self, request: BatchGetRequest) -> StoreResult<Vec<AttributeMap>> {
        let keys = KeysAndAttributes::builder()
            .set_keys(Some(request.keys.iter().map(item_to_sdk).collect()))
            .build()
            .map_err(map_build_error)?;

        let mut items = Vec::with_capacity(request.keys.len());
        let mut pending = keys;
        let mut attempt = 0;
        loop {
            let output = self
                .client
                .batch_get_item()
                .request_items(&request.table_name, pending)
                .send()
                .await
                .map_err(map_batch_get_error)?;

            let (found, unprocessed) = batch_get_output(output, &request.table_name)?;
            items.extend(found);
            let Some(unprocessed) = unprocessed else {
                return Ok(items);
            };

            let remaining = unprocessed.keys().len();
            if attempt == BATCH_GET_RETRIES {
                return Err(StoreError::Throughput(format!(
                    "{remaining} keys left unprocessed after {BATCH_GET_RETRIES} retries"
                )));
            }
            let delay = retry_delay(attempt);
            tracing::warn!(
                table = %request.table_name,
                remaining,
                delay_ms = delay.as_millis() as u64,
                "Batch get left unprocessed keys, retrying"
            );
            tokio::time::sleep(delay).await;
            pending = unprocessed;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_dynamodb::types::AttributeValue as SdkValue;
    use dynarepo_core::AttributeValue;

    use super::*;

    #[test]
    fn test_limit_conversion() {
        assert_eq!(limit(None), None);
        assert_eq!(limit(Some(10)), Some(10));
        assert_eq!(limit(Some(usize::MAX)), Some(i32::MAX));
    }

    #[test]
    fn test_items_from_sdk_missing_is_empty() {
        assert!(items_from_sdk(None).unwrap().is_empty());
    }

    #[test]
    fn test_retry_delay_doubles_up_to_cap() {
        assert_eq!(retry_delay(0), Duration::from_millis(100));
        assert_eq!(retry_delay(2), Duration::from_millis(400));
        assert_eq!(retry_delay(4), Duration::from_millis(1600));
        assert_eq!(retry_delay(30), RETRY_MAX_DELAY);
    }

    fn sdk_key(id: &str) -> SdkItem {
        SdkItem::from([("Id".to_string(), SdkValue::S(id.to_string()))])
    }

    #[test]
    fn test_batch_get_output_keeps_unprocessed_keys() {
        let unprocessed = KeysAndAttributes::builder()
            .keys(sdk_key("a2"))
            .build()
            .unwrap();
        let output = BatchGetItemOutput::builder()
            .responses("accounts", vec![sdk_key("a1")])
            .unprocessed_keys("accounts", unprocessed)
            .build();

        let (items, unprocessed) = batch_get_output(output, "accounts").unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get("Id"), Some(&AttributeValue::from("a1")));
        assert_eq!(unprocessed.unwrap().keys(), &[sdk_key("a2")]);
    }

    #[test]
    fn test_batch_get_output_complete() {
        let output = BatchGetItemOutput::builder()
            .responses("accounts", vec![sdk_key("a1"), sdk_key("a2")])
            .build();

        let (items, unprocessed) = batch_get_output(output, "accounts").unwrap();

        assert_eq!(items.len(), 2);
        assert!(unprocessed.is_none());
    }

    #[tokio::test]
    async fn test_from_config_uses_configured_region() {
        let config = Config {
            endpoint_url: Some("http://localhost:8000".to_string()),
            region: "eu-west-1".to_string(),
            batch_write_chunk: 25,
            batch_get_chunk: 100,
            timeout_ms: Some(500),
        };
        let store = DynamoDbStore::from_config(&config).await;

        let region = store.client.config().region();
        assert_eq!(region, Some(&Region::new("eu-west-1")));
    }
}
