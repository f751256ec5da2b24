//! Batch writes, deletes and gets.
//!
//! Requests are split into chunks no larger than the store accepts and
//! sent one after another. The first failing chunk ends the batch.

use crate::attribute::{AttributeMap, ItemCodec};
use crate::context::Context;
use crate::error::{RepositoryError, Result};
use crate::key::{validate_key, Key};
use crate::storage::{BatchGetRequest, BatchWriteRequest};
use crate::telemetry::{Severity, METRIC_ITEMS_DELETED, METRIC_ITEMS_SAVED};

use super::{Repository, NO_ITEM_FOUND};

/// Maximum number of entries sent per batch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub write_chunk: usize,
    pub get_chunk: usize,
}

impl BatchConfig {
    pub const DEFAULT_WRITE_CHUNK: usize = 25;
    pub const DEFAULT_GET_CHUNK: usize = 100;
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            write_chunk: Self::DEFAULT_WRITE_CHUNK,
            get_chunk: Self::DEFAULT_GET_CHUNK,
        }
    }
}

impl Repository {
    /// Writes all items to the key's table. Returns how many the store processed.
    pub async fn save_items<T: ItemCodec>(
        &self,
        ctx: &Context,
        key: &Key,
        items: &[T],
    ) -> Result<usize> {
        let table = key.table_name();
        self.check(ctx, table, validate_key(key))?;
        if items.is_empty() {
            return Ok(0);
        }

        let encoded = items
            .iter()
            .map(|item| self.encode(ctx, table, item))
            .collect::<Result<Vec<_>>>()?;
        let requests = chunks(encoded, self.batch.write_chunk)
            .map(|puts| BatchWriteRequest {
                table_name: table.to_string(),
                puts,
                deletes: Vec::new(),
            })
            .collect();
        self.write_chunks(ctx, table, requests, METRIC_ITEMS_SAVED)
            .await
    }

    /// Deletes every key. All keys must share one table and one key schema.
    ///
    /// An empty list succeeds without calling the store.
    pub async fn delete_items(&self, ctx: &Context, keys: &[Key]) -> Result<usize> {
        let Some(first) = keys.first() else {
            return Ok(0);
        };
        let table = first.table_name();
        self.check(ctx, table, validate_batch_keys(keys, true))?;

        let requests = chunks(
            keys.iter().map(Key::to_attribute_map).collect(),
            self.batch.write_chunk,
        )
        .map(|deletes| BatchWriteRequest {
            table_name: table.to_string(),
            puts: Vec::new(),
            deletes,
        })
        .collect();
        self.write_chunks(ctx, table, requests, METRIC_ITEMS_DELETED)
            .await
    }

    /// Gets every key from one table. `Ok(None)` when nothing was found,
    /// including for an empty key list.
    pub async fn batch_get_items<T: ItemCodec>(
        &self,
        ctx: &Context,
        keys: &[Key],
    ) -> Result<Option<Vec<T>>> {
        let Some(first) = keys.first() else {
            return Ok(None);
        };
        let table = first.table_name();
        self.check(ctx, table, validate_batch_keys(keys, false))?;

        let mut items = Vec::new();
        for chunk in chunks(
            keys.iter().map(Key::to_attribute_map).collect(),
            self.batch.get_chunk,
        ) {
            let request = BatchGetRequest {
                table_name: table.to_string(),
                keys: chunk,
            };
            let found = self.call(ctx, table, self.client.batch_get(request));
            items.extend(found.await?);
        }

        if items.is_empty() {
            self.log(ctx, Severity::Info, table, NO_ITEM_FOUND);
            return Ok(None);
        }
        self.decode_all(ctx, table, items).map(Some)
    }

    async fn write_chunks(
        &self,
        ctx: &Context,
        table: &str,
        requests: Vec<BatchWriteRequest>,
        metric: &str,
    ) -> Result<usize> {
        let mut processed = 0;
        for request in requests {
            match self.call(ctx, table, self.client.batch_write(request)).await {
                Ok(count) => processed += count,
                Err(err) => {
                    if processed > 0 {
                        self.log(
                            ctx,
                            Severity::Warn,
                            table,
                            &format!("batch stopped after {processed} processed items"),
                        );
                        self.publish(ctx, table, metric, processed as f64).await;
                    }
                    return Err(err);
                }
            }
        }
        self.publish(ctx, table, metric, processed as f64).await;
        Ok(processed)
    }
}

/// Every key valid, in one table, and sharing hash and range key names.
fn validate_batch_keys(keys: &[Key], same_schema: bool) -> Result<()> {
    let Some(first) = keys.first() else {
        return Ok(());
    };
    for key in keys {
        validate_key(key)?;
        if key.table_name() != first.table_name() {
            return Err(RepositoryError::CrossTableBatch {
                expected: first.table_name().to_string(),
                found: key.table_name().to_string(),
            });
        }
        if same_schema
            && (key.hash_key_name() != first.hash_key_name()
                || key.range_key_name() != first.range_key_name())
        {
            return Err(RepositoryError::MixedBatchKeySchema);
        }
    }
    Ok(())
}

fn chunks(items: Vec<AttributeMap>, size: usize) -> impl Iterator<Item = Vec<AttributeMap>> {
    let size = size.max(1);
    let mut items = items.into_iter().peekable();
    std::iter::from_fn(move || {
        items.peek()?;
        Some(items.by_ref().take(size).collect())
    })
}
