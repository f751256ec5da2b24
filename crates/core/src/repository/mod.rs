//! Repository facade over a [`StoreClient`].
//!
//! Every operation validates its key before touching the store, logs
//! failures with the table name, and publishes a count metric after a
//! successful write. Not-found is reported as `None`, never as an error.

mod batch;
mod conditional;
mod index;
mod iterator;
#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;
use std::sync::Arc;

use crate::attribute::{AttributeMap, AttributeValue, ItemCodec};
use crate::context::Context;
use crate::error::{RepositoryError, Result};
use crate::key::{validate_key, validate_query, validate_table_name, Key, Query, RangeOperator};
use crate::storage::{
    DeleteItemRequest, GetItemRequest, KeyCondition, PutItemRequest, QueryRequest, RangeCondition,
    StoreClient, StoreResult,
};
use crate::telemetry::{
    Logger, MetricsPublisher, NopLogger, NopMetrics, Severity, METRIC_ITEMS_DELETED,
    METRIC_ITEMS_SAVED, METRIC_ITEMS_UPDATED,
};
use crate::update::{compile, UpdateExpressions, UpdateKind};

pub use batch::BatchConfig;
pub use index::GlobalIndex;
pub use iterator::ScanIterator;

const NO_ITEM_FOUND: &str = "no item found";

/// Typed data access over a partitioned key-value store.
#[derive(Clone)]
pub struct Repository {
    client: Arc<dyn StoreClient>,
    logger: Arc<dyn Logger>,
    metrics: Arc<dyn MetricsPublisher>,
    batch: BatchConfig,
}

impl Repository {
    /// A repository with no-op logging and metrics.
    pub fn new(client: Arc<dyn StoreClient>) -> Self {
        Self {
            client,
            logger: Arc::new(NopLogger),
            metrics: Arc::new(NopMetrics),
            batch: BatchConfig::default(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsPublisher>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_batch_config(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    /// Gets one item. `Ok(None)` when no item matches the key.
    pub async fn get_item<T: ItemCodec>(&self, ctx: &Context, key: &Key) -> Result<Option<T>> {
        let table = key.table_name();
        self.check(ctx, table, validate_key(key))?;

        let item = match key.index_name() {
            // Index keys need not be unique, so the first match is returned.
            Some(_) => {
                let range = key
                    .range()
                    .map(|(name, value)| range_condition(name, RangeOperator::Equal, value));
                let request = query_request(key, range, Some(1), false);
                let page = self.call(ctx, table, self.client.query(request)).await?;
                page.items.into_iter().next()
            }
            None => {
                let request = GetItemRequest {
                    table_name: table.to_string(),
                    key: key.to_attribute_map(),
                };
                self.call(ctx, table, self.client.get_item(request)).await?
            }
        };
        match item {
            Some(item) => self.decode(ctx, table, item).map(Some),
            None => {
                self.log(ctx, Severity::Info, table, NO_ITEM_FOUND);
                Ok(None)
            }
        }
    }

    /// Gets every item sharing the key's hash key. `Ok(None)` when there are none.
    pub async fn get_items<T: ItemCodec>(
        &self,
        ctx: &Context,
        key: &Key,
    ) -> Result<Option<Vec<T>>> {
        let table = key.table_name();
        self.check(ctx, table, validate_key(key))?;

        let request = query_request(key, None, None, false);
        let items = self.drain_query(ctx, request, None).await?;
        if items.is_empty() {
            self.log(ctx, Severity::Info, table, NO_ITEM_FOUND);
            return Ok(None);
        }
        self.decode_all(ctx, table, items).map(Some)
    }

    /// Runs a key-condition query, following continuation tokens until the
    /// query's limit is reached or the store has no more pages.
    pub async fn query<T: ItemCodec>(&self, ctx: &Context, query: &Query) -> Result<Vec<T>> {
        let table = query.table_name();
        self.check(ctx, table, validate_query(query))?;

        let range = query
            .key()
            .range()
            .map(|(name, value)| range_condition(name, query.range_op(), value));
        let request = query_request(query.key(), range, query.limit(), query.descending());
        let items = self.drain_query(ctx, request, query.limit()).await?;
        self.decode_all(ctx, table, items)
    }

    /// Writes the whole item, replacing any existing item with the same key.
    pub async fn save_item<T: ItemCodec>(&self, ctx: &Context, key: &Key, item: &T) -> Result<()> {
        let table = key.table_name();
        self.check(ctx, table, validate_key(key))?;

        let item = self.encode(ctx, table, item)?;
        let request = PutItemRequest {
            table_name: table.to_string(),
            item,
            condition: None,
        };
        self.call(ctx, table, self.client.put_item(request)).await?;
        self.publish(ctx, table, METRIC_ITEMS_SAVED, 1.0).await;
        Ok(())
    }

    /// Applies one update kind to every `(field, value)` pair.
    pub async fn update<I, F, V>(
        &self,
        ctx: &Context,
        kind: UpdateKind,
        key: &Key,
        values: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<String>,
        V: Into<AttributeValue>,
    {
        let updates = UpdateExpressions::from_values(kind, values);
        self.update_with_expressions(ctx, key, &updates).await
    }

    /// Applies field-level changes of mixed kinds in one update.
    pub async fn update_with_expressions(
        &self,
        ctx: &Context,
        key: &Key,
        updates: &UpdateExpressions,
    ) -> Result<()> {
        let table = key.table_name();
        let request = self.check(ctx, table, compile(key, updates))?;

        self.call(ctx, table, self.client.update_item(request))
            .await?;
        self.publish(ctx, table, METRIC_ITEMS_UPDATED, 1.0).await;
        Ok(())
    }

    /// Like [`Repository::update_with_expressions`], returning the item as
    /// it is after the update.
    pub async fn update_with_expressions_and_return_value<T: ItemCodec>(
        &self,
        ctx: &Context,
        key: &Key,
        updates: &UpdateExpressions,
    ) -> Result<T> {
        let table = key.table_name();
        let mut request = self.check(ctx, table, compile(key, updates))?;
        request.return_new = true;

        let item = self
            .call(ctx, table, self.client.update_item(request))
            .await?;
        let Some(item) = item else {
            return Err(self.logged(ctx, table, RepositoryError::MissingReturnValue));
        };
        let item = self.decode(ctx, table, item)?;
        self.publish(ctx, table, METRIC_ITEMS_UPDATED, 1.0).await;
        Ok(item)
    }

    /// Deletes one item. Deleting a missing item succeeds.
    pub async fn delete_item(&self, ctx: &Context, key: &Key) -> Result<()> {
        let table = key.table_name();
        self.check(ctx, table, validate_key(key))?;

        let request = DeleteItemRequest {
            table_name: table.to_string(),
            key: key.to_attribute_map(),
        };
        self.call(ctx, table, self.client.delete_item(request))
            .await?;
        self.publish(ctx, table, METRIC_ITEMS_DELETED, 1.0).await;
        Ok(())
    }

    /// A resumable cursor over a full scan of the key's table.
    ///
    /// Only the table name is required. `page_size` of 0 leaves paging to the store.
    pub fn scan_iterator<T: ItemCodec>(
        &self,
        ctx: &Context,
        key: &Key,
        page_size: usize,
    ) -> Result<ScanIterator<T>> {
        let table = key.table_name();
        self.check(ctx, table, validate_table_name(key))?;

        Ok(ScanIterator::new(
            self.client.clone(),
            self.logger.clone(),
            ctx.clone(),
            table,
            (page_size > 0).then_some(page_size),
        ))
    }

    /// A view that routes reads through the named secondary index.
    pub fn index(&self, name: impl Into<String>) -> GlobalIndex {
        GlobalIndex::new(self.clone(), name)
    }

    async fn drain_query(
        &self,
        ctx: &Context,
        mut request: QueryRequest,
        limit: Option<usize>,
    ) -> Result<Vec<AttributeMap>> {
        let table = request.table_name.clone();
        let mut items = Vec::new();
        loop {
            if let Some(limit) = limit {
                request.limit = Some(limit - items.len());
            }
            let page = self
                .call(ctx, &table, self.client.query(request.clone()))
                .await?;
            items.extend(page.items);

            let wants_more = limit.map_or(true, |limit| items.len() < limit);
            match page.last_evaluated_key {
                Some(token) if wants_more => request.exclusive_start_key = Some(token),
                _ => break,
            }
        }
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    pub(crate) fn log(&self, ctx: &Context, severity: Severity, table: &str, message: &str) {
        self.logger.log(ctx, severity, table, message);
    }

    /// Logs `err` at error severity and hands it back.
    pub(crate) fn logged(
        &self,
        ctx: &Context,
        table: &str,
        err: RepositoryError,
    ) -> RepositoryError {
        self.log(ctx, Severity::Error, table, &err.to_string());
        err
    }

    pub(crate) fn check<T>(&self, ctx: &Context, table: &str, result: Result<T>) -> Result<T> {
        result.map_err(|err| self.logged(ctx, table, err))
    }

    /// Runs a store call under the context, logging and wrapping any fault.
    pub(crate) async fn call<T, F>(&self, ctx: &Context, table: &str, call: F) -> Result<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let result = ctx.run(call).await;
        self.check(ctx, table, result.map_err(RepositoryError::from))
    }

    pub(crate) fn encode<T: ItemCodec>(
        &self,
        ctx: &Context,
        table: &str,
        item: &T,
    ) -> Result<AttributeMap> {
        self.check(ctx, table, item.encode().map_err(RepositoryError::from))
    }

    pub(crate) fn decode<T: ItemCodec>(
        &self,
        ctx: &Context,
        table: &str,
        item: AttributeMap,
    ) -> Result<T> {
        self.check(ctx, table, T::decode(item).map_err(RepositoryError::from))
    }

    pub(crate) fn decode_all<T: ItemCodec>(
        &self,
        ctx: &Context,
        table: &str,
        items: Vec<AttributeMap>,
    ) -> Result<Vec<T>> {
        items
            .into_iter()
            .map(|item| self.decode(ctx, table, item))
            .collect()
    }

    /// Publishes a count. Failures are logged and dropped.
    pub(crate) async fn publish(&self, ctx: &Context, table: &str, metric: &str, value: f64) {
        if let Err(err) = self.metrics.publish(ctx, table, metric, value).await {
            self.log(ctx, Severity::Error, table, &err.to_string());
        }
    }
}

fn query_request(
    key: &Key,
    range: Option<RangeCondition>,
    limit: Option<usize>,
    descending: bool,
) -> QueryRequest {
    QueryRequest {
        table_name: key.table_name().to_string(),
        index_name: key.index_name().map(str::to_string),
        key_condition: KeyCondition {
            hash_key_name: key.hash_key_name().unwrap_or_default().to_string(),
            hash_key: key.hash_key().cloned().unwrap_or(AttributeValue::Null),
            range,
        },
        limit,
        descending,
        exclusive_start_key: None,
    }
}

/// Between takes its bounds from a two-element list; validation has checked the shape.
fn range_condition(name: &str, op: RangeOperator, value: &AttributeValue) -> RangeCondition {
    let values = match (op, value) {
        (RangeOperator::Between, AttributeValue::L(bounds)) => bounds.clone(),
        _ => vec![value.clone()],
    };
    RangeCondition {
        name: name.to_string(),
        op,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{user_item, MockStore, RecordingLogger, RecordingMetrics, User};
    use super::*;
    use crate::storage::{Page, StoreError, UpdateDirective};

    fn user_key() -> Key {
        Key::new()
            .with_table_name("Users")
            .with_hash_key_name("UUID")
            .with_hash_key("u1")
    }

    type Recorded = (Repository, Arc<RecordingLogger>, Arc<RecordingMetrics>);

    fn repository(store: &Arc<MockStore>) -> Recorded {
        let logger = Arc::new(RecordingLogger::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let repository = Repository::new(store.clone())
            .with_logger(logger.clone())
            .with_metrics(metrics.clone());
        (repository, logger, metrics)
    }

    #[tokio::test]
    async fn test_invalid_keys_fail_in_order_without_store_calls() {
        let store = Arc::new(MockStore::default());
        let (repository, logger, _) = repository(&store);
        let ctx = Context::background();

        let no_table = Key::new().with_hash_key_name("UUID").with_hash_key("u1");
        let no_hash_name = Key::new().with_table_name("Users").with_hash_key("u1");
        let no_hash_value = Key::new()
            .with_table_name("Users")
            .with_hash_key_name("UUID");
        let cases = [
            (no_table, RepositoryError::InvalidTableName),
            (no_hash_name, RepositoryError::InvalidHashKeyName),
            (no_hash_value, RepositoryError::InvalidHashKeyValue),
        ];
        for (key, expected) in cases {
            let result = repository.get_item::<User>(&ctx, &key).await;
            assert_eq!(result, Err(expected));
        }

        assert_eq!(store.call_count(), 0);
        assert_eq!(logger.count(Severity::Error), 3);
    }

    #[tokio::test]
    async fn test_get_item_found() {
        let store = Arc::new(MockStore::default());
        store.push_get(Ok(Some(user_item("u1", "Alice", 2))));
        let (repository, _, _) = repository(&store);

        let user: Option<User> = repository
            .get_item(&Context::background(), &user_key())
            .await
            .unwrap();
        let user = user.unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(user.model.version, 2);
    }

    #[tokio::test]
    async fn test_get_item_not_found_is_not_an_error() {
        let store = Arc::new(MockStore::default());
        store.push_get(Ok(None));
        let (repository, logger, _) = repository(&store);

        let user: Option<User> = repository
            .get_item(&Context::background(), &user_key())
            .await
            .unwrap();
        assert!(user.is_none());
        assert_eq!(logger.count(Severity::Info), 1);
        assert_eq!(logger.count(Severity::Error), 0);
    }

    #[tokio::test]
    async fn test_get_item_surfaces_store_fault() {
        let store = Arc::new(MockStore::default());
        let fault = StoreError::Transport("connection reset".to_string());
        store.push_get(Err(fault.clone()));
        let (repository, logger, _) = repository(&store);

        let result = repository
            .get_item::<User>(&Context::background(), &user_key())
            .await;
        assert_eq!(result, Err(RepositoryError::Store(fault)));
        assert_eq!(logger.count(Severity::Error), 1);
    }

    #[tokio::test]
    async fn test_get_item_on_index_queries_one_item() {
        let store = Arc::new(MockStore::default());
        let (repository, _, _) = repository(&store);
        let key = user_key()
            .with_index_name("ByEmail")
            .with_range_key_name("Name")
            .with_range_key("Alice");

        let user = repository
            .get_item::<User>(&Context::background(), &key)
            .await
            .unwrap();
        assert!(user.is_none());
        assert!(store.last_get().is_none());

        let queries = store.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].index_name.as_deref(), Some("ByEmail"));
        assert_eq!(queries[0].limit, Some(1));
        let range = queries[0].key_condition.range.as_ref().unwrap();
        assert_eq!(range.op, RangeOperator::Equal);
    }

    #[tokio::test]
    async fn test_get_item_addresses_base_table() {
        let store = Arc::new(MockStore::default());
        let (repository, _, _) = repository(&store);

        let _ = repository
            .get_item::<User>(&Context::background(), &user_key())
            .await
            .unwrap();
        let request = store.last_get().unwrap();
        assert_eq!(request.table_name, "Users");
        assert_eq!(request.key, user_key().to_attribute_map());
    }

    #[tokio::test]
    async fn test_get_items_empty_is_not_found() {
        let store = Arc::new(MockStore::default());
        store.push_query(Ok(Page::default()));
        let (repository, _, _) = repository(&store);

        let users: Option<Vec<User>> = repository
            .get_items(&Context::background(), &user_key())
            .await
            .unwrap();
        assert!(users.is_none());
    }

    #[tokio::test]
    async fn test_get_items_follows_pages() {
        let store = Arc::new(MockStore::default());
        let token = user_key().to_attribute_map();
        store.push_query(Ok(Page {
            items: vec![user_item("u1", "Alice", 0)],
            last_evaluated_key: Some(token.clone()),
        }));
        store.push_query(Ok(Page {
            items: vec![user_item("u1", "Bob", 0)],
            last_evaluated_key: None,
        }));
        let (repository, _, _) = repository(&store);

        let users: Vec<User> = repository
            .get_items(&Context::background(), &user_key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(users.len(), 2);

        let requests = store.queries();
        assert_eq!(requests[1].exclusive_start_key, Some(token));
        assert!(requests[0].key_condition.range.is_none());
    }

    #[tokio::test]
    async fn test_query_stops_at_limit() {
        let store = Arc::new(MockStore::default());
        store.push_query(Ok(Page {
            items: vec![user_item("u1", "A", 0), user_item("u1", "B", 0)],
            last_evaluated_key: Some(AttributeMap::new()),
        }));
        let (repository, _, _) = repository(&store);

        let query = Query::new()
            .with_table_name("Users")
            .with_hash_key_name("UUID")
            .with_hash_key("u1")
            .with_range_key_name("Name")
            .with_range_key("A")
            .with_range_op(RangeOperator::GreaterOrEqual)
            .with_limit(2)
            .with_descending(true);
        let users: Vec<User> = repository
            .query(&Context::background(), &query)
            .await
            .unwrap();
        assert_eq!(users.len(), 2);

        let requests = store.queries();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].limit, Some(2));
        assert!(requests[0].descending);
        let range = requests[0].key_condition.range.as_ref().unwrap();
        assert_eq!(range.op, RangeOperator::GreaterOrEqual);
        assert_eq!(range.values, vec![AttributeValue::from("A")]);
    }

    #[tokio::test]
    async fn test_query_between_splits_bounds() {
        let store = Arc::new(MockStore::default());
        let (repository, _, _) = repository(&store);

        let query = Query::new()
            .with_table_name("Users")
            .with_hash_key_name("UUID")
            .with_hash_key("u1")
            .with_range_key_name("Age")
            .with_range_key(vec![18, 30])
            .with_range_op(RangeOperator::Between);
        let _: Vec<User> = repository
            .query(&Context::background(), &query)
            .await
            .unwrap();

        let range = store.queries()[0].key_condition.range.clone().unwrap();
        let bounds = vec![AttributeValue::from(18), AttributeValue::from(30)];
        assert_eq!(range.values, bounds);
    }

    #[tokio::test]
    async fn test_query_between_requires_two_bounds() {
        let store = Arc::new(MockStore::default());
        let (repository, _, _) = repository(&store);

        let query = Query::new()
            .with_table_name("Users")
            .with_hash_key_name("UUID")
            .with_hash_key("u1")
            .with_range_key_name("Age")
            .with_range_key(18)
            .with_range_op(RangeOperator::Between);
        let result = repository
            .query::<User>(&Context::background(), &query)
            .await;
        assert!(matches!(result, Err(RepositoryError::InvalidRangeValue { .. })));
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_save_item_publishes_metric() {
        let store = Arc::new(MockStore::default());
        let (repository, _, metrics) = repository(&store);
        let user = User::new("u1", "Alice");

        repository
            .save_item(&Context::background(), &user_key(), &user)
            .await
            .unwrap();

        let put = store.last_put().unwrap();
        assert_eq!(put.table_name, "Users");
        assert!(put.condition.is_none());
        assert_eq!(put.item.get("Name"), Some(&AttributeValue::from("Alice")));
        let expected = ("Users".to_string(), METRIC_ITEMS_SAVED.to_string(), 1.0);
        assert_eq!(metrics.entries(), vec![expected]);
    }

    #[tokio::test]
    async fn test_metrics_failure_does_not_fail_operation() {
        let store = Arc::new(MockStore::default());
        let logger = Arc::new(RecordingLogger::default());
        let repository = Repository::new(store.clone())
            .with_logger(logger.clone())
            .with_metrics(Arc::new(RecordingMetrics::failing()));

        let result = repository
            .delete_item(&Context::background(), &user_key())
            .await;
        assert_eq!(result, Ok(()));
        assert_eq!(logger.count(Severity::Error), 1);
    }

    #[tokio::test]
    async fn test_update_single_kind() {
        let store = Arc::new(MockStore::default());
        let (repository, _, metrics) = repository(&store);

        repository
            .update(
                &Context::background(),
                UpdateKind::Add,
                &user_key(),
                vec![("Logins", 1)],
            )
            .await
            .unwrap();

        let request = store.last_update().unwrap();
        assert!(matches!(request.directives[0], UpdateDirective::Add { .. }));
        assert!(!request.return_new);
        assert_eq!(metrics.entries()[0].1, METRIC_ITEMS_UPDATED);
    }

    #[tokio::test]
    async fn test_set_expr_with_scalar_makes_no_store_call() {
        let store = Arc::new(MockStore::default());
        let (repository, logger, _) = repository(&store);
        let updates = UpdateExpressions::new().set_expr("Score = Score + ?", 5);

        let result = repository
            .update_with_expressions(&Context::background(), &user_key(), &updates)
            .await;
        assert_eq!(result, Err(RepositoryError::InvalidSliceType));
        assert_eq!(store.call_count(), 0);
        assert_eq!(logger.count(Severity::Error), 1);
    }

    #[tokio::test]
    async fn test_update_and_return_value() {
        let store = Arc::new(MockStore::default());
        store.push_update(Ok(Some(user_item("u1", "Renamed", 4))));
        let (repository, _, _) = repository(&store);
        let updates = UpdateExpressions::new().set("Name", "Renamed");

        let user: User = repository
            .update_with_expressions_and_return_value(&Context::background(), &user_key(), &updates)
            .await
            .unwrap();
        assert_eq!(user.name, "Renamed");
        assert!(store.last_update().unwrap().return_new);
    }

    #[tokio::test]
    async fn test_update_and_return_value_without_item() {
        let store = Arc::new(MockStore::default());
        store.push_update(Ok(None));
        let (repository, _, metrics) = repository(&store);
        let updates = UpdateExpressions::new().set("Name", "Renamed");

        let result = repository
            .update_with_expressions_and_return_value::<User>(
                &Context::background(),
                &user_key(),
                &updates,
            )
            .await;
        assert_eq!(result, Err(RepositoryError::MissingReturnValue));
        assert!(metrics.entries().is_empty());
    }

    #[tokio::test]
    async fn test_delete_item_addresses_range_key() {
        let store = Arc::new(MockStore::default());
        let (repository, _, metrics) = repository(&store);
        let key = user_key().with_range_key_name("Sort").with_range_key("a");

        repository
            .delete_item(&Context::background(), &key)
            .await
            .unwrap();
        let request = store.last_delete().unwrap();
        assert_eq!(request.key, key.to_attribute_map());
        assert_eq!(metrics.entries()[0].1, METRIC_ITEMS_DELETED);
    }

    #[tokio::test]
    async fn test_scan_iterator_only_needs_table_name() {
        let store = Arc::new(MockStore::default());
        let (repository, _, _) = repository(&store);
        let ctx = Context::background();

        assert!(repository
            .scan_iterator::<User>(&ctx, &Key::new().with_table_name("Users"), 10)
            .is_ok());
        assert!(matches!(
            repository.scan_iterator::<User>(&ctx, &Key::new(), 10),
            Err(RepositoryError::InvalidTableName)
        ));
    }
}
