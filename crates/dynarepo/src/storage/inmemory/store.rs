//! In-memory store implementation.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use dynarepo_core::storage::{
    BatchGetRequest, BatchWriteRequest, DeleteItemRequest, GetItemRequest, Page, PutItemRequest,
    QueryRequest, ScanRequest, StoreClient, StoreError, StoreResult, UpdateItemRequest,
};
use dynarepo_core::{AttributeMap, AttributeValue};

use super::evaluator::{apply_updates, matches, matches_key};

const CONDITIONAL_CHECK_FAILED: &str = "The conditional request failed";

/// Hash and optional range key attribute names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub hash_key: String,
    pub range_key: Option<String>,
}

impl KeySchema {
    pub fn new(hash_key: impl Into<String>, range_key: Option<&str>) -> Self {
        Self {
            hash_key: hash_key.into(),
            range_key: range_key.map(str::to_string),
        }
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.hash_key.as_str()).chain(self.range_key.as_deref())
    }

    /// Copy this schema's key attributes out of an item. `None` if one is absent.
    fn extract(&self, item: &AttributeMap) -> Option<AttributeMap> {
        self.names()
            .map(|name| Some((name.to_string(), item.get(name)?.clone())))
            .collect()
    }
}

/// A table definition: primary key plus named secondary indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub key: KeySchema,
    pub indexes: HashMap<String, KeySchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, hash_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: KeySchema::new(hash_key, None),
            indexes: HashMap::new(),
        }
    }

    pub fn with_range_key(mut self, range_key: impl Into<String>) -> Self {
        self.key.range_key = Some(range_key.into());
        self
    }

    pub fn with_index(
        mut self,
        name: impl Into<String>,
        hash_key: impl Into<String>,
        range_key: Option<&str>,
    ) -> Self {
        self.indexes
            .insert(name.into(), KeySchema::new(hash_key, range_key));
        self
    }
}

/// Ordered identity of an item within a table.
type PrimaryKey = (String, String);

#[derive(Debug)]
struct Table {
    schema: TableSchema,
    items: BTreeMap<PrimaryKey, AttributeMap>,
}

impl Table {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            items: BTreeMap::new(),
        }
    }

    /// Primary key of an item or key map, validated against the schema.
    fn primary_key(&self, item: &AttributeMap) -> StoreResult<PrimaryKey> {
        let key = &self.schema.key;
        let hash = key_part(item, &key.hash_key)?;
        let range = match &key.range_key {
            Some(name) => key_part(item, name)?,
            None => String::new(),
        };
        Ok((hash, range))
    }

    fn key_schema(&self, index_name: Option<&str>) -> StoreResult<&KeySchema> {
        match index_name {
            None => Ok(&self.schema.key),
            Some(name) => self.schema.indexes.get(name).ok_or_else(|| {
                StoreError::Validation(format!(
                    "The table does not have the specified index: {name}"
                ))
            }),
        }
    }

    /// Key attributes identifying an item in a page, including index keys.
    fn last_key(&self, item: &AttributeMap, index: &KeySchema) -> AttributeMap {
        let mut key = self.schema.key.extract(item).unwrap_or_default();
        key.extend(index.extract(item).unwrap_or_default());
        key
    }
}

/// Encode a key attribute so that equal store values produce equal strings.
fn key_part(item: &AttributeMap, name: &str) -> StoreResult<String> {
    match item.get(name) {
        Some(AttributeValue::S(s)) => Ok(format!("S{s}")),
        Some(AttributeValue::N(n)) => canonical_number(n)
            .map(|n| format!("N{n}"))
            .ok_or_else(|| StoreError::Validation(format!("Invalid number for key {name}"))),
        Some(AttributeValue::B(b)) => {
            let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
            Ok(format!("B{hex}"))
        }
        Some(other) => Err(StoreError::Validation(format!(
            "Key attribute {name} has unsupported type {}",
            other.type_name()
        ))),
        None => Err(StoreError::Validation(format!(
            "One of the required keys was not given a value: {name}"
        ))),
    }
}

/// Exact canonical form of a decimal number, as significant digits and a
/// power-of-ten exponent, so `1`, `1.0` and `10E-1` produce the same string.
fn canonical_number(n: &str) -> Option<String> {
    let (negative, unsigned) = match n.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, n.strip_prefix('+').unwrap_or(n)),
    };
    let (mantissa, exponent) = match unsigned.find(|c| c == 'e' || c == 'E') {
        Some(at) => (&unsigned[..at], unsigned[at + 1..].parse::<i64>().ok()?),
        None => (unsigned, 0),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{int}{frac}");
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let leading = digits.trim_start_matches('0');
    if leading.is_empty() {
        return Some("0".to_string());
    }
    let significant = leading.trim_end_matches('0');
    let exponent = exponent - frac.len() as i64 + (leading.len() - significant.len()) as i64;
    let sign = if negative { "-" } else { "" };
    Some(format!("{sign}{significant}e{exponent}"))
}

fn range_order(a: &AttributeMap, b: &AttributeMap, range_key: Option<&str>) -> std::cmp::Ordering {
    let Some(name) = range_key else {
        return std::cmp::Ordering::Equal;
    };
    match (a.get(name), b.get(name)) {
        (Some(a), Some(b)) => a.compare(b).unwrap_or(std::cmp::Ordering::Equal),
        _ => std::cmp::Ordering::Equal,
    }
}

/// In-memory store for tests and local development.
///
/// Uses a map of tables wrapped in `Arc<RwLock<_>>` for thread-safe access.
/// Data is not persisted and will be lost when the store is dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl InMemoryStore {
    /// Creates a store with the given tables.
    pub fn with_tables(schemas: impl IntoIterator<Item = TableSchema>) -> Self {
        let tables = schemas
            .into_iter()
            .map(|schema| (schema.name.clone(), Table::new(schema)))
            .collect();
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    /// Creates a table, replacing any existing table of the same name.
    pub async fn create_table(&self, schema: TableSchema) {
        let mut tables = self.tables.write().await;
        tables.insert(schema.name.clone(), Table::new(schema));
    }

    /// Number of items stored in a table.
    pub async fn item_count(&self, table_name: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table_name).map_or(0, |table| table.items.len())
    }
}

fn not_found(table_name: &str) -> StoreError {
    StoreError::ResourceNotFound(format!(
        "Requested resource not found: Table: {table_name} not found"
    ))
}

fn table<'a>(tables: &'a HashMap<String, Table>, name: &str) -> StoreResult<&'a Table> {
    tables.get(name).ok_or_else(|| not_found(name))
}

fn table_mut<'a>(tables: &'a mut HashMap<String, Table>, name: &str) -> StoreResult<&'a mut Table> {
    tables.get_mut(name).ok_or_else(|| not_found(name))
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn get_item(&self, request: GetItemRequest) -> StoreResult<Option<AttributeMap>> {
        let tables = self.tables.read().await;
        let table = table(&tables, &request.table_name)?;
        let key = table.primary_key(&request.key)?;
        Ok(table.items.get(&key).cloned())
    }

    async fn put_item(&self, request: PutItemRequest) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let table = table_mut(&mut tables, &request.table_name)?;
        let key = table.primary_key(&request.item)?;

        let empty = AttributeMap::new();
        let existing = table.items.get(&key).unwrap_or(&empty);
        if !matches(existing, request.condition.as_ref()) {
            return Err(StoreError::ConditionalCheckFailed(
                CONDITIONAL_CHECK_FAILED.to_string(),
            ));
        }

        table.items.insert(key, request.item);
        Ok(())
    }

    async fn update_item(&self, request: UpdateItemRequest) -> StoreResult<Option<AttributeMap>> {
        let mut tables = self.tables.write().await;
        let table = table_mut(&mut tables, &request.table_name)?;
        let key = table.primary_key(&request.key)?;

        for directive in &request.directives {
            let path = directive.path();
            if table.schema.key.names().any(|name| path.segments() == [name]) {
                return Err(StoreError::Validation(format!(
                    "Cannot update attribute {path}. This attribute is part of the key"
                )));
            }
        }

        let current = table.items.get(&key).cloned();
        if !matches(
            current.as_ref().unwrap_or(&AttributeMap::new()),
            request.condition.as_ref(),
        ) {
            return Err(StoreError::ConditionalCheckFailed(
                CONDITIONAL_CHECK_FAILED.to_string(),
            ));
        }

        let mut item = current.unwrap_or_else(|| request.key.clone());
        apply_updates(&mut item, &request.directives)?;
        table.items.insert(key, item.clone());

        Ok(request.return_new.then_some(item))
    }

    async fn delete_item(&self, request: DeleteItemRequest) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let table = table_mut(&mut tables, &request.table_name)?;
        let key = table.primary_key(&request.key)?;
        table.items.remove(&key);
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> StoreResult<Page> {
        let tables = self.tables.read().await;
        let table = table(&tables, &request.table_name)?;
        let schema = table.key_schema(request.index_name.as_deref())?;

        let mut candidates: Vec<&AttributeMap> = table
            .items
            .values()
            .filter(|item| schema.extract(item).is_some())
            .filter(|item| matches_key(item, &request.key_condition))
            .collect();
        candidates.sort_by(|a, b| range_order(a, b, schema.range_key.as_deref()));
        if request.descending {
            candidates.reverse();
        }

        let start = match &request.exclusive_start_key {
            Some(start) => {
                let start = table.primary_key(start)?;
                candidates
                    .iter()
                    .position(|item| table.primary_key(item).ok().as_ref() == Some(&start))
                    .map_or(candidates.len(), |position| position + 1)
            }
            None => 0,
        };

        let remaining = &candidates[start..];
        let available = remaining.len();
        let take = request.limit.unwrap_or(available).min(available);
        let items: Vec<AttributeMap> = remaining[..take].iter().copied().cloned().collect();
        let last_evaluated_key = (take < available)
            .then(|| items.last().map(|item| table.last_key(item, schema)))
            .flatten();

        Ok(Page {
            items,
            last_evaluated_key,
        })
    }

    async fn scan(&self, request: ScanRequest) -> StoreResult<Page> {
        let tables = self.tables.read().await;
        let table = table(&tables, &request.table_name)?;

        let lower = match &request.exclusive_start_key {
            Some(start) => Bound::Excluded(table.primary_key(start)?),
            None => Bound::Unbounded,
        };
        let limit = request.limit.unwrap_or(usize::MAX);

        // The limit applies to items examined, before the filter.
        let mut examined = table.items.range((lower, Bound::Unbounded)).peekable();
        let mut items = Vec::new();
        let mut last_examined = None;
        let mut count = 0;
        while count < limit {
            let Some((_, item)) = examined.next() else {
                break;
            };
            count += 1;
            last_examined = Some(item);
            if matches(item, request.filter.as_ref()) {
                items.push(item.clone());
            }
        }

        let last_evaluated_key = match (examined.peek(), last_examined) {
            (Some(_), Some(item)) => Some(table.last_key(item, &table.schema.key)),
            _ => None,
        };

        Ok(Page {
            items,
            last_evaluated_key,
        })
    }

    async fn batch_write(&self, request: BatchWriteRequest) -> StoreResult<usize> {
        let mut tables = self.tables.write().await;
        let table = table_mut(&mut tables, &request.table_name)?;

        let puts = request
            .puts
            .iter()
            .map(|item| Ok((table.primary_key(item)?, item.clone())))
            .collect::<StoreResult<Vec<_>>>()?;
        let deletes = request
            .deletes
            .iter()
            .map(|key| table.primary_key(key))
            .collect::<StoreResult<Vec<_>>>()?;

        let processed = puts.len() + deletes.len();
        table.items.extend(puts);
        for key in deletes {
            table.items.remove(&key);
        }
        Ok(processed)
    }

    async fn batch_get(&self, request: BatchGetRequest) -> StoreResult<Vec<AttributeMap>> {
        let tables = self.tables.read().await;
        let table = table(&tables, &request.table_name)?;

        let mut items = Vec::new();
        for key in &request.keys {
            if let Some(item) = table.items.get(&table.primary_key(key)?) {
                items.push(item.clone());
            }
        }
        Ok(items)
    }
}
