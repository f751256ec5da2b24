//! Scripted store, logger and metrics doubles for repository tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::attribute::{get_string, AttributeMap, AttributeValue, CodecError, ItemCodec};
use crate::context::Context;
use crate::model::{Model, Versioned};
use crate::storage::{
    BatchGetRequest, BatchWriteRequest, DeleteItemRequest, GetItemRequest, Page, PutItemRequest,
    QueryRequest, ScanRequest, StoreClient, StoreResult, UpdateItemRequest,
};
use crate::telemetry::{Logger, MetricsError, MetricsPublisher, Severity};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct User {
    pub uuid: String,
    pub name: String,
    pub model: Model,
}

impl User {
    pub fn new(uuid: &str, name: &str) -> Self {
        Self {
            uuid: uuid.to_string(),
            name: name.to_string(),
            model: Model::default(),
        }
    }
}

impl ItemCodec for User {
    fn encode(&self) -> Result<AttributeMap, CodecError> {
        let mut item = AttributeMap::new();
        item.insert("UUID".to_string(), self.uuid.as_str().into());
        item.insert("Name".to_string(), self.name.as_str().into());
        self.model.encode_into(&mut item);
        Ok(item)
    }

    fn decode(item: AttributeMap) -> Result<Self, CodecError> {
        Ok(Self {
            uuid: get_string(&item, "UUID")?,
            name: get_string(&item, "Name")?,
            model: Model::decode_from(&item)?,
        })
    }
}

impl Versioned for User {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }
}

pub(crate) fn user_item(uuid: &str, name: &str, version: u64) -> AttributeMap {
    let mut item = AttributeMap::new();
    item.insert("UUID".to_string(), uuid.into());
    item.insert("Name".to_string(), name.into());
    item.insert("Version".to_string(), AttributeValue::from(version));
    item
}

#[derive(Debug, Clone)]
pub(crate) enum Call {
    GetItem(GetItemRequest),
    PutItem(PutItemRequest),
    UpdateItem(UpdateItemRequest),
    DeleteItem(DeleteItemRequest),
    Query(QueryRequest),
    Scan(ScanRequest),
    BatchWrite(BatchWriteRequest),
    BatchGet(BatchGetRequest),
}

/// Records every request and answers from per-operation queues.
///
/// An empty queue answers with success: no item, an empty page, or every
/// batch entry processed.
#[derive(Default)]
pub(crate) struct MockStore {
    calls: Mutex<Vec<Call>>,
    gets: Mutex<VecDeque<StoreResult<Option<AttributeMap>>>>,
    puts: Mutex<VecDeque<StoreResult<()>>>,
    updates: Mutex<VecDeque<StoreResult<Option<AttributeMap>>>>,
    deletes: Mutex<VecDeque<StoreResult<()>>>,
    query_pages: Mutex<VecDeque<StoreResult<Page>>>,
    scan_pages: Mutex<VecDeque<StoreResult<Page>>>,
    batch_writes: Mutex<VecDeque<StoreResult<usize>>>,
    batch_gets: Mutex<VecDeque<StoreResult<Vec<AttributeMap>>>>,
}

impl MockStore {
    pub fn push_get(&self, response: StoreResult<Option<AttributeMap>>) {
        self.gets.lock().unwrap().push_back(response);
    }

    pub fn push_put(&self, response: StoreResult<()>) {
        self.puts.lock().unwrap().push_back(response);
    }

    pub fn push_update(&self, response: StoreResult<Option<AttributeMap>>) {
        self.updates.lock().unwrap().push_back(response);
    }

    pub fn push_query(&self, response: StoreResult<Page>) {
        self.query_pages.lock().unwrap().push_back(response);
    }

    pub fn push_scan(&self, response: StoreResult<Page>) {
        self.scan_pages.lock().unwrap().push_back(response);
    }

    pub fn push_batch_write(&self, response: StoreResult<usize>) {
        self.batch_writes.lock().unwrap().push_back(response);
    }

    pub fn push_batch_get(&self, response: StoreResult<Vec<AttributeMap>>) {
        self.batch_gets.lock().unwrap().push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_get(&self) -> Option<GetItemRequest> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::GetItem(request) => Some(request),
            _ => None,
        })
    }

    pub fn last_put(&self) -> Option<PutItemRequest> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::PutItem(request) => Some(request),
            _ => None,
        })
    }

    pub fn last_update(&self) -> Option<UpdateItemRequest> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::UpdateItem(request) => Some(request),
            _ => None,
        })
    }

    pub fn last_delete(&self) -> Option<DeleteItemRequest> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::DeleteItem(request) => Some(request),
            _ => None,
        })
    }

    pub fn queries(&self) -> Vec<QueryRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Query(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn scans(&self) -> Vec<ScanRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Scan(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn batch_writes(&self) -> Vec<BatchWriteRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::BatchWrite(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn batch_gets(&self) -> Vec<BatchGetRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::BatchGet(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn next<T>(queue: &Mutex<VecDeque<StoreResult<T>>>, default: T) -> StoreResult<T> {
    queue.lock().unwrap().pop_front().unwrap_or(Ok(default))
}

#[async_trait]
impl StoreClient for MockStore {
    async fn get_item(&self, request: GetItemRequest) -> StoreResult<Option<AttributeMap>> {
        self.record(Call::GetItem(request));
        next(&self.gets, None)
    }

    async fn put_item(&self, request: PutItemRequest) -> StoreResult<()> {
        self.record(Call::PutItem(request));
        next(&self.puts, ())
    }

    async fn update_item(&self, request: UpdateItemRequest) -> StoreResult<Option<AttributeMap>> {
        self.record(Call::UpdateItem(request));
        next(&self.updates, None)
    }

    async fn delete_item(&self, request: DeleteItemRequest) -> StoreResult<()> {
        self.record(Call::DeleteItem(request));
        next(&self.deletes, ())
    }

    async fn query(&self, request: QueryRequest) -> StoreResult<Page> {
        self.record(Call::Query(request));
        next(&self.query_pages, Page::default())
    }

    async fn scan(&self, request: ScanRequest) -> StoreResult<Page> {
        self.record(Call::Scan(request));
        next(&self.scan_pages, Page::default())
    }

    async fn batch_write(&self, request: BatchWriteRequest) -> StoreResult<usize> {
        let processed = request.len();
        self.record(Call::BatchWrite(request));
        next(&self.batch_writes, processed)
    }

    async fn batch_get(&self, request: BatchGetRequest) -> StoreResult<Vec<AttributeMap>> {
        self.record(Call::BatchGet(request));
        next(&self.batch_gets, Vec::new())
    }
}

#[derive(Default)]
pub(crate) struct RecordingLogger {
    entries: Mutex<Vec<(Severity, String, String)>>,
}

impl RecordingLogger {
    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _, _)| *s == severity)
            .count()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, _ctx: &Context, severity: Severity, table: &str, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((severity, table.to_string(), message.to_string()));
    }
}

#[derive(Default)]
pub(crate) struct RecordingMetrics {
    entries: Mutex<Vec<(String, String, f64)>>,
    fail: bool,
}

impl RecordingMetrics {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> Vec<(String, String, f64)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsPublisher for RecordingMetrics {
    async fn publish(
        &self,
        _ctx: &Context,
        table: &str,
        metric_name: &str,
        value: f64,
    ) -> Result<(), MetricsError> {
        if self.fail {
            return Err(MetricsError("sink unavailable".to_string()));
        }
        self.entries
            .lock()
            .unwrap()
            .push((table.to_string(), metric_name.to_string(), value));
        Ok(())
    }
}
