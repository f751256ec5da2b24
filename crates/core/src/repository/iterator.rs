use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use futures_util::Stream;

use crate::attribute::{AttributeMap, ItemCodec};
use crate::context::Context;
use crate::error::{RepositoryError, Result};
use crate::expression::Condition;
use crate::storage::{ScanRequest, StoreClient};
use crate::telemetry::{Logger, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No page fetched yet.
    Start,
    Active,
    Exhausted,
}

/// Cursor over a full-table scan that resumes from the store's
/// continuation token, one page at a time.
///
/// A failed page fetch leaves the cursor where it was, so the next call
/// retries the same page. A row that fails to decode stays at the head of
/// the buffer and is reported again on the next call.
pub struct ScanIterator<T> {
    client: Arc<dyn StoreClient>,
    logger: Arc<dyn Logger>,
    ctx: Context,
    table_name: String,
    page_size: Option<usize>,
    filter: Option<Condition>,
    buffer: VecDeque<AttributeMap>,
    last_evaluated_key: Option<AttributeMap>,
    state: State,
    _item: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for ScanIterator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanIterator")
            .field("table_name", &self.table_name)
            .field("page_size", &self.page_size)
            .field("buffered", &self.buffer.len())
            .field("state", &self.state)
            .finish()
    }
}

impl<T: ItemCodec> ScanIterator<T> {
    pub(crate) fn new(
        client: Arc<dyn StoreClient>,
        logger: Arc<dyn Logger>,
        ctx: Context,
        table_name: &str,
        page_size: Option<usize>,
    ) -> Self {
        Self {
            client,
            logger,
            ctx,
            table_name: table_name.to_string(),
            page_size,
            filter: None,
            buffer: VecDeque::new(),
            last_evaluated_key: None,
            state: State::Start,
            _item: PhantomData,
        }
    }

    /// Only items matching `filter` are returned. Pages are still read in full.
    pub fn with_filter(mut self, filter: Condition) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    /// The next item, or `Ok(None)` once the scan has no more pages.
    pub async fn next_item(&mut self) -> Result<Option<T>> {
        loop {
            if let Some(item) = self.buffer.front() {
                let decoded = T::decode(item.clone()).map_err(|err| self.fail(err.into()))?;
                self.buffer.pop_front();
                return Ok(Some(decoded));
            }

            let start_key = match self.state {
                State::Exhausted => return Ok(None),
                State::Start => None,
                State::Active => match self.last_evaluated_key.clone() {
                    Some(token) => Some(token),
                    None => {
                        self.state = State::Exhausted;
                        return Ok(None);
                    }
                },
            };
            self.fetch(start_key).await?;
        }
    }

    /// Adapts the cursor into a stream that ends after the first error.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<T>> {
        async_stream::try_stream! {
            while let Some(item) = self.next_item().await? {
                yield item;
            }
        }
    }

    async fn fetch(&mut self, exclusive_start_key: Option<AttributeMap>) -> Result<()> {
        let request = ScanRequest {
            table_name: self.table_name.clone(),
            limit: self.page_size,
            filter: self.filter.clone(),
            exclusive_start_key,
        };
        let page = self
            .ctx
            .run(self.client.scan(request))
            .await
            .map_err(|err| self.fail(err.into()))?;

        self.buffer.extend(page.items);
        self.last_evaluated_key = page.last_evaluated_key;
        self.state = State::Active;
        Ok(())
    }

    fn fail(&self, err: RepositoryError) -> RepositoryError {
        let message = err.to_string();
        self.logger
            .log(&self.ctx, Severity::Error, &self.table_name, &message);
        err
    }
}
