use crate::attribute::ItemCodec;
use crate::context::Context;
use crate::error::Result;
use crate::key::{Key, Query};

use super::Repository;

/// Reads routed through a global secondary index.
///
/// Keys passed in name the index's own hash and range keys; the index name
/// is filled in by the view.
#[derive(Clone)]
pub struct GlobalIndex {
    repository: Repository,
    name: String,
}

impl GlobalIndex {
    pub(crate) fn new(repository: Repository, name: impl Into<String>) -> Self {
        Self {
            repository,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The first item matching the key on the index. `Ok(None)` when none match.
    pub async fn get_item<T: ItemCodec>(&self, ctx: &Context, key: &Key) -> Result<Option<T>> {
        self.repository.get_item(ctx, &self.route(key)).await
    }

    /// Every item sharing the key's hash key on the index.
    pub async fn get_items<T: ItemCodec>(
        &self,
        ctx: &Context,
        key: &Key,
    ) -> Result<Option<Vec<T>>> {
        self.repository.get_items(ctx, &self.route(key)).await
    }

    /// Items matching both the hash key and, by equality, the range key.
    pub async fn get_items_with_range<T: ItemCodec>(
        &self,
        ctx: &Context,
        key: &Key,
    ) -> Result<Option<Vec<T>>> {
        let items: Vec<T> = self
            .repository
            .query(ctx, &Query::from(self.route(key)))
            .await?;
        Ok((!items.is_empty()).then_some(items))
    }

    pub async fn query<T: ItemCodec>(&self, ctx: &Context, query: &Query) -> Result<Vec<T>> {
        let query = query.clone().with_index_name(self.name.clone());
        self.repository.query(ctx, &query).await
    }

    fn route(&self, key: &Key) -> Key {
        key.clone().with_index_name(self.name.clone())
    }
}
