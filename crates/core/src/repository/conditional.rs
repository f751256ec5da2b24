//! Conditional writes and optimistic locking.
//!
//! A failed precondition is an expected outcome: it is logged at info and
//! reported as `false` (or `None`), never as an error. Only the store's
//! conditional-check classification counts as a failed precondition.

use crate::attribute::{AttributeValue, ItemCodec};
use crate::context::Context;
use crate::error::{RepositoryError, Result};
use crate::expression::Condition;
use crate::key::{validate_key, Key};
use crate::model::{Versioned, VERSION_ATTRIBUTE};
use crate::storage::{PutItemRequest, StoreResult};
use crate::telemetry::{Severity, METRIC_ITEMS_SAVED, METRIC_ITEMS_UPDATED};
use crate::update::{compile, UpdateExpressions};

use super::Repository;

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailedException";

impl Repository {
    /// Saves `item` only if the stored version still equals the item's version.
    ///
    /// The item's version is incremented and its timestamps refreshed before
    /// the write. These changes are kept even when the write is rejected.
    pub async fn optimistic_lock_save<T>(
        &self,
        ctx: &Context,
        key: &Key,
        item: &mut T,
    ) -> Result<bool>
    where
        T: ItemCodec + Versioned,
    {
        let table = key.table_name();
        self.check(ctx, table, validate_key(key))?;

        let current_version = item.version();
        let model = item.model_mut();
        model.increase_version();
        model.init_created_at();
        model.init_updated_at();

        let mut encoded = self.encode(ctx, table, &*item)?;
        item.model().encode_into(&mut encoded);

        let condition = Condition::version_matches(VERSION_ATTRIBUTE, current_version);
        let request = PutItemRequest {
            table_name: table.to_string(),
            item: encoded,
            condition: Some(condition),
        };
        let written = self
            .conditional(ctx, table, self.client.put_item(request))
            .await?;
        if written.is_some() {
            self.publish(ctx, table, METRIC_ITEMS_SAVED, 1.0).await;
        }
        Ok(written.is_some())
    }

    /// Replaces the item only if `expression` holds for the stored item.
    ///
    /// `args` bind to the `?` placeholders of `expression` in order.
    pub async fn conditional_update<T: ItemCodec>(
        &self,
        ctx: &Context,
        key: &Key,
        item: &T,
        expression: &str,
        args: Vec<AttributeValue>,
    ) -> Result<bool> {
        let table = key.table_name();
        self.check(ctx, table, validate_key(key))?;
        let condition = Condition::new(expression, args).map_err(RepositoryError::from);
        let condition = self.check(ctx, table, condition)?;

        let request = PutItemRequest {
            table_name: table.to_string(),
            item: self.encode(ctx, table, item)?,
            condition: Some(condition),
        };
        let written = self
            .conditional(ctx, table, self.client.put_item(request))
            .await?;
        if written.is_some() {
            self.publish(ctx, table, METRIC_ITEMS_UPDATED, 1.0).await;
        }
        Ok(written.is_some())
    }

    /// Applies field-level changes only if `expression` holds, returning
    /// the updated item. `Ok(None)` when the precondition failed.
    pub async fn conditional_update_with_expressions_and_return_value<T: ItemCodec>(
        &self,
        ctx: &Context,
        key: &Key,
        updates: &UpdateExpressions,
        expression: &str,
        args: Vec<AttributeValue>,
    ) -> Result<Option<T>> {
        let table = key.table_name();
        let mut request = self.check(ctx, table, compile(key, updates))?;
        let condition = Condition::new(expression, args).map_err(RepositoryError::from);
        let condition = self.check(ctx, table, condition)?;
        request.condition = Some(condition);
        request.return_new = true;

        let Some(updated) = self
            .conditional(ctx, table, self.client.update_item(request))
            .await?
        else {
            return Ok(None);
        };
        let Some(item) = updated else {
            return Err(self.logged(ctx, table, RepositoryError::MissingReturnValue));
        };
        let item = self.decode(ctx, table, item)?;
        self.publish(ctx, table, METRIC_ITEMS_UPDATED, 1.0).await;
        Ok(Some(item))
    }

    /// Runs a conditional store call. `Ok(None)` when the condition was false.
    async fn conditional<T, F>(&self, ctx: &Context, table: &str, call: F) -> Result<Option<T>>
    where
        F: std::future::Future<Output = StoreResult<T>>,
    {
        match ctx.run(call).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_conditional_check_failed() => {
                self.log(ctx, Severity::Info, table, CONDITIONAL_CHECK_FAILED);
                Ok(None)
            }
            Err(err) => Err(self.logged(ctx, table, err.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::mock::{user_item, MockStore, RecordingLogger, User};
    use super::*;
    use crate::expression::ExpressionError;
    use crate::model::Model;
    use crate::storage::{StoreError, UpdateDirective};

    fn user_key() -> Key {
        Key::new()
            .with_table_name("Users")
            .with_hash_key_name("UUID")
            .with_hash_key("u1")
    }

    fn conditional_failed() -> StoreError {
        StoreError::ConditionalCheckFailed("The conditional request failed".to_string())
    }

    #[tokio::test]
    async fn test_optimistic_lock_first_save() {
        let store = Arc::new(MockStore::default());
        let repository = Repository::new(store.clone());
        let mut user = User::new("u1", "Alice");

        let saved = repository
            .optimistic_lock_save(&Context::background(), &user_key(), &mut user)
            .await
            .unwrap();
        assert!(saved);
        assert_eq!(user.model.version, 1);
        assert!(user.model.created_at.is_some());
        assert!(user.model.updated_at.is_some());

        let put = store.last_put().unwrap();
        let version = put.item.get(VERSION_ATTRIBUTE);
        assert_eq!(version, Some(&AttributeValue::from(1u64)));
        let condition = put.condition.unwrap();
        let expected = "attribute_not_exists(Version) OR Version = ?";
        assert_eq!(condition.expression(), expected);
        assert_eq!(condition.args(), &[AttributeValue::from(0u64)]);
    }

    #[tokio::test]
    async fn test_optimistic_lock_rejected_keeps_local_mutation() {
        let store = Arc::new(MockStore::default());
        store.push_put(Err(conditional_failed()));
        let logger = Arc::new(RecordingLogger::default());
        let repository = Repository::new(store.clone()).with_logger(logger.clone());
        let mut user = User::new("u1", "Alice");
        user.model = Model {
            version: 3,
            ..Model::default()
        };

        let saved = repository
            .optimistic_lock_save(&Context::background(), &user_key(), &mut user)
            .await
            .unwrap();
        assert!(!saved);
        assert_eq!(user.model.version, 4);
        assert_eq!(logger.count(Severity::Info), 1);
        assert_eq!(logger.count(Severity::Error), 0);
    }

    #[tokio::test]
    async fn test_optimistic_lock_store_fault() {
        let store = Arc::new(MockStore::default());
        let fault = StoreError::Throughput("slow down".to_string());
        store.push_put(Err(fault.clone()));
        let repository = Repository::new(store.clone());
        let mut user = User::new("u1", "Alice");

        let result = repository
            .optimistic_lock_save(&Context::background(), &user_key(), &mut user)
            .await;
        assert_eq!(result, Err(RepositoryError::Store(fault)));
    }

    #[tokio::test]
    async fn test_conditional_update_tri_state() {
        let store = Arc::new(MockStore::default());
        store.push_put(Ok(()));
        store.push_put(Err(conditional_failed()));
        store.push_put(Err(StoreError::Transport("broken pipe".to_string())));
        let repository = Repository::new(store.clone());
        let ctx = Context::background();
        let user = User::new("u1", "Alice");

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            outcomes.push(
                repository
                    .conditional_update(&ctx, &user_key(), &user, "Name = ?", vec!["old".into()])
                    .await,
            );
        }

        assert_eq!(outcomes[0], Ok(true));
        assert_eq!(outcomes[1], Ok(false));
        assert!(matches!(
            outcomes[2],
            Err(RepositoryError::Store(StoreError::Transport(_)))
        ));
        let condition = store.last_put().unwrap().condition.unwrap();
        assert_eq!(condition.args(), &[AttributeValue::from("old")]);
    }

    #[tokio::test]
    async fn test_conditional_update_rejects_bad_expression() {
        let store = Arc::new(MockStore::default());
        let repository = Repository::new(store.clone());
        let user = User::new("u1", "Alice");

        let ctx = Context::background();
        let result = repository
            .conditional_update(&ctx, &user_key(), &user, "Name = ?", vec![])
            .await;
        assert_eq!(
            result,
            Err(RepositoryError::Expression(ExpressionError::ArgumentCount {
                placeholders: 1,
                args: 0
            }))
        );
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_conditional_update_with_expressions_returns_item() {
        let store = Arc::new(MockStore::default());
        store.push_update(Ok(Some(user_item("u1", "Bob", 1))));
        let repository = Repository::new(store.clone());
        let updates = UpdateExpressions::new().set("Name", "Bob");

        let user: Option<User> = repository
            .conditional_update_with_expressions_and_return_value(
                &Context::background(),
                &user_key(),
                &updates,
                "attribute_exists(UUID)",
                vec![],
            )
            .await
            .unwrap();
        assert_eq!(user.unwrap().name, "Bob");

        let request = store.last_update().unwrap();
        assert!(request.return_new);
        assert!(request.condition.is_some());
        assert!(matches!(request.directives[0], UpdateDirective::Set { .. }));
    }

    #[tokio::test]
    async fn test_conditional_update_with_expressions_precondition_failed() {
        let store = Arc::new(MockStore::default());
        store.push_update(Err(conditional_failed()));
        let repository = Repository::new(store.clone());
        let updates = UpdateExpressions::new().add("Stock", -1);

        let user: Option<User> = repository
            .conditional_update_with_expressions_and_return_value(
                &Context::background(),
                &user_key(),
                &updates,
                "Stock > ?",
                vec![0.into()],
            )
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
