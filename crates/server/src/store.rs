//! Persistence for users and subscriptions.
//!
//! `get_or_create_*` rely on the unique indexes on `alert_user.email` and
//! `subscription(user_id, query)`: when an insert loses a race the winning row
//! is re-read, so concurrent confirmations never produce duplicates.

use crate::entity::{subscription, user};
use crate::query::{self, InvalidQuery};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, SqlErr,
};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] InvalidQuery),
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[derive(Clone)]
pub struct SubscriptionStore {
    db: Arc<DatabaseConnection>,
}

impl SubscriptionStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<user::Model>, DbErr> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(self.db.as_ref())
            .await
    }

    /// Returns the user for `email`, creating it on first use. The flag is
    /// `true` when a row was inserted.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_create_user(&self, email: &str) -> Result<(user::Model, bool), DbErr> {
        if let Some(user) = self.find_user_by_email(email).await? {
            return Ok((user, false));
        }

        let new_user = user::ActiveModel {
            email: Set(email.trim().to_lowercase()),
            created_at: Set(OffsetDateTime::now_utc()),
            ..Default::default()
        };
        match new_user.insert(self.db.as_ref()).await {
            Ok(user) => Ok((user, true)),
            Err(e) if is_unique_violation(&e) => {
                tracing::debug!(
                    name = "store.get_or_create_user.lost_race",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    message = "Concurrent insert won; re-reading user"
                );
                self.find_user_by_email(email)
                    .await?
                    .map(|u| (u, false))
                    .ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn find_by_query(
        &self,
        user_id: i32,
        query: &str,
    ) -> Result<Option<subscription::Model>, DbErr> {
        subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .filter(subscription::Column::Query.eq(query))
            .one(self.db.as_ref())
            .await
    }

    /// Returns the subscription of `user` for `query`, creating an active one
    /// if none exists. An existing subscription is returned untouched, even
    /// when inactive.
    #[tracing::instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn get_or_create_by_query(
        &self,
        query: &str,
        user: &user::Model,
    ) -> Result<(subscription::Model, bool), StoreError> {
        let normalized = query::normalize(query)?;
        if let Some(existing) = self.find_by_query(user.id, &normalized).await? {
            return Ok((existing, false));
        }

        let topic = query::topic_label(&normalized)?;
        let new_subscription = subscription::ActiveModel {
            user_id: Set(user.id),
            query: Set(normalized.clone()),
            topic: Set(topic),
            active: Set(true),
            created_at: Set(OffsetDateTime::now_utc()),
            ..Default::default()
        };
        match new_subscription.insert(self.db.as_ref()).await {
            Ok(created) => {
                tracing::info!(
                    subscription_id = created.id,
                    user_id = user.id,
                    "Created subscription"
                );
                Ok((created, true))
            }
            Err(e) if is_unique_violation(&e) => {
                let existing = self.find_by_query(user.id, &normalized).await?;
                Ok((existing.ok_or(e)?, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_subscription(&self, id: i32) -> Result<Option<subscription::Model>, DbErr> {
        subscription::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
    }

    /// Loads a subscription together with the user owning it.
    pub async fn find_subscription_with_owner(
        &self,
        id: i32,
    ) -> Result<Option<(subscription::Model, user::Model)>, DbErr> {
        let found = subscription::Entity::find_by_id(id)
            .find_also_related(user::Entity)
            .one(self.db.as_ref())
            .await?;
        Ok(found.and_then(|(sub, owner)| owner.map(|o| (sub, o))))
    }

    /// Sets the active flag, skipping the write when nothing changes.
    pub async fn set_active(
        &self,
        subscription: subscription::Model,
        active: bool,
    ) -> Result<subscription::Model, DbErr> {
        if subscription.active == active {
            return Ok(subscription);
        }
        let mut model: subscription::ActiveModel = subscription.into();
        model.active = Set(active);
        model.update(self.db.as_ref()).await
    }

    pub async fn delete_subscription(&self, subscription: subscription::Model) -> Result<(), DbErr> {
        subscription.delete(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<subscription::Model>, DbErr> {
        subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .order_by_asc(subscription::Column::CreatedAt)
            .order_by_asc(subscription::Column::Id)
            .all(self.db.as_ref())
            .await
    }
}
