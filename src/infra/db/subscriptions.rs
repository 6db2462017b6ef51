use async_trait::async_trait;

use crate::application::repos::{RepoError, SubscriptionsRepo};
use crate::domain::ids::UserId;

use super::{PostgresRepositories, map_sqlx_error};

fn into_user_ids(raw: Vec<String>) -> Result<Vec<UserId>, RepoError> {
    raw.into_iter()
        .map(|id| UserId::new(id).map_err(RepoError::from_persistence))
        .collect()
}

#[async_trait]
impl SubscriptionsRepo for PostgresRepositories {
    async fn subscribe(&self, subscriber: &UserId, target: &UserId) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO subscriptions (subscriber_id, target_id) VALUES ($1, $2) \
             ON CONFLICT (subscriber_id, target_id) DO NOTHING",
        )
        .bind(subscriber.as_str())
        .bind(target.as_str())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_subscriptions(&self, user: &UserId) -> Result<Vec<UserId>, RepoError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT target_id FROM subscriptions WHERE subscriber_id = $1 ORDER BY target_id",
        )
        .bind(user.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        into_user_ids(rows)
    }

    async fn list_subscribers(&self, user: &UserId) -> Result<Vec<UserId>, RepoError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT subscriber_id FROM subscriptions WHERE target_id = $1 ORDER BY subscriber_id",
        )
        .bind(user.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        into_user_ids(rows)
    }
}
