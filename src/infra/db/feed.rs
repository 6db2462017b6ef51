use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::pagination::{CursorPage, PageRequest, paginate};
use crate::application::repos::{FeedRepo, RepoError};
use crate::domain::entities::{FeedItem, Post};
use crate::domain::ids::{PostId, UserId};

use super::{PostgresRepositories, map_sqlx_error};

const FEED_COLUMNS: &str = "user_id, post_id, author_id, text, created_at";

#[derive(sqlx::FromRow)]
struct FeedItemRow {
    user_id: String,
    post_id: Vec<u8>,
    author_id: String,
    text: String,
    created_at: OffsetDateTime,
}

impl TryFrom<FeedItemRow> for FeedItem {
    type Error = RepoError;

    fn try_from(row: FeedItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId::new(row.user_id).map_err(RepoError::from_persistence)?,
            post_id: PostId::from_slice(&row.post_id).map_err(RepoError::from_persistence)?,
            author_id: UserId::new(row.author_id).map_err(RepoError::from_persistence)?,
            text: row.text,
            created_at: row.created_at,
        })
    }
}

impl PostgresRepositories {
    async fn fetch_feed_window(
        &self,
        user: &UserId,
        anchor: Option<PostId>,
        limit: usize,
    ) -> Result<Vec<FeedItem>, RepoError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match anchor {
            Some(anchor) => {
                let sql = format!(
                    "SELECT {FEED_COLUMNS} FROM feed_items \
                     WHERE user_id = $1 AND post_id <= $2 \
                     ORDER BY post_id DESC LIMIT $3"
                );
                sqlx::query_as::<_, FeedItemRow>(&sql)
                    .bind(user.as_str())
                    .bind(anchor.as_bytes().as_slice())
                    .bind(limit)
                    .fetch_all(self.pool())
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {FEED_COLUMNS} FROM feed_items \
                     WHERE user_id = $1 \
                     ORDER BY post_id DESC LIMIT $2"
                );
                sqlx::query_as::<_, FeedItemRow>(&sql)
                    .bind(user.as_str())
                    .bind(limit)
                    .fetch_all(self.pool())
                    .await
            }
        }
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(FeedItem::try_from).collect()
    }
}

#[async_trait]
impl FeedRepo for PostgresRepositories {
    async fn put_post_to_feed(&self, user: &UserId, post: &Post) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO feed_items (user_id, post_id, author_id, text, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, post_id) DO UPDATE \
             SET author_id = EXCLUDED.author_id, text = EXCLUDED.text, \
                 created_at = EXCLUDED.created_at",
        )
        .bind(user.as_str())
        .bind(post.id.as_bytes().as_slice())
        .bind(post.author_id.as_str())
        .bind(post.text.as_str())
        .bind(post.created_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_feed(
        &self,
        user: &UserId,
        page: PageRequest,
    ) -> Result<CursorPage<FeedItem>, RepoError> {
        paginate(&page, |anchor, limit| {
            self.fetch_feed_window(user, anchor, limit)
        })
        .await
    }
}
