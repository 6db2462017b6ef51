use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::application::pagination::{CursorPage, PageRequest, paginate};
use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::entities::Post;
use crate::domain::ids::{PostId, UserId};
use crate::domain::posts::now_millis;

use super::PostgresRepositories;
use super::types::{POST_COLUMNS, PostRow};
use crate::infra::db::map_sqlx_error;

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn create_post(&self, author: &UserId, text: &str) -> Result<Post, RepoError> {
        let now = now_millis();
        let id = PostId::generate_at(now);
        let sql = format!(
            "INSERT INTO posts (id, author_id, text, created_at, last_modified_at, version) \
             VALUES ($1, $2, $3, $4, $4, 0) \
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id.as_bytes().as_slice())
            .bind(author.as_str())
            .bind(text)
            .bind(now)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Post::try_from(row)
    }

    async fn get_post(&self, id: PostId) -> Result<Post, RepoError> {
        self.fetch_post(id).await
    }

    async fn edit_post(&self, id: PostId, author: &UserId, text: &str) -> Result<Post, RepoError> {
        // Row-level lock of the UPDATE serializes concurrent edits of one post.
        let sql = format!(
            "UPDATE posts \
             SET text = $3, last_modified_at = $4, version = version + 1 \
             WHERE id = $1 AND author_id = $2 \
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id.as_bytes().as_slice())
            .bind(author.as_str())
            .bind(text)
            .bind(now_millis())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Post::try_from(row)
    }

    async fn delete_post(&self, id: PostId, author: &UserId) -> Result<Post, RepoError> {
        let sql = format!(
            "DELETE FROM posts WHERE id = $1 AND author_id = $2 RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id.as_bytes().as_slice())
            .bind(author.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Post::try_from(row)
    }

    async fn list_user_posts(
        &self,
        author: &UserId,
        page: PageRequest,
    ) -> Result<CursorPage<Post>, RepoError> {
        paginate(&page, |anchor, limit| {
            self.fetch_user_posts_window(author, anchor, limit)
        })
        .await
    }

    fn stream_user_posts(&self, author: &UserId) -> BoxStream<'_, Result<Post, RepoError>> {
        self.stream_posts_by_author(author)
    }
}
