use futures::{StreamExt, stream::BoxStream};

use crate::application::repos::RepoError;
use crate::domain::entities::Post;
use crate::domain::ids::{PostId, UserId};

use super::PostgresRepositories;
use super::types::{POST_COLUMNS, PostRow};
use crate::infra::db::map_sqlx_error;

impl PostgresRepositories {
    pub(crate) async fn fetch_post(&self, id: PostId) -> Result<Post, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id.as_bytes().as_slice())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Post::try_from(row)
    }

    /// One keyset window: `limit` rows with `id <= anchor`, newest first.
    pub(crate) async fn fetch_user_posts_window(
        &self,
        author: &UserId,
        anchor: Option<PostId>,
        limit: usize,
    ) -> Result<Vec<Post>, RepoError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match anchor {
            Some(anchor) => {
                let sql = format!(
                    "SELECT {POST_COLUMNS} FROM posts \
                     WHERE author_id = $1 AND id <= $2 \
                     ORDER BY id DESC LIMIT $3"
                );
                sqlx::query_as::<_, PostRow>(&sql)
                    .bind(author.as_str())
                    .bind(anchor.as_bytes().as_slice())
                    .bind(limit)
                    .fetch_all(self.pool())
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {POST_COLUMNS} FROM posts \
                     WHERE author_id = $1 \
                     ORDER BY id DESC LIMIT $2"
                );
                sqlx::query_as::<_, PostRow>(&sql)
                    .bind(author.as_str())
                    .bind(limit)
                    .fetch_all(self.pool())
                    .await
            }
        }
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(Post::try_from).collect()
    }

    pub(crate) fn stream_posts_by_author(
        &self,
        author: &UserId,
    ) -> BoxStream<'_, Result<Post, RepoError>> {
        let author = author.as_str().to_owned();
        let stream = async_stream::try_stream! {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE author_id = $1 ORDER BY id DESC"
            );
            let mut rows = sqlx::query_as::<_, PostRow>(&sql)
                .bind(author)
                .fetch(self.pool());
            while let Some(row) = rows.next().await {
                let row = row.map_err(map_sqlx_error)?;
                yield Post::try_from(row)?;
            }
        };

        Box::pin(stream)
    }
}
