//! Repository traits describing persistence adapters.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::application::pagination::{CursorPage, PageRequest, PaginationError};
use crate::cache::CacheError;
use crate::domain::entities::{FeedItem, Post};
use crate::domain::ids::{PostId, UserId};
use crate::domain::types::JobType;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Durable post storage. Implementations own identifier and version assignment.
#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Insert a new post with version 0.
    async fn create_post(&self, author: &UserId, text: &str) -> Result<Post, RepoError>;

    async fn get_post(&self, id: PostId) -> Result<Post, RepoError>;

    /// Replace the text of `author`'s post and bump its version by one as a
    /// single atomic step. Concurrent edits never assign the same version.
    async fn edit_post(&self, id: PostId, author: &UserId, text: &str) -> Result<Post, RepoError>;

    /// Remove `author`'s post, returning the last stored value.
    async fn delete_post(&self, id: PostId, author: &UserId) -> Result<Post, RepoError>;

    /// Keyset listing of one author's posts, newest first.
    async fn list_user_posts(
        &self,
        author: &UserId,
        page: PageRequest,
    ) -> Result<CursorPage<Post>, RepoError>;

    /// Every post of `author`, newest first, fetched lazily.
    fn stream_user_posts(&self, author: &UserId) -> BoxStream<'_, Result<Post, RepoError>>;
}

#[async_trait]
impl<T: PostsRepo + ?Sized> PostsRepo for Arc<T> {
    async fn create_post(&self, author: &UserId, text: &str) -> Result<Post, RepoError> {
        (**self).create_post(author, text).await
    }

    async fn get_post(&self, id: PostId) -> Result<Post, RepoError> {
        (**self).get_post(id).await
    }

    async fn edit_post(&self, id: PostId, author: &UserId, text: &str) -> Result<Post, RepoError> {
        (**self).edit_post(id, author, text).await
    }

    async fn delete_post(&self, id: PostId, author: &UserId) -> Result<Post, RepoError> {
        (**self).delete_post(id, author).await
    }

    async fn list_user_posts(
        &self,
        author: &UserId,
        page: PageRequest,
    ) -> Result<CursorPage<Post>, RepoError> {
        (**self).list_user_posts(author, page).await
    }

    fn stream_user_posts(&self, author: &UserId) -> BoxStream<'_, Result<Post, RepoError>> {
        (**self).stream_user_posts(author)
    }
}

/// The follow graph.
#[async_trait]
pub trait SubscriptionsRepo: Send + Sync {
    /// Record that `subscriber` follows `target`. Repeating is a no-op.
    async fn subscribe(&self, subscriber: &UserId, target: &UserId) -> Result<(), RepoError>;

    async fn list_subscriptions(&self, user: &UserId) -> Result<Vec<UserId>, RepoError>;

    async fn list_subscribers(&self, user: &UserId) -> Result<Vec<UserId>, RepoError>;
}

/// Personal feeds assembled by fan-out.
#[async_trait]
pub trait FeedRepo: Send + Sync {
    /// Insert or overwrite the copy of `post` in `user`'s feed.
    async fn put_post_to_feed(&self, user: &UserId, post: &Post) -> Result<(), RepoError>;

    async fn list_feed(
        &self,
        user: &UserId,
        page: PageRequest,
    ) -> Result<CursorPage<FeedItem>, RepoError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub max_attempts: i32,
}

/// At-least-once job submission. Submitters never await a result.
#[async_trait]
pub trait JobsRepo: Send + Sync {
    /// Returns the identifier the queue assigned to the job.
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;
}
