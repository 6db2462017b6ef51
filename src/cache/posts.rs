//! Cache-aside decorator for post repositories.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::pagination::{CursorPage, PageRequest, PageSize, PageToken};
use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::entities::Post;
use crate::domain::ids::{PostId, UserId};

use super::keys::{first_page_identity, post_identity};
use super::{CacheBackend, CacheConfig, CacheNamespace, Versioned, VersionedCache};

impl Versioned for Post {
    fn version(&self) -> i64 {
        self.version
    }
}

/// Post cache entry. A deletion leaves a tombstone one version above the
/// removed post so a reader that fetched the post before the delete cannot
/// put it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostEntry {
    Live(Post),
    Deleted { version: i64 },
}

impl Versioned for PostEntry {
    fn version(&self) -> i64 {
        match self {
            PostEntry::Live(post) => post.version,
            PostEntry::Deleted { version } => *version,
        }
    }
}

impl PostEntry {
    fn into_post(self) -> Result<Post, RepoError> {
        match self {
            PostEntry::Live(post) => Ok(post),
            PostEntry::Deleted { .. } => Err(RepoError::NotFound),
        }
    }
}

/// An author's canonical first page as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstPagePack {
    pub posts: Vec<Post>,
    pub next_cursor: Option<PageToken>,
}

impl Versioned for FirstPagePack {
    /// Sum of member versions, so an edit to any member changes the pack.
    fn version(&self) -> i64 {
        self.posts.iter().map(|post| post.version).sum()
    }
}

impl From<CursorPage<Post>> for FirstPagePack {
    fn from(page: CursorPage<Post>) -> Self {
        Self {
            posts: page.items,
            next_cursor: page.next_cursor,
        }
    }
}

impl FirstPagePack {
    /// Serve a first page of `size` from a pack built at the canonical size.
    pub fn reshape(self, size: PageSize) -> CursorPage<Post> {
        let size = size.get();
        let Self {
            mut posts,
            next_cursor,
        } = self;

        match posts.len() {
            len if len == size => CursorPage::new(posts, next_cursor),
            len if len < size => CursorPage::new(posts, None),
            _ => {
                posts.truncate(size);
                let next_cursor = posts.last().map(|post| PageToken::new(post.id));
                CursorPage::new(posts, next_cursor)
            }
        }
    }
}

/// Post repository that serves reads from a [`VersionedCache`] and keeps it
/// coherent on writes.
///
/// Cache faults are not absorbed: a failing cache read or write fails the
/// whole operation.
pub struct CachedPostsRepo<P> {
    primary: P,
    posts: VersionedCache<PostEntry>,
    first_pages: VersionedCache<FirstPagePack>,
    first_page_size: PageSize,
}

impl<P: PostsRepo> CachedPostsRepo<P> {
    pub fn new(primary: P, backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        let ttl = config.ttl();
        Self {
            primary,
            posts: VersionedCache::new(Arc::clone(&backend), CacheNamespace::Posts, ttl),
            first_pages: VersionedCache::new(backend, CacheNamespace::FirstPage, ttl),
            first_page_size: config.first_page_size(),
        }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn first_page_size(&self) -> PageSize {
        self.first_page_size
    }

    async fn invalidate_first_page(&self, author: &UserId) -> Result<(), RepoError> {
        self.first_pages
            .delete(first_page_identity(author))
            .await
            .map_err(RepoError::from)
    }

    async fn cached_first_page(&self, author: &UserId) -> Result<FirstPagePack, RepoError> {
        let identity = first_page_identity(author);
        if let Some(pack) = self.first_pages.get(identity).await? {
            return Ok(pack);
        }

        let page = self
            .primary
            .list_user_posts(author, PageRequest::first(self.first_page_size))
            .await?;
        let pack = FirstPagePack::from(page);
        Ok(self.first_pages.set_with_freshness(identity, &pack).await?)
    }
}

#[async_trait]
impl<P: PostsRepo> PostsRepo for CachedPostsRepo<P> {
    async fn create_post(&self, author: &UserId, text: &str) -> Result<Post, RepoError> {
        let post = self.primary.create_post(author, text).await?;
        self.posts
            .set_with_freshness(&post_identity(post.id), &PostEntry::Live(post.clone()))
            .await?;
        self.invalidate_first_page(author).await?;
        Ok(post)
    }

    async fn get_post(&self, id: PostId) -> Result<Post, RepoError> {
        let identity = post_identity(id);
        if let Some(entry) = self.posts.get(&identity).await? {
            return entry.into_post();
        }

        let fetched = self.primary.get_post(id).await?;
        self.posts
            .set_with_freshness(&identity, &PostEntry::Live(fetched))
            .await?
            .into_post()
    }

    async fn edit_post(&self, id: PostId, author: &UserId, text: &str) -> Result<Post, RepoError> {
        let edited = self.primary.edit_post(id, author, text).await?;
        self.posts
            .set_with_freshness(&post_identity(id), &PostEntry::Live(edited.clone()))
            .await?;
        self.invalidate_first_page(author).await?;
        Ok(edited)
    }

    async fn delete_post(&self, id: PostId, author: &UserId) -> Result<Post, RepoError> {
        let removed = self.primary.delete_post(id, author).await?;
        let tombstone = PostEntry::Deleted {
            version: removed.version + 1,
        };
        self.posts
            .set_with_freshness(&post_identity(id), &tombstone)
            .await?;
        self.invalidate_first_page(author).await?;
        Ok(removed)
    }

    async fn list_user_posts(
        &self,
        author: &UserId,
        page: PageRequest,
    ) -> Result<CursorPage<Post>, RepoError> {
        if page.cursor.is_some() || page.size > self.first_page_size {
            debug!(
                target = "murmur::cache::posts",
                author = %author,
                size = page.size.get(),
                "first-page cache bypassed"
            );
            return self.primary.list_user_posts(author, page).await;
        }

        let pack = self.cached_first_page(author).await?;
        Ok(pack.reshape(page.size))
    }

    fn stream_user_posts(&self, author: &UserId) -> BoxStream<'_, Result<Post, RepoError>> {
        self.primary.stream_user_posts(author)
    }
}
