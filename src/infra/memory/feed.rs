use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::application::pagination::{CursorPage, PageRequest, paginate};
use crate::application::repos::{FeedRepo, RepoError};
use crate::domain::entities::{FeedItem, Post};
use crate::domain::ids::{PostId, UserId};

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "infra::memory::feed";

/// Personal feeds keyed by user, each ordered by post id.
#[derive(Default)]
pub struct MemoryFeedRepo {
    feeds: RwLock<HashMap<UserId, BTreeMap<PostId, FeedItem>>>,
}

impl MemoryFeedRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items in `user`'s feed.
    pub fn len_for(&self, user: &UserId) -> usize {
        rw_read(&self.feeds, SOURCE, "len_for")
            .get(user)
            .map_or(0, BTreeMap::len)
    }

    fn window(&self, user: &UserId, anchor: Option<PostId>, limit: usize) -> Vec<FeedItem> {
        let feeds = rw_read(&self.feeds, SOURCE, "window");
        let Some(items) = feeds.get(user) else {
            return Vec::new();
        };
        let range = match anchor {
            Some(anchor) => items.range(..=anchor),
            None => items.range(..),
        };
        range.rev().take(limit).map(|(_, item)| item.clone()).collect()
    }
}

#[async_trait]
impl FeedRepo for MemoryFeedRepo {
    async fn put_post_to_feed(&self, user: &UserId, post: &Post) -> Result<(), RepoError> {
        rw_write(&self.feeds, SOURCE, "put_post_to_feed")
            .entry(user.clone())
            .or_default()
            .insert(post.id, FeedItem::from_post(user.clone(), post));
        Ok(())
    }

    async fn list_feed(
        &self,
        user: &UserId,
        page: PageRequest,
    ) -> Result<CursorPage<FeedItem>, RepoError> {
        paginate(&page, |anchor, limit| async move {
            Ok(self.window(user, anchor, limit))
        })
        .await
    }
}
