//! Fan-out of posts into subscriber feeds.
//!
//! Both operations are idempotent upserts, so an at-least-once job transport
//! may replay them freely. Feed copies are plain snapshots: a later fan-out
//! of an edited post simply overwrites the earlier copy.

use std::sync::Arc;

use futures::StreamExt;
use metrics::counter;
use tracing::{info, warn};

use crate::application::pagination::{CursorPage, PageRequest};
use crate::application::repos::{FeedRepo, PostsRepo, RepoError, SubscriptionsRepo};
use crate::domain::entities::FeedItem;
use crate::domain::ids::{PostId, UserId};

const METRIC_FANOUT_UPSERT: &str = "murmur_fanout_upsert_total";

#[derive(Clone)]
pub struct FeedManager {
    posts: Arc<dyn PostsRepo>,
    subscriptions: Arc<dyn SubscriptionsRepo>,
    feed: Arc<dyn FeedRepo>,
}

impl FeedManager {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        subscriptions: Arc<dyn SubscriptionsRepo>,
        feed: Arc<dyn FeedRepo>,
    ) -> Self {
        Self {
            posts,
            subscriptions,
            feed,
        }
    }

    /// Copy one post into the feed of every current subscriber of `author`.
    ///
    /// Returns the number of feeds written. A post deleted before the job
    /// ran has nothing left to spread.
    pub async fn spread_post(&self, author: &UserId, post_id: PostId) -> Result<usize, RepoError> {
        let subscribers = self.subscriptions.list_subscribers(author).await?;
        let post = match self.posts.get_post(post_id).await {
            Ok(post) => post,
            Err(RepoError::NotFound) => {
                warn!(
                    target = "murmur::application::feed",
                    author = %author,
                    post_id = %post_id,
                    "post vanished before fan-out"
                );
                return Ok(0);
            }
            Err(err) => return Err(err),
        };

        for subscriber in &subscribers {
            self.feed.put_post_to_feed(subscriber, &post).await?;
            counter!(METRIC_FANOUT_UPSERT, "job" => "spread_post").increment(1);
        }

        info!(
            target = "murmur::application::feed",
            author = %author,
            post_id = %post_id,
            version = post.version,
            subscribers = subscribers.len(),
            "post spread to subscribers"
        );
        Ok(subscribers.len())
    }

    /// Copy every post of `target` into `subscriber`'s feed, one at a time.
    ///
    /// The walk is not resumable; a failed run is retried from the start.
    pub async fn collect_feed(
        &self,
        subscriber: &UserId,
        target: &UserId,
    ) -> Result<usize, RepoError> {
        let mut posts = self.posts.stream_user_posts(target);
        let mut collected = 0;
        while let Some(post) = posts.next().await {
            let post = post?;
            self.feed.put_post_to_feed(subscriber, &post).await?;
            counter!(METRIC_FANOUT_UPSERT, "job" => "collect_feed").increment(1);
            collected += 1;
        }

        info!(
            target = "murmur::application::feed",
            subscriber = %subscriber,
            source = %target,
            collected,
            "collected posts into personal feed"
        );
        Ok(collected)
    }

    pub async fn feed(
        &self,
        user: &UserId,
        page: PageRequest,
    ) -> Result<CursorPage<FeedItem>, RepoError> {
        self.feed.list_feed(user, page).await
    }
}
