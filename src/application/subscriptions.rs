//! Follow graph and personal feed reads.

use std::sync::Arc;

use tracing::info;

use crate::application::error::AppError;
use crate::application::feed::FeedManager;
use crate::application::jobs::JobScheduler;
use crate::application::pagination::{CursorPage, PageRequest};
use crate::application::repos::SubscriptionsRepo;
use crate::domain::entities::FeedItem;
use crate::domain::ids::UserId;
use crate::domain::posts::ensure_distinct_users;

#[derive(Clone)]
pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionsRepo>,
    feed: Arc<FeedManager>,
    jobs: JobScheduler,
}

impl SubscriptionService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionsRepo>,
        feed: Arc<FeedManager>,
        jobs: JobScheduler,
    ) -> Self {
        Self {
            subscriptions,
            feed,
            jobs,
        }
    }

    /// Follow `target` and schedule backfilling their history into the feed.
    pub async fn subscribe(&self, subscriber: &UserId, target: &UserId) -> Result<(), AppError> {
        ensure_distinct_users(subscriber, target)?;
        self.subscriptions.subscribe(subscriber, target).await?;
        self.jobs.collect_feed(subscriber, target).await?;

        info!(
            target = "murmur::application::subscriptions",
            subscriber = %subscriber,
            source = %target,
            "subscription stored"
        );
        Ok(())
    }

    pub async fn subscriptions(&self, user: &UserId) -> Result<Vec<UserId>, AppError> {
        Ok(self.subscriptions.list_subscriptions(user).await?)
    }

    pub async fn subscribers(&self, user: &UserId) -> Result<Vec<UserId>, AppError> {
        Ok(self.subscriptions.list_subscribers(user).await?)
    }

    pub async fn feed(
        &self,
        user: &UserId,
        page: PageRequest,
    ) -> Result<CursorPage<FeedItem>, AppError> {
        Ok(self.feed.feed(user, page).await?)
    }
}
