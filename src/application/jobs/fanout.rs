//! Fan-out job payloads and their processors.

use std::sync::Arc;
use std::time::Duration;

use apalis::prelude::{Data, Error as ApalisError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::{
    application::{feed::FeedManager, repos::NewJobRecord},
    domain::{
        ids::{IdError, PostId, UserId},
        types::JobType,
    },
};

use super::context::{JobWorkerContext, job_failed};

const LOCAL_RETRY_BASE: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum JobPayloadError {
    #[error("malformed job payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid identifier in job payload: {0}")]
    Id(#[from] IdError),
}

/// `[author, post id as hex]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadPostJob(pub String, pub String);

impl SpreadPostJob {
    pub fn new(author: &UserId, post_id: PostId) -> Self {
        Self(author.as_str().to_owned(), post_id.to_hex())
    }

    pub fn parse(&self) -> Result<(UserId, PostId), JobPayloadError> {
        Ok((UserId::new(self.0.clone())?, PostId::from_hex(&self.1)?))
    }
}

/// `[subscriber, followed user]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectFeedJob(pub String, pub String);

impl CollectFeedJob {
    pub fn new(subscriber: &UserId, target: &UserId) -> Self {
        Self(subscriber.as_str().to_owned(), target.as_str().to_owned())
    }

    pub fn parse(&self) -> Result<(UserId, UserId), JobPayloadError> {
        Ok((UserId::new(self.0.clone())?, UserId::new(self.1.clone())?))
    }
}

pub async fn process_spread_post_job(
    payload: SpreadPostJob,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;
    let (author, post_id) = payload.parse().map_err(job_failed)?;
    let written = ctx
        .feed
        .spread_post(&author, post_id)
        .await
        .map_err(job_failed)?;

    info!(
        target = "murmur::application::jobs::fanout",
        job = JobType::SpreadPost.as_str(),
        author = %author,
        post_id = %post_id,
        written,
        "job finished"
    );
    Ok(())
}

pub async fn process_collect_feed_job(
    payload: CollectFeedJob,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;
    let (subscriber, target) = payload.parse().map_err(job_failed)?;
    let written = ctx
        .feed
        .collect_feed(&subscriber, &target)
        .await
        .map_err(job_failed)?;

    info!(
        target = "murmur::application::jobs::fanout",
        job = JobType::CollectFeed.as_str(),
        subscriber = %subscriber,
        source = %target,
        written,
        "job finished"
    );
    Ok(())
}

/// Run one queued record against `feed`, returning the number of feeds touched.
pub async fn dispatch_local_job(
    feed: &FeedManager,
    record: &NewJobRecord,
) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    match record.job_type {
        JobType::SpreadPost => {
            let job: SpreadPostJob = serde_json::from_value(record.payload.clone())
                .map_err(JobPayloadError::from)?;
            let (author, post_id) = job.parse()?;
            Ok(feed.spread_post(&author, post_id).await?)
        }
        JobType::CollectFeed => {
            let job: CollectFeedJob = serde_json::from_value(record.payload.clone())
                .map_err(JobPayloadError::from)?;
            let (subscriber, target) = job.parse()?;
            Ok(feed.collect_feed(&subscriber, &target).await?)
        }
    }
}

/// Drain in-process submissions until every sender is dropped.
///
/// Each record gets up to `max_attempts` tries with a linear backoff; a
/// record that keeps failing is logged and dropped.
pub async fn run_local_dispatcher(
    mut jobs: mpsc::UnboundedReceiver<NewJobRecord>,
    feed: Arc<FeedManager>,
) {
    while let Some(record) = jobs.recv().await {
        let attempts = record.max_attempts.max(1);
        for attempt in 1..=attempts {
            match dispatch_local_job(&feed, &record).await {
                Ok(_) => break,
                Err(err) if attempt < attempts => {
                    warn!(
                        target = "murmur::application::jobs::fanout",
                        job = record.job_type.as_str(),
                        attempt,
                        error = %err,
                        "local job failed, retrying"
                    );
                    tokio::time::sleep(LOCAL_RETRY_BASE * attempt as u32).await;
                }
                Err(err) => {
                    error!(
                        target = "murmur::application::jobs::fanout",
                        job = record.job_type.as_str(),
                        attempts,
                        error = %err,
                        "local job abandoned"
                    );
                }
            }
        }
    }
}
