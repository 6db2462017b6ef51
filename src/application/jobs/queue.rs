use std::sync::Arc;

use tracing::info;

use crate::{
    application::repos::{JobsRepo, NewJobRecord, RepoError},
    domain::{
        ids::{PostId, UserId},
        types::JobType,
    },
};

use super::fanout::{CollectFeedJob, SpreadPostJob};

/// Enqueue a job with the provided payload, returning the assigned id.
pub async fn enqueue_job<J, P>(
    repo: &J,
    job_type: JobType,
    payload: &P,
    max_attempts: i32,
) -> Result<String, RepoError>
where
    J: JobsRepo + ?Sized,
    P: serde::Serialize,
{
    let payload = serde_json::to_value(payload).map_err(RepoError::from_persistence)?;
    let record = NewJobRecord {
        job_type,
        payload,
        max_attempts,
    };

    let id = repo.enqueue_job(record).await?;
    info!(
        target = "murmur::application::jobs",
        job_type = job_type.as_str(),
        job_id = %id,
        "job enqueued"
    );
    Ok(id)
}

/// Request-path entry point for background fan-out. Submits and never waits.
#[derive(Clone)]
pub struct JobScheduler {
    repo: Arc<dyn JobsRepo>,
    max_attempts: i32,
}

impl JobScheduler {
    pub fn new(repo: Arc<dyn JobsRepo>, max_attempts: i32) -> Self {
        Self {
            repo,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn spread_post(&self, author: &UserId, post_id: PostId) -> Result<String, RepoError> {
        let job = SpreadPostJob::new(author, post_id);
        enqueue_job(
            self.repo.as_ref(),
            JobType::SpreadPost,
            &job,
            self.max_attempts,
        )
        .await
    }

    pub async fn collect_feed(
        &self,
        subscriber: &UserId,
        target: &UserId,
    ) -> Result<String, RepoError> {
        let job = CollectFeedJob::new(subscriber, target);
        enqueue_job(
            self.repo.as_ref(),
            JobType::CollectFeed,
            &job,
            self.max_attempts,
        )
        .await
    }
}
