use std::sync::Arc;

use apalis::prelude::Error as ApalisError;

use crate::application::feed::FeedManager;

/// Shared context passed to job workers.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub feed: Arc<FeedManager>,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`] so the job is retried.
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}
