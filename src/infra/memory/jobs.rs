use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::repos::{JobsRepo, NewJobRecord, RepoError};

use super::lock::mutex_lock;

const SOURCE: &str = "infra::memory::jobs";

/// Job queue that either forwards submissions to an in-process dispatcher or,
/// without one, records them for inspection.
#[derive(Default)]
pub struct MemoryJobQueue {
    submitted: Mutex<Vec<NewJobRecord>>,
    next_id: AtomicU64,
    dispatch: Option<mpsc::UnboundedSender<NewJobRecord>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dispatch(dispatch: mpsc::UnboundedSender<NewJobRecord>) -> Self {
        Self {
            dispatch: Some(dispatch),
            ..Self::default()
        }
    }

    /// Recorded jobs, oldest first.
    pub fn submitted(&self) -> Vec<NewJobRecord> {
        mutex_lock(&self.submitted, SOURCE, "submitted").clone()
    }

    /// Remove and return every recorded job.
    pub fn drain(&self) -> Vec<NewJobRecord> {
        std::mem::take(&mut *mutex_lock(&self.submitted, SOURCE, "drain"))
    }
}

#[async_trait]
impl JobsRepo for MemoryJobQueue {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        match &self.dispatch {
            Some(dispatch) => dispatch
                .send(job)
                .map_err(|_| RepoError::from_persistence("job dispatcher has shut down"))?,
            None => mutex_lock(&self.submitted, SOURCE, "enqueue_job").push(job),
        }

        Ok(format!("memory-{id}"))
    }
}
