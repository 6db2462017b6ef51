use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{JobsRepo, NewJobRecord, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

const DEFAULT_PRIORITY: i32 = 0;

#[async_trait]
impl JobsRepo for PostgresRepositories {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let id = sqlx::query_scalar::<_, String>(
            "SELECT (apalis.push_job($1, $2::json, $3, $4, $5, $6)).id",
        )
        .bind(job.job_type.as_str())
        .bind(job.payload)
        .bind("Pending")
        .bind(OffsetDateTime::now_utc())
        .bind(job.max_attempts)
        .bind(DEFAULT_PRIORITY)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }
}
