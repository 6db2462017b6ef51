//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

/// Background job kinds understood by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    SpreadPost,
    CollectFeed,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::SpreadPost => "spread_post",
            JobType::CollectFeed => "collect_feed",
        }
    }
}
