mod context;
mod fanout;
mod queue;

pub use context::{JobWorkerContext, job_failed};
pub use fanout::{
    CollectFeedJob, JobPayloadError, SpreadPostJob, dispatch_local_job, process_collect_feed_job,
    process_spread_post_job, run_local_dispatcher,
};
pub use queue::{JobScheduler, enqueue_job};
