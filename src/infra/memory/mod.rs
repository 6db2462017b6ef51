//! In-process adapters with the same contracts as the Postgres ones.
//!
//! Used by `murmur serve --in-memory` and by the test suites. State lives
//! behind std locks that are never held across an await point.

mod feed;
mod jobs;
mod lock;
mod posts;
mod subscriptions;

pub use feed::MemoryFeedRepo;
pub use jobs::MemoryJobQueue;
pub use posts::MemoryPostsRepo;
pub use subscriptions::MemorySubscriptionsRepo;
