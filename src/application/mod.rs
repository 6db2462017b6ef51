//! Application services and the seams they depend on.

pub mod error;
pub mod feed;
pub mod jobs;
pub mod pagination;
pub mod posts;
pub mod repos;
pub mod subscriptions;
