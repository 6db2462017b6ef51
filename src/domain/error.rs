use thiserror::Error;

/// Business rule violations detected before storage is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("post text must not be empty")]
    EmptyText,
    #[error("users cannot subscribe to themselves")]
    SelfSubscription,
}
