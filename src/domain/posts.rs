//! Post content rules and timestamp normalization.

use time::OffsetDateTime;

use crate::domain::error::DomainError;
use crate::domain::ids::UserId;

/// Reject blank post bodies before any storage is touched.
pub fn validate_text(text: &str) -> Result<(), DomainError> {
    if text.trim().is_empty() {
        return Err(DomainError::EmptyText);
    }
    Ok(())
}

pub fn ensure_distinct_users(subscriber: &UserId, target: &UserId) -> Result<(), DomainError> {
    if subscriber == target {
        return Err(DomainError::SelfSubscription);
    }
    Ok(())
}

/// Current time truncated to whole milliseconds, the precision every store keeps.
pub fn now_millis() -> OffsetDateTime {
    truncate_to_millis(OffsetDateTime::now_utc())
}

pub fn truncate_to_millis(at: OffsetDateTime) -> OffsetDateTime {
    let nanos = at.nanosecond();
    at.replace_nanosecond(nanos - nanos % 1_000_000)
        .unwrap_or(at)
}
