//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::ids::{PostId, UserId};

/// A post as owned by the primary store. Every read hands out an owned copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub last_modified_at: OffsetDateTime,
    /// Starts at 0 and grows by exactly one on every successful edit.
    pub version: i64,
}

/// Denormalized copy of a post placed into a subscriber's feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub user_id: UserId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub text: String,
    pub created_at: OffsetDateTime,
}

impl FeedItem {
    pub fn from_post(user_id: UserId, post: &Post) -> Self {
        Self {
            user_id,
            post_id: post.id,
            author_id: post.author_id.clone(),
            text: post.text.clone(),
            created_at: post.created_at,
        }
    }
}
