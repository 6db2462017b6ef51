use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::application::error::AppError;
use crate::application::pagination::{CursorPage, PageRequest};
use crate::domain::entities::{FeedItem, Post};
use crate::domain::ids::UserId;

#[derive(Debug, Deserialize, Serialize)]
pub struct TextRequest {
    pub text: String,
}

/// Post as exposed over the wire. Feed copies carry no edit metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostJson {
    pub id: String,
    pub text: String,
    pub author_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl From<Post> for PostJson {
    fn from(post: Post) -> Self {
        Self {
            id: post.id.encode(),
            text: post.text,
            author_id: post.author_id.into_inner(),
            created_at: post.created_at,
            last_modified_at: Some(post.last_modified_at),
            version: Some(post.version),
        }
    }
}

impl From<FeedItem> for PostJson {
    fn from(item: FeedItem) -> Self {
        Self {
            id: item.post_id.encode(),
            text: item.text,
            author_id: item.author_id.into_inner(),
            created_at: item.created_at,
            last_modified_at: None,
            version: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageJson {
    pub posts: Vec<PostJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page: Option<String>,
}

impl<T: Into<PostJson>> From<CursorPage<T>> for PageJson {
    fn from(page: CursorPage<T>) -> Self {
        Self {
            posts: page.items.into_iter().map(Into::into).collect(),
            next_page: page.next_cursor.map(|token| token.encode()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsersJson {
    pub users: Vec<String>,
}

impl From<Vec<UserId>> for UsersJson {
    fn from(users: Vec<UserId>) -> Self {
        Self {
            users: users.into_iter().map(UserId::into_inner).collect(),
        }
    }
}

/// `?page=<token>&size=<n>`; both optional.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub size: Option<String>,
}

impl PageQuery {
    pub fn into_request(self) -> Result<PageRequest, AppError> {
        let size = match self.size.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<i64>()
                    .map_err(|err| AppError::validation(format!("invalid page size: {err}")))?,
            ),
        };
        let page = self.page.as_deref().filter(|token| !token.is_empty());
        Ok(PageRequest::parse(page, size)?)
    }
}
