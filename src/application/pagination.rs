//! Shared keyset pagination.
//!
//! Every paged listing is ordered by [`PostId`] descending and resumes from
//! an anchor: the last item the caller has already seen. A store fetches at
//! most `size + 2` rows with `id <= anchor`; one slot re-validates the anchor
//! row itself and one detects whether another page exists.

use std::fmt;
use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use crate::domain::entities::{FeedItem, Post};
use crate::domain::ids::PostId;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Slots fetched beyond the page: one for the anchor row, one to detect more.
const LOOKAHEAD: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("page anchor {0} no longer resolves")]
    AnchorMismatch(PageToken),
    #[error("page size must not be negative: {0}")]
    NegativeSize(i64),
}

/// Opaque resume point handed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageToken(PostId);

impl PageToken {
    pub fn new(anchor: PostId) -> Self {
        Self(anchor)
    }

    pub fn anchor(&self) -> PostId {
        self.0
    }

    pub fn encode(&self) -> String {
        self.0.encode()
    }

    pub fn decode(token: &str) -> Result<Self, PaginationError> {
        PostId::decode(token)
            .map(Self)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl Serialize for PageToken {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> serde::Deserialize<'de> for PageToken {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::decode(&raw).map_err(serde::de::Error::custom)
    }
}

/// A validated, strictly positive page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageSize(usize);

impl PageSize {
    /// Zero selects [`DEFAULT_PAGE_SIZE`]; negative sizes are rejected.
    pub fn from_raw(raw: i64) -> Result<Self, PaginationError> {
        match raw {
            n if n < 0 => Err(PaginationError::NegativeSize(n)),
            0 => Ok(Self::default()),
            n => Ok(Self(usize::try_from(n).unwrap_or(usize::MAX))),
        }
    }

    pub fn new(size: usize) -> Self {
        if size == 0 { Self::default() } else { Self(size) }
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// Number of rows a store should fetch for one page.
    pub fn fetch_limit(self) -> usize {
        self.0.saturating_add(LOOKAHEAD)
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(DEFAULT_PAGE_SIZE)
    }
}

/// Cursor-aware pagination request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<PageToken>,
    pub size: PageSize,
}

impl PageRequest {
    pub fn new(cursor: Option<PageToken>, size: PageSize) -> Self {
        Self { cursor, size }
    }

    pub fn first(size: PageSize) -> Self {
        Self { cursor: None, size }
    }

    /// Parse the raw `page` / `size` query parameters.
    pub fn parse(page: Option<&str>, size: Option<i64>) -> Result<Self, PaginationError> {
        let cursor = match page.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(PageToken::decode(raw)?),
            None => None,
        };
        let size = PageSize::from_raw(size.unwrap_or(0))?;
        Ok(Self { cursor, size })
    }

    pub fn anchor(&self) -> Option<PostId> {
        self.cursor.map(|token| token.anchor())
    }
}

/// Cursor-aware page result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<PageToken>,
}

impl<T> CursorPage<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<PageToken>) -> Self {
        Self { items, next_cursor }
    }
}

/// Rows that can be paged by their identifier.
pub trait Keyed {
    fn key(&self) -> PostId;
}

impl Keyed for Post {
    fn key(&self) -> PostId {
        self.id
    }
}

impl Keyed for FeedItem {
    fn key(&self) -> PostId {
        self.post_id
    }
}

/// Turn up to `size + 2` rows fetched with `id <= anchor ORDER BY id DESC`
/// into one page.
pub fn assemble_page<T: Keyed>(
    mut rows: Vec<T>,
    request: &PageRequest,
) -> Result<CursorPage<T>, PaginationError> {
    if let Some(token) = request.cursor {
        match rows.first() {
            Some(first) if first.key() == token.anchor() => {
                rows.remove(0);
            }
            _ => return Err(PaginationError::AnchorMismatch(token)),
        }
    }

    let size = request.size.get();
    if rows.len() > size {
        rows.truncate(size);
        let next_cursor = rows.last().map(|row| PageToken::new(row.key()));
        return Ok(CursorPage::new(rows, next_cursor));
    }

    Ok(CursorPage::new(rows, None))
}

/// Run one keyset query through `fetch(anchor, limit)` and assemble the page.
pub async fn paginate<T, E, F, Fut>(request: &PageRequest, fetch: F) -> Result<CursorPage<T>, E>
where
    T: Keyed,
    E: From<PaginationError>,
    F: FnOnce(Option<PostId>, usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let rows = fetch(request.anchor(), request.size.fetch_limit()).await?;
    assemble_page(rows, request).map_err(E::from)
}
