use time::OffsetDateTime;

use crate::application::repos::RepoError;
use crate::domain::entities::Post;
use crate::domain::ids::{PostId, UserId};

pub(crate) const POST_COLUMNS: &str = "id, author_id, text, created_at, last_modified_at, version";

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: Vec<u8>,
    pub(crate) author_id: String,
    pub(crate) text: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) last_modified_at: OffsetDateTime,
    pub(crate) version: i64,
}

impl TryFrom<PostRow> for Post {
    type Error = RepoError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let id = PostId::from_slice(&row.id).map_err(RepoError::from_persistence)?;
        let author_id = UserId::new(row.author_id).map_err(RepoError::from_persistence)?;
        Ok(Self {
            id,
            author_id,
            text: row.text,
            created_at: row.created_at,
            last_modified_at: row.last_modified_at,
            version: row.version,
        })
    }
}
