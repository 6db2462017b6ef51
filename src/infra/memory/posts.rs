use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::application::pagination::{CursorPage, PageRequest, paginate};
use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::entities::Post;
use crate::domain::ids::{PostId, UserId};
use crate::domain::posts::now_millis;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "infra::memory::posts";

#[derive(Default)]
struct PostsState {
    by_id: HashMap<PostId, Post>,
    by_author: HashMap<UserId, BTreeSet<PostId>>,
}

impl PostsState {
    /// Up to `limit` posts of `author` with `id <= anchor`, newest first.
    fn window(&self, author: &UserId, anchor: Option<PostId>, limit: usize) -> Vec<Post> {
        let Some(ids) = self.by_author.get(author) else {
            return Vec::new();
        };
        let range = match anchor {
            Some(anchor) => ids.range(..=anchor),
            None => ids.range(..),
        };
        range
            .rev()
            .take(limit)
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }

    fn owned_by(&self, id: PostId, author: &UserId) -> Option<&Post> {
        self.by_id.get(&id).filter(|post| &post.author_id == author)
    }
}

/// Post store kept in a map. Edits are serialized by the write lock.
#[derive(Default)]
pub struct MemoryPostsRepo {
    state: RwLock<PostsState>,
}

impl MemoryPostsRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed post, replacing any post with the same id.
    pub fn insert(&self, post: Post) {
        let mut state = rw_write(&self.state, SOURCE, "insert");
        state
            .by_author
            .entry(post.author_id.clone())
            .or_default()
            .insert(post.id);
        state.by_id.insert(post.id, post);
    }

    fn next_older(&self, author: &UserId, before: Option<PostId>) -> Option<Post> {
        let state = rw_read(&self.state, SOURCE, "next_older");
        let ids = state.by_author.get(author)?;
        let next = match before {
            Some(before) => ids.range(..before).next_back(),
            None => ids.iter().next_back(),
        }?;
        state.by_id.get(next).cloned()
    }
}

#[async_trait]
impl PostsRepo for MemoryPostsRepo {
    async fn create_post(&self, author: &UserId, text: &str) -> Result<Post, RepoError> {
        let now = now_millis();
        let post = Post {
            id: PostId::generate_at(now),
            author_id: author.clone(),
            text: text.to_string(),
            created_at: now,
            last_modified_at: now,
            version: 0,
        };
        self.insert(post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: PostId) -> Result<Post, RepoError> {
        rw_read(&self.state, SOURCE, "get_post")
            .by_id
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn edit_post(&self, id: PostId, author: &UserId, text: &str) -> Result<Post, RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "edit_post");
        if state.owned_by(id, author).is_none() {
            return Err(RepoError::NotFound);
        }
        let post = state.by_id.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.text = text.to_string();
        post.last_modified_at = now_millis();
        post.version += 1;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: PostId, author: &UserId) -> Result<Post, RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "delete_post");
        if state.owned_by(id, author).is_none() {
            return Err(RepoError::NotFound);
        }
        if let Some(ids) = state.by_author.get_mut(author) {
            ids.remove(&id);
        }
        state.by_id.remove(&id).ok_or(RepoError::NotFound)
    }

    async fn list_user_posts(
        &self,
        author: &UserId,
        page: PageRequest,
    ) -> Result<CursorPage<Post>, RepoError> {
        paginate(&page, |anchor, limit| async move {
            Ok(rw_read(&self.state, SOURCE, "list_user_posts").window(author, anchor, limit))
        })
        .await
    }

    fn stream_user_posts(&self, author: &UserId) -> BoxStream<'_, Result<Post, RepoError>> {
        let author = author.clone();
        let stream = async_stream::stream! {
            let mut before = None;
            while let Some(post) = self.next_older(&author, before) {
                before = Some(post.id);
                yield Ok(post);
            }
        };

        Box::pin(stream)
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::application::pagination::{PageSize, PaginationError};

    fn alice() -> UserId {
        UserId::new("alice").expect("user")
    }

    #[tokio::test]
    async fn edits_bump_version_by_one() {
        let repo = MemoryPostsRepo::new();
        let post = repo.create_post(&alice(), "first").await.expect("create");
        assert_eq!(post.version, 0);

        let edited = repo
            .edit_post(post.id, &alice(), "second")
            .await
            .expect("edit");
        assert_eq!(edited.version, 1);
        assert_eq!(edited.text, "second");
        assert_eq!(edited.created_at, post.created_at);
    }

    #[tokio::test]
    async fn edits_by_other_authors_are_not_found() {
        let repo = MemoryPostsRepo::new();
        let post = repo.create_post(&alice(), "first").await.expect("create");
        let bob = UserId::new("bob").expect("user");

        let err = repo.edit_post(post.id, &bob, "mine").await.expect_err("rejected");
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn deleted_anchor_is_rejected() {
        let repo = MemoryPostsRepo::new();
        for n in 0..5 {
            repo.create_post(&alice(), &format!("post {n}"))
                .await
                .expect("create");
        }
        let first = repo
            .list_user_posts(&alice(), PageRequest::first(PageSize::new(2)))
            .await
            .expect("page");
        let token = first.next_cursor.expect("more pages");

        repo.delete_post(token.anchor(), &alice())
            .await
            .expect("delete");

        let err = repo
            .list_user_posts(&alice(), PageRequest::new(Some(token), PageSize::new(2)))
            .await
            .expect_err("anchor gone");
        assert!(matches!(
            err,
            RepoError::Pagination(PaginationError::AnchorMismatch(_))
        ));
    }

    #[tokio::test]
    async fn stream_yields_every_post_newest_first() {
        let repo = MemoryPostsRepo::new();
        let mut created = Vec::new();
        for n in 0..4 {
            created.push(
                repo.create_post(&alice(), &format!("post {n}"))
                    .await
                    .expect("create"),
            );
        }

        let streamed: Vec<Post> = repo
            .stream_user_posts(&alice())
            .map(|post| post.expect("post"))
            .collect()
            .await;

        created.reverse();
        assert_eq!(streamed, created);
    }
}
