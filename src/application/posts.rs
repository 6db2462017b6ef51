//! Post lifecycle as seen by API callers.

use std::sync::Arc;

use tracing::info;

use crate::application::error::AppError;
use crate::application::jobs::JobScheduler;
use crate::application::pagination::{CursorPage, PageRequest};
use crate::application::repos::PostsRepo;
use crate::domain::entities::Post;
use crate::domain::ids::{PostId, UserId};
use crate::domain::posts::validate_text;

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    jobs: JobScheduler,
}

impl PostService {
    /// `posts` is expected to be the cache-aware store when caching is on.
    pub fn new(posts: Arc<dyn PostsRepo>, jobs: JobScheduler) -> Self {
        Self { posts, jobs }
    }

    pub async fn create(&self, author: &UserId, text: &str) -> Result<Post, AppError> {
        validate_text(text)?;
        let post = self.posts.create_post(author, text).await?;
        self.jobs.spread_post(author, post.id).await?;

        info!(
            target = "murmur::application::posts",
            author = %author,
            post_id = %post.id,
            "post created"
        );
        Ok(post)
    }

    pub async fn get(&self, id: PostId) -> Result<Post, AppError> {
        Ok(self.posts.get_post(id).await?)
    }

    pub async fn edit(&self, id: PostId, actor: &UserId, text: &str) -> Result<Post, AppError> {
        validate_text(text)?;
        self.ensure_author(id, actor).await?;

        let post = self.posts.edit_post(id, actor, text).await?;
        self.jobs.spread_post(actor, post.id).await?;

        info!(
            target = "murmur::application::posts",
            author = %actor,
            post_id = %post.id,
            version = post.version,
            "post edited"
        );
        Ok(post)
    }

    /// Feed copies already fanned out are left in place.
    pub async fn delete(&self, id: PostId, actor: &UserId) -> Result<(), AppError> {
        self.ensure_author(id, actor).await?;
        let removed = self.posts.delete_post(id, actor).await?;

        info!(
            target = "murmur::application::posts",
            author = %actor,
            post_id = %removed.id,
            "post deleted"
        );
        Ok(())
    }

    pub async fn list_author_posts(
        &self,
        author: &UserId,
        page: PageRequest,
    ) -> Result<CursorPage<Post>, AppError> {
        Ok(self.posts.list_user_posts(author, page).await?)
    }

    async fn ensure_author(&self, id: PostId, actor: &UserId) -> Result<(), AppError> {
        let current = self.posts.get_post(id).await?;
        if &current.author_id != actor {
            return Err(AppError::Forbidden);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::JobsRepo;
    use crate::domain::types::JobType;
    use crate::infra::memory::{MemoryJobQueue, MemoryPostsRepo};

    fn service() -> (PostService, Arc<MemoryJobQueue>) {
        let queue = Arc::new(MemoryJobQueue::new());
        let jobs: Arc<dyn JobsRepo> = queue.clone();
        let service = PostService::new(Arc::new(MemoryPostsRepo::new()), JobScheduler::new(jobs, 3));
        (service, queue)
    }

    fn user(name: &str) -> UserId {
        UserId::new(name).expect("user")
    }

    #[tokio::test]
    async fn create_enqueues_spread_post() {
        let (service, queue) = service();
        let post = service.create(&user("alice"), "hello").await.expect("create");

        let jobs = queue.submitted();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_type, JobType::SpreadPost);
        assert_eq!(
            jobs[0].payload,
            serde_json::json!(["alice", post.id.to_hex()])
        );
    }

    #[tokio::test]
    async fn blank_text_is_rejected_before_storage() {
        let (service, queue) = service();
        let err = service.create(&user("alice"), "   ").await.expect_err("blank");
        assert!(matches!(err, AppError::Validation(_)));
        assert!(queue.submitted().is_empty());
    }

    #[tokio::test]
    async fn only_the_author_may_edit_or_delete() {
        let (service, _) = service();
        let post = service.create(&user("alice"), "hello").await.expect("create");

        let err = service
            .edit(post.id, &user("mallory"), "pwned")
            .await
            .expect_err("forbidden");
        assert!(matches!(err, AppError::Forbidden));

        let err = service
            .delete(post.id, &user("mallory"))
            .await
            .expect_err("forbidden");
        assert!(matches!(err, AppError::Forbidden));

        let edited = service
            .edit(post.id, &user("alice"), "hello again")
            .await
            .expect("edit");
        assert_eq!(edited.version, 1);
    }

    #[tokio::test]
    async fn editing_a_missing_post_is_not_found() {
        let (service, _) = service();
        let err = service
            .edit(PostId::generate(), &user("alice"), "text")
            .await
            .expect_err("missing");
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn deleted_posts_are_gone() {
        let (service, _) = service();
        let post = service.create(&user("alice"), "hello").await.expect("create");
        service.delete(post.id, &user("alice")).await.expect("delete");
        assert!(matches!(
            service.get(post.id).await,
            Err(AppError::NotFound)
        ));
    }
}
