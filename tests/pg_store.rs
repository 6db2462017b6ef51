//! Postgres adapters against a throwaway database.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use sqlx::PgPool;

use murmur::application::pagination::{PageRequest, PageSize, PaginationError};
use murmur::application::repos::{FeedRepo, PostsRepo, RepoError, SubscriptionsRepo};
use murmur::cache::CacheBackend;
use murmur::domain::ids::UserId;
use murmur::infra::db::{PgCacheBackend, PostgresRepositories};

fn user(name: &str) -> UserId {
    UserId::new(name).expect("user")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn posts_are_versioned_and_paged(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let alice = user("alice");

    let mut created = Vec::new();
    for n in 0..5 {
        created.push(
            repos
                .create_post(&alice, &format!("post {n}"))
                .await
                .expect("create"),
        );
    }

    let edited = repos
        .edit_post(created[0].id, &alice, "edited")
        .await
        .expect("edit");
    assert_eq!(edited.version, 1);
    assert!(matches!(
        repos.edit_post(created[0].id, &user("bob"), "x").await,
        Err(RepoError::NotFound)
    ));

    let first = repos
        .list_user_posts(&alice, PageRequest::first(PageSize::new(2)))
        .await
        .expect("first page");
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.items[0].id, created[4].id);
    let token = first.next_cursor.expect("more pages");
    assert_eq!(token.anchor(), created[3].id);

    repos
        .delete_post(token.anchor(), &alice)
        .await
        .expect("delete");
    let err = repos
        .list_user_posts(&alice, PageRequest::new(Some(token), PageSize::new(2)))
        .await
        .expect_err("anchor gone");
    assert!(matches!(
        err,
        RepoError::Pagination(PaginationError::AnchorMismatch(_))
    ));

    let streamed: Vec<_> = repos
        .stream_user_posts(&alice)
        .map(|post| post.expect("post").id)
        .collect()
        .await;
    assert_eq!(
        streamed,
        vec![created[4].id, created[2].id, created[1].id, created[0].id]
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn subscriptions_and_feed_upserts(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let (alice, bob) = (user("alice"), user("bob"));

    repos.subscribe(&bob, &alice).await.expect("subscribe");
    repos.subscribe(&bob, &alice).await.expect("subscribe again");
    assert_eq!(
        repos.list_subscriptions(&bob).await.expect("list"),
        vec![alice.clone()]
    );
    assert_eq!(
        repos.list_subscribers(&alice).await.expect("list"),
        vec![bob.clone()]
    );

    let post = repos.create_post(&alice, "draft").await.expect("create");
    repos.put_post_to_feed(&bob, &post).await.expect("put");
    let edited = repos
        .edit_post(post.id, &alice, "final")
        .await
        .expect("edit");
    repos.put_post_to_feed(&bob, &edited).await.expect("put again");

    let page = repos
        .list_feed(&bob, PageRequest::first(PageSize::default()))
        .await
        .expect("feed");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].text, "final");
    assert_eq!(page.items[0].author_id, alice);
    assert!(page.next_cursor.is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn cache_table_keeps_the_newest_version(pool: PgPool) {
    let backend = PgCacheBackend::new(pool);
    let ttl = Duration::from_secs(60);

    let stored = backend
        .set_if_not_older("murmur:posts:k", Bytes::from_static(b"v2"), 2, ttl)
        .await
        .expect("store");
    assert!(stored.accepted);

    let stale = backend
        .set_if_not_older("murmur:posts:k", Bytes::from_static(b"v1"), 1, ttl)
        .await
        .expect("stale offer");
    assert!(!stale.accepted);
    assert_eq!(&stale.payload[..], b"v2");

    let same = backend
        .set_if_not_older("murmur:posts:k", Bytes::from_static(b"v2b"), 2, ttl)
        .await
        .expect("equal version");
    assert!(same.accepted);

    backend.delete("murmur:posts:k").await.expect("delete");
    assert!(backend.get("murmur:posts:k").await.expect("get").is_none());

    backend
        .set_if_not_older("murmur:posts:short", Bytes::from_static(b"x"), 0, Duration::ZERO)
        .await
        .expect("expired on arrival");
    assert!(backend.get("murmur:posts:short").await.expect("get").is_none());
    assert_eq!(backend.purge_expired().await.expect("purge"), 1);
}
