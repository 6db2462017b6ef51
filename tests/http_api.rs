use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use murmur::application::feed::FeedManager;
use murmur::application::jobs::JobScheduler;
use murmur::application::pagination::{CursorPage, PageRequest};
use murmur::application::posts::PostService;
use murmur::application::repos::{PostsRepo, RepoError};
use murmur::application::subscriptions::SubscriptionService;
use murmur::domain::entities::Post;
use murmur::domain::ids::{PostId, UserId};
use murmur::infra::http::{ApiState, CALLER_HEADER, PageJson, PostJson, UsersJson, build_router};
use murmur::infra::memory::{
    MemoryFeedRepo, MemoryJobQueue, MemoryPostsRepo, MemorySubscriptionsRepo,
};

struct TestApp {
    router: Router,
    jobs: Arc<MemoryJobQueue>,
}

fn app() -> TestApp {
    let posts = Arc::new(MemoryPostsRepo::new());
    let subscriptions = Arc::new(MemorySubscriptionsRepo::new());
    let feed = Arc::new(MemoryFeedRepo::new());
    let jobs = Arc::new(MemoryJobQueue::new());

    let scheduler = JobScheduler::new(jobs.clone(), 5);
    let manager = Arc::new(FeedManager::new(
        posts.clone(),
        subscriptions.clone(),
        feed,
    ));
    let state = ApiState {
        posts: Arc::new(PostService::new(posts, scheduler.clone())),
        subscriptions: Arc::new(SubscriptionService::new(subscriptions, manager, scheduler)),
    };

    TestApp {
        router: build_router(state, Duration::from_secs(5)),
        jobs,
    }
}

fn request(method: Method, uri: &str, caller: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder.header(CALLER_HEADER, caller);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request")
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, bytes::Bytes) {
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("response");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    (status, body)
}

fn json<T: DeserializeOwned>(body: &[u8]) -> T {
    serde_json::from_slice(body).expect("json body")
}

async fn create(app: &TestApp, caller: &str, text: &str) -> PostJson {
    let payload = serde_json::json!({ "text": text }).to_string();
    let (status, body) = send(
        app,
        request(Method::POST, "/api/v1/posts", Some(caller), Some(&payload)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json(&body)
}

#[tokio::test]
async fn ping_answers_pong() {
    let app = app();
    let (status, body) = send(&app, request(Method::GET, "/maintenance/ping", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"pong");
}

#[tokio::test]
async fn writes_without_caller_header_are_unauthorized() {
    let app = app();
    let (status, body) = send(
        &app,
        request(Method::POST, "/api/v1/posts", None, Some(r#"{"text":"hi"}"#)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let error: serde_json::Value = json(&body);
    assert_eq!(error["error"]["code"], "unauthorized");
    assert!(app.jobs.submitted().is_empty());
}

#[tokio::test]
async fn post_lifecycle_over_http() {
    let app = app();
    let created = create(&app, "alice", "hello").await;
    assert_eq!(created.author_id, "alice");
    assert_eq!(created.version, Some(0));
    assert_eq!(created.id.len(), 16);

    let (status, body) = send(
        &app,
        request(Method::GET, &format!("/api/v1/posts/{}", created.id), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json::<PostJson>(&body), created);

    let uri = format!("/api/v1/posts/{}", created.id);
    let (status, _) = send(
        &app,
        request(Method::PATCH, &uri, Some("mallory"), Some(r#"{"text":"pwned"}"#)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request(Method::PATCH, &uri, Some("alice"), Some(r#"{"text":"edited"}"#)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let edited: PostJson = json(&body);
    assert_eq!(edited.text, "edited");
    assert_eq!(edited.version, Some(1));

    let (status, _) = send(&app, request(Method::DELETE, &uri, Some("mallory"), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, request(Method::DELETE, &uri, Some("alice"), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, request(Method::GET, &uri, None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // create and edit each schedule a spread
    assert_eq!(app.jobs.submitted().len(), 2);
}

#[tokio::test]
async fn malformed_post_id_is_a_bad_request() {
    let app = app();
    let (status, _) = send(
        &app,
        request(Method::GET, "/api/v1/posts/not-a-post", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn author_listing_follows_next_page_tokens() {
    let app = app();
    for n in 0..5 {
        create(&app, "alice", &format!("post {n}")).await;
    }

    let mut texts = Vec::new();
    let mut uri = "/api/v1/users/alice/posts?size=2".to_string();
    loop {
        let (status, body) = send(&app, request(Method::GET, &uri, None, None)).await;
        assert_eq!(status, StatusCode::OK);
        let page: PageJson = json(&body);
        assert!(page.posts.len() <= 2);
        texts.extend(page.posts.into_iter().map(|post| post.text));
        match page.next_page {
            Some(token) => uri = format!("/api/v1/users/alice/posts?size=2&page={token}"),
            None => break,
        }
    }

    assert_eq!(texts, vec!["post 4", "post 3", "post 2", "post 1", "post 0"]);
}

#[tokio::test]
async fn listing_rejects_bad_paging_input() {
    let app = app();
    let (status, _) = send(
        &app,
        request(Method::GET, "/api/v1/users/alice/posts?size=-1", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        request(Method::GET, "/api/v1/users/alice/posts?page=%21%21", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: serde_json::Value = json(&body);
    assert_eq!(error["error"]["code"], "invalid_page_token");
}

#[tokio::test]
async fn subscriptions_are_listed_from_both_sides() {
    let app = app();
    let (status, _) = send(
        &app,
        request(Method::POST, "/api/v1/users/alice/subscribe", Some("bob"), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/v1/users/bob/subscribe", Some("bob"), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(
        &app,
        request(Method::GET, "/api/v1/subscriptions", Some("bob"), None),
    )
    .await;
    assert_eq!(json::<UsersJson>(&body).users, vec!["alice"]);

    let (_, body) = send(
        &app,
        request(Method::GET, "/api/v1/subscribers", Some("alice"), None),
    )
    .await;
    assert_eq!(json::<UsersJson>(&body).users, vec!["bob"]);

    let (status, body) = send(&app, request(Method::GET, "/api/v1/feed", Some("bob"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json::<PageJson>(&body).posts.is_empty());
}

/// Post store whose lookups never finish in time.
struct StalledPosts(MemoryPostsRepo);

#[async_trait]
impl PostsRepo for StalledPosts {
    async fn create_post(&self, author: &UserId, text: &str) -> Result<Post, RepoError> {
        self.0.create_post(author, text).await
    }

    async fn get_post(&self, id: PostId) -> Result<Post, RepoError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        self.0.get_post(id).await
    }

    async fn edit_post(&self, id: PostId, author: &UserId, text: &str) -> Result<Post, RepoError> {
        self.0.edit_post(id, author, text).await
    }

    async fn delete_post(&self, id: PostId, author: &UserId) -> Result<Post, RepoError> {
        self.0.delete_post(id, author).await
    }

    async fn list_user_posts(
        &self,
        author: &UserId,
        page: PageRequest,
    ) -> Result<CursorPage<Post>, RepoError> {
        self.0.list_user_posts(author, page).await
    }

    fn stream_user_posts(&self, author: &UserId) -> BoxStream<'_, Result<Post, RepoError>> {
        self.0.stream_user_posts(author)
    }
}

#[tokio::test]
async fn slow_requests_time_out_with_service_unavailable() {
    let subscriptions = Arc::new(MemorySubscriptionsRepo::new());
    let jobs = Arc::new(MemoryJobQueue::new());
    let scheduler = JobScheduler::new(jobs.clone(), 1);
    let manager = Arc::new(FeedManager::new(
        Arc::new(MemoryPostsRepo::new()),
        subscriptions.clone(),
        Arc::new(MemoryFeedRepo::new()),
    ));
    let state = ApiState {
        posts: Arc::new(PostService::new(
            Arc::new(StalledPosts(MemoryPostsRepo::new())),
            scheduler.clone(),
        )),
        subscriptions: Arc::new(SubscriptionService::new(subscriptions, manager, scheduler)),
    };
    let app = TestApp {
        router: build_router(state, Duration::from_millis(50)),
        jobs,
    };

    let started = std::time::Instant::now();
    let uri = format!("/api/v1/posts/{}", PostId::generate().encode());
    let (status, _) = send(&app, request(Method::GET, &uri, None, None)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(started.elapsed() < Duration::from_secs(10));

    let (status, _) = send(&app, request(Method::GET, "/maintenance/ping", None, None)).await;
    assert_eq!(status, StatusCode::OK);
}
