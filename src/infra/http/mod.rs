//! JSON API over the application services.

mod extract;
mod handlers;
mod middleware;
mod models;
mod state;

pub use extract::{CALLER_HEADER, CallerId};
pub use models::{PageJson, PostJson, TextRequest, UsersJson};
pub use state::ApiState;

use std::time::Duration;

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use middleware::{log_responses, set_request_context};

/// Build the full API router.
///
/// Requests that outlive `request_timeout` are answered with 503 and their
/// handler future is dropped, which cancels in-flight storage and cache calls.
pub fn build_router(state: ApiState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/api/v1/posts", post(handlers::create_post))
        .route(
            "/api/v1/posts/{post_id}",
            get(handlers::get_post)
                .patch(handlers::edit_post)
                .delete(handlers::delete_post),
        )
        .route("/api/v1/users/{user_id}/posts", get(handlers::list_user_posts))
        .route("/api/v1/users/{user_id}/subscribe", post(handlers::subscribe))
        .route("/api/v1/subscriptions", get(handlers::list_subscriptions))
        .route("/api/v1/subscribers", get(handlers::list_subscribers))
        .route("/api/v1/feed", get(handlers::feed))
        .route("/maintenance/ping", get(handlers::ping))
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::SERVICE_UNAVAILABLE,
            request_timeout,
        ))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(set_request_context))
}
