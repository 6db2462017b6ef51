use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::application::error::AppError;
use crate::domain::ids::{PostId, UserId};

use super::extract::CallerId;
use super::models::{PageJson, PageQuery, PostJson, TextRequest, UsersJson};
use super::state::ApiState;

pub async fn create_post(
    State(state): State<ApiState>,
    CallerId(caller): CallerId,
    Json(body): Json<TextRequest>,
) -> Result<Json<PostJson>, AppError> {
    let post = state.posts.create(&caller, &body.text).await?;
    Ok(Json(post.into()))
}

pub async fn get_post(
    State(state): State<ApiState>,
    Path(post_id): Path<String>,
) -> Result<Json<PostJson>, AppError> {
    let id = PostId::decode(&post_id)?;
    let post = state.posts.get(id).await?;
    Ok(Json(post.into()))
}

pub async fn edit_post(
    State(state): State<ApiState>,
    CallerId(caller): CallerId,
    Path(post_id): Path<String>,
    Json(body): Json<TextRequest>,
) -> Result<Json<PostJson>, AppError> {
    let id = PostId::decode(&post_id)?;
    let post = state.posts.edit(id, &caller, &body.text).await?;
    Ok(Json(post.into()))
}

pub async fn delete_post(
    State(state): State<ApiState>,
    CallerId(caller): CallerId,
    Path(post_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = PostId::decode(&post_id)?;
    state.posts.delete(id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_user_posts(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageJson>, AppError> {
    let author = UserId::new(user_id)?;
    let page = state
        .posts
        .list_author_posts(&author, query.into_request()?)
        .await?;
    Ok(Json(page.into()))
}

pub async fn subscribe(
    State(state): State<ApiState>,
    CallerId(caller): CallerId,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let target = UserId::new(user_id)?;
    state.subscriptions.subscribe(&caller, &target).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_subscriptions(
    State(state): State<ApiState>,
    CallerId(caller): CallerId,
) -> Result<Json<UsersJson>, AppError> {
    let users = state.subscriptions.subscriptions(&caller).await?;
    Ok(Json(users.into()))
}

pub async fn list_subscribers(
    State(state): State<ApiState>,
    CallerId(caller): CallerId,
) -> Result<Json<UsersJson>, AppError> {
    let users = state.subscriptions.subscribers(&caller).await?;
    Ok(Json(users.into()))
}

pub async fn feed(
    State(state): State<ApiState>,
    CallerId(caller): CallerId,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageJson>, AppError> {
    let page = state
        .subscriptions
        .feed(&caller, query.into_request()?)
        .await?;
    Ok(Json(page.into()))
}

pub async fn ping() -> &'static str {
    "pong"
}
