use axum::{extract::FromRequestParts, http::request::Parts};

use crate::application::error::AppError;
use crate::domain::ids::UserId;

/// Header carrying the authenticated caller's user id.
pub const CALLER_HEADER: &str = "System-Design-User-Id";

/// Caller identity for routes that act on behalf of a user.
#[derive(Debug, Clone)]
pub struct CallerId(pub UserId);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        UserId::new(value)
            .map(CallerId)
            .map_err(|_| AppError::Unauthorized)
    }
}
