use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    application::{pagination::PaginationError, repos::RepoError},
    cache::CacheError,
    domain::{error::DomainError, ids::IdError},
    infra::error::InfraError,
};

/// Diagnostic chain attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

pub mod codes {
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_PAGE_TOKEN: &str = "invalid_page_token";
    pub const VALIDATION: &str = "validation_error";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const STORAGE: &str = "storage_fault";
    pub const CACHE: &str = "cache_fault";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("resource not found")]
    NotFound,
    #[error("invalid page token: {0}")]
    InvalidPageToken(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("caller identity is missing")]
    Unauthorized,
    #[error("caller may not modify this resource")]
    Forbidden,
    #[error("storage fault: {0}")]
    Storage(String),
    #[error(transparent)]
    Cache(CacheError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InvalidPageToken(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Storage(_) | AppError::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(InfraError::Database { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => codes::NOT_FOUND,
            AppError::InvalidPageToken(_) => codes::INVALID_PAGE_TOKEN,
            AppError::Validation(_) => codes::VALIDATION,
            AppError::Unauthorized => codes::UNAUTHORIZED,
            AppError::Forbidden => codes::FORBIDDEN,
            AppError::Storage(_) | AppError::Infra(InfraError::Database { .. }) => codes::STORAGE,
            AppError::Cache(_) => codes::CACHE,
            AppError::Infra(_) | AppError::Unexpected(_) => codes::INTERNAL,
        }
    }

    /// Message safe to show callers. Faults keep their detail in the report.
    fn presentation_message(&self) -> String {
        match self {
            AppError::NotFound
            | AppError::InvalidPageToken(_)
            | AppError::Validation(_)
            | AppError::Unauthorized
            | AppError::Forbidden => self.to_string(),
            AppError::Storage(_)
            | AppError::Cache(_)
            | AppError::Infra(InfraError::Database { .. }) => {
                "Service temporarily unavailable".to_string()
            }
            AppError::Infra(_) | AppError::Unexpected(_) => "Unexpected error occurred".to_string(),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound,
            RepoError::Pagination(err) => AppError::from(err),
            RepoError::InvalidInput { message } => AppError::Validation(message),
            RepoError::Cache(err) => AppError::Cache(err),
            RepoError::Persistence(message) => AppError::Storage(message),
            RepoError::Timeout => AppError::Storage("database timeout".to_string()),
        }
    }
}

impl From<PaginationError> for AppError {
    fn from(err: PaginationError) -> Self {
        match err {
            PaginationError::NegativeSize(_) => AppError::Validation(err.to_string()),
            PaginationError::InvalidCursor(_) | PaginationError::AnchorMismatch(_) => {
                AppError::InvalidPageToken(err.to_string())
            }
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::Cache(err)
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<IdError> for AppError {
    fn from(err: IdError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorMessage {
                code: self.code(),
                message: self.presentation_message(),
            },
        };
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}
