use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;
use crate::templates;
use crate::tmdb::TmdbError;

/// Errors returned by the JSON API under `/movies`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Upstream request failed")]
    Upstream { status: Option<u16>, details: String },
    #[error("{0}")]
    Configuration(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Configuration(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => ApiError::Validation(msg),
            e @ StoreError::NotFound(_) => ApiError::NotFound(e.to_string()),
            e @ StoreError::Conflict(_) => ApiError::Conflict(e.to_string()),
            e => ApiError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl From<TmdbError> for ApiError {
    fn from(err: TmdbError) -> Self {
        match err {
            e @ TmdbError::MissingCredentials => ApiError::Configuration(e.to_string()),
            TmdbError::Upstream { status, body } => ApiError::Upstream {
                status: Some(status),
                details: body,
            },
            e => ApiError::Upstream {
                status: None,
                details: e.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Upstream {
                status: upstream,
                details,
            } => json!({
                "error": self.to_string(),
                "status": upstream,
                "details": details,
            }),
            ApiError::Internal(e) => {
                error!("Unhandled API error: {:?}", e);
                json!({ "error": "Internal server error" })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Errors from HTML page routes; rendered as an error page.
#[derive(Debug)]
pub struct PageError {
    status: StatusCode,
    message: String,
}

impl PageError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn method_not_allowed() -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            message: "This page does not accept that request method".to_string(),
        }
    }
}

impl From<StoreError> for PageError {
    fn from(err: StoreError) -> Self {
        match err {
            e @ StoreError::NotFound(_) => PageError::not_found(e.to_string()),
            StoreError::Validation(msg) => PageError::bad_request(msg),
            e => {
                error!("Unhandled page error: {:?}", e);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Something went wrong".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let body = templates::error_page(self.status, &self.message);
        (self.status, Html(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
pub type PageResult<T> = Result<T, PageError>;
