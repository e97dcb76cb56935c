use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Remote connection error: {0}")]
    RemoteConnection(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to load organizations: {0}")]
    FatalLoad(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A 2xx body whose `success` flag reflects a reported (non-thrown) outcome.
    pub fn reported(success: bool, data: T) -> Self {
        Self {
            success,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: &str) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RemoteConnection(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_)
            | AppError::Configuration(_)
            | AppError::Storage(_)
            | AppError::FatalLoad(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Jwt(e) => {
                tracing::warn!("JWT error: {:?}", e);
                "Invalid token".to_string()
            }
            AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg) => msg.clone(),
            other => {
                tracing::error!("{}", other);
                other.to_string()
            }
        };

        let body = Json(ApiResponse::<()>::error(&message));
        (self.status(), body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
