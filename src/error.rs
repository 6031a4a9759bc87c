use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::services::mollie::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payment provider unavailable: {0}")]
    Upstream(String),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Errors that should make the payment provider redeliver a webhook.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Upstream(_) | AppError::Database(_) | AppError::Internal(_)
        )
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        // Everything but a missing key is retryable, garbled responses included.
        match err {
            ProviderError::NotConfigured => AppError::NotConfigured("payment provider".into()),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Payment provider error");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Payment provider unavailable".into(),
                )
            }
            AppError::DataIntegrity(msg) => {
                tracing::error!(error = %msg, "Data integrity error");
                (StatusCode::UNPROCESSABLE_ENTITY, msg.clone())
            }
            AppError::NotConfigured(msg) => {
                tracing::error!(error = %msg, "Service not configured");
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        let body = json!({
            "error": {
                "message": message,
                "code": status.as_u16(),
            }
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
