//! Error handling for the HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Error response body shared by every route
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable summary
    pub message: String,
    /// Underlying error text, present for backend failures that expose it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Offending form fields, present for input errors
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest {
        message: String,
        fields: Vec<String>,
    },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("payload too large: {message}")]
    PayloadTooLarge { message: String },

    /// Storage or upload failure; `detail` is echoed to the client when set
    #[error("{message}")]
    Backend {
        message: String,
        detail: Option<String>,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Create a bad request error naming the offending fields
    pub fn invalid_fields<I, S>(message: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::BadRequest {
            message: message.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a payload too large error
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::PayloadTooLarge {
            message: message.into(),
        }
    }

    /// Backend failure whose cause stays in the logs
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            detail: None,
        }
    }

    /// Backend failure whose cause is returned in the `error` field
    pub fn backend_with_detail(message: impl Into<String>, detail: impl ToString) -> Self {
        Self::Backend {
            message: message.into(),
            detail: Some(detail.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Backend { .. } | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let status = self.status();

        let body = match self {
            AppError::BadRequest { message, fields } => ErrorBody {
                message,
                error: None,
                fields,
            },
            AppError::NotFound { message } | AppError::PayloadTooLarge { message } => ErrorBody {
                message,
                error: None,
                fields: Vec::new(),
            },
            AppError::Backend { message, detail } => {
                tracing::error!(
                    error_id = %error_id,
                    detail = detail.as_deref().unwrap_or_default(),
                    "{}",
                    message
                );
                ErrorBody {
                    message,
                    error: detail,
                    fields: Vec::new(),
                }
            }
            AppError::Internal(e) => {
                tracing::error!(error_id = %error_id, error = ?e, "internal error");
                // Release builds keep internal causes out of responses
                let message = if cfg!(debug_assertions) {
                    e.to_string()
                } else {
                    "An internal server error occurred".to_string()
                };
                ErrorBody {
                    message,
                    error: None,
                    fields: Vec::new(),
                }
            }
        };

        tracing::warn!(
            error_id = %error_id,
            status_code = %status.as_u16(),
            message = %body.message,
            "request failed"
        );

        (status, Json(body)).into_response()
    }
}
