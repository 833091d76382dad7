use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Order has already been refunded")]
    AlreadyRefunded,

    #[error("Webhook signature verification failed")]
    SignatureVerificationFailed,

    #[error("Unhandled payment status: {0}")]
    UnhandledGatewayStatus(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Refund limit exceeded: {0}")]
    RefundLimitExceeded(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-checkable error kind, returned in the response body
    /// so clients can branch without parsing the human message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::PreconditionFailed(_) => "precondition_failed",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::AlreadyRefunded => "already_refunded",
            AppError::SignatureVerificationFailed => "signature_verification_failed",
            AppError::UnhandledGatewayStatus(_) => "unhandled_gateway_status",
            AppError::GatewayUnavailable(_) => "gateway_unavailable",
            AppError::RefundLimitExceeded(_) => "refund_limit_exceeded",
            AppError::Conflict(_) => "conflict",
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "database_error",
            AppError::Json(_) => "invalid_json",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_)
            | AppError::PreconditionFailed(_)
            | AppError::InvalidTransition(_)
            | AppError::AlreadyRefunded
            | AppError::SignatureVerificationFailed
            | AppError::UnhandledGatewayStatus(_)
            | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::RefundLimitExceeded(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Infra failures log server-side and hide details from the client.
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                None
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                None
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                None
            }
            other => Some(other.to_string()),
        };

        let body = ErrorResponse {
            error: self.kind(),
            message,
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Helper for converting `Option` lookups into `NotFound` errors.
pub trait OptionExt<T> {
    fn or_not_found(self, what: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, what: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(what.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
