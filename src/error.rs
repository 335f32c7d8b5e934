//! Error handling module
//!
//! Provides unified error types and handling for the entire application.

use crate::auth::TokenError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    Expired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: String,
}

/// Every token rejection looks the same from the outside.
const TOKEN_REJECTED: &str = "Invalid or expired token";

impl AppError {
    /// HTTP status this error maps to at the request boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_)
            | AppError::InvalidToken(_)
            | AppError::Expired
            | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateKey(_)
            | AppError::Validation(_)
            | AppError::PolicyViolation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Internal(_)
            | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::InvalidToken(_) | AppError::Expired => "INVALID_TOKEN",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::DuplicateKey(_) => "DUPLICATE_KEY",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::PolicyViolation(_) => "POLICY_VIOLATION",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Internal(_)
            | AppError::Config(_) => "INTERNAL_ERROR",
        }
    }

    /// Message that is safe to hand to the client
    fn public_message(&self) -> String {
        match self {
            AppError::Unauthenticated(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::DuplicateKey(msg)
            | AppError::Validation(msg)
            | AppError::PolicyViolation(msg) => msg.clone(),
            AppError::InvalidToken(_) | AppError::Expired => TOKEN_REJECTED.to_string(),
            AppError::InvalidCredentials => "Invalid username or password".to_string(),
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Internal(_)
            | AppError::Config(_) => "An internal error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(e) => error!("Database error: {:?}", e),
            AppError::Pool(e) => error!("Pool error: {:?}", e),
            AppError::Internal(msg) => error!("Internal error: {}", msg),
            AppError::Config(msg) => error!("Configuration error: {}", msg),
            AppError::InvalidToken(reason) => warn!("Rejected token: {}", reason),
            AppError::Expired => debug!("Rejected expired token"),
            AppError::Forbidden(msg) => warn!("Forbidden: {}", msg),
            AppError::PolicyViolation(msg) => warn!("Policy violation: {}", msg),
            _ => debug!("Request failed: {}", self),
        }

        let body = Json(ErrorResponse {
            success: false,
            message: self.public_message(),
            code: self.code().to_string(),
        });

        (self.status_code(), body).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::Expired,
            TokenError::InvalidSignature => AppError::InvalidToken("signature mismatch".to_string()),
            TokenError::Malformed(reason) => AppError::InvalidToken(reason),
            TokenError::Encoding(reason) => {
                AppError::Internal(format!("Failed to sign token: {}", reason))
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create a validation error
pub fn validation_error(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

/// Helper function to create a not found error
pub fn not_found_error(msg: impl Into<String>) -> AppError {
    AppError::NotFound(msg.into())
}

/// Helper function to create a duplicate key error
pub fn duplicate_key_error(msg: impl Into<String>) -> AppError {
    AppError::DuplicateKey(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_token_failures_are_indistinguishable() {
        let (s1, b1) = body_json(AppError::from(TokenError::Expired)).await;
        let (s2, b2) = body_json(AppError::from(TokenError::InvalidSignature)).await;
        let (s3, b3) = body_json(AppError::from(TokenError::Malformed("bad base64".into()))).await;

        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s1, s2);
        assert_eq!(s2, s3);
        assert_eq!(b1, b2);
        assert_eq!(b2, b3);
    }

    #[tokio::test]
    async fn test_internal_details_are_not_exposed() {
        let (status, body) = body_json(AppError::Internal("pool at 10.0.0.3 refused".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An internal error occurred");
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert!(!body.to_string().contains("10.0.0.3"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Unauthenticated("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::DuplicateKey("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::PolicyViolation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
    }
}
