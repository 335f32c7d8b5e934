//! Data models and DTOs (Data Transfer Objects)
//!
//! Contains the request/response structures shared by the API.

pub mod achievement;
pub mod student;

// Re-export commonly used types
pub use achievement::*;
pub use student::*;

use crate::error::{validation_error, AppError};
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Message-only response (no data)
#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// JSON body that has been deserialized and validated.
///
/// Malformed JSON, missing fields, unknown enum values and failed field rules
/// all reject with a 400 `VALIDATION_ERROR`.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            debug!(error = %e, "JSON body rejected");
            AppError::Validation(e.body_text())
        })?;

        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Parse a path id, treating garbage as a bad request
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| validation_error(format!("Invalid {} id", what)))
}

/// Reject text that is empty once surrounding whitespace is removed
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value cannot be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Trim an optional text field, mapping blank input to `None`
pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "user").unwrap(), id);
        assert!(matches!(parse_id("42", "user"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_trimmed() {
        assert_eq!(trimmed(Some("  x ".into())), Some("x".to_string()));
        assert_eq!(trimmed(Some("   ".into())), None);
        assert_eq!(trimmed(None), None);
    }

    #[test]
    fn test_not_blank() {
        assert!(not_blank("Ana").is_ok());
        assert!(not_blank(" \t ").is_err());
        assert!(not_blank("").is_err());
    }
}
