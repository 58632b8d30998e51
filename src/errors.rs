use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub errors: Vec<FieldError>,
}

impl ValidationFailure {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{}", joined)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("VALIDATION_FAILED: {0}")]
    Validation(ValidationFailure),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("CONFLICT: {0}")]
    Conflict(String),
    #[error("SERVER_ERROR: {0}")]
    Server(String),
    #[error("NETWORK_FAILURE: {0}")]
    Network(String),
    #[error("DECODE_FAILED: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            404 => Self::NotFound(message),
            400..=499 => Self::Conflict(message),
            _ => Self::Server(message),
        }
    }

    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::Validation(ValidationFailure::new(errors))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::{ApiError, FieldError, ValidationFailure};

    #[test]
    fn status_classes_map_to_failure_kinds() {
        assert!(matches!(
            ApiError::from_status(404, "gone".to_string()),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(409, "illegal transition".to_string()),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from_status(422, "negative quantity".to_string()),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from_status(500, "boom".to_string()),
            ApiError::Server(_)
        ));
    }

    #[test]
    fn validation_failure_lists_every_field() {
        let failure = ValidationFailure::new(vec![
            FieldError::new("title", "is required"),
            FieldError::new("estimatedHours", "must be >= 0"),
        ]);
        let rendered = ApiError::Validation(failure).to_string();
        assert!(rendered.contains("title"));
        assert!(rendered.contains("estimatedHours"));
    }
}
