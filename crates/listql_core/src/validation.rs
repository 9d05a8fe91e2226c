//! Validation message collection for the input hooks.
//!
//! `validateInput` and `validateDelete` hooks never fail on their own; they
//! push messages into a shared [`ValidationErrors`] collector, and the
//! pipeline turns a non-empty collector into one aggregated [`ListError`].

use crate::error::ListError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validation error for a specific field, or for the item as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// The field that failed validation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Human-readable error message.
    pub message: String,
    /// Machine-readable error code.
    pub code: ValidationErrorCode,
}

impl ValidationError {
    /// Creates a field-scoped validation error.
    pub fn field(
        field: impl Into<String>,
        code: ValidationErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
            code,
        }
    }

    /// Creates an item-scoped validation error.
    pub fn item(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
            code: ValidationErrorCode::Custom,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {}", field, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorCode {
    /// Value is required but missing.
    Required,
    /// Value has the wrong type for the field.
    InvalidType,
    /// Custom validation failed.
    Custom,
}

/// Collection of validation errors gathered across one pipeline stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationErrors {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Creates an empty error collection.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Adds an error.
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Adds a custom message for a field.
    pub fn add_field_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(ValidationError::field(
            field,
            ValidationErrorCode::Custom,
            message,
        ));
    }

    /// Adds a custom message for the whole item.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.push(ValidationError::item(message));
    }

    /// Returns true if there are any errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Converts a non-empty collection into one aggregated error.
    ///
    /// Field messages are prefixed with `<listKey>.<fieldPath>`.
    pub fn into_result(self, list_key: &str) -> Result<(), ListError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|e| match &e.field {
                Some(field) => format!("{list_key}.{field}: {}", e.message),
                None => e.message.clone(),
            })
            .collect();
        Err(ListError::validation_failure(&messages))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<_> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}
