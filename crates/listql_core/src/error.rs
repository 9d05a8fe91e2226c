//! Strongly typed error system for listql.
//!
//! Every error a list operation can surface carries a stable [`ErrorCode`],
//! a human-readable message, optional client-visible `data`, and optional
//! `internal_data` that is never rendered into a client response.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

/// Typed error codes exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    /// List-level or field-level authorization failure.
    AccessDenied,
    /// One or more validation hooks rejected the input.
    ValidationError,
    /// A relationship input referenced an unusable item.
    RelationshipError,
    /// Unexpected internal failure.
    SystemError,
    /// Failure surfaced by the storage adapter.
    StorageError,
    /// Malformed query arguments.
    UserInputError,
    /// A query returned more results than the list allows.
    LimitsExceeded,
    /// The schema configuration cannot be built.
    ConfigError,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "ACCESS_DENIED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::RelationshipError => "RELATIONSHIP_ERROR",
            Self::SystemError => "SYSTEM_ERROR",
            Self::StorageError => "STORAGE_ERROR",
            Self::UserInputError => "USER_INPUT_ERROR",
            Self::LimitsExceeded => "LIMITS_EXCEEDED",
            Self::ConfigError => "CONFIG_ERROR",
        }
    }

    /// Returns true if the caller can fix the request and retry.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::AccessDenied
                | Self::ValidationError
                | Self::RelationshipError
                | Self::UserInputError
                | Self::LimitsExceeded
        )
    }

    /// Returns true if this is a server error (5xx equivalent).
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::SystemError | Self::StorageError | Self::ConfigError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A segment of a response path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object key.
    Field(String),
    /// List index.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        Self::Field(s.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        Self::Field(s)
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

const ACCESS_DENIED_MESSAGE: &str = "You do not have access to this resource";

/// Operation kind reported in field restriction errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictionKind {
    /// Restricted read.
    Query,
    /// Restricted write.
    Mutation,
}

/// Error returned by every list operation.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("[{code}] {message}")]
pub struct ListError {
    /// Typed error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Structured data visible to the client.
    pub data: Option<Value>,
    /// Diagnostic context that must never reach the client.
    pub internal_data: Option<Value>,
}

impl ListError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
            internal_data: None,
        }
    }

    /// Attaches client-visible data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attaches internal-only diagnostic data.
    pub fn with_internal_data(mut self, data: Value) -> Self {
        self.internal_data = Some(data);
        self
    }

    /// Generic access denial. Carries no detail about why.
    pub fn access_denied() -> Self {
        Self::new(ErrorCode::AccessDenied, ACCESS_DENIED_MESSAGE)
    }

    /// Access denial caused by restricted fields.
    pub fn field_access_denied(
        restricted_fields: Vec<String>,
        target: impl Into<String>,
        kind: RestrictionKind,
        internal_data: Value,
    ) -> Self {
        Self::access_denied()
            .with_data(json!({
                "restrictedFields": restricted_fields,
                "target": target.into(),
                "type": kind,
            }))
            .with_internal_data(internal_data)
    }

    /// Aggregated validation failure.
    pub fn validation_failure(messages: &[String]) -> Self {
        Self::new(
            ErrorCode::ValidationError,
            format!(
                "You provided invalid data for this operation.\n{}",
                bullet_list(messages)
            ),
        )
    }

    /// Relationship resolution failure.
    pub fn relationship(messages: &[String]) -> Self {
        Self::new(
            ErrorCode::RelationshipError,
            format!("Relationship error:\n{}", bullet_list(messages)),
        )
    }

    /// Unexpected internal failure.
    pub fn system(messages: &[String]) -> Self {
        Self::new(
            ErrorCode::SystemError,
            format!("System error:\n{}", bullet_list(messages)),
        )
    }

    /// Error surfaced by the storage adapter.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::new(ErrorCode::StorageError, format!("Storage error: {message}"))
    }

    /// Malformed user input.
    pub fn user_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UserInputError, message)
    }

    /// The `maxResults` limit of a list was exceeded.
    pub fn max_results_exceeded(list_key: &str, limit: usize) -> Self {
        Self::new(
            ErrorCode::LimitsExceeded,
            format!(
                "Your request exceeded server limits. '{list_key}' has maxResults limit of {limit}"
            ),
        )
    }

    /// Schema construction failure.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Returns true if this is an access denial.
    pub fn is_access_denied(&self) -> bool {
        self.code == ErrorCode::AccessDenied
    }

    /// Restricted field paths, if this is a field access denial.
    pub fn restricted_fields(&self) -> Vec<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.get("restrictedFields"))
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Renders the client-facing GraphQL error object.
    ///
    /// `internal_data` is deliberately absent from the output.
    pub fn to_graphql_error(&self, path: &[PathSegment]) -> Value {
        let mut extensions = Map::new();
        extensions.insert("code".into(), json!(self.code));
        if let Some(data) = &self.data {
            extensions.insert("data".into(), data.clone());
        }

        let mut error = Map::new();
        error.insert("message".into(), json!(self.message));
        if !path.is_empty() {
            error.insert("path".into(), json!(path));
        }
        error.insert("extensions".into(), Value::Object(extensions));
        Value::Object(error)
    }
}

impl Serialize for ListError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_graphql_error(&[]).serialize(serializer)
    }
}

fn bullet_list(messages: &[String]) -> String {
    messages
        .iter()
        .map(|m| format!("  - {m}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Type alias for list operation results.
pub type ListResult<T> = std::result::Result<T, ListError>;

/// Result extension for mapping foreign errors at the storage seam.
pub trait ResultExt<T> {
    /// Maps the error to a storage error.
    fn map_storage_err(self) -> ListResult<T>;

    /// Maps the error to a system error.
    fn map_system_err(self) -> ListResult<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn map_storage_err(self) -> ListResult<T> {
        self.map_err(ListError::storage)
    }

    fn map_system_err(self) -> ListResult<T> {
        self.map_err(|e| ListError::system(&[e.to_string()]))
    }
}
