//! Resolver system.
//!
//! Lists expose their queries, mutations and output fields as resolvers
//! keyed by `"TypeName.fieldName"`. The [`crate::Executor`] looks them up
//! while walking a selection.

use crate::context::Context;
use crate::Item;
use listql_core::{ListError, PathSegment};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Arguments passed to a resolver.
#[derive(Debug, Clone, Default)]
pub struct ResolverArgs {
    args: Item,
}

impl ResolverArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(args: Item) -> Self {
        Self { args }
    }

    /// Gets an argument by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Gets a required argument, failing with a user input error.
    pub fn require<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, ListError> {
        let value = self
            .args
            .get(name)
            .ok_or_else(|| ListError::user_input(format!("Missing required argument: {name}")))?;
        serde_json::from_value(value.clone()).map_err(|e| {
            ListError::user_input(format!("Failed to parse argument '{name}': {e}"))
        })
    }

    /// Returns all arguments.
    pub fn all(&self) -> &Item {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.args.insert(name.into(), value);
    }
}

/// An error raised below a resolver's own path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathError {
    pub path: Vec<PathSegment>,
    pub error: ListError,
}

/// Collects errors that do not fail the whole field, such as one failed
/// item of a many-mutation.
#[derive(Debug, Clone, Default)]
pub struct ErrorSink(Arc<Mutex<Vec<PathError>>>);

impl ErrorSink {
    pub async fn push(&self, path: Vec<PathSegment>, error: ListError) {
        self.0.lock().await.push(PathError { path, error });
    }

    pub async fn take(&self) -> Vec<PathError> {
        std::mem::take(&mut *self.0.lock().await)
    }
}

/// Info about the field being resolved.
#[derive(Debug, Clone, Default)]
pub struct ResolverInfo {
    /// The field name being resolved.
    pub field_name: String,

    /// The object type of the result, if it has sub-fields.
    pub return_type: Option<String>,

    /// The parent type name.
    pub parent_type: String,

    /// Path to this field.
    pub path: Vec<PathSegment>,

    /// Selected sub-fields.
    pub selected_fields: Vec<String>,

    /// Sink for errors below this field.
    pub errors: ErrorSink,
}

impl ResolverInfo {
    pub fn new(field_name: impl Into<String>, parent_type: impl Into<String>) -> Self {
        let field_name = field_name.into();
        Self {
            path: vec![PathSegment::Field(field_name.clone())],
            field_name,
            parent_type: parent_type.into(),
            ..Self::default()
        }
    }

    pub fn with_return_type(mut self, ty: impl Into<String>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    pub fn with_selected_fields(mut self, fields: Vec<String>) -> Self {
        self.selected_fields = fields;
        self
    }

    pub fn with_errors(mut self, errors: ErrorSink) -> Self {
        self.errors = errors;
        self
    }

    /// Returns true if `field` is among the selected sub-fields.
    pub fn selects(&self, field: &str) -> bool {
        self.selected_fields.iter().any(|f| f == field)
    }

    /// The path of one element of this field's list result.
    pub fn index_path(&self, index: usize) -> Vec<PathSegment> {
        let mut path = self.path.clone();
        path.push(PathSegment::Index(index));
        path
    }
}

/// Result type for resolvers.
pub type ResolverResult = Result<Value, ListError>;

/// Future type for async resolvers.
pub type ResolverFuture<'a> = Pin<Box<dyn Future<Output = ResolverResult> + Send + 'a>>;

/// Trait for field resolvers.
pub trait Resolver: Send + Sync {
    /// Resolves a field value.
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a>;
}

/// Returns the parent's property named like the field.
pub struct DefaultResolver;

impl Resolver for DefaultResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        _args: &'a ResolverArgs,
        _ctx: &'a Context,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        let result = match parent {
            Value::Object(map) => Ok(map.get(&info.field_name).cloned().unwrap_or(Value::Null)),
            Value::Null => Ok(Value::Null),
            _ => Err(ListError::system(&[format!(
                "cannot read '{}' from a non-object value",
                info.field_name
            )])),
        };
        Box::pin(async move { result })
    }
}

/// A registered resolver.
#[derive(Clone)]
pub struct ResolverEntry {
    pub resolver: Arc<dyn Resolver>,
    /// Object type of the result, for nested selections.
    pub return_type: Option<String>,
}

/// Storage for resolvers organized by type and field.
#[derive(Clone, Default)]
pub struct ResolverMap {
    /// Resolvers indexed by "TypeName.fieldName".
    resolvers: HashMap<String, ResolverEntry>,
}

impl ResolverMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver for a specific type and field.
    pub fn register(
        &mut self,
        type_name: &str,
        field_name: &str,
        return_type: Option<String>,
        resolver: Arc<dyn Resolver>,
    ) {
        self.resolvers.insert(
            format!("{type_name}.{field_name}"),
            ResolverEntry {
                resolver,
                return_type,
            },
        );
    }

    /// Gets the resolver for a type and field.
    pub fn get(&self, type_name: &str, field_name: &str) -> Option<&ResolverEntry> {
        self.resolvers.get(&format!("{type_name}.{field_name}"))
    }

    pub fn contains(&self, type_name: &str, field_name: &str) -> bool {
        self.get(type_name, field_name).is_some()
    }

    /// Registered field names of a type, sorted.
    pub fn fields_of(&self, type_name: &str) -> Vec<&str> {
        let prefix = format!("{type_name}.");
        let mut fields: Vec<&str> = self
            .resolvers
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .collect();
        fields.sort_unstable();
        fields
    }

    /// Adds every resolver of `other`, replacing duplicates.
    pub fn merge(&mut self, other: ResolverMap) {
        self.resolvers.extend(other.resolvers);
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl Debug for ResolverMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.resolvers.keys().collect();
        keys.sort();
        f.debug_struct("ResolverMap").field("resolvers", &keys).finish()
    }
}
