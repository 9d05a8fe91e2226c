//! Declarative schema configuration.
//!
//! Configurations deserialize from JSON and can also be built in code.
//! Hooks and access functions are code-only:
//!
//! ```
//! use listql_runtime::{FieldConfig, ListConfig, SchemaConfig};
//!
//! let schema = SchemaConfig::new()
//!     .list(
//!         "Post",
//!         ListConfig::new()
//!             .field("title", FieldConfig::text().required())
//!             .field("author", FieldConfig::relationship("User")),
//!     )
//!     .list("User", ListConfig::new().field("name", FieldConfig::text()));
//! assert_eq!(schema.lists.len(), 2);
//! ```

use crate::access::{FieldAccess, ListAccess};
use crate::hooks::{FieldHooks, ListHooks};
use indexmap::IndexMap;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// All lists of a schema, in declaration order.
#[derive(Clone, Default, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub lists: IndexMap<String, ListConfig>,
}

impl SchemaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a list.
    #[must_use]
    pub fn list(mut self, key: impl Into<String>, config: ListConfig) -> Self {
        self.lists.insert(key.into(), config);
        self
    }

    /// Parses a JSON schema document.
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }
}

impl fmt::Debug for SchemaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaConfig")
            .field("lists", &self.lists.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Query limits of a list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLimits {
    /// Upper bound on the number of items a list query may return.
    pub max_results: Option<usize>,
}

/// Configuration of one list.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListConfig {
    /// Fields in declaration order. Duplicate paths are rejected at build.
    #[serde(default, deserialize_with = "ordered_fields")]
    pub fields: Vec<(String, FieldConfig)>,
    #[serde(default)]
    pub access: ListAccess,
    pub plural: Option<String>,
    pub description: Option<String>,
    /// Field matched by the `search` argument. Defaults to `name`.
    pub search_field: Option<String>,
    #[serde(default)]
    pub query_limits: QueryLimits,
    #[serde(skip)]
    pub hooks: Option<Arc<dyn ListHooks>>,
}

impl ListConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, path: impl Into<String>, config: FieldConfig) -> Self {
        self.fields.push((path.into(), config));
        self
    }

    #[must_use]
    pub fn access(mut self, access: ListAccess) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = Some(plural.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn search_field(mut self, path: impl Into<String>) -> Self {
        self.search_field = Some(path.into());
        self
    }

    #[must_use]
    pub fn max_results(mut self, limit: usize) -> Self {
        self.query_limits.max_results = Some(limit);
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: impl ListHooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }
}

impl fmt::Debug for ListConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListConfig")
            .field("fields", &self.fields)
            .field("access", &self.access)
            .field("plural", &self.plural)
            .field("description", &self.description)
            .field("search_field", &self.search_field)
            .field("query_limits", &self.query_limits)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

fn ordered_fields<'de, D>(deserializer: D) -> Result<Vec<(String, FieldConfig)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct FieldsVisitor;

    impl<'de> Visitor<'de> for FieldsVisitor {
        type Value = Vec<(String, FieldConfig)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of field paths to field configs")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut fields = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                fields.push(entry);
            }
            Ok(fields)
        }
    }

    deserializer.deserialize_map(FieldsVisitor)
}

/// Configuration of one field.
///
/// Keys other than the common ones below are type-specific options, e.g.
/// `ref` and `many` for relationships.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub access: FieldAccess,
    pub default_value: Option<Value>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(flatten)]
    pub options: Map<String, Value>,
    #[serde(skip)]
    pub hooks: Option<Arc<dyn FieldHooks>>,
}

impl FieldConfig {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            access: FieldAccess::default(),
            default_value: None,
            is_required: false,
            options: Map::new(),
            hooks: None,
        }
    }

    pub fn id() -> Self {
        Self::new("Id")
    }

    pub fn text() -> Self {
        Self::new("Text")
    }

    pub fn integer() -> Self {
        Self::new("Integer")
    }

    pub fn checkbox() -> Self {
        Self::new("Checkbox")
    }

    /// A to-one relationship.
    pub fn relationship(ref_list: impl Into<String>) -> Self {
        Self::new("Relationship").option("ref", Value::String(ref_list.into()))
    }

    /// A to-many relationship.
    pub fn relationship_many(ref_list: impl Into<String>) -> Self {
        Self::relationship(ref_list).option("many", Value::Bool(true))
    }

    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn access(mut self, access: FieldAccess) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: impl FieldHooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    pub fn option_bool(&self, key: &str) -> bool {
        self.options.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("type_name", &self.type_name)
            .field("access", &self.access)
            .field("default_value", &self.default_value)
            .field("is_required", &self.is_required)
            .field("options", &self.options)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}
