//! Field plugin contract and the built-in field types.
//!
//! A field type contributes GraphQL fragments (output fields, filter inputs,
//! create and update inputs, auxiliary types), optional output resolvers, and
//! lifecycle hooks. Types are instantiated by name through a
//! [`FieldTypeRegistry`].

mod checkbox;
mod id;
mod integer;
mod relationship;
mod text;

pub use checkbox::Checkbox;
pub use id::Id;
pub use integer::Integer;
pub use relationship::Relationship;
pub use text::Text;

use crate::access::FieldAccess;
use crate::config::FieldConfig;
use crate::hooks::{FieldHookArgs, FieldHooks};
use crate::registry::ListLookup;
use crate::resolver::Resolver;
use listql_core::{ListError, ListResult, ValidationErrorCode, ValidationErrors};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// What a field type needs to render its schema fragments.
#[derive(Clone, Copy)]
pub struct FieldGqlContext<'a> {
    pub path: &'a str,
    pub list_key: &'a str,
    pub lists: &'a Arc<dyn ListLookup>,
}

/// A custom resolver for one output field.
#[derive(Clone)]
pub struct OutputResolver {
    pub field_name: String,
    /// Object type of the resolved value, for nested selections.
    pub return_type: Option<String>,
    pub resolver: Arc<dyn Resolver>,
}

impl fmt::Debug for OutputResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputResolver")
            .field("field_name", &self.field_name)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

/// A field type.
pub trait FieldType: FieldHooks + fmt::Debug {
    /// The name the type is registered under.
    fn type_name(&self) -> &'static str;

    fn gql_output_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String>;

    /// Filter inputs contributed to the list's where-input.
    fn gql_query_input_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String>;

    fn gql_create_input_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String>;

    fn gql_update_input_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        self.gql_create_input_fields(cx)
    }

    /// Extra types this field needs in the schema.
    fn gql_aux_types(&self, _cx: &FieldGqlContext<'_>) -> Vec<String> {
        Vec::new()
    }

    /// Custom output resolvers. Empty means the stored value is returned.
    fn gql_output_field_resolvers(&self, _cx: &FieldGqlContext<'_>) -> Vec<OutputResolver> {
        Vec::new()
    }

    fn default_value(&self) -> Option<Value> {
        None
    }

    /// Whether the field appears in the sort enum and order-by input.
    fn is_orderable(&self) -> bool {
        false
    }

    /// The list this field points at, for relationship types.
    fn referenced_list(&self) -> Option<&str> {
        None
    }
}

/// An instantiated field type, usable both as a type and as hooks.
#[derive(Clone)]
pub struct FieldImpl {
    kind: Arc<dyn FieldType>,
    hooks: Arc<dyn FieldHooks>,
}

impl FieldImpl {
    pub fn new<T: FieldType + 'static>(field_type: T) -> Self {
        let field_type = Arc::new(field_type);
        Self {
            kind: field_type.clone(),
            hooks: field_type,
        }
    }
}

/// Builds a field type from its configuration.
pub type FieldTypeFactory = Arc<dyn Fn(&FieldConfig) -> ListResult<FieldImpl> + Send + Sync>;

/// Field types by name.
#[derive(Clone)]
pub struct FieldTypeRegistry {
    factories: FxHashMap<String, FieldTypeFactory>,
}

impl FieldTypeRegistry {
    /// A registry without any types.
    pub fn empty() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }

    /// A registry with `Id`, `Text`, `Integer`, `Checkbox` and `Relationship`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("Id", |_| Ok(FieldImpl::new(Id)));
        registry.register("Text", |_| Ok(FieldImpl::new(Text)));
        registry.register("Integer", |_| Ok(FieldImpl::new(Integer)));
        registry.register("Checkbox", |_| Ok(FieldImpl::new(Checkbox)));
        registry.register("Relationship", |config| {
            Relationship::from_config(config).map(FieldImpl::new)
        });
        registry
    }

    /// Registers a type, replacing any type of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&FieldConfig) -> ListResult<FieldImpl> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn instantiate(&self, config: &FieldConfig) -> ListResult<FieldImpl> {
        let factory = self.factories.get(&config.type_name).ok_or_else(|| {
            ListError::config(format!("Unknown field type '{}'", config.type_name))
        })?;
        factory(config)
    }
}

impl Default for FieldTypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FieldTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("FieldTypeRegistry")
            .field("types", &names)
            .finish()
    }
}

/// A field of a list.
pub struct Field {
    path: String,
    list_key: String,
    kind: Arc<dyn FieldType>,
    hooks: Vec<Arc<dyn FieldHooks>>,
    access: FieldAccess,
    default_value: Option<Value>,
    is_required: bool,
}

impl Field {
    pub fn new(list_key: &str, path: &str, config: &FieldConfig, field_impl: FieldImpl) -> Self {
        let mut hooks = vec![field_impl.hooks];
        hooks.extend(config.hooks.clone());
        Self {
            path: path.to_string(),
            list_key: list_key.to_string(),
            default_value: config
                .default_value
                .clone()
                .or_else(|| field_impl.kind.default_value()),
            kind: field_impl.kind,
            hooks,
            access: config.access.clone(),
            is_required: config.is_required,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn list_key(&self) -> &str {
        &self.list_key
    }

    pub fn kind(&self) -> &dyn FieldType {
        self.kind.as_ref()
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn access(&self) -> &FieldAccess {
        &self.access
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.is_required
    }

    /// The type's hooks followed by the configured hooks.
    pub fn hooks(&self) -> impl Iterator<Item = &dyn FieldHooks> {
        self.hooks.iter().map(|hooks| hooks.as_ref())
    }

    /// Adds a `Required` error if the resolved value is missing.
    ///
    /// Creates must provide a value; updates may omit the field but not
    /// set it to null.
    pub(crate) fn check_required(&self, args: &FieldHookArgs<'_>, errors: &mut ValidationErrors) {
        if !self.is_required {
            return;
        }
        let missing = match args.value() {
            None => args.existing_item.is_none(),
            Some(value) => value.is_null(),
        };
        if missing {
            errors.push(listql_core::ValidationError::field(
                &self.path,
                ValidationErrorCode::Required,
                format!("Required field \"{}\" is null or undefined.", self.path),
            ));
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("path", &self.path)
            .field("list_key", &self.list_key)
            .field("kind", &self.kind)
            .field("access", &self.access)
            .field("is_required", &self.is_required)
            .finish_non_exhaustive()
    }
}

/// Adds an `InvalidType` error unless the value is null or passes `check`.
pub(crate) fn expect_type(
    args: &FieldHookArgs<'_>,
    errors: &mut ValidationErrors,
    expected: &str,
    check: impl Fn(&Value) -> bool,
) {
    if let Some(value) = args.value() {
        if !value.is_null() && !check(value) {
            errors.push(listql_core::ValidationError::field(
                args.field_path,
                ValidationErrorCode::InvalidType,
                format!("Expected {expected} but received {value}"),
            ));
        }
    }
}
