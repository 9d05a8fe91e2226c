//! The list runtime.
//!
//! A [`List`] owns one list's configuration, its fields, and its storage
//! adapter. It synthesizes the list's GraphQL surface, enforces access
//! control, and runs queries and mutations through the hook pipeline.
//!
//! - `schema`: GraphQL type, query and mutation fragments
//! - `access`: list, field and item-level access checks
//! - `operations`: queries and mutations
//! - `pipeline`: the mutation hook pipeline
//! - `resolvers`: resolver maps for the executor

mod access;
mod operations;
mod pipeline;
mod resolvers;
mod schema;

pub use access::{AccessTarget, FieldAccessItem};
pub use operations::{ItemQueryArgs, ListQueryArgs, QueryMeta, UpdateManyEntry};
pub use schema::filter_fragment;

use crate::access::ListAccess;
use crate::config::{FieldConfig, ListConfig, QueryLimits};
use crate::field::{Field, FieldTypeRegistry};
use crate::hooks::ListHooks;
use crate::registry::ListLookup;
use crate::storage::{DatabaseAdapter, ListAdapter};
use listql_core::{GqlNames, ListError, ListResult};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Collaborators a list is constructed with.
#[derive(Clone)]
pub struct ListExtras {
    /// Resolves other lists by key, for relationships.
    pub lists: Arc<dyn ListLookup>,
    pub adapter: Arc<dyn DatabaseAdapter>,
    pub field_types: Arc<FieldTypeRegistry>,
}

struct FieldSet {
    fields: Vec<Field>,
    by_path: FxHashMap<String, usize>,
}

/// A list.
pub struct List {
    key: String,
    gql_names: GqlNames,
    description: Option<String>,
    access: ListAccess,
    hooks: Option<Arc<dyn ListHooks>>,
    field_configs: Vec<(String, FieldConfig)>,
    fields: OnceLock<FieldSet>,
    search_field: Option<String>,
    query_limits: QueryLimits,
    adapter: Arc<dyn ListAdapter>,
    lists: Arc<dyn ListLookup>,
    field_types: Arc<FieldTypeRegistry>,
}

impl List {
    /// Creates a list. Fields are instantiated by [`List::init_fields`].
    ///
    /// Fails if the list's plural equals its key.
    pub fn new(key: impl Into<String>, config: ListConfig, extras: ListExtras) -> ListResult<Self> {
        let key = key.into();
        let gql_names = GqlNames::derive(&key, config.plural.as_deref())?;
        debug!(list = %key, query = %gql_names.list_query_name, "list created");
        Ok(Self {
            adapter: extras.adapter.list_adapter(&key),
            key,
            gql_names,
            description: config.description,
            access: config.access,
            hooks: config.hooks,
            field_configs: config.fields,
            fields: OnceLock::new(),
            search_field: config.search_field,
            query_limits: config.query_limits,
            lists: extras.lists,
            field_types: extras.field_types,
        })
    }

    /// Instantiates the configured fields in declaration order.
    ///
    /// An `id` field is added first unless one is declared. Fails on a
    /// second call, a duplicate path, or an unknown field type.
    pub fn init_fields(&self) -> ListResult<()> {
        let already = || ListError::config(format!("Fields of list '{}' are already initialised", self.key));
        if self.fields.get().is_some() {
            return Err(already());
        }

        let implicit_id = (!self.field_configs.iter().any(|(path, _)| path == "id"))
            .then(|| ("id".to_string(), FieldConfig::id()));
        let mut fields = Vec::with_capacity(self.field_configs.len() + 1);
        let mut by_path = FxHashMap::default();
        for (path, config) in implicit_id.iter().chain(&self.field_configs) {
            if by_path.contains_key(path) {
                return Err(ListError::config(format!(
                    "Duplicate field path '{path}' in list '{}'",
                    self.key
                )));
            }
            let field_impl = self
                .field_types
                .instantiate(config)
                .map_err(|e| ListError::config(format!("{}.{path}: {}", self.key, e.message)))?;
            by_path.insert(path.clone(), fields.len());
            fields.push(Field::new(&self.key, path, config, field_impl));
        }

        debug!(list = %self.key, fields = fields.len(), "fields initialised");
        self.fields
            .set(FieldSet { fields, by_path })
            .map_err(|_| already())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn gql_names(&self) -> &GqlNames {
        &self.gql_names
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn access(&self) -> &ListAccess {
        &self.access
    }

    /// Fields in declaration order; empty before `init_fields`.
    pub fn fields(&self) -> &[Field] {
        self.fields.get().map_or(&[][..], |set| set.fields.as_slice())
    }

    pub fn field(&self, path: &str) -> Option<&Field> {
        let set = self.fields.get()?;
        set.by_path.get(path).map(|&index| &set.fields[index])
    }

    pub fn hooks(&self) -> Option<&dyn ListHooks> {
        self.hooks.as_deref()
    }

    pub fn adapter(&self) -> &Arc<dyn ListAdapter> {
        &self.adapter
    }

    pub fn lists(&self) -> &Arc<dyn ListLookup> {
        &self.lists
    }

    pub fn query_limits(&self) -> QueryLimits {
        self.query_limits
    }

    /// The field `search` matches against: the configured one, else `name`.
    pub fn search_field(&self) -> Option<&str> {
        match &self.search_field {
            Some(path) => Some(path.as_str()),
            None => self.field("name").map(Field::path),
        }
    }

    /// Fields whose read access is not statically denied.
    pub fn readable_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields()
            .iter()
            .filter(|field| field.access().read.may_allow())
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("key", &self.key)
            .field("access", &self.access)
            .field("fields", &self.fields())
            .finish_non_exhaustive()
    }
}
