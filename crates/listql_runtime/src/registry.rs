//! The list registry.
//!
//! A [`ListRegistry`] owns every list of a schema. Lists find each other
//! through a [`ListLookup`], which the registry hands out as a weak handle
//! so that lists never keep the registry alive.

use crate::config::SchemaConfig;
use crate::executor::Executor;
use crate::field::FieldTypeRegistry;
use crate::list::{List, ListExtras};
use crate::resolver::{DefaultResolver, ResolverMap};
use crate::storage::DatabaseAdapter;
use indexmap::IndexMap;
use listql_core::{sdl, ListError, ListResult};
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::info;

/// Resolves lists by key.
pub trait ListLookup: Send + Sync {
    fn list_by_key(&self, key: &str) -> Option<Arc<List>>;
}

struct RegistryHandle(Weak<ListRegistry>);

impl ListLookup for RegistryHandle {
    fn list_by_key(&self, key: &str) -> Option<Arc<List>> {
        self.0.upgrade()?.list(key)
    }
}

/// Every list of a schema.
pub struct ListRegistry {
    lists: OnceLock<IndexMap<String, Arc<List>>>,
}

impl ListRegistry {
    /// Builds all lists with the built-in field types.
    pub fn build(config: SchemaConfig, adapter: Arc<dyn DatabaseAdapter>) -> ListResult<Arc<Self>> {
        Self::build_with(config, adapter, FieldTypeRegistry::default())
    }

    /// Builds all lists with a custom field type registry.
    ///
    /// Fails on an invalid list or field, or on a relationship to a list
    /// that is not part of the schema.
    pub fn build_with(
        config: SchemaConfig,
        adapter: Arc<dyn DatabaseAdapter>,
        field_types: FieldTypeRegistry,
    ) -> ListResult<Arc<Self>> {
        let registry = Arc::new(Self {
            lists: OnceLock::new(),
        });
        let extras = ListExtras {
            lists: Arc::new(RegistryHandle(Arc::downgrade(&registry))),
            adapter,
            field_types: Arc::new(field_types),
        };

        let mut lists = IndexMap::with_capacity(config.lists.len());
        for (key, list_config) in config.lists {
            let list = List::new(key.clone(), list_config, extras.clone())?;
            list.init_fields()?;
            lists.insert(key, Arc::new(list));
        }

        for list in lists.values() {
            for field in list.fields() {
                if let Some(target) = field.kind().referenced_list() {
                    if !lists.contains_key(target) {
                        return Err(ListError::config(format!(
                            "Unable to resolve related list '{target}' from {}.{}",
                            list.key(),
                            field.path()
                        )));
                    }
                }
            }
        }

        info!(lists = lists.len(), "list registry built");
        registry
            .lists
            .set(lists)
            .map_err(|_| ListError::system(&["list registry initialised twice".to_string()]))?;
        Ok(registry)
    }

    pub fn list(&self, key: &str) -> Option<Arc<List>> {
        self.lists.get()?.get(key).cloned()
    }

    /// Lists in declaration order.
    pub fn lists(&self) -> impl Iterator<Item = &Arc<List>> {
        self.lists.get().into_iter().flat_map(IndexMap::values)
    }

    pub fn len(&self) -> usize {
        self.lists.get().map_or(0, IndexMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Type definitions of every list, without duplicates, after the
    /// shared `_QueryMeta` type.
    pub fn gql_types(&self) -> Vec<String> {
        let mut types = vec![sdl::object_type(None, "_QueryMeta", &["count: Int".to_string()])];
        for list in self.lists() {
            for ty in list.gql_types() {
                if !types.contains(&ty) {
                    types.push(ty);
                }
            }
        }
        types
    }

    /// The complete schema document.
    pub fn print_schema(&self) -> String {
        let mut blocks = self.gql_types();
        let queries: Vec<String> = self.lists().flat_map(|list| list.gql_queries()).collect();
        if !queries.is_empty() {
            blocks.push(sdl::object_type(None, "Query", &queries));
        }
        let mutations: Vec<String> = self.lists().flat_map(|list| list.gql_mutations()).collect();
        if !mutations.is_empty() {
            blocks.push(sdl::object_type(None, "Mutation", &mutations));
        }
        let mut schema = blocks.join("\n\n");
        schema.push('\n');
        schema
    }

    /// Resolvers of every list.
    pub fn resolvers(&self) -> ResolverMap {
        let mut map = ResolverMap::new();
        map.register("_QueryMeta", "count", None, Arc::new(DefaultResolver));
        for list in self.lists() {
            map.merge(list.gql_field_resolvers());
            map.merge(list.gql_query_resolvers());
            map.merge(list.gql_mutation_resolvers());
        }
        map
    }

    pub fn executor(&self) -> Executor {
        Executor::new(self.resolvers())
    }
}

impl ListLookup for ListRegistry {
    fn list_by_key(&self, key: &str) -> Option<Arc<List>> {
        self.list(key)
    }
}

impl fmt::Debug for ListRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListRegistry")
            .field("lists", &self.lists().map(|list| list.key()).collect::<Vec<_>>())
            .finish()
    }
}
