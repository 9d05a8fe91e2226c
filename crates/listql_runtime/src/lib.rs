//! List runtime for listql.
//!
//! This crate turns declarative list configurations into a GraphQL surface and
//! mediates every read and write against a storage adapter:
//! - `access`: Access rules, evaluation and scopes
//! - `context`: Request-scoped context (session, access evaluator, extensions)
//! - `config`: Declarative schema, list and field configuration
//! - `field`: The field plugin contract and the built-in field types
//! - `hooks`: Lifecycle hooks and the pipeline runner
//! - `list`: The `List` runtime (schema synthesis, access checks, operations)
//! - `registry`: All lists of a schema and the lookup between them
//! - `resolver`: Resolver trait and resolver map
//! - `executor`: Executes selections against the resolver map
//! - `storage`: Storage adapter contract and the in-memory adapter
//! - `where_clause`: Where-input helpers and evaluation

pub mod access;
pub mod config;
pub mod context;
pub mod executor;
pub mod field;
pub mod hooks;
pub mod list;
pub mod registry;
pub mod resolver;
pub mod storage;
pub mod where_clause;

/// A stored item or a mutation payload, keyed by field path.
pub type Item = serde_json::Map<String, serde_json::Value>;

pub use access::{
    AccessDecision, AccessEvaluator, AccessRule, AccessScope, FieldAccess, FieldAccessArgs,
    FieldAccessRule, ListAccess, ListAccessArgs, Operation, RuleEvaluator,
};
pub use config::{FieldConfig, ListConfig, QueryLimits, SchemaConfig};
pub use context::{Context, Extensions};
pub use executor::{Executor, OperationKind, Response, Selection};
pub use field::{Field, FieldGqlContext, FieldImpl, FieldType, FieldTypeRegistry, OutputResolver};
pub use hooks::{FieldHookArgs, FieldHooks, HookArgs, HookStage, ListHooks};
pub use list::{
    AccessTarget, FieldAccessItem, ItemQueryArgs, List, ListExtras, ListQueryArgs, QueryMeta,
    UpdateManyEntry,
};
pub use listql_core::{ErrorCode, GqlNames, ListError, ListResult, ValidationErrors};
pub use registry::{ListLookup, ListRegistry};
pub use resolver::{
    DefaultResolver, ErrorSink, Resolver, ResolverArgs, ResolverEntry, ResolverFuture,
    ResolverInfo, ResolverMap, ResolverResult,
};
pub use storage::{
    memory::{MemoryAdapter, MemoryListAdapter},
    DatabaseAdapter, ItemsQuery, ListAdapter, OrderBy, OrderDirection,
};
