//! Storage adapter contract.
//!
//! Lists never touch storage directly; they go through a [`ListAdapter`]
//! obtained from the schema's [`DatabaseAdapter`]. Adapters receive fully
//! translated queries: access filters are already merged into the where-input.

pub mod memory;

use crate::where_clause::WhereInput;
use crate::Item;
use async_trait::async_trait;
use listql_core::ListResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: OrderDirection,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// A translated list query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemsQuery {
    pub filter: WhereInput,
    pub order_by: Vec<OrderBy>,
    pub first: Option<usize>,
    pub skip: usize,
}

impl ItemsQuery {
    /// A query that only filters.
    pub fn filtered(filter: WhereInput) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// Storage operations for one list.
#[async_trait]
pub trait ListAdapter: Send + Sync {
    /// Returns the matching items, in storage order unless sorted.
    async fn items_query(&self, query: &ItemsQuery) -> ListResult<Vec<Item>>;

    /// Counts the items `items_query` would return.
    async fn items_count(&self, query: &ItemsQuery) -> ListResult<usize>;

    /// Inserts an item and returns it with its id.
    async fn create(&self, data: Item) -> ListResult<Item>;

    /// Applies `data` to an item and returns the updated item.
    async fn update(&self, id: &Value, data: Item) -> ListResult<Item>;

    /// Removes an item.
    async fn delete(&self, id: &Value) -> ListResult<()>;
}

/// A database hands out one adapter per list.
pub trait DatabaseAdapter: Send + Sync {
    fn list_adapter(&self, list_key: &str) -> Arc<dyn ListAdapter>;
}
