//! In-memory storage.
//!
//! Items are kept in insertion order and receive sequential numeric ids.
//! Filters are evaluated with [`crate::where_clause::matches`], so
//! relationship filters that need another list's items are not supported.

use super::{DatabaseAdapter, ItemsQuery, ListAdapter, OrderDirection};
use crate::where_clause::{compare_values, id_key, matches};
use crate::Item;
use async_trait::async_trait;
use indexmap::IndexMap;
use listql_core::{ListError, ListResult};
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::RwLock as AsyncRwLock;
use tracing::debug;

/// An in-memory database.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    lists: RwLock<FxHashMap<String, Arc<MemoryListAdapter>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store of a list, creating it on first use.
    pub fn list(&self, list_key: &str) -> Arc<MemoryListAdapter> {
        if let Some(list) = self
            .lists
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(list_key)
        {
            return Arc::clone(list);
        }
        let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            lists
                .entry(list_key.to_string())
                .or_insert_with(|| Arc::new(MemoryListAdapter::new(list_key))),
        )
    }
}

impl DatabaseAdapter for MemoryAdapter {
    fn list_adapter(&self, list_key: &str) -> Arc<dyn ListAdapter> {
        self.list(list_key)
    }
}

#[derive(Debug, Default)]
struct Store {
    next_id: u64,
    items: IndexMap<String, Item>,
}

/// In-memory storage for one list.
#[derive(Debug)]
pub struct MemoryListAdapter {
    list_key: String,
    store: AsyncRwLock<Store>,
}

impl MemoryListAdapter {
    pub fn new(list_key: impl Into<String>) -> Self {
        Self {
            list_key: list_key.into(),
            store: AsyncRwLock::new(Store::default()),
        }
    }

    /// Inserts items as-is. Items without an id get the next sequential id.
    pub async fn seed(&self, items: impl IntoIterator<Item = Item>) -> ListResult<()> {
        let mut store = self.store.write().await;
        for item in items {
            insert(&mut store, item)?;
        }
        Ok(())
    }

    /// Returns all items in storage order.
    pub async fn snapshot(&self) -> Vec<Item> {
        self.store.read().await.items.values().cloned().collect()
    }

    fn not_found(&self, id: &Value) -> ListError {
        ListError::storage(format!("no {} item with id {id}", self.list_key))
    }

    fn filter(&self, store: &Store, query: &ItemsQuery) -> ListResult<Vec<Item>> {
        let mut items = Vec::new();
        for item in store.items.values() {
            if matches(item, &query.filter)? {
                items.push(item.clone());
            }
        }
        if !query.order_by.is_empty() {
            items.sort_by(|a, b| {
                query
                    .order_by
                    .iter()
                    .map(|order| {
                        let ordering = compare_values(
                            a.get(&order.field).unwrap_or(&Value::Null),
                            b.get(&order.field).unwrap_or(&Value::Null),
                        )
                        .unwrap_or(Ordering::Equal);
                        match order.direction {
                            OrderDirection::Asc => ordering,
                            OrderDirection::Desc => ordering.reverse(),
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }
        let items = items.into_iter().skip(query.skip);
        Ok(match query.first {
            Some(first) => items.take(first).collect(),
            None => items.collect(),
        })
    }
}

fn insert(store: &mut Store, mut item: Item) -> ListResult<Item> {
    let id = match item.get("id").filter(|id| !id.is_null()) {
        Some(id) => id.clone(),
        None => json!(store.next_id),
    };
    let key = id_key(&id).ok_or_else(|| ListError::storage(format!("invalid id {id}")))?;
    if store.items.contains_key(&key) {
        return Err(ListError::storage(format!("duplicate id {id}")));
    }
    if let Ok(n) = key.parse::<u64>() {
        store.next_id = store.next_id.max(n.saturating_add(1));
    }

    item.remove("id");
    let mut stored = Item::new();
    stored.insert("id".into(), id);
    stored.extend(item);
    store.items.insert(key, stored.clone());
    Ok(stored)
}

#[async_trait]
impl ListAdapter for MemoryListAdapter {
    async fn items_query(&self, query: &ItemsQuery) -> ListResult<Vec<Item>> {
        let store = self.store.read().await;
        let items = self.filter(&store, query)?;
        debug!(list = %self.list_key, count = items.len(), "memory items query");
        Ok(items)
    }

    async fn items_count(&self, query: &ItemsQuery) -> ListResult<usize> {
        let store = self.store.read().await;
        Ok(self.filter(&store, query)?.len())
    }

    async fn create(&self, data: Item) -> ListResult<Item> {
        let mut store = self.store.write().await;
        let item = insert(&mut store, data)?;
        debug!(list = %self.list_key, id = %item["id"], "memory item created");
        Ok(item)
    }

    async fn update(&self, id: &Value, data: Item) -> ListResult<Item> {
        let key = id_key(id).ok_or_else(|| self.not_found(id))?;
        let mut store = self.store.write().await;
        let item = store
            .items
            .get_mut(&key)
            .ok_or_else(|| self.not_found(id))?;
        for (field, value) in data {
            if field != "id" {
                item.insert(field, value);
            }
        }
        Ok(item.clone())
    }

    async fn delete(&self, id: &Value) -> ListResult<()> {
        let key = id_key(id).ok_or_else(|| self.not_found(id))?;
        let mut store = self.store.write().await;
        store
            .items
            .shift_remove(&key)
            .map(|_| ())
            .ok_or_else(|| self.not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::OrderBy;

    fn item(value: Value) -> Item {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn seeded() -> Arc<MemoryListAdapter> {
        let db = MemoryAdapter::new();
        let list = db.list("Test");
        list.seed([
            item(json!({"name": "b", "email": "b@x"})),
            item(json!({"name": "a", "email": "a@x"})),
            item(json!({"name": "c", "email": "c@x"})),
        ])
        .await
        .unwrap();
        list
    }

    #[tokio::test]
    async fn test_seed_assigns_sequential_ids() {
        let list = seeded().await;
        let ids: Vec<_> = list.snapshot().await.into_iter().map(|i| i["id"].clone()).collect();
        assert_eq!(ids, vec![json!(0), json!(1), json!(2)]);

        let created = list.create(item(json!({"name": "d"}))).await.unwrap();
        assert_eq!(Value::Object(created), json!({"id": 3, "name": "d"}));
    }

    #[tokio::test]
    async fn test_largest_id_does_not_overflow() {
        let db = MemoryAdapter::new();
        let list = db.list("Test");
        list.seed([item(json!({"id": u64::MAX, "name": "last"}))])
            .await
            .unwrap();
        let err = list.create(item(json!({"name": "next"}))).await.unwrap_err();
        assert_eq!(err.code, listql_core::ErrorCode::StorageError);
        assert_eq!(err.message, format!("Storage error: duplicate id {}", u64::MAX));

        let created = list.create(item(json!({"id": 7, "name": "seven"}))).await.unwrap();
        assert_eq!(created["id"], json!(7));
    }

    #[tokio::test]
    async fn test_same_store_per_list_key() {
        let db = MemoryAdapter::new();
        db.list("Test").seed([item(json!({"name": "x"}))]).await.unwrap();
        let adapter = db.list_adapter("Test");
        assert_eq!(adapter.items_count(&ItemsQuery::default()).await.unwrap(), 1);
        assert_eq!(
            db.list_adapter("Other")
                .items_count(&ItemsQuery::default())
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_query_sort_skip_first() {
        let list = seeded().await;
        let query = ItemsQuery {
            order_by: vec![OrderBy::desc("name")],
            skip: 1,
            first: Some(1),
            ..ItemsQuery::default()
        };
        let items = list.items_query(&query).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "b");

        let query = ItemsQuery::filtered(item(json!({"id_in": ["0", 2]})));
        assert_eq!(list.items_count(&query).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let list = seeded().await;
        let updated = list
            .update(&json!("1"), item(json!({"name": "z", "id": 99})))
            .await
            .unwrap();
        assert_eq!(updated["id"], 1);
        assert_eq!(updated["name"], "z");

        list.delete(&json!(1)).await.unwrap();
        assert_eq!(list.snapshot().await.len(), 2);

        let err = list.delete(&json!(1)).await.unwrap_err();
        assert_eq!(err.code, listql_core::ErrorCode::StorageError);
        assert!(list.update(&json!(42), Item::new()).await.is_err());
    }
}
