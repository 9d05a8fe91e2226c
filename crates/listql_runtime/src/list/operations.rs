//! Queries and mutations of a list.
//!
//! Every operation checks list access first. Mutations then load the
//! affected items within the access scope, check field access on the input,
//! and run each item through the hook pipeline. Many-item mutations process
//! their items one after another and report one outcome per item.

use super::pipeline::PipelineState;
use super::{AccessTarget, FieldAccessItem, List};
use crate::access::{AccessScope, Operation};
use crate::context::Context;
use crate::hooks::HookStage;
use crate::resolver::ResolverArgs;
use crate::storage::{ItemsQuery, ListAdapter, OrderBy, OrderDirection};
use crate::where_clause::{id_key, merge_where, WhereInput};
use crate::Item;
use listql_core::{ListError, ListResult};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Arguments of a query returning many items.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQueryArgs {
    #[serde(rename = "where")]
    pub filter: WhereInput,
    pub search: Option<String>,
    /// Deprecated `<field>_ASC` / `<field>_DESC` keys.
    pub sort_by: Vec<String>,
    /// Single-key `{ <field>: "asc" | "desc" }` objects.
    pub order_by: Vec<Item>,
    pub first: Option<i64>,
    pub skip: i64,
}

impl ListQueryArgs {
    /// Reads the arguments of a GraphQL field. Null arguments count as absent.
    pub fn from_args(args: &ResolverArgs) -> ListResult<Self> {
        let present: Item = args
            .all()
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        serde_json::from_value(Value::Object(present))
            .map_err(|e| ListError::user_input(format!("Invalid query arguments: {e}")))
    }

    /// Arguments that only filter.
    pub fn filtered(filter: WhereInput) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// Arguments of a single-item query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemQueryArgs {
    #[serde(rename = "where")]
    pub filter: WhereInput,
}

impl ItemQueryArgs {
    pub fn by_id(id: Value) -> Self {
        let mut filter = WhereInput::new();
        filter.insert("id".into(), id);
        Self { filter }
    }
}

/// One entry of an update-many mutation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateManyEntry {
    pub id: Value,
    #[serde(default)]
    pub data: Item,
}

/// The result of a meta query. The count is computed on demand.
pub struct QueryMeta {
    adapter: Arc<dyn ListAdapter>,
    query: ItemsQuery,
}

impl QueryMeta {
    pub async fn count(&self) -> ListResult<usize> {
        self.adapter.items_count(&self.query).await
    }
}

impl fmt::Debug for QueryMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryMeta")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

fn non_negative(name: &str, value: i64) -> ListResult<usize> {
    usize::try_from(value)
        .map_err(|_| ListError::user_input(format!("'{name}' must not be negative, got {value}")))
}

fn many_input(key: &str, entries: Vec<Value>) -> Item {
    let mut input = Item::new();
    input.insert(key.into(), Value::Array(entries));
    input
}

impl List {
    /// Translates query arguments into a storage query within `scope`.
    fn items_query(&self, args: &ListQueryArgs, scope: &AccessScope) -> ListResult<ItemsQuery> {
        let first = args
            .first
            .map(|first| non_negative("first", first))
            .transpose()?;
        let skip = non_negative("skip", args.skip)?;

        let mut order_by = Vec::with_capacity(args.sort_by.len() + args.order_by.len());
        for key in &args.sort_by {
            let parsed = key
                .strip_suffix("_ASC")
                .map(OrderBy::asc)
                .or_else(|| key.strip_suffix("_DESC").map(OrderBy::desc))
                .ok_or_else(|| ListError::user_input(format!("Invalid sortBy value '{key}'")))?;
            order_by.push(self.orderable(parsed)?);
        }
        for entry in &args.order_by {
            let mut pairs = entry.iter();
            let (Some((field, direction)), None) = (pairs.next(), pairs.next()) else {
                return Err(ListError::user_input(
                    "orderBy entries must have exactly one key",
                ));
            };
            let direction: OrderDirection = serde_json::from_value(direction.clone())
                .map_err(|_| {
                    ListError::user_input(format!(
                        "Invalid orderBy direction {direction} for '{field}'"
                    ))
                })?;
            order_by.push(self.orderable(OrderBy {
                field: field.clone(),
                direction,
            })?);
        }

        let mut filter = args.filter.clone();
        if let Some(search) = args.search.as_deref().filter(|s| !s.is_empty()) {
            match self.search_field() {
                Some(path) => {
                    let mut clause = WhereInput::new();
                    clause.insert(format!("{path}_contains_i"), json!(search));
                    filter = merge_where(filter, clause);
                }
                None => debug!(list = %self.key(), "search ignored, list has no search field"),
            }
        }
        if let Some(scope) = scope.filter() {
            filter = merge_where(filter, scope.clone());
        }

        Ok(ItemsQuery {
            filter,
            order_by,
            first,
            skip,
        })
    }

    fn orderable(&self, order: OrderBy) -> ListResult<OrderBy> {
        let allowed = self.field(&order.field).is_some_and(|field| {
            field.kind().is_orderable() && field.access().read.may_allow()
        });
        if allowed {
            Ok(order)
        } else {
            Err(ListError::user_input(format!(
                "Unable to order {} by '{}'",
                self.key(),
                order.field
            )))
        }
    }

    /// Items matching the query arguments.
    pub async fn list_query(
        &self,
        args: &ListQueryArgs,
        ctx: &Context,
        gql_name: &str,
    ) -> ListResult<Vec<Item>> {
        let target = AccessTarget::new(gql_name);
        let scope = self.check_list_access(ctx, &args.filter, Operation::Read, target)?;
        let query = self.items_query(args, &scope)?;
        let items = self.adapter().items_query(&query).await?;
        if let Some(limit) = self.query_limits().max_results {
            if items.len() > limit {
                debug!(list = %self.key(), limit, count = items.len(), "max results exceeded");
                return Err(ListError::max_results_exceeded(self.key(), limit));
            }
        }
        Ok(items)
    }

    /// A meta query over the matching items.
    pub fn list_query_meta(
        &self,
        args: &ListQueryArgs,
        ctx: &Context,
        gql_name: &str,
    ) -> ListResult<QueryMeta> {
        let target = AccessTarget::new(gql_name);
        let scope = self.check_list_access(ctx, &args.filter, Operation::Read, target)?;
        Ok(QueryMeta {
            adapter: Arc::clone(self.adapter()),
            query: self.items_query(args, &scope)?,
        })
    }

    /// Number of items matching `filter`.
    pub async fn list_query_count(
        &self,
        filter: WhereInput,
        ctx: &Context,
        gql_name: &str,
    ) -> ListResult<usize> {
        self.list_query_meta(&ListQueryArgs::filtered(filter), ctx, gql_name)?
            .count()
            .await
    }

    /// The item with the id in `args`. Missing and forbidden items both
    /// fail with an access denial.
    pub async fn item_query(&self, args: &ItemQueryArgs, ctx: &Context) -> ListResult<Item> {
        let id = args.filter.get("id").filter(|id| !id.is_null()).ok_or_else(|| {
            ListError::user_input(format!("{}: item queries require an id", self.key()))
        })?;
        let target = AccessTarget::new(&self.gql_names().item_query_name).item_id(id);
        let scope = self.check_list_access(ctx, &args.filter, Operation::Read, target)?;
        self.get_access_controlled_item(id, &scope).await
    }

    /// Creates one item.
    pub async fn create_mutation(&self, data: Item, ctx: &Context) -> ListResult<Item> {
        let target = &self.gql_names().create_mutation_name;
        self.check_list_access(ctx, &data, Operation::Create, AccessTarget::new(target))?;
        let items = [FieldAccessItem {
            existing_item: None,
            data: &data,
        }];
        self.check_field_access(Operation::Create, &items, ctx, target, json!({ "data": &data }))?;
        self.create_single(data, ctx).await
    }

    /// Creates several items. The outer error is an access failure of the
    /// whole batch; the inner results are per item.
    pub async fn create_many_mutation(
        &self,
        data: Vec<Item>,
        ctx: &Context,
    ) -> ListResult<Vec<ListResult<Item>>> {
        let target = &self.gql_names().create_many_mutation_name;
        let original_input =
            many_input("data", data.iter().cloned().map(Value::Object).collect());
        let access_target = AccessTarget::new(target);
        self.check_list_access(ctx, &original_input, Operation::Create, access_target)?;
        let items: Vec<_> = data
            .iter()
            .map(|data| FieldAccessItem {
                existing_item: None,
                data,
            })
            .collect();
        self.check_field_access(Operation::Create, &items, ctx, target, json!({ "data": &data }))?;

        let mut results = Vec::with_capacity(data.len());
        for data in data {
            results.push(self.create_single(data, ctx).await);
        }
        Ok(results)
    }

    async fn create_single(&self, data: Item, ctx: &Context) -> ListResult<Item> {
        let mut state = PipelineState::new(Operation::Create, data, None);
        for field in self.fields() {
            if let Some(default) = field.default_value() {
                if !state.resolved_data.contains_key(field.path()) {
                    state
                        .resolved_data
                        .insert(field.path().to_string(), default.clone());
                }
            }
        }
        self.run_pipeline(&HookStage::CHANGE, &mut state, ctx).await?;
        self.finished(state)
    }

    /// Updates the item `id`.
    pub async fn update_mutation(&self, id: &Value, data: Item, ctx: &Context) -> ListResult<Item> {
        let target = &self.gql_names().update_mutation_name;
        let access_target = AccessTarget::new(target).item_id(id);
        let scope = self.check_list_access(ctx, &data, Operation::Update, access_target)?;
        let existing = self.get_access_controlled_item(id, &scope).await?;
        let items = [FieldAccessItem {
            existing_item: Some(&existing),
            data: &data,
        }];
        self.check_field_access(
            Operation::Update,
            &items,
            ctx,
            target,
            json!({ "id": id, "data": &data }),
        )?;
        self.update_single(existing, data, ctx).await
    }

    /// Updates several items. Entries whose item is missing or outside the
    /// access scope fail with an access denial.
    pub async fn update_many_mutation(
        &self,
        entries: Vec<UpdateManyEntry>,
        ctx: &Context,
    ) -> ListResult<Vec<ListResult<Item>>> {
        let target = &self.gql_names().update_many_mutation_name;
        let ids: Vec<Value> = entries.iter().map(|entry| entry.id.clone()).collect();
        let original_input = many_input(
            "data",
            entries
                .iter()
                .map(|entry| json!({ "id": &entry.id, "data": &entry.data }))
                .collect(),
        );
        let access_target = AccessTarget::new(target).item_ids(&ids);
        let scope = self.check_list_access(ctx, &original_input, Operation::Update, access_target)?;
        let mut existing = self.existing_by_id(&ids, &scope).await?;

        let items: Vec<_> = entries
            .iter()
            .filter_map(|entry| {
                let existing_item = existing.get(&id_key(&entry.id)?)?;
                Some(FieldAccessItem {
                    existing_item: Some(existing_item),
                    data: &entry.data,
                })
            })
            .collect();
        self.check_field_access(
            Operation::Update,
            &items,
            ctx,
            target,
            Value::Object(original_input.clone()),
        )?;

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let result = match id_key(&entry.id).and_then(|key| existing.remove(&key)) {
                Some(item) => self.update_single(item, entry.data, ctx).await,
                None => Err(ListError::access_denied()),
            };
            results.push(result);
        }
        Ok(results)
    }

    async fn update_single(&self, existing: Item, data: Item, ctx: &Context) -> ListResult<Item> {
        let mut state = PipelineState::new(Operation::Update, data, Some(existing));
        self.run_pipeline(&HookStage::CHANGE, &mut state, ctx).await?;
        self.finished(state)
    }

    /// Deletes the item `id` and returns it as it was before deletion.
    pub async fn delete_mutation(&self, id: &Value, ctx: &Context) -> ListResult<Item> {
        let target = AccessTarget::new(&self.gql_names().delete_mutation_name).item_id(id);
        let scope = self.check_list_access(ctx, &Item::new(), Operation::Delete, target)?;
        let existing = self.get_access_controlled_item(id, &scope).await?;
        self.delete_single(existing, ctx).await
    }

    /// Deletes several items. Ids that are missing or outside the access
    /// scope fail with an access denial.
    pub async fn delete_many_mutation(
        &self,
        ids: Vec<Value>,
        ctx: &Context,
    ) -> ListResult<Vec<ListResult<Item>>> {
        let target = AccessTarget::new(&self.gql_names().delete_many_mutation_name).item_ids(&ids);
        let scope = self.check_list_access(ctx, &Item::new(), Operation::Delete, target)?;
        let mut existing = self.existing_by_id(&ids, &scope).await?;

        let mut results = Vec::with_capacity(ids.len());
        for id in &ids {
            let result = match id_key(id).and_then(|key| existing.remove(&key)) {
                Some(item) => self.delete_single(item, ctx).await,
                None => Err(ListError::access_denied()),
            };
            results.push(result);
        }
        Ok(results)
    }

    async fn delete_single(&self, existing: Item, ctx: &Context) -> ListResult<Item> {
        let mut state = PipelineState::new(Operation::Delete, Item::new(), Some(existing));
        self.run_pipeline(&HookStage::DELETE, &mut state, ctx).await?;
        state
            .existing_item
            .ok_or_else(|| ListError::system(&[format!("{} delete lost its item", self.key())]))
    }

    async fn existing_by_id(
        &self,
        ids: &[Value],
        scope: &AccessScope,
    ) -> ListResult<FxHashMap<String, Item>> {
        Ok(self
            .get_access_controlled_items(ids, scope)
            .await?
            .into_iter()
            .filter_map(|item| Some((id_key(item.get("id")?)?, item)))
            .collect())
    }

    fn finished(&self, state: PipelineState) -> ListResult<Item> {
        state.updated_item.ok_or_else(|| {
            ListError::system(&[format!(
                "{} {} did not return an item",
                self.key(),
                state.operation
            )])
        })
    }
}
