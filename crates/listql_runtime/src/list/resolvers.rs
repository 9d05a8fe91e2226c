//! Resolver maps of a list.
//!
//! Root fields resolve through [`RootResolver`], which dispatches to the
//! list's operations. Output fields resolve through the field types'
//! resolvers, wrapped with the field's read access check.

use super::{ItemQueryArgs, List, ListQueryArgs, UpdateManyEntry};
use crate::access::Operation;
use crate::context::Context;
use crate::resolver::{
    DefaultResolver, Resolver, ResolverArgs, ResolverFuture, ResolverInfo, ResolverMap,
    ResolverResult,
};
use crate::Item;
use listql_core::ListResult;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

/// The root field a [`RootResolver`] serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootField {
    AllItems,
    Item,
    Meta,
    Count,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Delete,
    DeleteMany,
}

struct RootResolver {
    list: Arc<List>,
    field: RootField,
}

/// Reads an optional argument; absent and null yield the default.
fn optional<T: DeserializeOwned + Default>(args: &ResolverArgs, name: &str) -> ListResult<T> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(_) => args.require(name),
    }
}

fn object(item: Item) -> Value {
    Value::Object(item)
}

fn objects(items: Vec<Item>) -> Value {
    Value::Array(items.into_iter().map(Value::Object).collect())
}

/// Reports item failures as per-index errors and leaves a null in their place.
async fn per_item(results: Vec<ListResult<Item>>, info: &ResolverInfo) -> Value {
    let mut values = Vec::with_capacity(results.len());
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(item) => values.push(Value::Object(item)),
            Err(error) => {
                info.errors.push(info.index_path(index), error).await;
                values.push(Value::Null);
            }
        }
    }
    Value::Array(values)
}

impl RootResolver {
    async fn run(&self, args: &ResolverArgs, ctx: &Context, info: &ResolverInfo) -> ResolverResult {
        let list = &self.list;
        let names = list.gql_names();
        match self.field {
            RootField::AllItems => {
                let query = ListQueryArgs::from_args(args)?;
                list.list_query(&query, ctx, &names.list_query_name)
                    .await
                    .map(objects)
            }
            RootField::Item => {
                let query = ItemQueryArgs {
                    filter: args.require("where")?,
                };
                list.item_query(&query, ctx).await.map(object)
            }
            RootField::Meta => {
                let query = ListQueryArgs::from_args(args)?;
                let meta = list.list_query_meta(&query, ctx, &names.list_query_meta_name)?;
                if info.selects("count") {
                    Ok(json!({ "count": meta.count().await? }))
                } else {
                    Ok(json!({}))
                }
            }
            RootField::Count => {
                let filter: Item = optional(args, "where")?;
                let count = list
                    .list_query_count(filter, ctx, &names.list_query_count_name)
                    .await?;
                Ok(json!(count))
            }
            RootField::Create => {
                let data: Item = optional(args, "data")?;
                list.create_mutation(data, ctx).await.map(object)
            }
            RootField::CreateMany => {
                let entries: Vec<Value> = optional(args, "data")?;
                let data = entries
                    .iter()
                    .map(|entry| {
                        entry
                            .get("data")
                            .and_then(Value::as_object)
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect();
                let results = list.create_many_mutation(data, ctx).await?;
                Ok(per_item(results, info).await)
            }
            RootField::Update => {
                let id: Value = args.require("id")?;
                let data: Item = optional(args, "data")?;
                list.update_mutation(&id, data, ctx).await.map(object)
            }
            RootField::UpdateMany => {
                let entries: Vec<UpdateManyEntry> = optional(args, "data")?;
                let results = list.update_many_mutation(entries, ctx).await?;
                Ok(per_item(results, info).await)
            }
            RootField::Delete => {
                let id: Value = args.require("id")?;
                list.delete_mutation(&id, ctx).await.map(object)
            }
            RootField::DeleteMany => {
                let ids: Vec<Value> = optional(args, "ids")?;
                let results = list.delete_many_mutation(ids, ctx).await?;
                Ok(per_item(results, info).await)
            }
        }
    }
}

impl Resolver for RootResolver {
    fn resolve<'a>(
        &'a self,
        _parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        Box::pin(self.run(args, ctx, info))
    }
}

impl List {
    fn register_root(
        self: &Arc<Self>,
        map: &mut ResolverMap,
        root_type: &str,
        name: &str,
        return_type: Option<&str>,
        field: RootField,
    ) {
        map.register(
            root_type,
            name,
            return_type.map(str::to_string),
            Arc::new(RootResolver {
                list: Arc::clone(self),
                field,
            }),
        );
    }

    /// Resolvers of the list's output type.
    ///
    /// Fields that cannot be read are absent. Fields without a custom
    /// resolver return their stored value.
    pub fn gql_field_resolvers(self: &Arc<Self>) -> ResolverMap {
        let mut map = ResolverMap::new();
        if !self.access().may_allow_any() {
            return map;
        }
        let type_name = &self.gql_names().output_type_name;
        for field in self.readable_fields() {
            let custom = field
                .kind()
                .gql_output_field_resolvers(&self.gql_context(field));
            if custom.is_empty() {
                let resolver = self.wrap_field_resolver(field, Arc::new(DefaultResolver));
                map.register(type_name, field.path(), None, resolver);
                continue;
            }
            for output in custom {
                let resolver = self.wrap_field_resolver(field, output.resolver);
                map.register(type_name, &output.field_name, output.return_type, resolver);
            }
        }
        map
    }

    /// Resolvers of the list's query root fields.
    pub fn gql_query_resolvers(self: &Arc<Self>) -> ResolverMap {
        let mut map = ResolverMap::new();
        if !self.access().may_allow(Operation::Read) {
            return map;
        }
        let names = self.gql_names();
        let output = Some(names.output_type_name.as_str());
        self.register_root(&mut map, "Query", &names.list_query_name, output, RootField::AllItems);
        self.register_root(&mut map, "Query", &names.item_query_name, output, RootField::Item);
        self.register_root(
            &mut map,
            "Query",
            &names.list_query_meta_name,
            Some("_QueryMeta"),
            RootField::Meta,
        );
        self.register_root(&mut map, "Query", &names.list_query_count_name, None, RootField::Count);
        map
    }

    /// Resolvers of the list's mutation root fields, per permitted operation.
    pub fn gql_mutation_resolvers(self: &Arc<Self>) -> ResolverMap {
        let mut map = ResolverMap::new();
        let names = self.gql_names();
        let output = Some(names.output_type_name.as_str());
        let access = self.access();

        if access.may_allow(Operation::Create) {
            self.register_root(&mut map, "Mutation", &names.create_mutation_name, output, RootField::Create);
            self.register_root(
                &mut map,
                "Mutation",
                &names.create_many_mutation_name,
                output,
                RootField::CreateMany,
            );
        }
        if access.may_allow(Operation::Update) {
            self.register_root(&mut map, "Mutation", &names.update_mutation_name, output, RootField::Update);
            self.register_root(
                &mut map,
                "Mutation",
                &names.update_many_mutation_name,
                output,
                RootField::UpdateMany,
            );
        }
        if access.may_allow(Operation::Delete) {
            self.register_root(&mut map, "Mutation", &names.delete_mutation_name, output, RootField::Delete);
            self.register_root(
                &mut map,
                "Mutation",
                &names.delete_many_mutation_name,
                output,
                RootField::DeleteMany,
            );
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::access::{AccessRule, ListAccess};
    use crate::resolver::ErrorSink;
    use listql_core::PathSegment;

    async fn call(map: &ResolverMap, root: &str, field: &str, args: Value) -> (ResolverResult, ErrorSink) {
        let sink = ErrorSink::default();
        let info = ResolverInfo::new(field, root)
            .with_selected_fields(vec!["count".into()])
            .with_errors(sink.clone());
        let entry = map.get(root, field).unwrap();
        let result = entry
            .resolver
            .resolve(&Value::Null, &ResolverArgs::from_map(item(args)), &Context::new(), &info)
            .await;
        (result, sink)
    }

    #[tokio::test]
    async fn test_field_resolvers() {
        let list = setup().await;
        let map = list.gql_field_resolvers();
        assert_eq!(
            map.fields_of("Test"),
            vec!["email", "id", "name", "other", "writeOnce"]
        );
        assert_eq!(map.get("Test", "other").unwrap().return_type.as_deref(), Some("Other"));
        assert!(map.get("Test", "name").unwrap().return_type.is_none());

        let denied = setup_with(test_config().access(ListAccess::all(AccessRule::Static(false)))).await;
        assert!(denied.gql_field_resolvers().is_empty());
        assert!(denied.gql_query_resolvers().is_empty());
        assert!(denied.gql_mutation_resolvers().is_empty());
    }

    #[tokio::test]
    async fn test_root_resolver_names() {
        let list = setup().await;
        assert_eq!(
            list.gql_query_resolvers().fields_of("Query"),
            vec!["Test", "_allTestsMeta", "allTests", "testsCount"]
        );
        assert_eq!(
            list.gql_mutation_resolvers().fields_of("Mutation"),
            vec![
                "createTest",
                "createTests",
                "deleteTest",
                "deleteTests",
                "updateTest",
                "updateTests"
            ]
        );

        let read_only = ListAccess::all(AccessRule::Static(false))
            .with(Operation::Read, AccessRule::Static(true));
        let list = setup_with(test_config().access(read_only)).await;
        assert_eq!(list.gql_query_resolvers().len(), 4);
        assert!(list.gql_mutation_resolvers().is_empty());
    }

    #[tokio::test]
    async fn test_query_resolvers() {
        let list = setup().await;
        let map = list.gql_query_resolvers();

        let (result, _) = call(&map, "Query", "allTests", json!({"where": {"id": 1}})).await;
        assert_eq!(result.unwrap(), json!([{"id": 1, "name": "b", "email": "b@example.com"}]));

        let (result, _) = call(&map, "Query", "Test", json!({"where": {"id": "2"}})).await;
        assert_eq!(result.unwrap()["name"], json!("c"));

        let (result, _) = call(&map, "Query", "_allTestsMeta", json!({"where": {"id_in": [0, 1]}})).await;
        assert_eq!(result.unwrap(), json!({"count": 2}));

        let (result, _) = call(&map, "Query", "testsCount", json!({"where": null})).await;
        assert_eq!(result.unwrap(), json!(3));
    }

    #[tokio::test]
    async fn test_many_mutation_reports_item_errors() {
        let list = setup().await;
        let map = list.gql_mutation_resolvers();

        let (result, sink) = call(
            &map,
            "Mutation",
            "createTests",
            json!({"data": [{"data": {"name": "d"}}, {"data": {"name": 1}}]}),
        )
        .await;
        let value = result.unwrap();
        assert_eq!(value[0]["id"], json!(3));
        assert_eq!(value[1], Value::Null);
        let errors = sink.take().await;
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].path,
            vec![PathSegment::Field("createTests".into()), PathSegment::Index(1)]
        );
        assert_eq!(errors[0].error.code, listql_core::ErrorCode::ValidationError);

        let (result, sink) = call(&map, "Mutation", "deleteTests", json!({"ids": [0, 8]})).await;
        assert_eq!(result.unwrap()[1], Value::Null);
        assert!(sink.take().await[0].error.is_access_denied());

        let (result, _) = call(
            &map,
            "Mutation",
            "updateTest",
            json!({"id": 1, "data": {"email": "new@example.com"}}),
        )
        .await;
        assert_eq!(result.unwrap()["email"], json!("new@example.com"));

        let (result, _) = call(&map, "Mutation", "updateTest", json!({"data": {}})).await;
        assert_eq!(result.unwrap_err().code, listql_core::ErrorCode::UserInputError);
    }
}
