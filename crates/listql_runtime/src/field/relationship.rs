//! Relationship fields.
//!
//! A to-one relationship stores the related item's id; a to-many
//! relationship stores an array of ids. Inputs use `connect`, `disconnect`
//! and `disconnectAll`. Related items are always loaded through the
//! referenced list, so its access control applies.

use super::{FieldGqlContext, FieldType, OutputResolver};
use crate::access::Operation;
use crate::config::FieldConfig;
use crate::context::Context;
use crate::hooks::{FieldHookArgs, FieldHooks};
use crate::list::{filter_fragment, AccessTarget, List, ListQueryArgs};
use crate::registry::ListLookup;
use crate::resolver::{Resolver, ResolverArgs, ResolverFuture, ResolverInfo};
use crate::where_clause::{id_in, ids_equal, merge_where};
use crate::Item;
use async_trait::async_trait;
use listql_core::{pluralize, sdl, GqlNames, ListError, ListResult};
use serde_json::{json, Value};
use std::sync::Arc;

/// A relationship to another list.
#[derive(Debug, Clone)]
pub struct Relationship {
    ref_list: String,
    many: bool,
}

impl Relationship {
    pub fn to_one(ref_list: impl Into<String>) -> Self {
        Self {
            ref_list: ref_list.into(),
            many: false,
        }
    }

    pub fn to_many(ref_list: impl Into<String>) -> Self {
        Self {
            ref_list: ref_list.into(),
            many: true,
        }
    }

    /// Reads the `ref` and `many` options.
    pub fn from_config(config: &FieldConfig) -> ListResult<Self> {
        let ref_list = config
            .option_str("ref")
            .ok_or_else(|| ListError::config("Relationship fields require a 'ref' option"))?;
        Ok(Self {
            ref_list: ref_list.to_string(),
            many: config.option_bool("many"),
        })
    }

    pub fn is_many(&self) -> bool {
        self.many
    }

    fn ref_names(&self, lists: &dyn ListLookup) -> GqlNames {
        lists.list_by_key(&self.ref_list).map_or_else(
            || GqlNames::from_parts(&self.ref_list, &pluralize(&self.ref_list)),
            |list| list.gql_names().clone(),
        )
    }

    fn relate_input_name(&self, names: &GqlNames) -> String {
        if self.many {
            names.relate_to_many_input_name.clone()
        } else {
            names.relate_to_one_input_name.clone()
        }
    }

    /// Fails with a relationship error unless the caller can read `id`.
    async fn verify_connect(&self, id: &Value, args: &FieldHookArgs<'_>) -> ListResult<()> {
        let unable = || {
            ListError::relationship(&[format!(
                "Unable to connect a {}.{}<{}>",
                args.list_key, args.field_path, self.ref_list
            )])
        };
        let list = args.lists.list_by_key(&self.ref_list).ok_or_else(unable)?;
        let denied_as_unable = |e: ListError| if e.is_access_denied() { unable() } else { e };

        let names = list.gql_names();
        let target = AccessTarget::new(&names.item_query_name).item_id(id);
        let scope = list
            .check_list_access(args.context, &Item::new(), Operation::Read, target)
            .map_err(denied_as_unable)?;
        list.get_access_controlled_item(id, &scope)
            .await
            .map_err(denied_as_unable)?;
        Ok(())
    }

    async fn resolve_to_one(&self, input: &Item, args: &FieldHookArgs<'_>) -> ListResult<Value> {
        let existing = args.existing_value().cloned().unwrap_or(Value::Null);
        if let Some(connect) = present(input, "connect") {
            let id = unique_id(connect, args)?;
            self.verify_connect(id, args).await?;
            return Ok(id.clone());
        }
        if input.get("disconnectAll") == Some(&Value::Bool(true)) {
            return Ok(Value::Null);
        }
        if let Some(disconnect) = present(input, "disconnect") {
            if ids_equal(&existing, unique_id(disconnect, args)?) {
                return Ok(Value::Null);
            }
        }
        Ok(existing)
    }

    async fn resolve_to_many(&self, input: &Item, args: &FieldHookArgs<'_>) -> ListResult<Value> {
        let mut ids: Vec<Value> = if input.get("disconnectAll") == Some(&Value::Bool(true)) {
            Vec::new()
        } else {
            args.existing_value()
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        };
        for disconnect in entries(input, "disconnect") {
            let id = unique_id(disconnect, args)?;
            ids.retain(|existing| !ids_equal(existing, id));
        }
        for connect in entries(input, "connect") {
            let id = unique_id(connect, args)?;
            self.verify_connect(id, args).await?;
            if !ids.iter().any(|existing| ids_equal(existing, id)) {
                ids.push(id.clone());
            }
        }
        Ok(Value::Array(ids))
    }
}

fn present<'a>(input: &'a Item, key: &str) -> Option<&'a Value> {
    input.get(key).filter(|v| !v.is_null())
}

fn entries<'a>(input: &'a Item, key: &str) -> impl Iterator<Item = &'a Value> {
    present(input, key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn unique_id<'a>(where_unique: &'a Value, args: &FieldHookArgs<'_>) -> ListResult<&'a Value> {
    where_unique
        .get("id")
        .filter(|id| !id.is_null())
        .ok_or_else(|| {
            ListError::user_input(format!(
                "{}.{}: relationship inputs must identify items by id",
                args.list_key, args.field_path
            ))
        })
}

#[async_trait]
impl FieldHooks for Relationship {
    async fn resolve_input(&self, args: &FieldHookArgs<'_>) -> ListResult<Value> {
        let input = match args.value() {
            None | Some(Value::Null) => return Ok(Value::Null),
            Some(Value::Object(input)) => input,
            Some(_) => {
                return Err(ListError::user_input(format!(
                    "{}.{}: expected a relationship input",
                    args.list_key, args.field_path
                )))
            }
        };
        if self.many {
            self.resolve_to_many(input, args).await
        } else {
            self.resolve_to_one(input, args).await
        }
    }
}

impl FieldType for Relationship {
    fn type_name(&self) -> &'static str {
        "Relationship"
    }

    fn gql_output_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        let names = self.ref_names(cx.lists.as_ref());
        if !self.many {
            return vec![format!("{}: {}", cx.path, names.output_type_name)];
        }
        vec![
            sdl::field(
                None,
                cx.path,
                &filter_fragment(&names),
                &format!("[{}!]", names.output_type_name),
                None,
            ),
            sdl::field(
                None,
                &format!("{}Count", cx.path),
                &[format!("where: {}! = {{}}", names.where_input_name)],
                "Int",
                None,
            ),
        ]
    }

    fn gql_query_input_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        let names = self.ref_names(cx.lists.as_ref());
        let path = cx.path;
        let where_input = &names.where_input_name;
        if self.many {
            vec![
                format!("{path}_every: {where_input}"),
                format!("{path}_some: {where_input}"),
                format!("{path}_none: {where_input}"),
            ]
        } else {
            vec![
                format!("{path}: {where_input}"),
                format!("{path}_is_null: Boolean"),
            ]
        }
    }

    fn gql_create_input_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        let names = self.ref_names(cx.lists.as_ref());
        vec![format!("{}: {}", cx.path, self.relate_input_name(&names))]
    }

    fn gql_aux_types(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        let names = self.ref_names(cx.lists.as_ref());
        let unique = &names.where_unique_input_name;
        let members = if self.many {
            vec![
                format!("connect: [{unique}]"),
                format!("disconnect: [{unique}]"),
                "disconnectAll: Boolean".to_string(),
            ]
        } else {
            vec![
                format!("connect: {unique}"),
                format!("disconnect: {unique}"),
                "disconnectAll: Boolean".to_string(),
            ]
        };
        vec![sdl::input_type(&self.relate_input_name(&names), &members)]
    }

    fn gql_output_field_resolvers(&self, cx: &FieldGqlContext<'_>) -> Vec<OutputResolver> {
        let related = RelatedItems {
            lists: Arc::clone(cx.lists),
            ref_list: self.ref_list.clone(),
            path: cx.path.to_string(),
        };
        if !self.many {
            return vec![OutputResolver {
                field_name: cx.path.to_string(),
                return_type: Some(self.ref_list.clone()),
                resolver: Arc::new(ToOneResolver(related)),
            }];
        }
        vec![
            OutputResolver {
                field_name: cx.path.to_string(),
                return_type: Some(self.ref_list.clone()),
                resolver: Arc::new(ToManyResolver(related.clone())),
            },
            OutputResolver {
                field_name: format!("{}Count", cx.path),
                return_type: None,
                resolver: Arc::new(CountResolver(related)),
            },
        ]
    }

    fn referenced_list(&self) -> Option<&str> {
        Some(&self.ref_list)
    }
}

#[derive(Clone)]
struct RelatedItems {
    lists: Arc<dyn ListLookup>,
    ref_list: String,
    path: String,
}

impl RelatedItems {
    fn list(&self) -> ListResult<Arc<List>> {
        self.lists.list_by_key(&self.ref_list).ok_or_else(|| {
            ListError::system(&[format!("related list '{}' is not registered", self.ref_list)])
        })
    }

    fn ids<'a>(&self, parent: &'a Value) -> &'a [Value] {
        parent
            .get(self.path.as_str())
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Query args restricted to the stored ids.
    fn scoped_args(&self, parent: &Value, args: &ResolverArgs) -> ListResult<ListQueryArgs> {
        let mut query = ListQueryArgs::from_args(args)?;
        query.filter = merge_where(std::mem::take(&mut query.filter), id_in(self.ids(parent)));
        Ok(query)
    }
}

struct ToOneResolver(RelatedItems);

impl ToOneResolver {
    async fn load(&self, parent: &Value, ctx: &Context) -> ListResult<Value> {
        let Some(id) = parent.get(self.0.path.as_str()).filter(|id| !id.is_null()) else {
            return Ok(Value::Null);
        };
        let list = self.0.list()?;
        let names = list.gql_names();
        let target = AccessTarget::new(&names.item_query_name).item_id(id);
        let scope = list.check_list_access(ctx, &Item::new(), Operation::Read, target)?;
        list.get_access_controlled_item(id, &scope)
            .await
            .map(Value::Object)
    }
}

impl Resolver for ToOneResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        _args: &'a ResolverArgs,
        ctx: &'a Context,
        _info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        Box::pin(async move {
            match self.load(parent, ctx).await {
                Err(e) if e.is_access_denied() => Ok(Value::Null),
                other => other,
            }
        })
    }
}

struct ToManyResolver(RelatedItems);

impl Resolver for ToManyResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        _info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        Box::pin(async move {
            if self.0.ids(parent).is_empty() {
                return Ok(json!([]));
            }
            let list = self.0.list()?;
            let query = self.0.scoped_args(parent, args)?;
            match list
                .list_query(&query, ctx, &list.gql_names().list_query_name)
                .await
            {
                Ok(items) => Ok(Value::Array(items.into_iter().map(Value::Object).collect())),
                Err(e) if e.is_access_denied() => Ok(json!([])),
                Err(e) => Err(e),
            }
        })
    }
}

struct CountResolver(RelatedItems);

impl Resolver for CountResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        _info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        Box::pin(async move {
            if self.0.ids(parent).is_empty() {
                return Ok(json!(0));
            }
            let list = self.0.list()?;
            let query = self.0.scoped_args(parent, args)?;
            match list
                .list_query_count(query.filter, ctx, &list.gql_names().list_query_count_name)
                .await
            {
                Ok(count) => Ok(json!(count)),
                Err(e) if e.is_access_denied() => Ok(json!(0)),
                Err(e) => Err(e),
            }
        })
    }
}
