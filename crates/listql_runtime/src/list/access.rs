//! Access checks of a list.
//!
//! List access is decided once per operation and yields an
//! [`AccessScope`]. Field access is checked per item and per field.
//! Item-level checks combine the scope with the requested ids before the
//! storage adapter is queried.

use super::List;
use crate::access::{AccessDecision, AccessScope, FieldAccessArgs, ListAccessArgs, Operation};
use crate::context::Context;
use crate::field::Field;
use crate::resolver::{Resolver, ResolverArgs, ResolverFuture, ResolverInfo};
use crate::storage::ItemsQuery;
use crate::where_clause::{id_in, id_key, merge_where, without_id_clauses, IdConstraints};
use crate::Item;
use indexmap::IndexSet;
use listql_core::{ListError, ListResult};
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// What a list access check is performed for.
#[derive(Debug, Clone, Copy)]
pub struct AccessTarget<'a> {
    /// The GraphQL field that triggered the check.
    pub gql_name: &'a str,
    pub item_id: Option<&'a Value>,
    pub item_ids: Option<&'a [Value]>,
}

impl<'a> AccessTarget<'a> {
    pub fn new(gql_name: &'a str) -> Self {
        Self {
            gql_name,
            item_id: None,
            item_ids: None,
        }
    }

    #[must_use]
    pub fn item_id(mut self, id: &'a Value) -> Self {
        self.item_id = Some(id);
        self
    }

    #[must_use]
    pub fn item_ids(mut self, ids: &'a [Value]) -> Self {
        self.item_ids = Some(ids);
        self
    }
}

/// One item of a field access check.
#[derive(Debug, Clone, Copy)]
pub struct FieldAccessItem<'a> {
    pub existing_item: Option<&'a Item>,
    /// The mutation data for this item; only its keys are checked.
    pub data: &'a Item,
}

impl List {
    /// Decides list access for `operation`.
    ///
    /// A denial surfaces as a generic access-denied error. A filter with no
    /// clauses grants unrestricted access. Create access has no item to
    /// filter, so any filter is a configuration error there.
    pub fn check_list_access(
        &self,
        ctx: &Context,
        original_input: &Item,
        operation: Operation,
        target: AccessTarget<'_>,
    ) -> ListResult<AccessScope> {
        let args = ListAccessArgs {
            context: ctx,
            list_key: self.key(),
            operation,
            original_input,
            gql_name: target.gql_name,
            item_id: target.item_id,
            item_ids: target.item_ids,
        };
        match ctx.list_access(self.access().rule(operation), &args) {
            AccessDecision::Granted => Ok(AccessScope::All),
            AccessDecision::Filtered(_) if operation == Operation::Create => {
                Err(ListError::config(format!(
                    "Expected a Boolean for {}.access.create(), got a where-filter",
                    self.key()
                )))
            }
            AccessDecision::Filtered(filter) if filter.is_empty() => Ok(AccessScope::All),
            AccessDecision::Filtered(filter) => Ok(AccessScope::Matching(filter)),
            AccessDecision::Denied => {
                debug!(
                    list = %self.key(),
                    operation = %operation,
                    target = %target.gql_name,
                    "list access denied"
                );
                Err(ListError::access_denied())
            }
        }
    }

    /// Checks field access for every key of every item's data.
    ///
    /// A key the create or update input does not declare fails with a user
    /// input error. All restricted paths are collected before failing, in
    /// first-seen order and without duplicates. `internal_data` is attached
    /// to the error for logging only.
    pub fn check_field_access(
        &self,
        operation: Operation,
        items: &[FieldAccessItem<'_>],
        ctx: &Context,
        target: &str,
        internal_data: Value,
    ) -> ListResult<()> {
        let mut checks = Vec::new();
        for item in items {
            for path in item.data.keys() {
                checks.push((item, self.input_field(path, operation)?));
            }
        }

        let mut restricted: IndexSet<String> = IndexSet::new();
        for (item, field) in checks {
            if !self.field_allowed(field, operation, item.data, item.existing_item, ctx) {
                restricted.insert(field.path().to_string());
            }
        }
        if restricted.is_empty() {
            return Ok(());
        }

        debug!(
            list = %self.key(),
            operation = %operation,
            fields = ?restricted,
            "field access denied"
        );
        Err(ListError::field_access_denied(
            restricted.into_iter().collect(),
            target,
            operation.restriction_kind(),
            internal_data,
        ))
    }

    /// The field behind a mutation data key.
    fn input_field(&self, path: &str, operation: Operation) -> ListResult<&Field> {
        let declared = self.field(path).filter(|field| {
            let cx = self.gql_context(field);
            let fragments = match operation {
                Operation::Update => field.kind().gql_update_input_fields(&cx),
                _ => field.kind().gql_create_input_fields(&cx),
            };
            !fragments.is_empty()
        });
        declared.ok_or_else(|| {
            let names = self.gql_names();
            let input = match operation {
                Operation::Update => &names.update_input_name,
                _ => &names.create_input_name,
            };
            debug!(list = %self.key(), field = %path, "undeclared input field");
            ListError::user_input(format!(
                "Field \"{path}\" is not defined by type \"{input}\"."
            ))
        })
    }

    fn field_allowed(
        &self,
        field: &Field,
        operation: Operation,
        original_input: &Item,
        existing_item: Option<&Item>,
        ctx: &Context,
    ) -> bool {
        let Some(rule) = field.access().rule(operation) else {
            return true;
        };
        ctx.field_access(
            rule,
            &FieldAccessArgs {
                context: ctx,
                list_key: self.key(),
                field_path: field.path(),
                operation,
                original_input,
                existing_item,
            },
        )
    }

    /// Loads the items among `ids` that lie within `scope`.
    ///
    /// Ids are deduplicated and narrowed by any id clauses of the scope
    /// before storage is queried; storage is not queried at all when
    /// nothing can match.
    pub async fn get_access_controlled_items(
        &self,
        ids: &[Value],
        scope: &AccessScope,
    ) -> ListResult<Vec<Item>> {
        let mut seen = FxHashSet::default();
        let unique: Vec<Value> = ids
            .iter()
            .filter(|id| id_key(id).is_some_and(|key| seen.insert(key)))
            .cloned()
            .collect();

        let (constraints, rest) = match scope.filter() {
            Some(filter) => (IdConstraints::from_filter(filter), without_id_clauses(filter)),
            None => (IdConstraints::default(), Item::new()),
        };
        let permitted: Vec<Value> = unique
            .into_iter()
            .filter(|id| constraints.permits(id))
            .collect();
        if permitted.is_empty() {
            return Ok(Vec::new());
        }

        let query = ItemsQuery::filtered(merge_where(rest, id_in(&permitted)));
        let mut items = self.adapter().items_query(&query).await?;
        items.retain(|item| item.get("id").is_some_and(|id| constraints.permits(id)));
        Ok(items)
    }

    /// Loads one item within `scope`. Anything but exactly one match is an
    /// access denial, so missing items are indistinguishable from forbidden
    /// ones.
    pub async fn get_access_controlled_item(
        &self,
        id: &Value,
        scope: &AccessScope,
    ) -> ListResult<Item> {
        let mut items = self
            .get_access_controlled_items(std::slice::from_ref(id), scope)
            .await?;
        if items.len() != 1 {
            debug!(list = %self.key(), id = %id, "item not found or not accessible");
            return Err(ListError::access_denied());
        }
        Ok(items.remove(0))
    }

    /// Wraps an output field resolver with the field's read access check.
    ///
    /// The parent object is passed to the access rule as the existing item.
    pub fn wrap_field_resolver(
        self: &Arc<Self>,
        field: &Field,
        inner: Arc<dyn Resolver>,
    ) -> Arc<dyn Resolver> {
        Arc::new(FieldAccessResolver {
            list: Arc::clone(self),
            path: field.path().to_string(),
            inner,
        })
    }
}

struct FieldAccessResolver {
    list: Arc<List>,
    path: String,
    inner: Arc<dyn Resolver>,
}

impl Resolver for FieldAccessResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        Box::pin(async move {
            let field = self.list.field(&self.path).ok_or_else(|| {
                ListError::system(&[format!("unknown field {}.{}", self.list.key(), self.path)])
            })?;
            let existing_item = parent.as_object();
            let allowed = self.list.field_allowed(
                field,
                Operation::Read,
                args.all(),
                existing_item,
                ctx,
            );
            if !allowed {
                debug!(list = %self.list.key(), field = %self.path, "field read denied");
                return Err(ListError::access_denied());
            }
            self.inner.resolve(parent, args, ctx, info).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::access::{AccessEvaluator, AccessRule, FieldAccessRule};
    use crate::resolver::DefaultResolver;
    use serde_json::json;

    struct UpdateOnly;

    impl AccessEvaluator for UpdateOnly {
        fn list_access(&self, _rule: &AccessRule, args: &ListAccessArgs<'_>) -> AccessDecision {
            AccessDecision::from(args.operation == Operation::Update)
        }
    }

    struct NameRequiresFlag;

    impl AccessEvaluator for NameRequiresFlag {
        fn field_access(&self, _rule: &FieldAccessRule, args: &FieldAccessArgs<'_>) -> bool {
            let flagged = args
                .existing_item
                .and_then(|item| item.get("makeFalse"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            !(flagged && args.field_path == "name")
        }
    }

    #[tokio::test]
    async fn test_check_list_access() {
        let list = setup().await;
        let ctx = Context::new().with_evaluator(UpdateOnly);
        let input = Item::new();
        let target = AccessTarget::new("testing");

        assert_eq!(
            list.check_list_access(&ctx, &input, Operation::Update, target)
                .unwrap(),
            AccessScope::All
        );
        let err = list
            .check_list_access(&ctx, &input, Operation::Read, target)
            .unwrap_err();
        assert!(err.is_access_denied());
        assert_eq!(err.message, "You do not have access to this resource");

        assert!(list
            .check_list_access(&ctx.sudo(), &input, Operation::Read, target)
            .is_ok());
    }

    #[tokio::test]
    async fn test_check_list_access_filters() {
        use crate::access::ListAccess;
        let access = ListAccess::default()
            .with(Operation::Read, AccessRule::Filter(item(json!({"name": "a"}))))
            .with(Operation::Update, AccessRule::Filter(Item::new()));
        let list = setup_with(test_config().access(access)).await;
        let ctx = Context::new();
        let target = AccessTarget::new("testing");

        assert_eq!(
            list.check_list_access(&ctx, &Item::new(), Operation::Read, target)
                .unwrap(),
            AccessScope::Matching(item(json!({"name": "a"})))
        );
        assert_eq!(
            list.check_list_access(&ctx, &Item::new(), Operation::Update, target)
                .unwrap(),
            AccessScope::All
        );
    }

    #[tokio::test]
    async fn test_check_list_access_create_filter() {
        use crate::access::ListAccess;
        let access = ListAccess::dynamic(|_| AccessDecision::Filtered(item(json!({"name": "a"}))));
        let list = setup_with(test_config().access(access)).await;
        let target = AccessTarget::new("createTest");

        let err = list
            .check_list_access(&Context::new(), &Item::new(), Operation::Create, target)
            .unwrap_err();
        assert_eq!(err.code, listql_core::ErrorCode::ConfigError);
        assert_eq!(
            err.message,
            "Expected a Boolean for Test.access.create(), got a where-filter"
        );
        assert_eq!(
            list.check_list_access(&Context::new(), &Item::new(), Operation::Read, target)
                .unwrap(),
            AccessScope::Matching(item(json!({"name": "a"})))
        );
    }

    #[tokio::test]
    async fn test_check_field_access() {
        let list = setup().await;
        let ctx = Context::new();
        let data = item(json!({"name": "x", "hidden": "y"}));
        let items = [FieldAccessItem {
            existing_item: None,
            data: &data,
        }];
        list.check_field_access(Operation::Create, &items, &ctx, "createTest", json!({}))
            .unwrap();

        let update = item(json!({"name": "x", "writeOnce": "y"}));
        let again = item(json!({"writeOnce": "z"}));
        let items = [
            FieldAccessItem {
                existing_item: None,
                data: &update,
            },
            FieldAccessItem {
                existing_item: None,
                data: &again,
            },
        ];
        let err = list
            .check_field_access(Operation::Update, &items, &ctx, "updateTests", json!({"extra": 1}))
            .unwrap_err();
        assert!(err.is_access_denied());
        assert_eq!(
            err.data,
            Some(json!({
                "restrictedFields": ["writeOnce"],
                "target": "updateTests",
                "type": "mutation"
            }))
        );
        assert_eq!(err.internal_data, Some(json!({"extra": 1})));
    }

    #[tokio::test]
    async fn test_check_field_access_undeclared_inputs() {
        let list = setup().await;
        let ctx = Context::new();
        let check = |operation, data: Value| {
            let data = item(data);
            let items = [FieldAccessItem {
                existing_item: None,
                data: &data,
            }];
            list.check_field_access(operation, &items, &ctx, "testing", json!({}))
        };

        let err = check(Operation::Create, json!({"name": "x", "bogus": {"x": 1}})).unwrap_err();
        assert_eq!(err.code, listql_core::ErrorCode::UserInputError);
        assert_eq!(
            err.message,
            "Field \"bogus\" is not defined by type \"TestCreateInput\"."
        );

        let err = check(Operation::Create, json!({"id": 1000})).unwrap_err();
        assert_eq!(err.code, listql_core::ErrorCode::UserInputError);
        let err = check(Operation::Update, json!({"id": 1})).unwrap_err();
        assert_eq!(
            err.message,
            "Field \"id\" is not defined by type \"TestUpdateInput\"."
        );

        assert!(check(Operation::Update, json!({"other": {"disconnectAll": true}})).is_ok());
    }

    #[tokio::test]
    async fn test_get_access_controlled_items() {
        let list = setup().await;
        let ids = |items: Vec<Item>| -> Vec<Value> {
            items.into_iter().map(|i| i["id"].clone()).collect()
        };

        let all = AccessScope::All;
        assert!(list.get_access_controlled_items(&[], &all).await.unwrap().is_empty());
        assert_eq!(
            ids(list
                .get_access_controlled_items(&[json!(1), json!("2"), json!(1), json!(7)], &all)
                .await
                .unwrap()),
            vec![json!(1), json!(2)]
        );

        let by_id = AccessScope::Matching(item(json!({"id": 1})));
        assert_eq!(
            ids(list.get_access_controlled_items(&[json!(1), json!(2)], &by_id).await.unwrap()),
            vec![json!(1)]
        );
        let by_id_in = AccessScope::Matching(item(json!({"id_in": [0, 1]})));
        assert_eq!(
            ids(list
                .get_access_controlled_items(&[json!(0), json!(1), json!(2)], &by_id_in)
                .await
                .unwrap()),
            vec![json!(0), json!(1)]
        );
        let by_id_not = AccessScope::Matching(item(json!({"id_not": 1})));
        assert_eq!(
            ids(list
                .get_access_controlled_items(&[json!(1), json!(2)], &by_id_not)
                .await
                .unwrap()),
            vec![json!(2)]
        );
        let by_id_not_in = AccessScope::Matching(item(json!({"id_not_in": [1, 2]})));
        assert!(list
            .get_access_controlled_items(&[json!(1), json!(2)], &by_id_not_in)
            .await
            .unwrap()
            .is_empty());
        let by_name = AccessScope::Matching(item(json!({"name": "c"})));
        assert_eq!(
            ids(list
                .get_access_controlled_items(&[json!(0), json!(2)], &by_name)
                .await
                .unwrap()),
            vec![json!(2)]
        );
    }

    #[tokio::test]
    async fn test_get_access_controlled_item() {
        let list = setup().await;
        let found = list
            .get_access_controlled_item(&json!(1), &AccessScope::All)
            .await
            .unwrap();
        assert_eq!(found["name"], json!("b"));

        let scope = AccessScope::Matching(item(json!({"id": 2})));
        let err = list
            .get_access_controlled_item(&json!(1), &scope)
            .await
            .unwrap_err();
        assert!(err.is_access_denied());
        assert!(list
            .get_access_controlled_item(&json!(9), &AccessScope::All)
            .await
            .unwrap_err()
            .is_access_denied());
    }

    #[tokio::test]
    async fn test_wrap_field_resolver() {
        let list = setup().await;
        let ctx = Context::new().with_evaluator(NameRequiresFlag);
        let name = list.field("name").unwrap();
        let resolver = list.wrap_field_resolver(name, Arc::new(DefaultResolver));
        let args = ResolverArgs::new();
        let info = ResolverInfo::new("name", "Test");

        let parent = json!({"name": "a", "makeFalse": false});
        assert_eq!(
            resolver.resolve(&parent, &args, &ctx, &info).await.unwrap(),
            json!("a")
        );
        let parent = json!({"name": "a", "makeFalse": true});
        let err = resolver.resolve(&parent, &args, &ctx, &info).await.unwrap_err();
        assert!(err.is_access_denied());

        let email = list.field("email").unwrap();
        let resolver = list.wrap_field_resolver(email, Arc::new(DefaultResolver));
        let parent = json!({"email": "a@example.com", "makeFalse": true});
        let info = ResolverInfo::new("email", "Test");
        assert_eq!(
            resolver.resolve(&parent, &args, &ctx, &info).await.unwrap(),
            json!("a@example.com")
        );
    }
}
