//! Selection execution.
//!
//! The executor walks a tree of [`Selection`]s. Root fields resolve against
//! `Query` or `Mutation`; nested selections resolve against the return type
//! registered with each resolver. Lists are completed element by element.
//! Errors never abort the whole operation: the failing field becomes null
//! and the error is reported with its response path.

use crate::context::Context;
use crate::resolver::{ErrorSink, ResolverArgs, ResolverInfo, ResolverMap};
use crate::Item;
use listql_core::{ListError, PathSegment};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// The root an operation starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    pub const fn root_type(&self) -> &'static str {
        match self {
            Self::Query => "Query",
            Self::Mutation => "Mutation",
        }
    }
}

/// A selected field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Selection {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Item,
    pub selections: Vec<Selection>,
}

impl Selection {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn select(mut self, selection: Selection) -> Self {
        self.selections.push(selection);
        self
    }

    /// Adds leaf selections.
    #[must_use]
    pub fn fields(mut self, names: &[&str]) -> Self {
        self.selections
            .extend(names.iter().map(|name| Selection::field(*name)));
        self
    }

    /// The key of this field in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// An execution result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Value>,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Executes selections against a resolver map.
#[derive(Debug, Clone)]
pub struct Executor {
    resolvers: Arc<ResolverMap>,
}

struct ExecutionContext<'a> {
    ctx: &'a Context,
    resolvers: &'a ResolverMap,
    errors: ErrorSink,
}

type ValueFuture<'a> = Pin<Box<dyn Future<Output = Value> + Send + 'a>>;

impl Executor {
    pub fn new(resolvers: ResolverMap) -> Self {
        Self {
            resolvers: Arc::new(resolvers),
        }
    }

    pub fn resolvers(&self) -> &ResolverMap {
        &self.resolvers
    }

    /// Executes root selections one after another.
    pub async fn execute(
        &self,
        kind: OperationKind,
        selections: &[Selection],
        ctx: &Context,
    ) -> Response {
        let root_type = kind.root_type();
        debug!(root = root_type, fields = selections.len(), "executing operation");
        let exec = ExecutionContext {
            ctx,
            resolvers: &self.resolvers,
            errors: ErrorSink::default(),
        };

        let root = Value::Object(Item::new());
        let mut data = Item::new();
        for selection in selections {
            let value = resolve_field(root_type, &root, selection, Vec::new(), &exec).await;
            data.insert(selection.response_key().to_string(), value);
        }

        let errors: Vec<Value> = exec
            .errors
            .take()
            .await
            .iter()
            .map(|e| e.error.to_graphql_error(&e.path))
            .collect();
        if !errors.is_empty() {
            debug!(root = root_type, errors = errors.len(), "operation finished with errors");
        }
        Response {
            data: Value::Object(data),
            errors,
        }
    }
}

/// Resolves one field of `parent` and completes its selections.
fn resolve_field<'a>(
    parent_type: &'a str,
    parent: &'a Value,
    selection: &'a Selection,
    mut path: Vec<PathSegment>,
    exec: &'a ExecutionContext<'a>,
) -> ValueFuture<'a> {
    Box::pin(async move {
        if selection.name == "__typename" {
            return Value::String(parent_type.to_string());
        }
        path.push(PathSegment::Field(selection.response_key().to_string()));

        let Some(entry) = exec.resolvers.get(parent_type, &selection.name) else {
            let error = ListError::user_input(format!(
                "Cannot query field \"{}\" on type \"{parent_type}\".",
                selection.name
            ));
            exec.errors.push(path, error).await;
            return Value::Null;
        };

        let mut info = ResolverInfo::new(&selection.name, parent_type)
            .with_path(path.clone())
            .with_selected_fields(
                selection
                    .selections
                    .iter()
                    .map(|child| child.name.clone())
                    .collect(),
            )
            .with_errors(exec.errors.clone());
        if let Some(return_type) = &entry.return_type {
            info = info.with_return_type(return_type);
        }
        let args = ResolverArgs::from_map(selection.arguments.clone());

        match entry.resolver.resolve(parent, &args, exec.ctx, &info).await {
            Ok(value) => match &entry.return_type {
                Some(return_type) if !selection.selections.is_empty() => {
                    complete(return_type, value, &selection.selections, path, exec).await
                }
                _ => value,
            },
            Err(error) => {
                exec.errors.push(path, error).await;
                Value::Null
            }
        }
    })
}

/// Completes a resolved value of `type_name` with the nested selections.
fn complete<'a>(
    type_name: &'a str,
    value: Value,
    selections: &'a [Selection],
    path: Vec<PathSegment>,
    exec: &'a ExecutionContext<'a>,
) -> ValueFuture<'a> {
    Box::pin(async move {
        match value {
            Value::Array(items) => {
                let mut completed = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let mut item_path = path.clone();
                    item_path.push(PathSegment::Index(index));
                    completed.push(complete(type_name, item, selections, item_path, exec).await);
                }
                Value::Array(completed)
            }
            Value::Object(_) => {
                let mut object = Item::new();
                for selection in selections {
                    let field = resolve_field(type_name, &value, selection, path.clone(), exec).await;
                    object.insert(selection.response_key().to_string(), field);
                }
                Value::Object(object)
            }
            other => other,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{DefaultResolver, Resolver, ResolverFuture};
    use serde_json::json;

    enum Root {
        Posts,
        Fail,
        Echo,
    }

    impl Resolver for Root {
        fn resolve<'a>(
            &'a self,
            _parent: &'a Value,
            args: &'a ResolverArgs,
            _ctx: &'a Context,
            _info: &'a ResolverInfo,
        ) -> ResolverFuture<'a> {
            let result = match self {
                Self::Posts => Ok(json!([
                    {"id": 1, "title": "a", "secret": "x"},
                    {"id": 2, "title": "b", "secret": "y"}
                ])),
                Self::Fail => Err(ListError::access_denied()),
                Self::Echo => Ok(args.get("value").cloned().unwrap_or(Value::Null)),
            };
            Box::pin(async move { result })
        }
    }

    fn resolvers() -> ResolverMap {
        let mut map = ResolverMap::new();
        map.register("Query", "posts", Some("Post".into()), Arc::new(Root::Posts));
        map.register("Query", "fail", None, Arc::new(Root::Fail));
        map.register("Query", "echo", None, Arc::new(Root::Echo));
        map.register("Post", "id", None, Arc::new(DefaultResolver));
        map.register("Post", "title", None, Arc::new(DefaultResolver));
        map
    }

    #[tokio::test]
    async fn test_execute_nested_selections() {
        let executor = Executor::new(resolvers());
        let response = executor
            .execute(
                OperationKind::Query,
                &[
                    Selection::field("posts").fields(&["id", "title", "__typename"]),
                    Selection::field("echo").alias("said").arg("value", json!("hi")),
                ],
                &Context::new(),
            )
            .await;
        assert!(response.is_ok());
        assert_eq!(
            response.data,
            json!({
                "posts": [
                    {"id": 1, "title": "a", "__typename": "Post"},
                    {"id": 2, "title": "b", "__typename": "Post"}
                ],
                "said": "hi"
            })
        );
    }

    #[tokio::test]
    async fn test_errors_are_collected_with_paths() {
        let executor = Executor::new(resolvers());
        let response = executor
            .execute(
                OperationKind::Query,
                &[
                    Selection::field("fail"),
                    Selection::field("posts").fields(&["secret"]),
                ],
                &Context::new(),
            )
            .await;
        assert_eq!(response.data["fail"], Value::Null);
        assert_eq!(response.data["posts"], json!([{"secret": null}, {"secret": null}]));
        insta::assert_snapshot!(serde_json::to_string_pretty(&response.errors[..2]).unwrap(), @r###"
        [
          {
            "message": "You do not have access to this resource",
            "path": [
              "fail"
            ],
            "extensions": {
              "code": "ACCESS_DENIED"
            }
          },
          {
            "message": "Cannot query field \"secret\" on type \"Post\".",
            "path": [
              "posts",
              0,
              "secret"
            ],
            "extensions": {
              "code": "USER_INPUT_ERROR"
            }
          }
        ]
        "###);
        assert_eq!(response.errors.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_root_field() {
        let executor = Executor::new(ResolverMap::new());
        let response = executor
            .execute(OperationKind::Mutation, &[Selection::field("nope")], &Context::new())
            .await;
        assert_eq!(
            response.errors[0]["message"],
            json!("Cannot query field \"nope\" on type \"Mutation\".")
        );
        let serialized = serde_json::to_value(&response).unwrap();
        assert_eq!(serialized["data"], json!({"nope": null}));
    }

    #[test]
    fn test_selection_from_json() {
        let selection: Selection = serde_json::from_value(json!({
            "name": "posts",
            "alias": "all",
            "arguments": {"first": 1},
            "selections": [{"name": "id"}]
        }))
        .unwrap();
        assert_eq!(
            selection,
            Selection::field("posts")
                .alias("all")
                .arg("first", json!(1))
                .fields(&["id"])
        );
        let kind: OperationKind = serde_json::from_value(json!("mutation")).unwrap();
        assert_eq!(kind, OperationKind::Mutation);
    }
}
