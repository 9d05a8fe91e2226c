//! End-to-end tests: a schema built by the registry, seeded in memory and
//! driven through the executor.

use async_trait::async_trait;
use listql_runtime::{
    AccessDecision, AccessRule, Context, FieldAccess, FieldAccessRule, FieldConfig, HookArgs,
    Item, ListAccess, ListConfig, ListHooks, ListRegistry, ListResult, MemoryAdapter,
    Operation, OperationKind, Response, SchemaConfig, Selection, ValidationErrors,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn item(value: Value) -> Item {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn log(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

fn id_of(item: Option<&Item>) -> String {
    item.and_then(|item| item.get("id"))
        .map_or_else(|| "-".to_string(), ToString::to_string)
}

#[async_trait]
impl ListHooks for Recorder {
    async fn resolve_input(&self, args: &HookArgs<'_>) -> ListResult<Item> {
        self.log(format!("resolveInput:{}", args.operation));
        Ok(args.resolved_data.clone())
    }

    async fn validate_input(
        &self,
        args: &HookArgs<'_>,
        _errors: &mut ValidationErrors,
    ) -> ListResult<()> {
        self.log(format!("validateInput:{}", args.operation));
        Ok(())
    }

    async fn before_change(&self, args: &HookArgs<'_>) -> ListResult<()> {
        self.log(format!("beforeChange:{}", args.operation));
        Ok(())
    }

    async fn after_change(&self, args: &HookArgs<'_>) -> ListResult<()> {
        self.log(format!("afterChange:{}", id_of(args.updated_item)));
        Ok(())
    }

    async fn validate_delete(
        &self,
        args: &HookArgs<'_>,
        _errors: &mut ValidationErrors,
    ) -> ListResult<()> {
        self.log(format!("validateDelete:{}", id_of(args.existing_item)));
        Ok(())
    }

    async fn before_delete(&self, args: &HookArgs<'_>) -> ListResult<()> {
        self.log(format!("beforeDelete:{}", id_of(args.existing_item)));
        Ok(())
    }

    async fn after_delete(&self, args: &HookArgs<'_>) -> ListResult<()> {
        self.log(format!("afterDelete:{}", id_of(args.existing_item)));
        Ok(())
    }
}

fn note_access() -> ListAccess {
    ListAccess::default().with(
        Operation::Read,
        AccessRule::dynamic(|args| match args.session() {
            None => AccessDecision::Denied,
            Some(session) if session.get("admin") == Some(&json!(true)) => AccessDecision::Granted,
            Some(session) => AccessDecision::Filtered(item(json!({
                "owner": session.get("user").cloned().unwrap_or(Value::Null)
            }))),
        }),
    )
}

fn schema(recorder: &Recorder) -> SchemaConfig {
    SchemaConfig::new()
        .list(
            "Test",
            ListConfig::new()
                .field("name", FieldConfig::text())
                .field("email", FieldConfig::text())
                .field("other", FieldConfig::relationship("Other"))
                .field("tags", FieldConfig::relationship_many("Other"))
                .field(
                    "hidden",
                    FieldConfig::text().access(
                        FieldAccess::default().with(Operation::Read, FieldAccessRule::Static(false)),
                    ),
                )
                .field(
                    "writeOnce",
                    FieldConfig::text().access(
                        FieldAccess::default()
                            .with(Operation::Update, FieldAccessRule::Static(false)),
                    ),
                )
                .hooks(recorder.clone()),
        )
        .list(
            "Other",
            ListConfig::new()
                .field("name", FieldConfig::text())
                .access(ListAccess::default().with(
                    Operation::Read,
                    AccessRule::Filter(item(json!({"name_not": "private"}))),
                )),
        )
        .list(
            "Note",
            ListConfig::new()
                .field("title", FieldConfig::text())
                .field("owner", FieldConfig::text())
                .access(note_access()),
        )
}

async fn setup() -> (Arc<ListRegistry>, Recorder) {
    let db = Arc::new(MemoryAdapter::new());
    db.list("Test")
        .seed([
            item(json!({"id": 0, "name": "a", "email": "a@example.com", "other": 0, "tags": [0, 1, 2], "hidden": "h"})),
            item(json!({"id": 1, "name": "b", "email": "b@example.com"})),
            item(json!({"id": 2, "name": "c", "email": "c@example.com"})),
        ])
        .await
        .unwrap();
    db.list("Other")
        .seed([
            item(json!({"id": 0, "name": "o0"})),
            item(json!({"id": 1, "name": "o1"})),
            item(json!({"id": 2, "name": "private"})),
        ])
        .await
        .unwrap();
    db.list("Note")
        .seed([
            item(json!({"id": 0, "title": "n0", "owner": "ann"})),
            item(json!({"id": 1, "title": "n1", "owner": "bob"})),
        ])
        .await
        .unwrap();

    let recorder = Recorder::default();
    let registry = ListRegistry::build(schema(&recorder), db).unwrap();
    (registry, recorder)
}

async fn run(registry: &ListRegistry, kind: OperationKind, selection: Selection) -> Response {
    run_as(registry, kind, selection, &Context::new()).await
}

async fn run_as(
    registry: &ListRegistry,
    kind: OperationKind,
    selection: Selection,
    ctx: &Context,
) -> Response {
    registry.executor().execute(kind, &[selection], ctx).await
}

#[tokio::test]
async fn test_nested_relationships_respect_target_access() {
    let (registry, _) = setup().await;
    let response = run(
        &registry,
        OperationKind::Query,
        Selection::field("allTests")
            .arg("where", json!({"id": 0}))
            .fields(&["name", "tagsCount"])
            .select(Selection::field("other").fields(&["name"]))
            .select(Selection::field("tags").fields(&["id", "name"])),
    )
    .await;

    assert!(response.is_ok(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        json!({
            "allTests": [{
                "name": "a",
                "tagsCount": 2,
                "other": {"name": "o0"},
                "tags": [{"id": 0, "name": "o0"}, {"id": 1, "name": "o1"}]
            }]
        })
    );
}

#[tokio::test]
async fn test_unreadable_field_is_not_queryable() {
    let (registry, _) = setup().await;
    let response = run(
        &registry,
        OperationKind::Query,
        Selection::field("Test")
            .arg("where", json!({"id": 0}))
            .fields(&["name", "hidden"]),
    )
    .await;

    assert_eq!(response.data, json!({"Test": {"name": "a", "hidden": null}}));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0]["message"],
        json!("Cannot query field \"hidden\" on type \"Test\".")
    );
    assert_eq!(response.errors[0]["path"], json!(["Test", "hidden"]));
}

#[tokio::test]
async fn test_item_query_hides_missing_items() {
    let (registry, _) = setup().await;
    let response = run(
        &registry,
        OperationKind::Query,
        Selection::field("Test")
            .arg("where", json!({"id": "4"}))
            .fields(&["name"]),
    )
    .await;
    assert_eq!(response.data, json!({"Test": null}));
    assert_eq!(response.errors[0]["extensions"]["code"], json!("ACCESS_DENIED"));
    assert_eq!(
        response.errors[0]["message"],
        json!("You do not have access to this resource")
    );
}

#[tokio::test]
async fn test_meta_and_count_queries() {
    let (registry, _) = setup().await;
    let response = registry
        .executor()
        .execute(
            OperationKind::Query,
            &[
                Selection::field("_allTestsMeta")
                    .arg("where", json!({"id_in": [1, 2]}))
                    .fields(&["count"]),
                Selection::field("testsCount"),
                Selection::field("othersCount").alias("visibleOthers"),
            ],
            &Context::new(),
        )
        .await;
    assert!(response.is_ok(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        json!({"_allTestsMeta": {"count": 2}, "testsCount": 3, "visibleOthers": 2})
    );
}

#[tokio::test]
async fn test_create_many_runs_hooks_per_item() {
    let (registry, recorder) = setup().await;
    let response = run(
        &registry,
        OperationKind::Mutation,
        Selection::field("createTests")
            .arg(
                "data",
                json!([{"data": {"name": "d"}}, {"data": {"name": "e", "email": "e@example.com"}}]),
            )
            .fields(&["id", "name"]),
    )
    .await;

    assert!(response.is_ok(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        json!({"createTests": [{"id": 3, "name": "d"}, {"id": 4, "name": "e"}]})
    );
    assert_eq!(
        recorder.take(),
        vec![
            "resolveInput:create",
            "validateInput:create",
            "beforeChange:create",
            "afterChange:3",
            "resolveInput:create",
            "validateInput:create",
            "beforeChange:create",
            "afterChange:4",
        ]
    );
}

#[tokio::test]
async fn test_delete_returns_previous_item() {
    let (registry, recorder) = setup().await;
    let response = run(
        &registry,
        OperationKind::Mutation,
        Selection::field("deleteTest")
            .arg("id", json!(1))
            .fields(&["id", "name"]),
    )
    .await;
    assert_eq!(response.data, json!({"deleteTest": {"id": 1, "name": "b"}}));
    assert_eq!(
        recorder.take(),
        vec!["validateDelete:1", "beforeDelete:1", "afterDelete:1"]
    );

    let response = run(
        &registry,
        OperationKind::Query,
        Selection::field("allTests").fields(&["id"]),
    )
    .await;
    assert_eq!(response.data, json!({"allTests": [{"id": 0}, {"id": 2}]}));
}

#[tokio::test]
async fn test_relationship_connect() {
    let (registry, _) = setup().await;
    let response = run(
        &registry,
        OperationKind::Mutation,
        Selection::field("createTest")
            .arg("data", json!({"name": "d", "other": {"connect": {"id": 1}}}))
            .fields(&["id"])
            .select(Selection::field("other").fields(&["name"])),
    )
    .await;
    assert!(response.is_ok(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        json!({"createTest": {"id": 3, "other": {"name": "o1"}}})
    );

    let response = run(
        &registry,
        OperationKind::Mutation,
        Selection::field("createTest")
            .arg("data", json!({"name": "e", "other": {"connect": {"id": 2}}}))
            .fields(&["id"]),
    )
    .await;
    assert_eq!(response.data, json!({"createTest": null}));
    assert_eq!(
        response.errors[0]["extensions"]["code"],
        json!("RELATIONSHIP_ERROR")
    );
    assert_eq!(
        response.errors[0]["message"],
        json!("Relationship error:\n  - Unable to connect a Test.other<Other>")
    );
}

#[tokio::test]
async fn test_update_reports_restricted_fields() {
    let (registry, recorder) = setup().await;
    let response = run(
        &registry,
        OperationKind::Mutation,
        Selection::field("updateTest")
            .arg("id", json!(0))
            .arg("data", json!({"name": "z", "writeOnce": "w"}))
            .fields(&["name"]),
    )
    .await;

    assert_eq!(response.data, json!({"updateTest": null}));
    let extensions = &response.errors[0]["extensions"];
    assert_eq!(extensions["code"], json!("ACCESS_DENIED"));
    assert_eq!(
        extensions["data"],
        json!({"restrictedFields": ["writeOnce"], "target": "updateTest", "type": "mutation"})
    );
    assert!(recorder.take().is_empty());

    let response = run(
        &registry,
        OperationKind::Mutation,
        Selection::field("updateTests")
            .arg(
                "data",
                json!([
                    {"id": 0, "data": {"name": "z"}},
                    {"id": 7, "data": {"name": "y"}}
                ]),
            )
            .fields(&["name"]),
    )
    .await;
    assert_eq!(response.data, json!({"updateTests": [{"name": "z"}, null]}));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0]["path"], json!(["updateTests", 1]));
}

#[tokio::test]
async fn test_dynamic_access_uses_session() {
    let (registry, _) = setup().await;
    let query = || Selection::field("allNotes").fields(&["title"]);

    let anonymous = run(&registry, OperationKind::Query, query()).await;
    assert_eq!(anonymous.data, json!({"allNotes": null}));
    assert_eq!(anonymous.errors[0]["extensions"]["code"], json!("ACCESS_DENIED"));

    let ann = Context::new().with_session(json!({"user": "ann"}));
    let response = run_as(&registry, OperationKind::Query, query(), &ann).await;
    assert_eq!(response.data, json!({"allNotes": [{"title": "n0"}]}));

    let admin = Context::new().with_session(json!({"user": "root", "admin": true}));
    let response = run_as(&registry, OperationKind::Query, query(), &admin).await;
    assert_eq!(response.data, json!({"allNotes": [{"title": "n0"}, {"title": "n1"}]}));

    let response = run_as(&registry, OperationKind::Query, query(), &Context::new().sudo()).await;
    assert_eq!(response.data, json!({"allNotes": [{"title": "n0"}, {"title": "n1"}]}));
}

#[tokio::test]
async fn test_printed_schema() {
    let (registry, _) = setup().await;
    let schema = registry.print_schema();

    assert!(schema.contains("\"\"\" A listql list \"\"\"\ntype Test {\n"));
    assert!(schema.contains("  tagsCount(where: OtherWhereInput! = {}): Int\n"));
    assert!(schema.contains("input OtherRelateToManyInput {\n"));
    let start = schema.find("type Test {\n").unwrap();
    let end = start + schema[start..].find("\n}").unwrap() + 1;
    let test_type = &schema[start..end];
    assert!(!test_type.contains("hidden"), "{test_type}");
    assert!(test_type.contains("  writeOnce: String\n"), "{test_type}");
    assert!(schema.contains("input TestCreateInput {"));
    assert!(schema.contains("  notesCount(where: NoteWhereInput! = {}): Int\n"));
    assert!(schema.contains("  createNote(data: NoteCreateInput): Note\n"));
    assert_eq!(schema.matches("type _QueryMeta {").count(), 1);
}
