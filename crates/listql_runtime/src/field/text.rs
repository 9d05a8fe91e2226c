use super::{expect_type, FieldGqlContext, FieldType};
use crate::hooks::{FieldHookArgs, FieldHooks};
use async_trait::async_trait;
use listql_core::{ListResult, ValidationErrors};
use serde_json::Value;

const STRING_FILTERS: &[&str] = &[
    "",
    "_not",
    "_contains",
    "_not_contains",
    "_starts_with",
    "_not_starts_with",
    "_ends_with",
    "_not_ends_with",
    "_i",
    "_not_i",
    "_contains_i",
    "_not_contains_i",
    "_starts_with_i",
    "_not_starts_with_i",
    "_ends_with_i",
    "_not_ends_with_i",
];

/// A string field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Text;

#[async_trait]
impl FieldHooks for Text {
    async fn validate_input(
        &self,
        args: &FieldHookArgs<'_>,
        errors: &mut ValidationErrors,
    ) -> ListResult<()> {
        expect_type(args, errors, "a string", Value::is_string);
        Ok(())
    }
}

impl FieldType for Text {
    fn type_name(&self) -> &'static str {
        "Text"
    }

    fn gql_output_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        vec![format!("{}: String", cx.path)]
    }

    fn gql_query_input_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        let path = cx.path;
        STRING_FILTERS
            .iter()
            .map(|op| format!("{path}{op}: String"))
            .chain([
                format!("{path}_in: [String]"),
                format!("{path}_not_in: [String]"),
            ])
            .collect()
    }

    fn gql_create_input_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        vec![format!("{}: String", cx.path)]
    }

    fn is_orderable(&self) -> bool {
        true
    }
}
