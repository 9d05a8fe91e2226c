use super::{expect_type, FieldGqlContext, FieldType};
use crate::hooks::{FieldHookArgs, FieldHooks};
use async_trait::async_trait;
use listql_core::{ListResult, ValidationErrors};
use serde_json::Value;

/// A 64-bit signed integer field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Integer;

#[async_trait]
impl FieldHooks for Integer {
    async fn validate_input(
        &self,
        args: &FieldHookArgs<'_>,
        errors: &mut ValidationErrors,
    ) -> ListResult<()> {
        expect_type(args, errors, "an integer", |v| v.is_i64());
        Ok(())
    }
}

impl FieldType for Integer {
    fn type_name(&self) -> &'static str {
        "Integer"
    }

    fn gql_output_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        vec![format!("{}: Int", cx.path)]
    }

    fn gql_query_input_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        let path = cx.path;
        ["", "_not", "_lt", "_lte", "_gt", "_gte"]
            .iter()
            .map(|op| format!("{path}{op}: Int"))
            .chain([format!("{path}_in: [Int]"), format!("{path}_not_in: [Int]")])
            .collect()
    }

    fn gql_create_input_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        vec![format!("{}: Int", cx.path)]
    }

    fn is_orderable(&self) -> bool {
        true
    }
}
