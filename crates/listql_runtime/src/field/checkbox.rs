use super::{expect_type, FieldGqlContext, FieldType};
use crate::hooks::{FieldHookArgs, FieldHooks};
use async_trait::async_trait;
use listql_core::{ListResult, ValidationErrors};
use serde_json::Value;

/// A boolean field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Checkbox;

#[async_trait]
impl FieldHooks for Checkbox {
    async fn validate_input(
        &self,
        args: &FieldHookArgs<'_>,
        errors: &mut ValidationErrors,
    ) -> ListResult<()> {
        expect_type(args, errors, "a boolean", Value::is_boolean);
        Ok(())
    }
}

impl FieldType for Checkbox {
    fn type_name(&self) -> &'static str {
        "Checkbox"
    }

    fn gql_output_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        vec![format!("{}: Boolean", cx.path)]
    }

    fn gql_query_input_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        vec![
            format!("{}: Boolean", cx.path),
            format!("{}_not: Boolean", cx.path),
        ]
    }

    fn gql_create_input_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        vec![format!("{}: Boolean", cx.path)]
    }

    fn is_orderable(&self) -> bool {
        true
    }
}
