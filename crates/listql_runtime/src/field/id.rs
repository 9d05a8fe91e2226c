use super::{FieldGqlContext, FieldType};
use crate::hooks::FieldHooks;

/// The item id. Read-only: it has no create or update input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Id;

impl FieldHooks for Id {}

impl FieldType for Id {
    fn type_name(&self) -> &'static str {
        "Id"
    }

    fn gql_output_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        vec![format!("{}: ID", cx.path)]
    }

    fn gql_query_input_fields(&self, cx: &FieldGqlContext<'_>) -> Vec<String> {
        let path = cx.path;
        vec![
            format!("{path}: ID"),
            format!("{path}_not: ID"),
            format!("{path}_in: [ID!]"),
            format!("{path}_not_in: [ID!]"),
        ]
    }

    fn gql_create_input_fields(&self, _cx: &FieldGqlContext<'_>) -> Vec<String> {
        Vec::new()
    }

    fn is_orderable(&self) -> bool {
        true
    }
}
