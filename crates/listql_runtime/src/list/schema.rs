//! GraphQL schema fragments of a list.

use super::List;
use crate::access::Operation;
use crate::field::{Field, FieldGqlContext};
use listql_core::{sdl, GqlNames};

const DEFAULT_DESCRIPTION: &str = "A listql list";

/// Arguments shared by every query that returns many items of a list.
pub fn filter_fragment(names: &GqlNames) -> Vec<String> {
    vec![
        format!("where: {}! = {{}}", names.where_input_name),
        "search: String".to_string(),
        format!(
            "sortBy: [{}!] {}",
            names.list_sort_name,
            sdl::deprecated("sortBy has been deprecated in favour of orderBy")
        ),
        format!("orderBy: [{}!]! = []", names.list_order_name),
        "first: Int".to_string(),
        "skip: Int! = 0".to_string(),
    ]
}

impl List {
    pub(crate) fn gql_context<'a>(&'a self, field: &'a Field) -> FieldGqlContext<'a> {
        FieldGqlContext {
            path: field.path(),
            list_key: self.key(),
            lists: self.lists(),
        }
    }

    fn orderable_fields(&self) -> impl Iterator<Item = &Field> {
        self.readable_fields()
            .filter(|field| field.kind().is_orderable())
    }

    fn collect_fragments<'a>(
        &'a self,
        fields: impl Iterator<Item = &'a Field>,
        fragments: impl Fn(&Field, &FieldGqlContext<'_>) -> Vec<String>,
    ) -> Vec<String> {
        fields
            .flat_map(|field| fragments(field, &self.gql_context(field)))
            .collect()
    }

    /// The type definitions this list contributes.
    ///
    /// Nothing is emitted when every CRUD operation is statically denied.
    /// Update inputs are emitted only if updates may be allowed, create
    /// inputs only if creates may be allowed.
    pub fn gql_types(&self) -> Vec<String> {
        if !self.access().may_allow_any() {
            return Vec::new();
        }
        let names = self.gql_names();
        let mut types: Vec<String> = Vec::new();

        for aux in self.collect_fragments(self.readable_fields(), |field, cx| {
            field.kind().gql_aux_types(cx)
        }) {
            if !types.contains(&aux) {
                types.push(aux);
            }
        }

        types.push(sdl::object_type(
            Some(self.description().unwrap_or(DEFAULT_DESCRIPTION)),
            &names.output_type_name,
            &self.collect_fragments(self.readable_fields(), |field, cx| {
                field.kind().gql_output_fields(cx)
            }),
        ));

        let mut where_fields = vec![
            format!("AND: [{}]", names.where_input_name),
            format!("OR: [{}]", names.where_input_name),
        ];
        where_fields.extend(self.collect_fragments(self.readable_fields(), |field, cx| {
            field.kind().gql_query_input_fields(cx)
        }));
        types.push(sdl::input_type(&names.where_input_name, &where_fields));
        types.push(sdl::input_type(
            &names.where_unique_input_name,
            &["id: ID!".to_string()],
        ));

        let sort_values: Vec<String> = self
            .orderable_fields()
            .flat_map(|field| {
                [
                    format!("{}_ASC", field.path()),
                    format!("{}_DESC", field.path()),
                ]
            })
            .collect();
        types.push(sdl::enum_type(&names.list_sort_name, &sort_values));

        let order_fields: Vec<String> = self
            .orderable_fields()
            .map(|field| format!("{}: OrderDirection", field.path()))
            .collect();
        types.push(sdl::input_type(&names.list_order_name, &order_fields));
        types.push(sdl::enum_type(
            "OrderDirection",
            &["asc".to_string(), "desc".to_string()],
        ));

        if self.access().may_allow(Operation::Update) {
            let updatable = self
                .fields()
                .iter()
                .filter(|field| field.access().update.may_allow());
            types.push(sdl::input_type(
                &names.update_input_name,
                &self.collect_fragments(updatable, |field, cx| {
                    field.kind().gql_update_input_fields(cx)
                }),
            ));
            types.push(sdl::input_type(
                &names.update_many_input_name,
                &[
                    "id: ID!".to_string(),
                    format!("data: {}", names.update_input_name),
                ],
            ));
        }

        if self.access().may_allow(Operation::Create) {
            let creatable = self
                .fields()
                .iter()
                .filter(|field| field.access().create.may_allow());
            types.push(sdl::input_type(
                &names.create_input_name,
                &self.collect_fragments(creatable, |field, cx| {
                    field.kind().gql_create_input_fields(cx)
                }),
            ));
            types.push(sdl::input_type(
                &names.create_many_input_name,
                &[format!("data: {}", names.create_input_name)],
            ));
        }

        types
    }

    /// Query root fields, empty unless reads may be allowed.
    pub fn gql_queries(&self) -> Vec<String> {
        if !self.access().may_allow(Operation::Read) {
            return Vec::new();
        }
        let names = self.gql_names();
        let output = &names.output_type_name;
        let filters = filter_fragment(names);
        vec![
            sdl::field(
                Some(&format!(
                    "Search for all {output} items which match the where clause."
                )),
                &names.list_query_name,
                &filters,
                &format!("[{output}!]"),
                None,
            ),
            sdl::field(
                Some(&format!("Search for the {output} item with the matching ID.")),
                &names.item_query_name,
                &[format!("where: {}!", names.where_unique_input_name)],
                output,
                None,
            ),
            sdl::field(
                Some(&format!(
                    "Perform a meta-query on all {output} items which match the where clause."
                )),
                &names.list_query_meta_name,
                &filters,
                "_QueryMeta",
                Some(&sdl::deprecated(&format!(
                    "This query will be removed in a future version. Please use {} instead.",
                    names.list_query_count_name
                ))),
            ),
            sdl::field(
                None,
                &names.list_query_count_name,
                &[format!("where: {}! = {{}}", names.where_input_name)],
                "Int",
                None,
            ),
        ]
    }

    /// Mutation root fields, each gated on its operation.
    pub fn gql_mutations(&self) -> Vec<String> {
        let names = self.gql_names();
        let output = &names.output_type_name;
        let mut mutations = Vec::new();

        if self.access().may_allow(Operation::Create) {
            mutations.push(sdl::field(
                Some(&format!("Create a single {output} item.")),
                &names.create_mutation_name,
                &[format!("data: {}", names.create_input_name)],
                output,
                None,
            ));
            mutations.push(sdl::field(
                Some(&format!("Create multiple {output} items.")),
                &names.create_many_mutation_name,
                &[format!("data: [{}]", names.create_many_input_name)],
                &format!("[{output}]"),
                None,
            ));
        }

        if self.access().may_allow(Operation::Update) {
            mutations.push(sdl::field(
                Some(&format!("Update a single {output} item by ID.")),
                &names.update_mutation_name,
                &[
                    "id: ID!".to_string(),
                    format!("data: {}", names.update_input_name),
                ],
                output,
                None,
            ));
            mutations.push(sdl::field(
                Some(&format!("Update multiple {output} items by ID.")),
                &names.update_many_mutation_name,
                &[format!("data: [{}]", names.update_many_input_name)],
                &format!("[{output}]"),
                None,
            ));
        }

        if self.access().may_allow(Operation::Delete) {
            mutations.push(sdl::field(
                Some(&format!("Delete a single {output} item by ID.")),
                &names.delete_mutation_name,
                &["id: ID!".to_string()],
                output,
                None,
            ));
            mutations.push(sdl::field(
                Some(&format!("Delete multiple {output} items by ID.")),
                &names.delete_many_mutation_name,
                &["ids: [ID!]".to_string()],
                &format!("[{output}]"),
                None,
            ));
        }

        mutations
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::access::{AccessRule, ListAccess, Operation};

    #[tokio::test]
    async fn test_filter_fragment() {
        let list = setup().await;
        insta::assert_snapshot!(super::filter_fragment(list.gql_names()).join("\n"), @r###"
        where: TestWhereInput! = {}
        search: String
        sortBy: [SortTestsBy!] @deprecated(reason: "sortBy has been deprecated in favour of orderBy")
        orderBy: [TestOrderByInput!]! = []
        first: Int
        skip: Int! = 0
        "###);
    }

    #[tokio::test]
    async fn test_gql_types() {
        let list = setup().await;
        insta::assert_snapshot!(list.gql_types().join("\n"), @r###"
        input OtherRelateToOneInput {
          connect: OtherWhereUniqueInput
          disconnect: OtherWhereUniqueInput
          disconnectAll: Boolean
        }
        """ A listql list """
        type Test {
          id: ID
          name: String
          email: String
          other: Other
          writeOnce: String
        }
        input TestWhereInput {
          AND: [TestWhereInput]
          OR: [TestWhereInput]
          id: ID
          id_not: ID
          id_in: [ID!]
          id_not_in: [ID!]
          name: String
          name_not: String
          name_contains: String
          name_not_contains: String
          name_starts_with: String
          name_not_starts_with: String
          name_ends_with: String
          name_not_ends_with: String
          name_i: String
          name_not_i: String
          name_contains_i: String
          name_not_contains_i: String
          name_starts_with_i: String
          name_not_starts_with_i: String
          name_ends_with_i: String
          name_not_ends_with_i: String
          name_in: [String]
          name_not_in: [String]
          email: String
          email_not: String
          email_contains: String
          email_not_contains: String
          email_starts_with: String
          email_not_starts_with: String
          email_ends_with: String
          email_not_ends_with: String
          email_i: String
          email_not_i: String
          email_contains_i: String
          email_not_contains_i: String
          email_starts_with_i: String
          email_not_starts_with_i: String
          email_ends_with_i: String
          email_not_ends_with_i: String
          email_in: [String]
          email_not_in: [String]
          other: OtherWhereInput
          other_is_null: Boolean
          writeOnce: String
          writeOnce_not: String
          writeOnce_contains: String
          writeOnce_not_contains: String
          writeOnce_starts_with: String
          writeOnce_not_starts_with: String
          writeOnce_ends_with: String
          writeOnce_not_ends_with: String
          writeOnce_i: String
          writeOnce_not_i: String
          writeOnce_contains_i: String
          writeOnce_not_contains_i: String
          writeOnce_starts_with_i: String
          writeOnce_not_starts_with_i: String
          writeOnce_ends_with_i: String
          writeOnce_not_ends_with_i: String
          writeOnce_in: [String]
          writeOnce_not_in: [String]
        }
        input TestWhereUniqueInput {
          id: ID!
        }
        enum SortTestsBy {
          id_ASC
          id_DESC
          name_ASC
          name_DESC
          email_ASC
          email_DESC
          writeOnce_ASC
          writeOnce_DESC
        }
        input TestOrderByInput {
          id: OrderDirection
          name: OrderDirection
          email: OrderDirection
          writeOnce: OrderDirection
        }
        enum OrderDirection {
          asc
          desc
        }
        input TestUpdateInput {
          name: String
          email: String
          other: OtherRelateToOneInput
          hidden: String
        }
        input TestsUpdateInput {
          id: ID!
          data: TestUpdateInput
        }
        input TestCreateInput {
          name: String
          email: String
          other: OtherRelateToOneInput
          hidden: String
          writeOnce: String
        }
        input TestsCreateInput {
          data: TestCreateInput
        }
        "###);
    }

    #[tokio::test]
    async fn test_gql_types_follow_access() {
        let denied = setup_with(test_config().access(ListAccess::all(AccessRule::Static(false)))).await;
        assert!(denied.gql_types().is_empty());
        assert!(denied.gql_queries().is_empty());
        assert!(denied.gql_mutations().is_empty());

        let read_only = ListAccess::all(AccessRule::Static(false))
            .with(Operation::Read, AccessRule::Static(true));
        let list = setup_with(test_config().access(read_only)).await;
        let types = list.gql_types();
        assert!(types.iter().any(|t| t.contains("type Test {")));
        assert!(!types.iter().any(|t| t.contains("TestUpdateInput")));
        assert!(!types.iter().any(|t| t.contains("TestCreateInput")));
        assert_eq!(list.gql_queries().len(), 4);
        assert!(list.gql_mutations().is_empty());

        let create_only = ListAccess::all(AccessRule::Static(false))
            .with(Operation::Create, AccessRule::Static(true));
        let list = setup_with(test_config().access(create_only)).await;
        let types = list.gql_types();
        assert!(types.iter().any(|t| t.starts_with("input TestCreateInput")));
        assert!(types.iter().any(|t| t.starts_with("input TestsCreateInput")));
        assert!(!types.iter().any(|t| t.contains("TestUpdateInput")));
        assert!(list.gql_queries().is_empty());
        let mutations = list.gql_mutations();
        assert_eq!(mutations.len(), 2);
        assert!(mutations[0].ends_with("createTest(data: TestCreateInput): Test"));
        assert!(mutations[1].ends_with("createTests(data: [TestsCreateInput]): [Test]"));
    }

    #[tokio::test]
    async fn test_gql_queries() {
        let list = setup().await;
        let queries = list.gql_queries();
        assert_eq!(queries.len(), 4);
        assert!(queries[0].starts_with(
            "\"\"\" Search for all Test items which match the where clause. \"\"\"\nallTests(\n"
        ));
        assert!(queries[0].ends_with("): [Test!]"));
        assert_eq!(
            queries[1],
            "\"\"\" Search for the Test item with the matching ID. \"\"\"\nTest(where: TestWhereUniqueInput!): Test"
        );
        assert!(queries[2].ends_with(
            "): _QueryMeta @deprecated(reason: \"This query will be removed in a future version. Please use testsCount instead.\")"
        ));
        assert_eq!(queries[3], "testsCount(where: TestWhereInput! = {}): Int");
    }

    #[tokio::test]
    async fn test_gql_mutations() {
        let list = setup().await;
        insta::assert_snapshot!(list.gql_mutations().join("\n"), @r###"
        """ Create a single Test item. """
        createTest(data: TestCreateInput): Test
        """ Create multiple Test items. """
        createTests(data: [TestsCreateInput]): [Test]
        """ Update a single Test item by ID. """
        updateTest(id: ID!, data: TestUpdateInput): Test
        """ Update multiple Test items by ID. """
        updateTests(data: [TestsUpdateInput]): [Test]
        """ Delete a single Test item by ID. """
        deleteTest(id: ID!): Test
        """ Delete multiple Test items by ID. """
        deleteTests(ids: [ID!]): [Test]
        "###);
    }
}
