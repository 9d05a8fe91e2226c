//! GraphQL SDL rendering helpers.
//!
//! Lists and field types build their schema contribution out of these small
//! printers so every fragment shares one layout: two-space indentation,
//! one member per line, and `""" ... """` single-line descriptions.

/// Renders a single-line block description.
pub fn description(text: &str) -> String {
    format!("\"\"\" {text} \"\"\"")
}

/// Indents every non-empty line of `text` by `width` spaces.
pub fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn block(keyword: &str, name: &str, description_text: Option<&str>, members: &[String]) -> String {
    let mut out = String::new();
    if let Some(text) = description_text {
        out.push_str(&description(text));
        out.push('\n');
    }
    out.push_str(keyword);
    out.push(' ');
    out.push_str(name);
    out.push_str(" {\n");
    for member in members {
        out.push_str(&indent(member, 2));
        out.push('\n');
    }
    out.push('}');
    out
}

/// Renders an object type.
pub fn object_type(description_text: Option<&str>, name: &str, fields: &[String]) -> String {
    block("type", name, description_text, fields)
}

/// Renders an input object type.
pub fn input_type(name: &str, fields: &[String]) -> String {
    block("input", name, None, fields)
}

/// Renders an enum type.
pub fn enum_type(name: &str, values: &[String]) -> String {
    block("enum", name, None, values)
}

/// Renders a field definition with arguments.
///
/// Up to two arguments stay on one line; longer argument lists are broken
/// one per line.
pub fn field(
    description_text: Option<&str>,
    name: &str,
    args: &[String],
    ty: &str,
    directive: Option<&str>,
) -> String {
    let mut out = String::new();
    if let Some(text) = description_text {
        out.push_str(&description(text));
        out.push('\n');
    }
    out.push_str(name);
    match args.len() {
        0 => {}
        1 | 2 => {
            out.push('(');
            out.push_str(&args.join(", "));
            out.push(')');
        }
        _ => {
            out.push_str("(\n");
            for arg in args {
                out.push_str(&indent(arg, 2));
                out.push('\n');
            }
            out.push(')');
        }
    }
    out.push_str(": ");
    out.push_str(ty);
    if let Some(directive) = directive {
        out.push(' ');
        out.push_str(directive);
    }
    out
}

/// Renders a `@deprecated` directive.
pub fn deprecated(reason: &str) -> String {
    format!("@deprecated(reason: \"{reason}\")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_type() {
        let sdl = input_type(
            "OtherRelateToOneInput",
            &[
                "connect: OtherWhereUniqueInput".into(),
                "disconnect: OtherWhereUniqueInput".into(),
                "disconnectAll: Boolean".into(),
            ],
        );
        insta::assert_snapshot!(sdl, @r###"
        input OtherRelateToOneInput {
          connect: OtherWhereUniqueInput
          disconnect: OtherWhereUniqueInput
          disconnectAll: Boolean
        }
        "###);
    }

    #[test]
    fn test_enum_type() {
        let sdl = enum_type("OrderDirection", &["asc".into(), "desc".into()]);
        assert_eq!(sdl, "enum OrderDirection {\n  asc\n  desc\n}");
    }

    #[test]
    fn test_field_layouts() {
        assert_eq!(
            field(None, "testsCount", &["where: TestWhereInput! = {}".into()], "Int", None),
            "testsCount(where: TestWhereInput! = {}): Int"
        );
        assert_eq!(
            field(
                Some("Delete a single Test item by ID."),
                "deleteTest",
                &["id: ID!".into()],
                "Test",
                None
            ),
            "\"\"\" Delete a single Test item by ID. \"\"\"\ndeleteTest(id: ID!): Test"
        );
        assert_eq!(
            field(
                None,
                "_allTestsMeta",
                &["a: Int".into(), "b: Int".into(), "c: Int".into()],
                "_QueryMeta",
                Some(&deprecated("gone"))
            ),
            "_allTestsMeta(\n  a: Int\n  b: Int\n  c: Int\n): _QueryMeta @deprecated(reason: \"gone\")"
        );
    }

    #[test]
    fn test_object_type_indents_nested_lines() {
        let nested = field(
            None,
            "items",
            &["a: Int".into(), "b: Int".into(), "c: Int".into()],
            "[Item!]",
            None,
        );
        let sdl = object_type(Some("A list."), "Box", &["id: ID".into(), nested]);
        assert_eq!(
            sdl,
            "\"\"\" A list. \"\"\"\ntype Box {\n  id: ID\n  items(\n    a: Int\n    b: Int\n    c: Int\n  ): [Item!]\n}"
        );
    }
}
