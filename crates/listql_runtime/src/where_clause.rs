//! Where-input helpers.
//!
//! A where-input is a JSON object whose keys are either `AND` / `OR`
//! (arrays of nested where-inputs) or `<field>[_<operator>]` filters.
//! Ids are compared as strings so that `"1"` and `1` name the same item.

use crate::Item;
use listql_core::{ListError, ListResult};
use serde_json::{json, Value};
use std::cmp::Ordering;

/// A where-input object.
pub type WhereInput = Item;

/// Returns the canonical comparison key of an id.
pub fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Returns true if both values name the same id.
pub fn ids_equal(a: &Value, b: &Value) -> bool {
    match (id_key(a), id_key(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Combines two filters so that both must hold.
pub fn merge_where(a: WhereInput, b: WhereInput) -> WhereInput {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b,
        (_, true) => a,
        _ => {
            let mut merged = WhereInput::new();
            merged.insert("AND".into(), json!([a, b]));
            merged
        }
    }
}

/// Builds `{ id_in: ids }`.
pub fn id_in(ids: &[Value]) -> WhereInput {
    let mut filter = WhereInput::new();
    filter.insert("id_in".into(), Value::Array(ids.to_vec()));
    filter
}

/// Top-level id constraints of a filter.
///
/// `id` and `id_in` together form the allowed set; `id_not` and
/// `id_not_in` form the denied set. Nested constraints inside `AND` / `OR`
/// are left to the storage adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdConstraints {
    allowed: Option<Vec<String>>,
    denied: Vec<String>,
}

impl IdConstraints {
    pub fn from_filter(filter: &WhereInput) -> Self {
        let mut allowed: Option<Vec<String>> = None;
        let mut denied = Vec::new();
        for (key, value) in filter {
            match key.as_str() {
                "id" | "id_in" => allowed
                    .get_or_insert_with(Vec::new)
                    .extend(id_keys(value)),
                "id_not" | "id_not_in" => denied.extend(id_keys(value)),
                _ => {}
            }
        }
        Self { allowed, denied }
    }

    /// Returns true if the id satisfies every constraint.
    pub fn permits(&self, id: &Value) -> bool {
        let Some(key) = id_key(id) else {
            return false;
        };
        let allowed = self.allowed.as_ref().map_or(true, |ids| ids.contains(&key));
        allowed && !self.denied.contains(&key)
    }
}

fn id_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Array(ids) => ids.iter().filter_map(id_key).collect(),
        other => id_key(other).into_iter().collect(),
    }
}

/// Returns the filter without its top-level id clauses.
pub fn without_id_clauses(filter: &WhereInput) -> WhereInput {
    filter
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "id" | "id_in" | "id_not" | "id_not_in"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Filter operators, longest suffix first so that `_not_in` wins over `_in`.
const OPERATORS: &[&str] = &[
    "_not_starts_with_i",
    "_not_ends_with_i",
    "_not_contains_i",
    "_starts_with_i",
    "_ends_with_i",
    "_contains_i",
    "_not_starts_with",
    "_not_ends_with",
    "_not_contains",
    "_starts_with",
    "_ends_with",
    "_contains",
    "_is_null",
    "_not_in",
    "_not_i",
    "_every",
    "_some",
    "_none",
    "_not",
    "_lte",
    "_gte",
    "_in",
    "_lt",
    "_gt",
    "_i",
];

fn split_operator(key: &str) -> (&str, &str) {
    OPERATORS
        .iter()
        .find_map(|op| {
            key.strip_suffix(op)
                .filter(|field| !field.is_empty())
                .map(|field| (field, op.trim_start_matches('_')))
        })
        .unwrap_or((key, ""))
}

/// Evaluates a filter against an item.
///
/// Relationship filters that need another list's items (`<field>: {...}`,
/// `_some`, `_every`, `_none`) are rejected.
pub fn matches(item: &Item, filter: &WhereInput) -> ListResult<bool> {
    for (key, expected) in filter {
        let ok = match key.as_str() {
            "AND" => {
                let mut all = true;
                for nested in nested_filters(key, expected)? {
                    if !matches(item, nested)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "OR" => {
                let mut any = false;
                for nested in nested_filters(key, expected)? {
                    if matches(item, nested)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            _ => {
                let (field, op) = split_operator(key);
                let actual = item.get(field).unwrap_or(&Value::Null);
                apply_operator(key, op, actual, expected)?
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn nested_filters<'a>(key: &str, value: &'a Value) -> ListResult<Vec<&'a WhereInput>> {
    value
        .as_array()
        .ok_or_else(|| ListError::user_input(format!("{key} expects a list of filters")))?
        .iter()
        .map(|v| {
            v.as_object()
                .ok_or_else(|| ListError::user_input(format!("{key} expects a list of filters")))
        })
        .collect()
}

fn apply_operator(key: &str, op: &str, actual: &Value, expected: &Value) -> ListResult<bool> {
    let unsupported = || ListError::storage(format!("unsupported filter '{key}'"));
    Ok(match op {
        "" if expected.is_object() => return Err(unsupported()),
        "" => loose_eq(actual, expected),
        "not" => !loose_eq(actual, expected),
        "i" => str_op(actual, expected, true, |a, b| a == b),
        "not_i" => !str_op(actual, expected, true, |a, b| a == b),
        "contains" => str_op(actual, expected, false, |a, b| a.contains(b)),
        "not_contains" => !str_op(actual, expected, false, |a, b| a.contains(b)),
        "contains_i" => str_op(actual, expected, true, |a, b| a.contains(b)),
        "not_contains_i" => !str_op(actual, expected, true, |a, b| a.contains(b)),
        "starts_with" => str_op(actual, expected, false, |a, b| a.starts_with(b)),
        "not_starts_with" => !str_op(actual, expected, false, |a, b| a.starts_with(b)),
        "starts_with_i" => str_op(actual, expected, true, |a, b| a.starts_with(b)),
        "not_starts_with_i" => !str_op(actual, expected, true, |a, b| a.starts_with(b)),
        "ends_with" => str_op(actual, expected, false, |a, b| a.ends_with(b)),
        "not_ends_with" => !str_op(actual, expected, false, |a, b| a.ends_with(b)),
        "ends_with_i" => str_op(actual, expected, true, |a, b| a.ends_with(b)),
        "not_ends_with_i" => !str_op(actual, expected, true, |a, b| a.ends_with(b)),
        "in" => in_list(key, actual, expected)?,
        "not_in" => !in_list(key, actual, expected)?,
        "lt" => range(actual, expected) == Some(Ordering::Less),
        "lte" => matches!(
            range(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        "gt" => range(actual, expected) == Some(Ordering::Greater),
        "gte" => matches!(
            range(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        "is_null" => {
            let want_null = expected
                .as_bool()
                .ok_or_else(|| ListError::user_input(format!("{key} expects a boolean")))?;
            actual.is_null() == want_null
        }
        _ => return Err(unsupported()),
    })
}

// Range operators never match a missing value.
fn range(actual: &Value, expected: &Value) -> Option<Ordering> {
    if actual.is_null() || expected.is_null() {
        return None;
    }
    compare_values(actual, expected)
}

fn loose_eq(actual: &Value, expected: &Value) -> bool {
    actual == expected || ids_equal(actual, expected)
}

fn str_op(actual: &Value, expected: &Value, fold: bool, f: impl Fn(&str, &str) -> bool) -> bool {
    match (actual.as_str(), expected.as_str()) {
        (Some(a), Some(b)) if fold => f(&a.to_lowercase(), &b.to_lowercase()),
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn in_list(key: &str, actual: &Value, expected: &Value) -> ListResult<bool> {
    let values = expected
        .as_array()
        .ok_or_else(|| ListError::user_input(format!("{key} expects a list")))?;
    Ok(values.iter().any(|v| loose_eq(actual, v)))
}

/// Orders two scalar values. Nulls sort first; mixed types do not compare.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(value: Value) -> Item {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_id_keys_are_normalized() {
        assert!(ids_equal(&json!("1"), &json!(1)));
        assert!(!ids_equal(&json!(null), &json!(null)));
        assert_eq!(id_key(&json!(3)), Some("3".to_string()));
    }

    #[test]
    fn test_merge_where() {
        let a = item(json!({"name": "a"}));
        assert_eq!(merge_where(a.clone(), Item::new()), a);
        assert_eq!(merge_where(Item::new(), a.clone()), a);
        let b = item(json!({"email": "b"}));
        assert_eq!(
            Value::Object(merge_where(a, b)),
            json!({"AND": [{"name": "a"}, {"email": "b"}]})
        );
    }

    #[test]
    fn test_id_constraints() {
        let c = IdConstraints::from_filter(&item(json!({"id": 1, "id_in": ["2"], "name": "x"})));
        assert!(c.permits(&json!("1")));
        assert!(c.permits(&json!(2)));
        assert!(!c.permits(&json!(3)));

        let c = IdConstraints::from_filter(&item(json!({"id_not": 1, "id_not_in": [2]})));
        assert!(!c.permits(&json!(1)));
        assert!(!c.permits(&json!(2)));
        assert!(c.permits(&json!(3)));

        assert!(IdConstraints::default().permits(&json!(9)));
        assert_eq!(
            Value::Object(without_id_clauses(&item(json!({"id": 1, "name": "x"})))),
            json!({"name": "x"})
        );
    }

    #[test]
    fn test_split_operator() {
        assert_eq!(split_operator("name_not_in"), ("name", "not_in"));
        assert_eq!(split_operator("name_contains_i"), ("name", "contains_i"));
        assert_eq!(split_operator("name_i"), ("name", "i"));
        assert_eq!(split_operator("name"), ("name", ""));
        assert_eq!(split_operator("_in"), ("_in", ""));
    }

    #[test]
    fn test_matches_scalar_filters() {
        let row = item(json!({"id": 1, "name": "Alice", "age": 30, "other": null}));
        let check = |filter: Value| matches(&row, &item(filter)).unwrap();

        assert!(check(json!({})));
        assert!(check(json!({"id": "1"})));
        assert!(check(json!({"name_contains_i": "ali"})));
        assert!(!check(json!({"name_contains": "ali"})));
        assert!(check(json!({"name_not_starts_with": "B"})));
        assert!(check(json!({"name_i": "ALICE"})));
        assert!(check(json!({"age_gte": 30, "age_lt": 31})));
        assert!(check(json!({"id_in": [1, 2]})));
        assert!(!check(json!({"id_not_in": ["1"]})));
        assert!(check(json!({"other_is_null": true})));
        assert!(check(json!({"OR": [{"name": "Bob"}, {"age": 30}]})));
        assert!(!check(json!({"AND": [{"name": "Alice"}, {"age": 31}]})));
    }

    #[test]
    fn test_matches_rejects_relationship_filters() {
        let row = item(json!({"id": 1}));
        let err = matches(&row, &item(json!({"other": {"name": "x"}}))).unwrap_err();
        assert_eq!(err.code, listql_core::ErrorCode::StorageError);
        assert!(matches(&row, &item(json!({"others_some": {}}))).is_err());
    }
}
