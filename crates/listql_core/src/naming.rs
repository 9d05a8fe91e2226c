//! Name derivation for lists.
//!
//! Every GraphQL name a list contributes is derived from its key and its
//! plural form. The plural must differ from the key, otherwise the list query
//! and the item query would collide.

use crate::error::{ListError, ListResult};
use serde::Serialize;

const UNCOUNTABLE: &[&str] = &[
    "data",
    "deer",
    "equipment",
    "feedback",
    "fish",
    "information",
    "media",
    "metadata",
    "money",
    "news",
    "series",
    "sheep",
    "software",
    "species",
    "staff",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("man", "men"),
    ("mouse", "mice"),
    ("ox", "oxen"),
    ("person", "people"),
    ("tooth", "teeth"),
    ("woman", "women"),
];

/// Returns the plural form of a list key.
///
/// Only the last word of a `PascalCase` key is inflected, so `BlogPost`
/// becomes `BlogPosts` and `SalesPerson` becomes `SalesPeople`. Words that
/// already look plural are returned unchanged.
pub fn pluralize(key: &str) -> String {
    let split = key
        .char_indices()
        .filter(|(_, c)| c.is_uppercase())
        .map(|(i, _)| i)
        .filter(|&i| {
            // Acronym runs like `URL` stay together.
            i == 0
                || !key[..i]
                    .chars()
                    .next_back()
                    .is_some_and(char::is_uppercase)
        })
        .last()
        .unwrap_or(0);
    let (head, word) = key.split_at(split);
    format!("{head}{}", pluralize_word(word))
}

fn pluralize_word(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if word.len() > 1 && word.chars().all(|c| !c.is_lowercase()) {
        return format!("{word}s");
    }

    let lower = word.to_lowercase();
    let plural = inflect(&lower);
    if word.starts_with(|c: char| c.is_uppercase()) {
        capitalize(&plural)
    } else {
        plural
    }
}

fn inflect(word: &str) -> String {
    if UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    for (singular, plural) in IRREGULAR {
        if word == *plural {
            return word.to_string();
        }
        if word == *singular {
            return (*plural).to_string();
        }
    }
    if let Some(stem) = word.strip_suffix("is") {
        return format!("{stem}es");
    }
    if word.ends_with("ss") || word.ends_with("us") {
        return format!("{word}es");
    }
    if word.ends_with('s') {
        return word.to_string();
    }
    if ["x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The GraphQL names a list contributes to the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlNames {
    pub output_type_name: String,
    pub item_query_name: String,
    pub list_query_name: String,
    pub list_query_meta_name: String,
    pub list_query_count_name: String,
    pub list_sort_name: String,
    pub list_order_name: String,
    pub delete_mutation_name: String,
    pub delete_many_mutation_name: String,
    pub update_mutation_name: String,
    pub create_mutation_name: String,
    pub update_many_mutation_name: String,
    pub create_many_mutation_name: String,
    pub where_input_name: String,
    pub where_unique_input_name: String,
    pub update_input_name: String,
    pub create_input_name: String,
    pub update_many_input_name: String,
    pub create_many_input_name: String,
    pub relate_to_many_input_name: String,
    pub relate_to_one_input_name: String,
}

impl GqlNames {
    /// Derives the names for `key`, using `plural` when configured.
    ///
    /// Fails when the plural form equals the key.
    pub fn derive(key: &str, plural: Option<&str>) -> ListResult<Self> {
        let plural = plural.map_or_else(|| pluralize(key), str::to_string);
        if plural == key {
            return Err(ListError::config(format!(
                "Unable to use {key} as a List name - it has an ambiguous plural ({plural}). Please choose another name for your list."
            )));
        }
        Ok(Self::from_parts(key, &plural))
    }

    /// Builds names from an already validated key and plural.
    pub fn from_parts(key: &str, plural: &str) -> Self {
        Self {
            output_type_name: key.to_string(),
            item_query_name: key.to_string(),
            list_query_name: format!("all{plural}"),
            list_query_meta_name: format!("_all{plural}Meta"),
            list_query_count_name: format!("{}Count", lower_first(plural)),
            list_sort_name: format!("Sort{plural}By"),
            list_order_name: format!("{key}OrderByInput"),
            delete_mutation_name: format!("delete{key}"),
            delete_many_mutation_name: format!("delete{plural}"),
            update_mutation_name: format!("update{key}"),
            create_mutation_name: format!("create{key}"),
            update_many_mutation_name: format!("update{plural}"),
            create_many_mutation_name: format!("create{plural}"),
            where_input_name: format!("{key}WhereInput"),
            where_unique_input_name: format!("{key}WhereUniqueInput"),
            update_input_name: format!("{key}UpdateInput"),
            create_input_name: format!("{key}CreateInput"),
            update_many_input_name: format!("{plural}UpdateInput"),
            create_many_input_name: format!("{plural}CreateInput"),
            relate_to_many_input_name: format!("{key}RelateToManyInput"),
            relate_to_one_input_name: format!("{key}RelateToOneInput"),
        }
    }
}
