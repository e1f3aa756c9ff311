//! Author and organisation names from JSON-LD structured data.
//!
//! Blocks may be a single node, an array of nodes, or an object with an
//! `@graph` array; all shapes are walked recursively.

use serde_json::Value;

use crate::html::clean_text;

const MAX_NAME_LEN: usize = 100;

fn usable_name(raw: &str) -> Option<String> {
    let name = clean_text(raw);
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.starts_with("http") {
        return None;
    }
    Some(name)
}

fn type_matches(node_type: Option<&Value>, pred: impl Fn(&str) -> bool) -> bool {
    match node_type {
        Some(Value::String(s)) => pred(s),
        Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).any(pred),
        _ => false,
    }
}

fn is_person(t: &str) -> bool {
    t.eq_ignore_ascii_case("person")
}

fn is_organization(t: &str) -> bool {
    let lower = t.to_lowercase();
    lower.contains("organization") || lower == "corporation" || lower == "localbusiness"
}

fn name_of(node: &Value) -> Option<String> {
    match node {
        Value::String(s) => usable_name(s),
        Value::Object(map) => map.get("name").and_then(Value::as_str).and_then(usable_name),
        Value::Array(items) => items.iter().find_map(name_of),
        _ => None,
    }
}

/// First author name in a JSON-LD value.
///
/// At each node an explicit `author` (object, string or array) wins over the
/// node itself being a `Person`; children are searched depth-first after that.
#[must_use]
pub fn author_name(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(name) = map.get("author").and_then(name_of) {
                return Some(name);
            }
            if type_matches(map.get("@type"), is_person) {
                if let Some(name) = map.get("name").and_then(Value::as_str).and_then(usable_name) {
                    return Some(name);
                }
            }
            map.iter()
                .filter(|(key, _)| key.as_str() != "author")
                .find_map(|(_, child)| author_name(child))
        }
        Value::Array(items) => items.iter().find_map(author_name),
        _ => None,
    }
}

/// First organisation name in a JSON-LD value: an `Organization`-typed node's
/// `name`, or any node's `publisher.name`.
#[must_use]
pub fn company_name(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if type_matches(map.get("@type"), is_organization) {
                if let Some(name) = map.get("name").and_then(Value::as_str).and_then(usable_name) {
                    return Some(name);
                }
            }
            if let Some(name) = map.get("publisher").and_then(name_of) {
                return Some(name);
            }
            map.values().find_map(company_name)
        }
        Value::Array(items) => items.iter().find_map(company_name),
        _ => None,
    }
}
