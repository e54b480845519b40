//! Merge engine: folds a key/value pair into a partially built mapping.
//!
//! The same policy applies to attributes, element text and completed children:
//!
//! | existing entry under `key`  | incoming value | result                          |
//! |-----------------------------|----------------|---------------------------------|
//! | none, key force-listed      | any            | `[value]`                       |
//! | none                        | any            | `value`                         |
//! | sequence                    | any            | value appended                  |
//! | mapping                     | mapping        | incoming keys overwrite         |
//! | anything else               | any            | `[existing, value]`             |
//!
//! Repeated sibling elements therefore collapse into a sequence in document order.

use serde_json::{Map, Value};

use crate::options::ForceList;

/// Merge `value` under `key` into `parent`, creating the mapping when absent.
///
/// ```rust
/// use serde_json::json;
/// use xml_metadata::{merge, ForceList};
///
/// let none = ForceList::new();
/// let first = merge::push(None, "a", json!("1"), &none);
/// let second = merge::push(Some(first), "a", json!("2"), &none);
/// assert_eq!(serde_json::Value::Object(second), json!({"a": ["1", "2"]}));
/// ```
pub fn push(
    parent: Option<Map<String, Value>>,
    key: &str,
    value: Value,
    force_list: &ForceList,
) -> Map<String, Value> {
    let mut parent = parent.unwrap_or_default();
    match parent.get_mut(key) {
        None => {
            let value = if force_list.contains(key) {
                Value::Array(vec![value])
            } else {
                value
            };
            parent.insert(key.to_owned(), value);
        }
        Some(Value::Array(seq)) => seq.push(value),
        Some(Value::Object(existing)) if value.is_object() => {
            if let Value::Object(incoming) = value {
                existing.extend(incoming);
            }
        }
        Some(existing) => {
            let previous = existing.take();
            *existing = Value::Array(vec![previous, value]);
        }
    }
    parent
}
