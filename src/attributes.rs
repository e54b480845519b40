//! Attribute normalization.
//!
//! Namespace declarations and schema-location hints are not data. They are pulled out
//! of the attribute list and carried on the node path instead, attached to the next
//! element that has attributes of its own.

use serde_json::{Map, Value};

/// True for attributes that never reach the produced value.
pub fn is_reserved(name: &str) -> bool {
    name == "xmlns"
        || name.starts_with("xmlns:")
        || name == "xsi:schemaLocation"
        || name == "xsi:noNamespaceSchemaLocation"
}

/// Attributes of one element after reserved ones have been split off.
#[derive(Debug, Default)]
pub(crate) struct Normalized {
    /// Ordinary attributes in document order, unprefixed.
    pub(crate) ordinary: Vec<(String, String)>,
    /// Reserved attributes collected since the last element that took them.
    pub(crate) namespaces: Option<Map<String, Value>>,
}

impl Normalized {
    /// Ordinary attributes under their prefixed keys, or `None` when there are none.
    pub(crate) fn mapping(&self, prefix: &str) -> Option<Map<String, Value>> {
        if self.ordinary.is_empty() {
            return None;
        }
        Some(
            self.ordinary
                .iter()
                .map(|(name, value)| (format!("{prefix}{name}"), Value::String(value.clone())))
                .collect(),
        )
    }

    pub(crate) fn path_attributes(&self) -> Option<Vec<(String, String)>> {
        (!self.ordinary.is_empty()).then(|| self.ordinary.clone())
    }
}

/// Splits attribute lists and keeps pending namespace declarations across elements.
#[derive(Debug, Default)]
pub(crate) struct AttributeNormalizer {
    pending: Map<String, Value>,
}

impl AttributeNormalizer {
    pub(crate) fn normalize(&mut self, raw: Vec<(String, String)>) -> Normalized {
        let carrier = !raw.is_empty();
        let mut ordinary = Vec::with_capacity(raw.len());
        for (name, value) in raw {
            if is_reserved(&name) {
                self.pending.insert(name, Value::String(value));
            } else {
                ordinary.push((name, value));
            }
        }
        let namespaces =
            (carrier && !self.pending.is_empty()).then(|| std::mem::take(&mut self.pending));
        Normalized {
            ordinary,
            namespaces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reserved_names() {
        assert!(is_reserved("xmlns"));
        assert!(is_reserved("xmlns:ms"));
        assert!(is_reserved("xsi:schemaLocation"));
        assert!(!is_reserved("xmlnsfoo"));
        assert!(!is_reserved("lang"));
    }

    #[test]
    fn splits_and_prefixes() {
        let mut norm = AttributeNormalizer::default();
        let out = norm.normalize(attrs(&[
            ("xmlns", "http://example.org/ms"),
            ("id", "7"),
            ("lang", "en"),
        ]));
        assert_eq!(
            Value::Object(out.mapping("@").unwrap()),
            json!({"@id": "7", "@lang": "en"})
        );
        assert_eq!(
            Value::Object(out.namespaces.unwrap()),
            json!({"xmlns": "http://example.org/ms"})
        );
    }

    #[test]
    fn only_reserved_attributes_report_none() {
        let mut norm = AttributeNormalizer::default();
        let out = norm.normalize(attrs(&[(
            "xmlns:xsi",
            "http://www.w3.org/2001/XMLSchema-instance",
        )]));
        assert!(out.mapping("@").is_none());
        assert!(out.path_attributes().is_none());
        assert!(out.namespaces.is_some());
    }

    #[test]
    fn empty_prefix_keeps_raw_names() {
        let mut norm = AttributeNormalizer::default();
        let out = norm.normalize(attrs(&[("id", "1")]));
        assert_eq!(Value::Object(out.mapping("").unwrap()), json!({"id": "1"}));
    }

    #[test]
    fn elements_without_attributes_do_not_take_pending() {
        let mut norm = AttributeNormalizer::default();
        norm.pending.insert("xmlns".into(), json!("urn:x"));
        let bare = norm.normalize(Vec::new());
        assert!(bare.namespaces.is_none());
        let next = norm.normalize(attrs(&[("id", "1")]));
        assert_eq!(Value::Object(next.namespaces.unwrap()), json!({"xmlns": "urn:x"}));
    }
}
