//! Tree builder: turns start/text/end notifications into nested values.
//!
//! State is a node path (open elements), a frame stack (the saved partial item, text
//! and language of every enclosing element below the depth cutoff) and the current
//! partial item. Elements deeper than the cutoff are folded into their parent when they
//! close. Elements closing exactly at the cutoff are handed to the item callback and
//! their state is dropped, so memory stays bounded by one item.

use std::borrow::Cow;

use serde_json::{Map, Value};
use smallvec::SmallVec;
use tracing::trace;

use crate::attributes::AttributeNormalizer;
use crate::de::Flow;
use crate::error::Error;
use crate::merge;
use crate::options::Options;
use crate::path::{NodePath, PathSegment, display_path};

#[derive(Debug, Default)]
struct Frame {
    item: Option<Map<String, Value>>,
    text: Vec<String>,
    lang: Option<String>,
}

pub(crate) struct TreeBuilder<'o> {
    options: &'o Options,
    language_key: String,
    normalizer: AttributeNormalizer,
    path: SmallVec<[PathSegment; 8]>,
    frames: Vec<Frame>,
    item: Option<Map<String, Value>>,
    text: Vec<String>,
    lang: Option<String>,
}

impl<'o> TreeBuilder<'o> {
    pub(crate) fn new(options: &'o Options) -> Self {
        Self {
            options,
            language_key: options.language_key(),
            normalizer: AttributeNormalizer::default(),
            path: SmallVec::new(),
            frames: Vec::new(),
            item: None,
            text: Vec::new(),
            lang: None,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.path.len()
    }

    pub(crate) fn start_element(&mut self, name: String, attributes: Vec<(String, String)>) {
        let normalized = self.normalizer.normalize(attributes);
        self.path.push(PathSegment {
            name,
            attributes: normalized.path_attributes(),
            namespaces: normalized.namespaces.clone(),
        });

        let depth = self.path.len();
        let cutoff = self.options.depth_cutoff;
        if depth > cutoff {
            self.frames.push(Frame {
                item: self.item.take(),
                text: std::mem::take(&mut self.text),
                lang: self.lang.take(),
            });
            if self.options.xml_attributes {
                if let Some(mapping) = normalized.mapping(&self.options.attribute_prefix) {
                    let mut item = None;
                    for (key, value) in mapping {
                        item = self.push_data(item, &key, value);
                    }
                    self.lang = item
                        .as_ref()
                        .and_then(|map| map.get(&self.language_key))
                        .and_then(Value::as_str)
                        .map(str::to_owned);
                    self.item = item;
                }
            }
        } else if depth == cutoff {
            // Text seen above the cutoff is not part of the item.
            self.text.clear();
        }
    }

    pub(crate) fn characters(&mut self, text: String) {
        if !text.is_empty() {
            self.text.push(text);
        }
    }

    /// Close the innermost element. Returns the callback's decision when the element
    /// completed an item at the depth cutoff, `Flow::Continue` otherwise.
    pub(crate) fn end_element<F>(&mut self, name: &str, on_item: &mut F) -> Result<Flow, Error>
    where
        F: FnMut(&NodePath, Value) -> Flow,
    {
        let depth = self.path.len();
        let Some(open) = self.path.last() else {
            return Err(Error::invariant(format!(
                "end of `{name}` with an empty node path"
            )));
        };
        if open.name != name {
            return Err(Error::invariant(format!(
                "end of `{name}` while `{}` is open",
                open.name
            )));
        }
        let expected = depth.saturating_sub(self.options.depth_cutoff);
        if self.frames.len() != expected {
            return Err(Error::invariant(format!(
                "{} saved frames at depth {depth}, expected {expected}",
                self.frames.len()
            )));
        }

        let mut flow = Flow::Continue;
        if depth == self.options.depth_cutoff {
            let value = match self.item.take() {
                Some(map) => Value::Object(map),
                None => self.joined_text().map_or(Value::Null, Value::String),
            };
            trace!(path = %display_path(&self.path), "item completed");
            flow = on_item(self.path.as_slice(), value);
        }

        if let Some(parent) = self.frames.pop() {
            let text = self.finished_text();
            let own = self.item.take();
            let lang = self.lang.take();
            let own = match (own, &text) {
                (None, Some(_)) if self.options.force_text_key => Some(Map::new()),
                (own, _) => own,
            };
            let value = match own {
                Some(mut map) => {
                    if let Some(text) = text {
                        let text = Value::String(text);
                        let promoted = match lang {
                            Some(code) if map.contains_key(&self.language_key) => {
                                map.shift_remove(&self.language_key);
                                Some(code)
                            }
                            _ => None,
                        };
                        map = match promoted {
                            Some(code) => self.push_data(Some(map), &code, text),
                            None => {
                                let key = self.options.text_key.clone();
                                self.push_data(Some(map), &key, text)
                            }
                        }
                        .unwrap_or_default();
                    }
                    Value::Object(map)
                }
                None => text.map_or(Value::Null, coerce_leaf),
            };
            let merged = self.push_data(parent.item, name, value);
            self.item = merged;
            self.text = parent.text;
            self.lang = parent.lang;
        } else {
            self.item = None;
            self.text.clear();
            self.lang = None;
        }

        self.path.pop();
        Ok(flow)
    }

    /// The value built for the whole document (cutoff `0`), as an ordered mapping
    /// keyed by the root element name.
    pub(crate) fn into_value(self) -> Option<Map<String, Value>> {
        self.item
    }

    /// Element text joined with the separator, as written; `None` when empty.
    fn joined_text(&mut self) -> Option<String> {
        if self.text.is_empty() {
            return None;
        }
        let joined = self.text.join(&self.options.text_separator);
        self.text.clear();
        (!joined.is_empty()).then_some(joined)
    }

    /// Joined, optionally trimmed element text; `None` when nothing remains.
    fn finished_text(&mut self) -> Option<String> {
        let joined = self.joined_text()?;
        let text = if self.options.strip_whitespace {
            let trimmed = joined.trim();
            if trimmed.len() == joined.len() {
                joined
            } else {
                trimmed.to_owned()
            }
        } else {
            joined
        };
        (!text.is_empty()).then_some(text)
    }

    /// Run the postprocessor, then merge. A dropped pair leaves `parent` untouched.
    fn push_data(
        &self,
        parent: Option<Map<String, Value>>,
        key: &str,
        value: Value,
    ) -> Option<Map<String, Value>> {
        let (key, value) = match &self.options.postprocessor {
            Some(hook) => match hook(self.path.as_slice(), key, value) {
                Some((key, value)) => (Cow::Owned(key), value),
                None => return parent,
            },
            None => (Cow::Borrowed(key), value),
        };
        Some(merge::push(parent, &key, value, &self.options.force_list))
    }
}

/// Text-only leaves spelled `true` or `false` become booleans.
fn coerce_leaf(text: String) -> Value {
    match text.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ForceList;
    use serde_json::json;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ignore(_: &NodePath, _: Value) -> Flow {
        Flow::Continue
    }

    fn leaf(b: &mut TreeBuilder<'_>, name: &str, a: &[(&str, &str)], text: &str) {
        b.start_element(name.into(), attrs(a));
        b.characters(text.into());
        b.end_element(name, &mut ignore).unwrap();
    }

    #[test]
    fn builds_nested_mapping() {
        let options = Options::default();
        let mut b = TreeBuilder::new(&options);
        b.start_element("r".into(), Vec::new());
        leaf(&mut b, "a", &[], "1");
        leaf(&mut b, "a", &[], "2");
        leaf(&mut b, "flag", &[], "true");
        b.end_element("r", &mut ignore).unwrap();
        assert_eq!(
            Value::Object(b.into_value().unwrap()),
            json!({"r": {"a": ["1", "2"], "flag": true}})
        );
    }

    #[test]
    fn language_promotion_keeps_other_attributes() {
        let options = Options::default();
        let mut b = TreeBuilder::new(&options);
        b.start_element("r".into(), Vec::new());
        leaf(&mut b, "name", &[("lang", "en"), ("id", "3")], "Corpus");
        b.end_element("r", &mut ignore).unwrap();
        assert_eq!(
            Value::Object(b.into_value().unwrap()),
            json!({"r": {"name": {"en": "Corpus", "@id": "3"}}})
        );
    }

    #[test]
    fn language_of_parent_does_not_leak_into_children() {
        let options = Options::default();
        let mut b = TreeBuilder::new(&options);
        b.start_element("r".into(), attrs(&[("lang", "en")]));
        leaf(&mut b, "a", &[("id", "1")], "x");
        b.end_element("r", &mut ignore).unwrap();
        assert_eq!(
            Value::Object(b.into_value().unwrap()),
            json!({"r": {"@lang": "en", "a": {"@id": "1", "#text": "x"}}})
        );
    }

    #[test]
    fn cutoff_emits_items_and_keeps_root_empty() {
        let options = crate::options! { depth_cutoff: 2 };
        let mut b = TreeBuilder::new(&options);
        let mut seen = Vec::new();
        let mut collect = |path: &NodePath, value: Value| {
            seen.push((path.len(), value));
            Flow::Continue
        };
        b.start_element("r".into(), Vec::new());
        b.characters("  ".into());
        for text in ["x", "y"] {
            b.start_element("i".into(), Vec::new());
            b.characters(text.into());
            b.end_element("i", &mut collect).unwrap();
        }
        b.end_element("r", &mut collect).unwrap();
        assert_eq!(seen, vec![(2, json!("x")), (2, json!("y"))]);
        assert!(b.into_value().is_none());
    }

    #[test]
    fn cutoff_text_is_kept_as_written() {
        let options = crate::options! { depth_cutoff: 2 };
        let mut b = TreeBuilder::new(&options);
        let mut seen = Vec::new();
        let mut collect = |_: &NodePath, value: Value| {
            seen.push(value);
            Flow::Continue
        };
        b.start_element("r".into(), Vec::new());
        b.start_element("i".into(), Vec::new());
        b.characters(" b ".into());
        b.end_element("i", &mut collect).unwrap();
        b.start_element("i".into(), Vec::new());
        b.characters("  ".into());
        b.end_element("i", &mut collect).unwrap();
        b.end_element("r", &mut collect).unwrap();
        assert_eq!(seen, vec![json!(" b "), json!("  ")]);
    }

    #[test]
    fn state_is_released_between_items() {
        let options = crate::options! { depth_cutoff: 2 };
        let mut b = TreeBuilder::new(&options);
        let mut items = 0usize;
        let mut count = |_: &NodePath, _: Value| {
            items += 1;
            Flow::Continue
        };
        b.start_element("records".into(), Vec::new());
        for n in 0..500 {
            b.characters("\n  ".into());
            b.start_element("record".into(), attrs(&[("id", "x")]));
            b.characters("head".into());
            b.start_element("field".into(), Vec::new());
            b.characters(format!("value {n}"));
            b.start_element("note".into(), Vec::new());
            b.characters("deep".into());
            b.end_element("note", &mut count).unwrap();
            assert_eq!(b.frames.len(), 1);
            b.end_element("field", &mut count).unwrap();
            b.characters("tail".into());
            b.end_element("record", &mut count).unwrap();

            assert!(b.frames.is_empty());
            assert!(b.item.is_none());
            assert!(b.text.is_empty());
            assert!(b.lang.is_none());
            assert_eq!(b.depth(), 1);
        }
        b.end_element("records", &mut count).unwrap();
        assert_eq!(items, 500);
        assert!(b.frames.is_empty());
        assert!(b.into_value().is_none());
    }

    #[test]
    fn force_list_and_force_text_key() {
        let options = crate::options! {
            force_list: ForceList::from_iter(["k"]),
            force_text_key: true,
        };
        let mut b = TreeBuilder::new(&options);
        b.start_element("r".into(), Vec::new());
        leaf(&mut b, "k", &[], "v");
        b.end_element("r", &mut ignore).unwrap();
        assert_eq!(
            Value::Object(b.into_value().unwrap()),
            json!({"r": {"k": [{"#text": "v"}]}})
        );
    }

    #[test]
    fn postprocessor_can_rename_and_drop() {
        let options = Options::default().with_postprocessor(|_, key, value| match key {
            "secret" => None,
            "a" => Some(("renamed".to_owned(), value)),
            _ => Some((key.to_owned(), value)),
        });
        let mut b = TreeBuilder::new(&options);
        b.start_element("r".into(), Vec::new());
        leaf(&mut b, "a", &[], "1");
        leaf(&mut b, "secret", &[], "2");
        b.end_element("r", &mut ignore).unwrap();
        assert_eq!(
            Value::Object(b.into_value().unwrap()),
            json!({"r": {"renamed": "1"}})
        );
    }

    #[test]
    fn mismatched_end_is_an_invariant_violation() {
        let options = Options::default();
        let mut b = TreeBuilder::new(&options);
        let err = b.end_element("r", &mut ignore).unwrap_err();
        assert!(matches!(err, Error::InternalInvariantViolation { .. }));
        b.start_element("r".into(), Vec::new());
        let err = b.end_element("x", &mut ignore).unwrap_err();
        assert!(matches!(err, Error::InternalInvariantViolation { .. }));
    }

    #[test]
    fn whitespace_only_text_is_absent() {
        let options = Options::default();
        let mut b = TreeBuilder::new(&options);
        b.start_element("r".into(), Vec::new());
        leaf(&mut b, "e", &[], "  \n ");
        b.end_element("r", &mut ignore).unwrap();
        assert_eq!(
            Value::Object(b.into_value().unwrap()),
            json!({"r": {"e": null}})
        );
    }
}
