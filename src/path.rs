//! Node path: the chain of open elements from the document root.

use serde_json::{Map, Value};

/// One open element on the node path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathSegment {
    /// Element name as written in the document (prefix included, e.g. `ms:resourceInfo`).
    pub name: String,
    /// Ordinary attributes of the element with their raw (unprefixed) names, or `None`
    /// when the element carries none.
    pub attributes: Option<Vec<(String, String)>>,
    /// Namespace declarations and schema-location hints attached to this element.
    pub namespaces: Option<Map<String, Value>>,
}

impl PathSegment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: None,
            namespaces: None,
        }
    }

    /// Value of the raw attribute `name`, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .as_ref()?
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Ordered sequence of open elements, root first. Its length is the nesting depth.
pub type NodePath = [PathSegment];

/// Render a node path as `/a/b/c` for log lines.
pub(crate) fn display_path(path: &NodePath) -> String {
    let mut out = String::new();
    for segment in path {
        out.push('/');
        out.push_str(&segment.name);
    }
    out
}
