//! Streaming XML-to-value deserializer for language-resource metadata records.
//!
//! Documents become ordered [`serde_json::Value`] trees: attributes under prefixed
//! keys, repeated siblings collapsed into sequences, `lang`-tagged text promoted to
//! language keys, and `true`/`false` leaves coerced to booleans. DOCTYPE content and
//! non-predefined entities are neutralized by default.
//!
//! ```rust
//! use serde_json::json;
//!
//! let xml = r#"<r><a>1</a><a>2</a><b lang="en">Hello</b><flag>true</flag></r>"#;
//! assert_eq!(
//!     xml_metadata::from_str(xml).unwrap(),
//!     json!({"r": {"a": ["1", "2"], "b": {"en": "Hello"}, "flag": true}})
//! );
//! ```

pub use de::{
    Deserializer, Document, Flow, Outcome, Streamed, deserialize, deserialize_streaming,
    for_each_item, from_reader, from_reader_with_options, from_slice, from_slice_with_options,
    from_str, from_str_with_options,
};
pub use error::Error;
pub use guard::{Advisory, GuardReport};
pub use input::Input;
pub use location::Location;
pub use options::{ForceList, Options, Postprocessor};
pub use path::{NodePath, PathSegment};

pub mod attributes;
mod builder;
pub mod de;
pub mod error;
mod events;
pub mod guard;
mod input;
pub mod location;
mod macros;
pub mod merge;
#[cfg(feature = "miette")]
pub mod miette;
pub mod options;
pub mod path;
mod snippet;
