//! Deserializer facade: the public entry points.
//!
//! Every call owns its own guard, tokenizer and tree builder; nothing is shared
//! between calls except the immutable [`Options`].

use std::io::{BufRead, Read};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::builder::TreeBuilder;
use crate::error::Error;
use crate::events::{EventSource, XmlEvent};
use crate::guard::{Advisory, EntityGuard, GuardReport};
use crate::input::{self, Input};
use crate::options::Options;
use crate::path::NodePath;

/// Decision returned by the item callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop reading; the call returns [`Outcome::Interrupted`].
    Stop,
}

/// How a streaming parse ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Interrupted,
}

/// A fully deserialized document.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// `{root: {...}}` for a cutoff of `0`, otherwise the sequence of items
    /// completed at the cutoff depth.
    pub value: Value,
    pub report: GuardReport,
}

impl Document {
    pub fn advisories(&self) -> &[Advisory] {
        &self.report.advisories
    }

    /// True when the guard had to neutralize DOCTYPE content or entity references.
    /// Callers should not trust such a document blindly.
    pub fn is_suspect(&self) -> bool {
        self.report.is_suspect()
    }

    /// Convert the value into a typed record.
    ///
    /// ```rust
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Record {
    ///     r: Inner,
    /// }
    ///
    /// #[derive(Deserialize)]
    /// struct Inner {
    ///     name: String,
    ///     public: bool,
    /// }
    ///
    /// let xml = "<r><name>Corpus</name><public>true</public></r>";
    /// let doc = xml_metadata::from_str_with_options(xml, &Default::default()).unwrap();
    /// let record: Record = doc.into_typed().unwrap();
    /// assert_eq!(record.r.name, "Corpus");
    /// assert!(record.r.public);
    /// ```
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, Error> {
        Ok(serde_json::from_value(self.value)?)
    }
}

/// Result of a streaming parse.
#[derive(Clone, Debug, PartialEq)]
pub struct Streamed {
    pub outcome: Outcome,
    /// Number of callback invocations.
    pub items: usize,
    pub report: GuardReport,
}

impl Streamed {
    pub fn advisories(&self) -> &[Advisory] {
        &self.report.advisories
    }

    pub fn is_interrupted(&self) -> bool {
        self.outcome == Outcome::Interrupted
    }
}

/// Holds the configuration; any number of documents can be parsed with one
/// instance, from any number of threads.
#[derive(Clone, Debug, Default)]
pub struct Deserializer {
    options: Options,
}

impl Deserializer {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// See [`deserialize`].
    pub fn deserialize<'a>(&self, input: impl Into<Input<'a>>) -> Result<Document, Error> {
        deserialize(input, &self.options)
    }

    /// See [`deserialize_streaming`].
    pub fn deserialize_streaming<'a, F>(
        &self,
        input: impl Into<Input<'a>>,
        callback: F,
    ) -> Result<Streamed, Error>
    where
        F: FnMut(&NodePath, Value) -> Flow,
    {
        deserialize_streaming(input, &self.options, callback)
    }
}

/// Deserialize a whole document.
///
/// With `depth_cutoff == 0` the value is a mapping holding the root element. With a
/// cutoff `N > 0` it is the sequence of every item completed at depth `N`, in
/// document order.
///
/// ```rust
/// use serde_json::json;
/// use xml_metadata::{deserialize, Options};
///
/// let doc = deserialize("<r><a>1</a><a>2</a></r>", &Options::default()).unwrap();
/// assert_eq!(doc.value, json!({"r": {"a": ["1", "2"]}}));
///
/// let options = xml_metadata::options! { depth_cutoff: 2 };
/// let items = deserialize("<r><a>1</a><a>2</a></r>", &options).unwrap();
/// assert_eq!(items.value, json!(["1", "2"]));
/// ```
pub fn deserialize<'a>(input: impl Into<Input<'a>>, options: &Options) -> Result<Document, Error> {
    if options.depth_cutoff == 0 {
        let (root, streamed) = run(input.into(), options, |_, _| Flow::Continue)?;
        return Ok(Document {
            value: root.map_or(Value::Null, Value::Object),
            report: streamed.report,
        });
    }
    let mut items = Vec::new();
    let (_, streamed) = run(input.into(), options, |_, item| {
        items.push(item);
        Flow::Continue
    })?;
    Ok(Document {
        value: Value::Array(items),
        report: streamed.report,
    })
}

/// Deserialize a document item by item.
///
/// `callback` receives the node path and value of every element that closes at
/// depth `options.depth_cutoff`. Only one item is held in memory at a time. Returning
/// [`Flow::Stop`] ends the parse early with [`Outcome::Interrupted`].
///
/// ```rust
/// use xml_metadata::{Flow, Options, deserialize_streaming};
///
/// let xml = "<records><record>a</record><record>b</record><record>c</record></records>";
/// let options = xml_metadata::options! { depth_cutoff: 2 };
/// let mut seen = Vec::new();
/// let streamed = deserialize_streaming(xml, &options, |path, value| {
///     seen.push((path[1].name.clone(), value));
///     if seen.len() == 2 { Flow::Stop } else { Flow::Continue }
/// })
/// .unwrap();
/// assert!(streamed.is_interrupted());
/// assert_eq!(seen.len(), 2);
/// ```
pub fn deserialize_streaming<'a, F>(
    input: impl Into<Input<'a>>,
    options: &Options,
    callback: F,
) -> Result<Streamed, Error>
where
    F: FnMut(&NodePath, Value) -> Flow,
{
    run(input.into(), options, callback).map(|(_, streamed)| streamed)
}

/// Like [`deserialize_streaming`] for callbacks that never stop the parse.
pub fn for_each_item<'a, F>(
    input: impl Into<Input<'a>>,
    options: &Options,
    mut callback: F,
) -> Result<Streamed, Error>
where
    F: FnMut(&NodePath, Value),
{
    deserialize_streaming(input, options, |path, value| {
        callback(path, value);
        Flow::Continue
    })
}

/// Deserialize a document held in a string with default options.
///
/// Security advisories are logged and dropped; use [`from_str_with_options`] to
/// inspect them.
///
/// ```rust
/// use serde_json::json;
///
/// let xml = r#"<resourceInfo><name lang="en">Corpus</name></resourceInfo>"#;
/// let value = xml_metadata::from_str(xml).unwrap();
/// assert_eq!(value, json!({"resourceInfo": {"name": {"en": "Corpus"}}}));
/// ```
pub fn from_str(input: &str) -> Result<Value, Error> {
    from_str_with_options(input, &Options::default()).map(|doc| doc.value)
}

pub fn from_str_with_options(input: &str, options: &Options) -> Result<Document, Error> {
    deserialize(input, options)
}

/// Deserialize an encoded document held in memory with default options.
pub fn from_slice(input: &[u8]) -> Result<Value, Error> {
    from_slice_with_options(input, &Options::default()).map(|doc| doc.value)
}

pub fn from_slice_with_options(input: &[u8], options: &Options) -> Result<Document, Error> {
    deserialize(input, options)
}

/// Deserialize a document from any reader with default options.
///
/// Errors carry a byte offset but no line or column, since the input is not retained.
pub fn from_reader<R: Read>(reader: R) -> Result<Value, Error> {
    from_reader_with_options(reader, &Options::default()).map(|doc| doc.value)
}

pub fn from_reader_with_options<R: Read>(reader: R, options: &Options) -> Result<Document, Error> {
    deserialize(Input::reader(reader), options)
}

fn run<F>(
    mut input: Input<'_>,
    options: &Options,
    mut on_item: F,
) -> Result<(Option<Map<String, Value>>, Streamed), Error>
where
    F: FnMut(&NodePath, Value) -> Flow,
{
    let kind = input.kind();
    let source = input::open(&mut input, options)?;
    debug!(
        input = kind,
        encoding = source.encoding.name(),
        depth_cutoff = options.depth_cutoff,
        "parsing document"
    );
    let snippet_text = if options.with_snippet {
        source.text()
    } else {
        None
    };
    drive(source.reader, source.memory, options, &mut on_item).map_err(|err| match snippet_text {
        Some(text) if err.is_malformed() => err.with_snippet(text, options.crop_radius),
        _ => err,
    })
}

fn drive<R, F>(
    reader: R,
    memory: Option<&[u8]>,
    options: &Options,
    on_item: &mut F,
) -> Result<(Option<Map<String, Value>>, Streamed), Error>
where
    R: BufRead,
    F: FnMut(&NodePath, Value) -> Flow,
{
    let guard = EntityGuard::new(options.disable_external_entities);
    let mut events = EventSource::new(reader, guard, memory);
    let mut builder = TreeBuilder::new(options);
    let mut items = 0usize;
    let mut outcome = Outcome::Completed;
    let mut counted = |path: &NodePath, value: Value| {
        items += 1;
        on_item(path, value)
    };

    while let Some(event) = events.next_event()? {
        match event {
            XmlEvent::Start { name, attributes } => builder.start_element(name, attributes),
            XmlEvent::Text(text) => builder.characters(text),
            XmlEvent::End { name } => {
                if builder.end_element(&name, &mut counted)? == Flow::Stop {
                    trace!(depth = builder.depth(), "parse stopped by item callback");
                    outcome = Outcome::Interrupted;
                    break;
                }
            }
        }
    }

    let report = events.into_report();
    debug!(
        items,
        advisories = report.advisories.len(),
        ?outcome,
        "parse finished"
    );
    Ok((
        builder.into_value(),
        Streamed {
            outcome,
            items,
            report,
        },
    ))
}
