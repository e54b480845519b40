//! Adapter between the quick-xml tokenizer and the tree builder.
//!
//! Produces a flat stream of start / text / end events:
//! - Character data, CDATA sections and entity references that follow each other
//!   are merged into a single text event, emitted right before the next markup.
//! - DOCTYPE content and every entity reference pass through the [`EntityGuard`].
//! - Well-formedness checks the tokenizer leaves to its caller (single root, no
//!   text outside it, no unclosed element at end of input) are enforced here.
//! - Comments, processing instructions and the XML declaration are skipped.

use std::collections::VecDeque;
use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::Error;
use crate::guard::{EntityGuard, GuardReport};
use crate::location::Location;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum XmlEvent {
    Start {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    End {
        name: String,
    },
}

pub(crate) struct EventSource<'a, R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    guard: EntityGuard,
    /// Decoded input held in memory, used to turn offsets into line/column.
    source: Option<&'a [u8]>,
    pending_text: Option<String>,
    queued: VecDeque<XmlEvent>,
    depth: usize,
    seen_root: bool,
}

impl<'a, R: BufRead> EventSource<'a, R> {
    pub(crate) fn new(input: R, guard: EntityGuard, source: Option<&'a [u8]>) -> Self {
        let mut reader = Reader::from_reader(input);
        let config = reader.config_mut();
        config.check_end_names = true;
        config.trim_text(false);
        Self {
            reader,
            buf: Vec::new(),
            guard,
            source,
            pending_text: None,
            queued: VecDeque::new(),
            depth: 0,
            seen_root: false,
        }
    }

    /// Next event, or `None` once the document has ended cleanly.
    pub(crate) fn next_event(&mut self) -> Result<Option<XmlEvent>, Error> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Ok(Some(event));
            }

            let position = self.reader.buffer_position();
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event.into_owned(),
                Err(err) => {
                    let location = self.location(self.reader.error_position());
                    return Err(Error::from_xml(err, location));
                }
            };
            let location = self.location(position);

            match event {
                Event::Start(start) => {
                    let (name, attributes) = self.open(&start, location)?;
                    self.emit(XmlEvent::Start { name, attributes });
                }
                Event::Empty(start) => {
                    let (name, attributes) = self.open(&start, location)?;
                    self.emit(XmlEvent::Start {
                        name: name.clone(),
                        attributes,
                    });
                    self.depth -= 1;
                    self.queued.push_back(XmlEvent::End { name });
                }
                Event::End(end) => {
                    let name = utf8(end.name().as_ref(), location)?.to_owned();
                    self.depth = self.depth.saturating_sub(1);
                    self.emit(XmlEvent::End { name });
                }
                Event::Text(text) => {
                    let text = text
                        .decode()
                        .map_err(|err| Error::malformed(err.to_string(), location))?;
                    self.characters(&text, location)?;
                }
                Event::CData(cdata) => {
                    let text = utf8(&cdata, location)?.to_owned();
                    if self.depth == 0 {
                        return Err(Error::malformed(
                            "CDATA section outside the root element",
                            location,
                        ));
                    }
                    self.append(&text);
                }
                Event::GeneralRef(reference) => {
                    let name = reference
                        .decode()
                        .map_err(|err| Error::malformed(err.to_string(), location))?;
                    if self.depth == 0 {
                        return Err(Error::malformed(
                            format!("entity reference `&{name};` outside the root element"),
                            location,
                        ));
                    }
                    let resolved = self.guard.resolve(&name, location)?;
                    self.append(&resolved);
                }
                Event::DocType(doctype) => {
                    if self.seen_root {
                        return Err(Error::malformed("DOCTYPE after the root element", location));
                    }
                    let content = doctype
                        .decode()
                        .map_err(|err| Error::malformed(err.to_string(), location))?;
                    self.guard.observe_doctype(&content, location);
                }
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) => {}
                Event::Eof => {
                    let location = self.location(self.reader.buffer_position());
                    if self.depth > 0 {
                        return Err(Error::malformed(
                            format!(
                                "unexpected end of document, {} element(s) left open",
                                self.depth
                            ),
                            location,
                        ));
                    }
                    if !self.seen_root {
                        return Err(Error::malformed("no root element", location));
                    }
                    return Ok(None);
                }
            }
        }
    }

    pub(crate) fn into_report(self) -> GuardReport {
        self.guard.into_report()
    }

    /// Name and unescaped attributes of an opening tag; enters the element.
    fn open(
        &mut self,
        start: &BytesStart<'_>,
        location: Location,
    ) -> Result<(String, Vec<(String, String)>), Error> {
        if self.depth == 0 {
            if self.seen_root {
                return Err(Error::malformed("junk after document element", location));
            }
            self.seen_root = true;
        }
        let name = utf8(start.name().as_ref(), location)?.to_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| Error::malformed(err.to_string(), location))?;
            let key = utf8(attr.key.as_ref(), location)?.to_owned();
            let raw = utf8(&attr.value, location)?;
            let normalized = normalize_attribute_whitespace(raw);
            let value = self.guard.unescape(&normalized, location)?.into_owned();
            attributes.push((key, value));
        }
        self.depth += 1;
        Ok((name, attributes))
    }

    fn characters(&mut self, text: &str, location: Location) -> Result<(), Error> {
        if self.depth == 0 {
            if text.trim().is_empty() {
                return Ok(());
            }
            let what = if self.seen_root {
                "junk after document element"
            } else {
                "text before the root element"
            };
            return Err(Error::malformed(what, location));
        }
        if text.contains('\r') {
            self.append(&text.replace("\r\n", "\n").replace('\r', "\n"));
        } else {
            self.append(text);
        }
        Ok(())
    }

    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.pending_text
            .get_or_insert_with(String::new)
            .push_str(text);
    }

    /// Queue `event`, preceded by any character data collected so far.
    fn emit(&mut self, event: XmlEvent) {
        if let Some(text) = self.pending_text.take() {
            self.queued.push_back(XmlEvent::Text(text));
        }
        self.queued.push_back(event);
    }

    fn location(&self, offset: u64) -> Location {
        match self.source {
            Some(source) => Location::resolve(offset, source),
            None => Location::at_offset(offset),
        }
    }
}

fn utf8(bytes: &[u8], location: Location) -> Result<&str, Error> {
    std::str::from_utf8(bytes)
        .map_err(|err| Error::malformed(format!("invalid UTF-8: {err}"), location))
}

/// Literal tabs and line breaks in attribute values read as spaces. Character
/// references such as `&#10;` are resolved afterwards and survive.
fn normalize_attribute_whitespace(raw: &str) -> std::borrow::Cow<'_, str> {
    if !raw.contains(['\t', '\n', '\r']) {
        return std::borrow::Cow::Borrowed(raw);
    }
    std::borrow::Cow::Owned(
        raw.replace("\r\n", " ")
            .replace(['\t', '\n', '\r'], " "),
    )
}
