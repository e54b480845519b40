//! Input sources and encoding resolution.
//!
//! Everything handed to the tokenizer is UTF-8. Byte input and readers are decoded
//! on the fly with `encoding_rs_io`; the encoding is picked in this order:
//!
//! 1. a byte order mark,
//! 2. the `encoding` pseudo-attribute of the XML declaration,
//! 3. [`Options::encoding`](crate::Options::encoding).
//!
//! A declaration naming UTF-16 without a BOM is ignored: the declaration itself could
//! not have been read as ASCII in that case. Text input is already decoded; it is only
//! checked to be representable in the configured encoding.

use std::borrow::Cow;
use std::io::{BufRead, BufReader, Cursor, ErrorKind, Read};

use encoding_rs::{Encoding, REPLACEMENT, UTF_16BE, UTF_16LE, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;

use crate::error::Error;
use crate::options::Options;

/// How far into the input we look for an XML declaration.
const PROLOG_WINDOW: usize = 1024;

/// A document to deserialize.
///
/// ```rust
/// use xml_metadata::Input;
///
/// let from_text: Input = "<r/>".into();
/// let from_bytes: Input = b"<r/>".as_slice().into();
/// let from_reader = Input::reader(std::io::Cursor::new(b"<r/>".to_vec()));
/// # let _ = (from_text, from_bytes, from_reader);
/// ```
pub enum Input<'a> {
    /// Encoded bytes held in memory.
    Bytes(Cow<'a, [u8]>),
    /// Already decoded text.
    Text(Cow<'a, str>),
    /// Encoded bytes read incrementally.
    Reader(Box<dyn Read + 'a>),
}

impl<'a> Input<'a> {
    pub fn reader<R: Read + 'a>(reader: R) -> Self {
        Input::Reader(Box::new(reader))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Input::Bytes(_) => "bytes",
            Input::Text(_) => "text",
            Input::Reader(_) => "reader",
        }
    }
}

impl<'a> From<&'a str> for Input<'a> {
    fn from(text: &'a str) -> Self {
        Input::Text(Cow::Borrowed(text))
    }
}

impl<'a> From<&'a String> for Input<'a> {
    fn from(text: &'a String) -> Self {
        Input::Text(Cow::Borrowed(text.as_str()))
    }
}

impl From<String> for Input<'static> {
    fn from(text: String) -> Self {
        Input::Text(Cow::Owned(text))
    }
}

impl<'a> From<&'a [u8]> for Input<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Input::Bytes(Cow::Borrowed(bytes))
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Input<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Input::Bytes(Cow::Borrowed(bytes.as_slice()))
    }
}

impl From<Vec<u8>> for Input<'static> {
    fn from(bytes: Vec<u8>) -> Self {
        Input::Bytes(Cow::Owned(bytes))
    }
}

/// UTF-8 stream ready for the tokenizer.
pub(crate) struct Source<'s> {
    pub(crate) reader: Box<dyn BufRead + 's>,
    /// The decoded document, when it is held in memory as UTF-8.
    pub(crate) memory: Option<&'s [u8]>,
    pub(crate) encoding: &'static Encoding,
}

impl<'s> Source<'s> {
    /// The in-memory document as text, if it is valid UTF-8.
    pub(crate) fn text(&self) -> Option<&'s str> {
        self.memory.and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

pub(crate) fn open<'s, 'a: 's>(
    input: &'s mut Input<'a>,
    options: &Options,
) -> Result<Source<'s>, Error> {
    let configured = configured_encoding(&options.encoding)?;
    match input {
        Input::Text(text) => {
            let text: &'s str = &**text;
            if configured != UTF_8 {
                let (_, _, unmappable) = configured.encode(text);
                if unmappable {
                    return Err(Error::unsupported_encoding(
                        options.encoding.clone(),
                        "text contains characters the encoding cannot represent",
                    ));
                }
            }
            let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
            Ok(Source {
                reader: Box::new(text.as_bytes()),
                memory: Some(text.as_bytes()),
                encoding: configured,
            })
        }
        Input::Bytes(bytes) => {
            let bytes: &'s [u8] = &**bytes;
            let (encoding, bom_len) = sniff(bytes, configured)?;
            if encoding == UTF_8 {
                let body = &bytes[bom_len..];
                return Ok(Source {
                    reader: Box::new(body),
                    memory: Some(body),
                    encoding,
                });
            }
            let decoder = DecodeReaderBytesBuilder::new()
                .encoding(Some(encoding))
                .bom_override(true)
                .strip_bom(true)
                .build(bytes);
            Ok(Source {
                reader: Box::new(BufReader::new(decoder)),
                memory: None,
                encoding,
            })
        }
        Input::Reader(reader) => {
            let mut head = read_prolog(reader)?;
            let (encoding, bom_len) = sniff(&head, configured)?;
            let rest = Cursor::new(if encoding == UTF_8 {
                head.split_off(bom_len)
            } else {
                head
            })
            .chain(reader);
            let reader: Box<dyn BufRead + 's> = if encoding == UTF_8 {
                // Invalid sequences must reach the tokenizer, not be replaced.
                Box::new(BufReader::new(rest))
            } else {
                let decoder = DecodeReaderBytesBuilder::new()
                    .encoding(Some(encoding))
                    .bom_override(true)
                    .strip_bom(true)
                    .build(rest);
                Box::new(BufReader::new(decoder))
            };
            Ok(Source {
                reader,
                memory: None,
                encoding,
            })
        }
    }
}

/// Read from `reader` until the byte order mark and XML declaration (if any) are
/// complete, [`PROLOG_WINDOW`] bytes are buffered, or the input ends.
fn read_prolog(reader: &mut dyn Read) -> Result<Vec<u8>, Error> {
    let mut head = Vec::with_capacity(PROLOG_WINDOW);
    let mut chunk = [0u8; 256];
    while !prolog_complete(&head) {
        let want = chunk.len().min(PROLOG_WINDOW - head.len());
        match reader.read(&mut chunk[..want]) {
            Ok(0) => break,
            Ok(n) => head.extend_from_slice(&chunk[..n]),
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(head)
}

fn prolog_complete(head: &[u8]) -> bool {
    const DECL: &[u8] = b"<?xml";
    const BOMS: [&[u8]; 3] = [b"\xEF\xBB\xBF", b"\xFF\xFE", b"\xFE\xFF"];
    if head.len() >= PROLOG_WINDOW || Encoding::for_bom(head).is_some() {
        return true;
    }
    if BOMS.iter().any(|bom| head.len() < bom.len() && bom.starts_with(head)) {
        return false;
    }
    let n = head.len().min(DECL.len());
    if head[..n] != DECL[..n] {
        return true;
    }
    head.len() >= DECL.len() && head.windows(2).any(|w| w == b"?>")
}

fn configured_encoding(label: &str) -> Result<&'static Encoding, Error> {
    match Encoding::for_label(label.trim().as_bytes()) {
        None => Err(Error::unsupported_encoding(label, "unknown encoding label")),
        Some(enc) if enc == REPLACEMENT => Err(Error::unsupported_encoding(
            label,
            "label maps to the replacement encoding",
        )),
        Some(enc) => Ok(enc),
    }
}

/// Pick the encoding of `head` (the first bytes of the document) and the length of
/// its byte order mark.
fn sniff(
    head: &[u8],
    configured: &'static Encoding,
) -> Result<(&'static Encoding, usize), Error> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(head) {
        return Ok((encoding, bom_len));
    }
    let Some(label) = declared_encoding(head) else {
        return Ok((configured, 0));
    };
    match Encoding::for_label(label.as_bytes()) {
        None => Err(Error::unsupported_encoding(
            label,
            "unknown encoding declared in the XML declaration",
        )),
        Some(enc) if enc == REPLACEMENT => Err(Error::unsupported_encoding(
            label,
            "label maps to the replacement encoding",
        )),
        Some(enc) if enc == UTF_16LE || enc == UTF_16BE => Ok((configured, 0)),
        Some(enc) => Ok((enc, 0)),
    }
}

/// Value of the `encoding` pseudo-attribute in a leading `<?xml ...?>` declaration.
fn declared_encoding(head: &[u8]) -> Option<&str> {
    let head = &head[..head.len().min(PROLOG_WINDOW)];
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&head[..end]).ok()?;
    let after = &decl[decl.find("encoding")? + "encoding".len()..];
    let after = after.trim_start().strip_prefix('=')?.trim_start();
    let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &after[1..];
    let close = body.find(quote)?;
    Some(&body[..close])
}
