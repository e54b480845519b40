//! Defines error and its location
use std::fmt;

use annotate_snippets::Level;

use crate::location::Location;

/// Error returned by the deserializer entry points.
///
/// Stopping early through the item callback is not an error: it is reported as
/// [`crate::Outcome::Interrupted`]. Security advisories are not errors either; they are
/// returned next to the value (see [`crate::guard::Advisory`]).
#[derive(Debug)]
pub enum Error {
    /// The tokenizer reported a syntax error, or the document is not well-formed.
    MalformedDocument {
        msg: String,
        location: Location,
    },
    /// The configured or declared encoding cannot be applied to the input.
    UnsupportedEncoding {
        label: String,
        reason: &'static str,
    },
    /// Node path and frame stack went out of step. Indicates a bug in this crate.
    InternalInvariantViolation {
        msg: String,
    },
    /// Unexpected I/O error. This may happen only when deserializing from a reader.
    Io {
        cause: std::io::Error,
    },
    /// The produced value could not be converted into the requested type.
    Conversion {
        cause: serde_json::Error,
    },
    /// Wrap an error with a rendered source window, enabling rustc-like snippet output.
    WithSnippet {
        /// Pre-rendered snippet output (cropped) for display. The full input is not
        /// retained.
        text: String,
        error: Box<Error>,
    },
}

impl Error {
    pub(crate) fn malformed<S: Into<String>>(msg: S, location: Location) -> Self {
        Error::MalformedDocument {
            msg: msg.into(),
            location,
        }
    }

    pub(crate) fn invariant<S: Into<String>>(msg: S) -> Self {
        Error::InternalInvariantViolation { msg: msg.into() }
    }

    pub(crate) fn unsupported_encoding<S: Into<String>>(label: S, reason: &'static str) -> Self {
        Error::UnsupportedEncoding {
            label: label.into(),
            reason,
        }
    }

    /// Map a tokenizer error into our error type.
    pub(crate) fn from_xml(err: quick_xml::Error, location: Location) -> Self {
        match err {
            quick_xml::Error::Io(cause) => Error::Io {
                cause: std::io::Error::new(cause.kind(), cause.to_string()),
            },
            other => Error::malformed(other.to_string(), location),
        }
    }

    /// Attach a rendered snippet of `text` around the error location.
    ///
    /// Errors without a line/column location are returned unchanged.
    pub(crate) fn with_snippet(self, text: &str, crop_radius: usize) -> Self {
        let inner = match self {
            Error::WithSnippet { error, .. } => *error,
            other => other,
        };
        let Some(location) = inner.location().filter(Location::has_line) else {
            return inner;
        };
        let msg = inner.to_string();
        let rendered =
            crate::snippet::render(Level::ERROR, &msg, &location, text, "<input>", crop_radius);
        match rendered {
            Some(text) => Error::WithSnippet {
                text,
                error: Box::new(inner),
            },
            None => inner,
        }
    }

    /// The innermost error, without any snippet wrapper.
    pub fn without_snippet(&self) -> &Error {
        match self {
            Error::WithSnippet { error, .. } => error.without_snippet(),
            other => other,
        }
    }

    /// If the error has a known location, return it.
    pub fn location(&self) -> Option<Location> {
        match self {
            Error::MalformedDocument { location, .. } => location.is_known().then_some(*location),
            Error::WithSnippet { error, .. } => error.location(),
            _ => None,
        }
    }

    /// True for errors caused by the document itself rather than the environment.
    pub fn is_malformed(&self) -> bool {
        matches!(self.without_snippet(), Error::MalformedDocument { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedDocument { msg, location } => {
                if !location.is_known() {
                    write!(f, "malformed document: {msg}")
                } else {
                    write!(f, "malformed document: {msg} at {location}")
                }
            }
            Error::UnsupportedEncoding { label, reason } => {
                write!(f, "unsupported encoding `{label}`: {reason}")
            }
            Error::InternalInvariantViolation { msg } => {
                write!(f, "internal invariant violated: {msg}")
            }
            Error::Io { cause } => write!(f, "IO error: {cause}"),
            Error::Conversion { cause } => write!(f, "conversion error: {cause}"),
            Error::WithSnippet { text, .. } => f.write_str(text),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { cause } => Some(cause),
            Error::Conversion { cause } => Some(cause),
            Error::WithSnippet { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(cause: std::io::Error) -> Self {
        Error::Io { cause }
    }
}

impl From<serde_json::Error> for Error {
    fn from(cause: serde_json::Error) -> Self {
        Error::Conversion { cause }
    }
}
