//! `miette` integration.
//!
//! This module is feature-gated behind the `miette` feature.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};

use crate::Error;
use crate::Location;

/// Convert a deserialization [`Error`] into a `miette::Report`.
///
/// This function takes the XML `source` and a display `file` name/path.
///
/// # Example
///
/// ```rust,no_run
/// let xml = "<r><a></b></r>";
///
/// let err = xml_metadata::from_str(xml).expect_err("mismatched tag expected");
/// let report = xml_metadata::miette::to_miette_report(&err, xml, "record.xml");
///
/// // `Debug` formatting uses miette's graphical reporter.
/// eprintln!("{report:?}");
/// ```
///
/// Errors without a known location produce a report without labels.
pub fn to_miette_report(err: &Error, source: &str, file: &str) -> miette::Report {
    let src = Arc::new(NamedSource::new(file, source.to_owned()));
    let inner = err.without_snippet();
    let mut labels = Vec::new();
    if let Some(loc) = inner.location()
        && let Some(span) = to_source_span(source, &loc)
    {
        labels.push(LabeledSpan::new_with_span(Some(label_for(inner)), span));
    }
    miette::Report::new(ErrorDiagnostic {
        message: inner.to_string(),
        src,
        labels,
    })
}

#[derive(Clone, Debug)]
struct ErrorDiagnostic {
    message: String,
    src: Arc<NamedSource<String>>,
    labels: Vec<LabeledSpan>,
}

impl fmt::Display for ErrorDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ErrorDiagnostic {}

impl Diagnostic for ErrorDiagnostic {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        if self.labels.is_empty() {
            None
        } else {
            Some(Box::new(self.labels.clone().into_iter()))
        }
    }
}

fn label_for(err: &Error) -> String {
    match err {
        Error::MalformedDocument { msg, .. } => msg.clone(),
        other => other.to_string(),
    }
}

/// One-character span at the error offset, clamped to the source and moved back to a
/// character boundary.
fn to_source_span(source: &str, loc: &Location) -> Option<SourceSpan> {
    let mut offset = usize::try_from(loc.byte_offset()).ok()?.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let len = source[offset..].chars().next().map_or(0, char::len_utf8);
    Some(SourceSpan::new(offset.into(), len))
}
