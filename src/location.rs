//! Source location utilities.

use std::fmt;

/// Position of a diagnostic within the input document.
///
/// The byte offset is always known (it is reported by the tokenizer). Line and column
/// are 1-indexed and only available when the whole input is held in memory as UTF-8
/// (`&str` input, or byte input whose effective encoding is UTF-8). Reader-based
/// entry points only report the byte offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub(crate) line: u32,
    pub(crate) column: u32,
    pub(crate) byte_offset: u64,
    known: bool,
}

impl Location {
    /// Sentinel value meaning "location unknown".
    pub const UNKNOWN: Self = Self {
        line: 0,
        column: 0,
        byte_offset: 0,
        known: false,
    };

    /// A location known only by its byte offset in the decoded stream.
    pub(crate) const fn at_offset(byte_offset: u64) -> Self {
        Self {
            line: 0,
            column: 0,
            byte_offset,
            known: true,
        }
    }

    /// Resolve `byte_offset` against the in-memory source, filling in line and column.
    ///
    /// Columns count characters, not bytes. Offsets past the end of `source` clamp to
    /// the end.
    pub(crate) fn resolve(byte_offset: u64, source: &[u8]) -> Self {
        let end = usize::try_from(byte_offset)
            .unwrap_or(usize::MAX)
            .min(source.len());
        let before = &source[..end];
        let line_start = before
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |idx| idx + 1);
        let line = before.iter().filter(|b| **b == b'\n').count() + 1;
        let column = String::from_utf8_lossy(&before[line_start..]).chars().count() + 1;
        Self {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            column: u32::try_from(column).unwrap_or(u32::MAX),
            byte_offset,
            known: true,
        }
    }

    /// False only for [`Location::UNKNOWN`].
    pub fn is_known(&self) -> bool {
        self.known
    }

    /// 1-indexed line, if known.
    pub fn line(&self) -> Option<u64> {
        (self.line != 0).then_some(self.line as u64)
    }

    /// 1-indexed column (in characters), if known.
    pub fn column(&self) -> Option<u64> {
        (self.column != 0).then_some(self.column as u64)
    }

    /// Byte offset into the decoded (UTF-8) document.
    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    pub(crate) fn has_line(&self) -> bool {
        self.line != 0 && self.column != 0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_line() {
            write!(
                f,
                "line {}, column {} (byte {})",
                self.line, self.column, self.byte_offset
            )
        } else {
            write!(f, "byte {}", self.byte_offset)
        }
    }
}
