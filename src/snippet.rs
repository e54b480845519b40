//! Rustc-like source windows for malformed-document errors.

use annotate_snippets::{
    AnnotationKind, Level, Renderer, Snippet as AnnotateSnippet, renderer::DecorStyle,
};

use crate::location::Location;

/// Render a few lines of `text` around `location` with a caret under the error.
///
/// Returns `None` when the location cannot be mapped into `text` or when
/// `crop_radius` is zero (snippets disabled).
#[cold]
#[inline(never)]
pub(crate) fn render(
    level: Level,
    msg: &str,
    location: &Location,
    text: &str,
    path: &str,
    crop_radius: usize,
) -> Option<String> {
    if crop_radius == 0 || !location.has_line() {
        return None;
    }
    // Keep coordinates aligned with the tokenizer, which skips a leading BOM.
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);

    let row = location.line as usize;
    let col = location.column as usize;
    let starts = line_starts(text);
    if row == 0 || row > starts.len() {
        return None;
    }

    // Two lines before and after the error line, clipped to the input.
    let first_row = row.saturating_sub(2).max(1);
    let last_row = row.saturating_add(2).min(starts.len());

    let mut window = String::new();
    let mut span = 0..0;
    for current in first_row..=last_row {
        let start = starts[current - 1];
        let end = starts.get(current).copied().unwrap_or(text.len());
        let line = text[start..end].trim_end_matches(['\n', '\r']);
        let (cropped, shift) = crop_line(line, col, crop_radius);
        if current == row {
            let caret_col = col.saturating_sub(1).saturating_sub(shift);
            let local = char_to_byte(cropped, caret_col);
            let next = cropped[local..]
                .chars()
                .next()
                .map_or(local, |c| local + c.len_utf8());
            span = window.len() + local..window.len() + next;
        }
        window.push_str(cropped);
        window.push('\n');
    }

    let report = &[level
        .primary_title(format!("line {row} column {col}: {msg}"))
        .element(
            AnnotateSnippet::source(&window)
                .line_start(first_row)
                .path(path)
                .fold(false)
                .annotation(AnnotationKind::Primary.span(span).label(msg)),
        )];

    // Plain ASCII keeps error strings stable and free of escape sequences.
    let renderer = Renderer::plain().decor_style(DecorStyle::Ascii);
    Some(renderer.render(report).to_string())
}

fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(
        text.bytes()
            .enumerate()
            .filter(|(_, b)| *b == b'\n')
            .map(|(idx, _)| idx + 1)
            .filter(|idx| *idx < text.len()),
    );
    starts
}

/// Crop `line` to `radius` characters on each side of the 1-based column `col`.
///
/// Returns the cropped slice and the number of characters dropped on the left.
fn crop_line(line: &str, col: usize, radius: usize) -> (&str, usize) {
    let total = line.chars().count();
    if total <= radius.saturating_mul(2) {
        return (line, 0);
    }
    let center = col.saturating_sub(1);
    let left = center.saturating_sub(radius);
    let right = center.saturating_add(radius).min(total);
    if left >= right {
        return (line, 0);
    }
    let from = char_to_byte(line, left);
    let to = char_to_byte(line, right);
    (&line[from..to], left)
}

fn char_to_byte(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(idx, _)| idx)
}
