//! Bordered, titled panels and display-width measurement.

use unicode_width::UnicodeWidthChar;

use super::segment::{TextSegment, flatten};
use super::wrap::wrap_segments;

/// True for marks that occupy no column of their own.
fn is_zero_width(c: char) -> bool {
    matches!(
        c,
        '\u{0300}'..='\u{036F}'
            | '\u{1AB0}'..='\u{1AFF}'
            | '\u{1DC0}'..='\u{1DFF}'
            | '\u{20D0}'..='\u{20FF}'
            | '\u{FE20}'..='\u{FE2F}'
            | '\u{200B}'..='\u{200D}'
            | '\u{FE0F}'
    )
}

pub(crate) fn char_width(c: char) -> usize {
    if is_zero_width(c) {
        0
    } else {
        c.width().unwrap_or(0)
    }
}

/// Terminal columns occupied by `s`, ignoring combining marks.
pub fn display_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

/// Panel size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Compact,
    Standard,
    Wide,
}

impl PanelKind {
    pub fn min_width(self) -> usize {
        match self {
            PanelKind::Compact => 10,
            PanelKind::Standard => 20,
            PanelKind::Wide => 30,
        }
    }
}

/// Whether a panel cell is frame or body text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPart {
    Border,
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelCell {
    pub part: RowPart,
    pub segment: TextSegment,
}

impl PanelCell {
    fn border(text: impl Into<String>) -> Self {
        Self {
            part: RowPart::Border,
            segment: TextSegment::normal(text),
        }
    }

    fn content(segment: TextSegment) -> Self {
        Self {
            part: RowPart::Content,
            segment,
        }
    }
}

pub type PanelRow = Vec<PanelCell>;

/// Narrowest a panel ever gets, even on a tiny terminal.
const FLOOR_WIDTH: usize = 4;

/// Columns taken by `│ ` and ` │`.
const FRAME_WIDTH: usize = 4;

fn outer_width(kind: PanelKind, title: &str, body: &[Vec<TextSegment>], max_width: usize) -> usize {
    let content = body
        .iter()
        .map(|line| display_width(&flatten(line)))
        .max()
        .unwrap_or(0);
    let natural = (content + FRAME_WIDTH).max(display_width(title) + 6);
    let max_width = max_width.max(FLOOR_WIDTH);
    if max_width < kind.min_width() {
        max_width
    } else {
        natural.clamp(kind.min_width(), max_width)
    }
}

fn truncate_to(s: &str, width: usize) -> String {
    if display_width(s) <= width {
        return s.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = char_width(c);
        if used + w + 1 > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

fn top_border(title: &str, outer: usize) -> PanelRow {
    let room = outer.saturating_sub(6);
    if title.is_empty() || room == 0 {
        return vec![PanelCell::border(format!(
            "╭{}╮",
            "─".repeat(outer.saturating_sub(2))
        ))];
    }
    let title = truncate_to(title, room);
    let fill = outer.saturating_sub(5 + display_width(&title));
    vec![
        PanelCell::border("╭─ "),
        PanelCell {
            part: RowPart::Border,
            segment: TextSegment::bold(title),
        },
        PanelCell::border(format!(" {}╮", "─".repeat(fill))),
    ]
}

/// Lay out `body` (one entry per logical line) in a rounded-corner box.
///
/// The box is as wide as its widest line, clamped to `[kind.min_width(),
/// max_width]`. When `max_width` is below the minimum the box shrinks to
/// `max_width`, but never below four columns.
pub fn render_panel(
    kind: PanelKind,
    title: &str,
    body: &[Vec<TextSegment>],
    max_width: usize,
) -> Vec<PanelRow> {
    let outer = outer_width(kind, title, body, max_width);
    let interior = outer.saturating_sub(FRAME_WIDTH).max(1);

    let mut rows = vec![top_border(title, outer)];
    for line in body {
        let wrapped = if line.is_empty() {
            vec![Vec::new()]
        } else {
            wrap_segments(line, interior)
        };
        for segments in wrapped {
            let used = display_width(&flatten(&segments));
            let mut row = vec![PanelCell::border("│ ")];
            row.extend(segments.into_iter().map(PanelCell::content));
            row.push(PanelCell::border(format!(
                "{} │",
                " ".repeat(interior.saturating_sub(used))
            )));
            rows.push(row);
        }
    }
    rows.push(vec![PanelCell::border(format!(
        "╰{}╯",
        "─".repeat(outer.saturating_sub(2))
    ))]);
    rows
}

/// Concatenate a row's cells, for plain-text output and tests.
pub fn row_text(row: &[PanelCell]) -> String {
    row.iter().map(|cell| cell.segment.text.as_str()).collect()
}
