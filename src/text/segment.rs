//! Inline markup segmentation.
//!
//! A line is split into ordered [`TextSegment`] runs. Only two inline
//! constructs are recognised: backtick code spans and double-asterisk bold
//! spans. Code wins over bold when the two overlap.

use std::ops::Range;

/// Visual style of a run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentStyle {
    Normal,
    Code,
    Bold,
    Italic,
    /// The `Task N:` label of a task heading that keeps its prefix.
    TaskHeading,
}

/// A styled run of text. Derived per render, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    pub text: String,
    pub style: SegmentStyle,
}

impl TextSegment {
    pub fn new(text: impl Into<String>, style: SegmentStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn normal(text: impl Into<String>) -> Self {
        Self::new(text, SegmentStyle::Normal)
    }

    pub fn code(text: impl Into<String>) -> Self {
        Self::new(text, SegmentStyle::Code)
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self::new(text, SegmentStyle::Bold)
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self::new(text, SegmentStyle::Italic)
    }

    pub fn is_normal(&self) -> bool {
        self.style == SegmentStyle::Normal
    }
}

/// An accepted markup span: the full marker range plus the inner text range.
struct Span {
    outer: Range<usize>,
    inner: Range<usize>,
    style: SegmentStyle,
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Backtick-delimited spans, scanned left to right. An unmatched backtick is
/// plain text.
fn code_spans(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut search = 0;
    while let Some(open) = line[search..].find('`').map(|i| search + i) {
        let Some(close) = line[open + 1..].find('`').map(|i| open + 1 + i) else {
            break;
        };
        if close > open + 1 {
            spans.push(Span {
                outer: open..close + 1,
                inner: open + 1..close,
                style: SegmentStyle::Code,
            });
        }
        search = close + 1;
    }
    spans
}

/// Double-asterisk spans. Markers inside code spans are ignored; a trailing
/// unterminated `**` runs to end of line.
fn bold_spans(line: &str, code: &[Span]) -> Vec<Span> {
    // match_indices never overlaps, so "****" yields two markers.
    let markers: Vec<usize> = line
        .match_indices("**")
        .map(|(i, _)| i)
        .filter(|i| !code.iter().any(|c| c.outer.contains(i)))
        .collect();
    let mut spans = Vec::new();
    for pair in markers.chunks(2) {
        match *pair {
            [open, close] if close > open + 2 => spans.push(Span {
                outer: open..close + 2,
                inner: open + 2..close,
                style: SegmentStyle::Bold,
            }),
            [open] if open + 2 < line.len() => spans.push(Span {
                outer: open..line.len(),
                inner: open + 2..line.len(),
                style: SegmentStyle::Bold,
            }),
            _ => {}
        }
    }
    spans
}

/// Split `line` into ordered styled segments.
///
/// Code spans are accepted first; a bold span that overlaps an accepted code
/// span is discarded. Unmarked text between spans becomes `Normal`. Empty
/// runs are never emitted.
pub fn parse_styled_segments(line: &str) -> Vec<TextSegment> {
    let mut accepted = code_spans(line);
    for span in bold_spans(line, &accepted) {
        if !accepted.iter().any(|a| overlaps(&a.outer, &span.outer)) {
            accepted.push(span);
        }
    }
    accepted.sort_by_key(|s| s.outer.start);

    let mut segments = Vec::new();
    let mut cursor = 0;
    for span in &accepted {
        if span.outer.start > cursor {
            segments.push(TextSegment::normal(&line[cursor..span.outer.start]));
        }
        let inner = &line[span.inner.clone()];
        if !inner.is_empty() {
            segments.push(TextSegment::new(inner, span.style));
        }
        cursor = span.outer.end;
    }
    if cursor < line.len() {
        segments.push(TextSegment::normal(&line[cursor..]));
    }
    segments
}

/// Join segments into plain text, inserting one space between adjacent
/// segments when either side is styled and the boundary has no whitespace
/// or opening bracket/quote already.
pub fn flatten(segments: &[TextSegment]) -> String {
    let mut out = String::new();
    for (i, seg) in segments.iter().enumerate() {
        if i > 0 && needs_separator(&segments[i - 1], seg) {
            out.push(' ');
        }
        out.push_str(&seg.text);
    }
    out
}

/// The one-space inter-segment rule shared by flattening and wrapping.
pub fn needs_separator(prev: &TextSegment, next: &TextSegment) -> bool {
    if prev.is_normal() && next.is_normal() {
        return false;
    }
    let Some(last) = prev.text.chars().next_back() else {
        return false;
    };
    if last.is_whitespace() || matches!(last, '(' | '[' | '{' | '"' | '\'' | '“' | '‘') {
        return false;
    }
    match next.text.chars().next() {
        Some(first) => !first.is_whitespace() && !matches!(first, ',' | '.' | ';' | ':' | ')' | ']' | '!' | '?'),
        None => false,
    }
}
