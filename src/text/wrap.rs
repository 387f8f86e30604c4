//! Greedy fixed-width wrapping over styled segments.
//!
//! Wrapping works on the segment sequence rather than flattened text so a
//! style boundary never moves. Inter-segment spacing follows the same rule as
//! [`flatten`](super::segment::flatten); a separator that has to be inserted
//! is emitted as its own one-space `Normal` segment.

use super::panel::{char_width, display_width};
use super::segment::{TextSegment, needs_separator};

struct LineBuilder {
    lines: Vec<Vec<TextSegment>>,
    current: Vec<TextSegment>,
    used: usize,
}

impl LineBuilder {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            current: Vec::new(),
            used: 0,
        }
    }

    fn push(&mut self, text: &str, template: &TextSegment, separated: bool) {
        if separated {
            self.current.push(TextSegment::normal(" "));
            self.used += 1;
        }
        self.used += display_width(text);
        self.current.push(TextSegment::new(text, template.style));
    }

    fn flush(&mut self) {
        while let Some(last) = self.current.last_mut() {
            let trimmed = last.text.trim_end_matches(' ');
            if trimmed.is_empty() {
                self.current.pop();
            } else {
                last.text.truncate(trimmed.len());
                break;
            }
        }
        self.lines.push(std::mem::take(&mut self.current));
        self.used = 0;
    }

    fn is_continuation(&self) -> bool {
        self.current.is_empty() && !self.lines.is_empty()
    }
}

/// Byte index of the last space whose preceding text fits in `budget` columns.
fn last_space_within(text: &str, budget: usize) -> Option<usize> {
    let mut width = 0;
    let mut found = None;
    for (i, c) in text.char_indices() {
        if width > budget {
            break;
        }
        if c == ' ' {
            found = Some(i);
        }
        width += char_width(c);
    }
    found
}

/// Byte index splitting off the longest prefix that fits in `width` columns.
/// At least one visible character is taken, and zero-width marks stay with
/// their base character.
fn hard_break_at(text: &str, width: usize) -> usize {
    let mut used = 0;
    let mut end = 0;
    for (i, c) in text.char_indices() {
        let w = char_width(c);
        if w > 0 && used + w > width && end > 0 {
            break;
        }
        used += w;
        end = i + c.len_utf8();
    }
    end
}

/// Wrap `segments` into lines of at most `width` display columns.
///
/// A width of zero is treated as one. A single token wider than the line is
/// hard-broken.
pub fn wrap_segments(segments: &[TextSegment], width: usize) -> Vec<Vec<TextSegment>> {
    let width = width.max(1);
    let mut builder = LineBuilder::new();

    for segment in segments {
        let mut pending: &str = &segment.text;
        loop {
            if builder.is_continuation() {
                pending = pending.trim_start_matches(' ');
            }
            if pending.is_empty() {
                break;
            }

            let separated = builder
                .current
                .last()
                .is_some_and(|prev| needs_separator(prev, &TextSegment::new(pending, segment.style)));
            let sep = usize::from(separated);
            if builder.used + sep + display_width(pending) <= width {
                builder.push(pending, segment, separated);
                break;
            }

            let budget = width.saturating_sub(builder.used + sep);
            if let Some(split) = last_space_within(pending, budget) {
                let head = pending[..split].trim_end_matches(' ');
                if !head.is_empty() {
                    builder.push(head, segment, separated);
                }
                if !builder.current.is_empty() {
                    builder.flush();
                }
                pending = &pending[split + 1..];
                continue;
            }

            if builder.current.is_empty() {
                let end = hard_break_at(pending, width);
                builder.push(&pending[..end], segment, false);
                builder.flush();
                pending = &pending[end..];
                continue;
            }

            builder.flush();
        }
    }

    if !builder.current.is_empty() {
        builder.flush();
    }
    builder.lines
}
