//! Line-level markup normalization.
//!
//! Turns one raw line of worker prose into styled segments plus layout hints
//! (task heading, section header, blank line before). Only the constructs the
//! worker actually emits are handled: `Task N:` headings, `#` headers,
//! block quotes, bullets, fenced code and inline code/bold.

use std::sync::LazyLock;

use regex::Regex;

use super::latex::apply_latex_transformations;
use super::segment::{SegmentStyle, TextSegment, flatten, parse_styled_segments};

static TASK_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{1,3}\s*)?(\*\*)?\s*Task\s+(\d+)\s*:(\*\*)?\s*").expect("static regex")
});
static SECTION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,3}\s+").expect("static regex"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)[-*+•]\s+").expect("static regex"));

const FENCE: &str = "```";
const GUIDANCE_MARKER: &str = "guidance:";

/// One formatted display line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattedLine {
    pub segments: Vec<TextSegment>,
    /// Segments joined with the inter-segment spacing rule.
    pub plain: String,
    pub is_task_heading: bool,
    pub is_section_header: bool,
    /// Renderers emit one blank line before this line.
    pub add_empty_before: bool,
    pub is_code: bool,
    /// Body line of a task block; wrapped but never re-prefixed.
    pub is_task_continuation: bool,
}

fn normalize(line: &str) -> String {
    let text = line.replace("&nbsp;", " ").replace('\u{00A0}', " ");
    let trimmed = text.trim_start();
    match trimmed.strip_prefix('>') {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest).to_string(),
        None => text,
    }
}

fn finish(segments: Vec<TextSegment>) -> (Vec<TextSegment>, String) {
    let segments: Vec<TextSegment> = segments
        .into_iter()
        .map(|mut seg| {
            if seg.style != SegmentStyle::Code {
                seg.text = apply_latex_transformations(&seg.text);
            }
            seg
        })
        .filter(|seg| !seg.text.is_empty())
        .collect();
    let plain = flatten(&segments);
    (segments, plain)
}

/// Format a single line.
///
/// Inside a fenced code block the raw line comes back as one `Code` segment
/// and no other rule applies.
pub fn format_line(line: &str, strip_task_prefix: bool, in_code_block: bool) -> FormattedLine {
    if in_code_block {
        return FormattedLine {
            segments: vec![TextSegment::code(line)],
            plain: line.to_string(),
            is_code: true,
            ..Default::default()
        };
    }

    let text = normalize(line);
    let mut formatted = FormattedLine::default();

    let segments = if let Some(caps) = TASK_HEADING.captures(&text) {
        formatted.is_task_heading = true;
        formatted.add_empty_before = true;
        let end = caps.get(0).map_or(0, |m| m.end());
        let rest = &text[end..];
        if strip_task_prefix {
            let title = rest.replace("**", "");
            let title = title.trim_end();
            if title.is_empty() {
                Vec::new()
            } else {
                parse_styled_segments(&format!("**{title}**"))
            }
        } else {
            let number = caps.get(3).map_or("", |m| m.as_str());
            let mut segments = vec![TextSegment::new(
                format!("Task {number}:"),
                SegmentStyle::TaskHeading,
            )];
            segments.extend(parse_styled_segments(rest));
            segments
        }
    } else if let Some(m) = SECTION_HEADER.find(&text) {
        formatted.is_section_header = true;
        formatted.add_empty_before = true;
        parse_styled_segments(&text[m.end()..])
    } else {
        let text = BULLET.replace(&text, "${1}• ");
        parse_styled_segments(&text)
    };

    let (segments, plain) = finish(segments);
    formatted.segments = segments;
    formatted.plain = plain;
    formatted
}

fn is_guidance(line: &FormattedLine) -> bool {
    line.plain
        .replace("**", "")
        .trim_start()
        .to_lowercase()
        .starts_with(GUIDANCE_MARKER)
}

/// Format a block of lines, tracking fenced code and task blocks.
///
/// Fence delimiter lines toggle code mode and are not emitted.
pub fn format_lines<S: AsRef<str>>(lines: &[S], strip_task_prefix: bool) -> Vec<FormattedLine> {
    let mut out = Vec::with_capacity(lines.len());
    let mut in_code = false;
    let mut in_task_block = false;

    for line in lines {
        let line = line.as_ref();
        if line.trim_start().starts_with(FENCE) {
            in_code = !in_code;
            continue;
        }
        let mut formatted = format_line(line, strip_task_prefix, in_code);
        if formatted.is_task_heading {
            in_task_block = true;
        } else if formatted.is_section_header || is_guidance(&formatted) {
            in_task_block = false;
        } else if in_task_block && !formatted.is_code {
            formatted.is_task_continuation = true;
        }
        out.push(formatted);
    }
    out
}
