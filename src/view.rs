//! # Transcript View
//!
//! Turns committed items into display lines: styled cells plus a tone the
//! renderer maps to colors. Both the TUI and headless mode draw from here,
//! so the transcript reads the same on a terminal and in a pipe.
//!
//! ```text
//! CommittedItem ─► item_lines(width) ─► Vec<ViewLine>
//!                      ├─ format_lines / wrap_segments   (prose)
//!                      └─ render_panel                   (boxes)
//! ```

use crate::core::item::{CommittedItem, ItemKind};
use crate::text::{
    PanelCell, PanelKind, RowPart, TextSegment, format_line, format_lines, render_panel, row_text,
    wrap_segments,
};

/// Lines of tool output shown under a tool result.
pub const TOOL_OUTPUT_LINES: usize = 12;
pub const CODE_PANEL_LINES: usize = 40;
pub const CODE_RESULT_LINES: usize = 30;

/// Color intent for a line, mapped to concrete styles by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Normal,
    Error,
    Muted,
    Header,
    Success,
    Accent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewLine {
    pub cells: Vec<PanelCell>,
    pub tone: Tone,
}

impl ViewLine {
    pub fn blank() -> Self {
        Self {
            cells: Vec::new(),
            tone: Tone::Normal,
        }
    }

    fn from_segments(segments: Vec<TextSegment>, tone: Tone) -> Self {
        Self {
            cells: segments
                .into_iter()
                .map(|segment| PanelCell {
                    part: RowPart::Content,
                    segment,
                })
                .collect(),
            tone,
        }
    }

    pub fn text(&self) -> String {
        row_text(&self.cells)
    }
}

/// `strategist` → `Strategist`.
pub fn display_name(agent: &str) -> String {
    let mut chars = agent.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn prose(text: &str, width: usize, tone: Tone, out: &mut Vec<ViewLine>) {
    let lines: Vec<&str> = text.lines().collect();
    for line in format_lines(&lines, false) {
        if line.add_empty_before && !out.is_empty() {
            out.push(ViewLine::blank());
        }
        if line.segments.is_empty() {
            out.push(ViewLine::blank());
            continue;
        }
        let (indent, budget) = if line.is_task_continuation {
            ("  ", width.saturating_sub(2))
        } else {
            ("", width)
        };
        for wrapped in wrap_segments(&line.segments, budget) {
            let mut segments = Vec::with_capacity(wrapped.len() + 1);
            if !indent.is_empty() {
                segments.push(TextSegment::normal(indent));
            }
            segments.extend(wrapped);
            out.push(ViewLine::from_segments(segments, tone));
        }
    }
}

/// Free text laid out like a log entry, for content that is not an item yet
/// (the streaming plan preview).
pub fn prose_lines(text: &str, width: usize, tone: Tone) -> Vec<ViewLine> {
    let mut out = Vec::new();
    prose(text, width.max(1), tone, &mut out);
    out
}

/// Raw lines capped at `limit`, with a trailing "more lines" note.
fn capped_lines(text: &str, limit: usize) -> (Vec<String>, Option<String>) {
    let all: Vec<String> = text.lines().map(|l| l.replace('\t', "    ")).collect();
    if all.len() <= limit {
        return (all, None);
    }
    let hidden = all.len() - limit;
    let shown = all.into_iter().take(limit).collect();
    (shown, Some(format!("… {hidden} more lines")))
}

fn code_body(text: &str, limit: usize) -> Vec<Vec<TextSegment>> {
    let (lines, more) = capped_lines(text, limit);
    let mut body: Vec<Vec<TextSegment>> = lines
        .into_iter()
        .map(|l| {
            if l.is_empty() {
                Vec::new()
            } else {
                vec![TextSegment::code(l)]
            }
        })
        .collect();
    if let Some(more) = more {
        body.push(vec![TextSegment::italic(more)]);
    }
    body
}

fn prose_body(text: &str, strip_task_prefix: bool) -> Vec<Vec<TextSegment>> {
    let lines: Vec<&str> = text.lines().collect();
    format_lines(&lines, strip_task_prefix)
        .into_iter()
        .map(|l| l.segments)
        .collect()
}

fn panel(
    kind: PanelKind,
    title: &str,
    body: &[Vec<TextSegment>],
    width: usize,
    tone: Tone,
    out: &mut Vec<ViewLine>,
) {
    out.extend(
        render_panel(kind, title, body, width)
            .into_iter()
            .map(|cells| ViewLine { cells, tone }),
    );
}

/// Display lines for one item at `width` columns.
pub fn item_lines(item: &CommittedItem, width: usize) -> Vec<ViewLine> {
    let width = width.max(1);
    let mut out = Vec::new();
    let error_or = |tone: Tone| if item.is_error { Tone::Error } else { tone };

    match &item.kind {
        ItemKind::Header { agent, task } => {
            let label = match task {
                Some(n) => format!("● {} · Task {n}", display_name(agent)),
                None => format!("● {}", display_name(agent)),
            };
            out.push(ViewLine::blank());
            out.push(ViewLine::from_segments(vec![TextSegment::bold(label)], Tone::Header));
        }
        ItemKind::ToolResult { text, output } => {
            let mark = if item.is_error { "✗ " } else { "✓ " };
            let mut segments = vec![TextSegment::normal(mark)];
            segments.extend(format_line(text, false, false).segments);
            for wrapped in wrap_segments(&segments, width) {
                out.push(ViewLine::from_segments(wrapped, error_or(Tone::Success)));
            }
            if let Some(output) = output.as_deref().filter(|o| !o.trim().is_empty()) {
                let (lines, more) = capped_lines(output, TOOL_OUTPUT_LINES);
                for line in lines.into_iter().chain(more) {
                    let segments = vec![TextSegment::normal(format!("  {line}"))];
                    for wrapped in wrap_segments(&segments, width) {
                        out.push(ViewLine::from_segments(wrapped, Tone::Muted));
                    }
                }
            }
        }
        ItemKind::Log { text } => prose(text, width, error_or(Tone::Normal), &mut out),
        ItemKind::PlanBox { tasks } => {
            let body: Vec<Vec<TextSegment>> = tasks
                .iter()
                .enumerate()
                .map(|(i, task)| {
                    let mut line = vec![TextSegment::bold(format!("{}.", i + 1))];
                    line.extend(format_line(task, true, false).segments);
                    line
                })
                .collect();
            panel(PanelKind::Standard, "Plan", &body, width, Tone::Accent, &mut out);
        }
        ItemKind::TaskBox { number, text } => {
            let body = vec![format_line(text, true, false).segments];
            panel(
                PanelKind::Compact,
                &format!("Task {number}"),
                &body,
                width,
                Tone::Accent,
                &mut out,
            );
        }
        ItemKind::EvaluationSummary { verdict, summary } => {
            let body = summary
                .as_deref()
                .map(|s| prose_body(s, false))
                .unwrap_or_default();
            panel(
                PanelKind::Standard,
                verdict,
                &body,
                width,
                error_or(Tone::Success),
                &mut out,
            );
        }
        ItemKind::FinalSummary { content } => {
            let body = prose_body(content, false);
            panel(PanelKind::Wide, "Final Summary", &body, width, Tone::Success, &mut out);
        }
        ItemKind::CodePanel { name, content } => {
            let body = code_body(content, CODE_PANEL_LINES);
            panel(PanelKind::Wide, name, &body, width, Tone::Muted, &mut out);
        }
        ItemKind::CodeResultPanel { output, file_path } => {
            let title = if file_path.is_empty() {
                "Output".to_string()
            } else {
                format!("Output · {file_path}")
            };
            let body = code_body(output, CODE_RESULT_LINES);
            panel(PanelKind::Standard, &title, &body, width, error_or(Tone::Muted), &mut out);
        }
        ItemKind::ResumeBanner {
            previous_input,
            task,
            total,
        } => {
            let mut body = vec![vec![TextSegment::normal(format!(
                "Resuming at task {task} of {total}"
            ))]];
            if !previous_input.is_empty() {
                body.push(vec![
                    TextSegment::bold("Prompt:"),
                    TextSegment::normal(previous_input.clone()),
                ]);
            }
            panel(PanelKind::Standard, "Resumed", &body, width, Tone::Accent, &mut out);
        }
    }
    out
}

/// Whole transcript as plain text, one item after another.
pub fn transcript_text(items: &[CommittedItem], width: usize) -> String {
    items
        .iter()
        .flat_map(|item| item_lines(item, width))
        .map(|line| line.text().trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
