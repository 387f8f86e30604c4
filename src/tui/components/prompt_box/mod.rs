//! # PromptBox Component
//!
//! The bordered input area under the transcript.
//!
//! In `Mode::Input` it edits a multi-line prompt (Enter submits, Shift+Enter
//! or Ctrl+J inserts a newline). While a confirmation is pending it shows the
//! question instead and leaves key handling to the event loop.
//!
//! The buffer and cursor are internal state; `title` and `question` are
//! props refreshed every frame from `App`.

mod editing;
mod layout;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, BorderType, Padding, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState};

use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

use layout::{MAX_VISIBLE_ROWS, VERTICAL_OVERHEAD, cursor_position, inner_width, row_count, rows};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
    Submit(String),
    Edited,
}

pub struct PromptBox {
    pub buffer: String,
    /// Byte offset into `buffer`.
    cursor: usize,
    /// First visible row when the text is taller than the box.
    scroll_offset: u16,
    pub title: String,
    /// Pending yes/no question, shown instead of the buffer.
    pub question: Option<String>,
    /// Input is accepted but submitting is refused (dims the text).
    pub dimmed: bool,
}

impl Default for PromptBox {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBox {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            scroll_offset: 0,
            title: String::from("Prompt"),
            question: None,
            dimmed: false,
        }
    }

    /// Height for the current content at `area_width`, borders included.
    pub fn calculate_height(&self, area_width: u16) -> u16 {
        let content = match &self.question {
            Some(question) => row_count(question, inner_width(area_width)),
            None => row_count(&self.buffer, inner_width(area_width)),
        };
        content.clamp(1, MAX_VISIBLE_ROWS) + VERTICAL_OVERHEAD
    }

    fn keep_cursor_visible(&mut self, width: usize) {
        let total = row_count(&self.buffer, width);
        if total <= MAX_VISIBLE_ROWS {
            self.scroll_offset = 0;
            return;
        }
        let (row, _) = cursor_position(&self.buffer, self.cursor, width);
        if row < self.scroll_offset {
            self.scroll_offset = row;
        } else if row >= self.scroll_offset + MAX_VISIBLE_ROWS {
            self.scroll_offset = row + 1 - MAX_VISIBLE_ROWS;
        }
    }

    fn block(&self) -> Block<'static> {
        Block::bordered()
            .border_type(BorderType::Rounded)
            .padding(Padding::horizontal(1))
            .title(self.title.clone())
    }

    fn render_question(&self, frame: &mut Frame, area: Rect, question: &str) {
        let width = inner_width(area.width);
        let text = rows(question, width).join("\n");
        let paragraph = Paragraph::new(text)
            .block(self.block().border_style(Style::default().fg(Color::Yellow)))
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
        frame.render_widget(paragraph, area);
    }

    fn render_scrollbar(&self, frame: &mut Frame, area: Rect, total_rows: u16) {
        if total_rows <= MAX_VISIBLE_ROWS {
            return;
        }
        let mut state = ScrollbarState::default()
            .content_length(total_rows.saturating_sub(MAX_VISIBLE_ROWS) as usize)
            .position(self.scroll_offset as usize);
        let bar_area = Rect {
            x: area.x + area.width.saturating_sub(1),
            y: area.y + 1,
            width: 1,
            height: area.height.saturating_sub(2),
        };
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            bar_area,
            &mut state,
        );
    }

    fn insert(&mut self, text: &str) {
        self.buffer.insert_str(self.cursor, text);
        self.cursor += text.len();
    }

    fn move_to(&mut self, pos: usize) -> Option<PromptEvent> {
        (pos != self.cursor).then(|| {
            self.cursor = pos;
            PromptEvent::Edited
        })
    }
}

impl Component for PromptBox {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        if let Some(question) = self.question.clone() {
            self.render_question(frame, area, &question);
            return;
        }

        let width = inner_width(area.width);
        self.keep_cursor_visible(width);

        let all_rows = rows(&self.buffer, width);
        let total_rows = u16::try_from(all_rows.len()).unwrap_or(u16::MAX);
        let visible = all_rows
            .iter()
            .skip(self.scroll_offset as usize)
            .take(MAX_VISIBLE_ROWS as usize)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");

        let color = if self.dimmed { Color::DarkGray } else { Color::Green };
        let paragraph = Paragraph::new(visible)
            .block(self.block())
            .style(Style::default().fg(color));
        frame.render_widget(paragraph, area);
        self.render_scrollbar(frame, area, total_rows);

        // One column of border plus one of padding on the left.
        let (row, col) = cursor_position(&self.buffer, self.cursor, width);
        let x = area.x + 2 + col.min(u16::try_from(width).unwrap_or(u16::MAX));
        let y = area.y + 1 + row.saturating_sub(self.scroll_offset);
        frame.set_cursor_position((x, y));
    }
}

impl EventHandler for PromptBox {
    type Event = PromptEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        let text = &self.buffer;
        match event {
            TuiEvent::InputChar(c) => {
                self.insert(c.encode_utf8(&mut [0; 4]));
                Some(PromptEvent::Edited)
            }
            TuiEvent::Paste(pasted) => {
                // Terminals send CR line endings in bracketed paste.
                let normalized = pasted.replace("\r\n", "\n").replace('\r', "\n");
                self.insert(&normalized);
                Some(PromptEvent::Edited)
            }
            TuiEvent::Backspace => {
                if self.cursor == 0 {
                    return None;
                }
                let start = editing::prev_char(text, self.cursor);
                self.buffer.drain(start..self.cursor);
                self.cursor = start;
                Some(PromptEvent::Edited)
            }
            TuiEvent::Delete => {
                if self.cursor >= text.len() {
                    return None;
                }
                let end = editing::next_char(text, self.cursor);
                self.buffer.drain(self.cursor..end);
                Some(PromptEvent::Edited)
            }
            TuiEvent::CursorLeft => {
                let pos = editing::prev_char(text, self.cursor);
                self.move_to(pos)
            }
            TuiEvent::CursorRight => {
                let pos = editing::next_char(text, self.cursor);
                self.move_to(pos)
            }
            TuiEvent::WordLeft => {
                let pos = editing::prev_word(text, self.cursor);
                self.move_to(pos)
            }
            TuiEvent::WordRight => {
                let pos = editing::next_word(text, self.cursor);
                self.move_to(pos)
            }
            TuiEvent::CursorHome => {
                let pos = editing::line_start(text, self.cursor);
                self.move_to(pos)
            }
            TuiEvent::CursorEnd => {
                let pos = editing::line_end(text, self.cursor);
                self.move_to(pos)
            }
            TuiEvent::Submit => {
                if self.buffer.trim().is_empty() {
                    return None;
                }
                let submitted = std::mem::take(&mut self.buffer);
                self.cursor = 0;
                self.scroll_offset = 0;
                Some(PromptEvent::Submit(submitted))
            }
            _ => None,
        }
    }
}
