//! # Transcript Component
//!
//! Scrollable view of the committed item log.
//!
//! Committed items never change, so each one is rendered to ratatui lines
//! once per width and cached with its height. A frame only renders the new
//! tail of the log and the items inside the visible window (plus half a
//! viewport of slack on each side).
//!
//! `Transcript` is created every frame with props borrowed from `App`; the
//! persistent part (`TranscriptState`) lives in `TuiState`.

use ratatui::Frame;
use ratatui::layout::{Position, Rect, Size};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::Paragraph;
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::core::item::{CommittedItem, ItemKind};
use crate::text::{RowPart, SegmentStyle};
use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;
use crate::tui::highlight::CodeHighlighter;
use crate::view::{self, Tone, ViewLine};

pub fn tone_style(tone: Tone) -> Style {
    match tone {
        Tone::Normal => Style::default(),
        Tone::Error => Style::default().fg(Color::Red),
        Tone::Muted => Style::default().fg(Color::DarkGray),
        Tone::Header => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        Tone::Success => Style::default().fg(Color::Green),
        Tone::Accent => Style::default().fg(Color::Magenta),
    }
}

fn code_style() -> Style {
    Style::default().fg(Color::Yellow)
}

fn segment_style(style: SegmentStyle, base: Style) -> Style {
    match style {
        SegmentStyle::Normal => base,
        SegmentStyle::Code => code_style(),
        SegmentStyle::Bold => base.add_modifier(Modifier::BOLD),
        SegmentStyle::Italic => base.add_modifier(Modifier::ITALIC),
        SegmentStyle::TaskHeading => base.fg(Color::Cyan).add_modifier(Modifier::BOLD),
    }
}

/// Convert one display line. Panel frames take the tone color; panel bodies
/// keep the default color unless the whole panel is an error.
fn to_line(line: &ViewLine, highlighter: &mut Option<CodeHighlighter>) -> Line<'static> {
    let tone = tone_style(line.tone);
    let is_panel = line.cells.iter().any(|c| c.part == RowPart::Border);
    let content_base = if is_panel && line.tone != Tone::Error {
        Style::default()
    } else {
        tone
    };

    let mut spans = Vec::with_capacity(line.cells.len());
    for cell in &line.cells {
        let segment = &cell.segment;
        match cell.part {
            RowPart::Border => {
                spans.push(Span::styled(segment.text.clone(), segment_style(segment.style, tone)));
            }
            RowPart::Content => match highlighter.as_mut() {
                Some(hl) if segment.style == SegmentStyle::Code => {
                    spans.extend(hl.spans(&segment.text));
                }
                _ => spans.push(Span::styled(
                    segment.text.clone(),
                    segment_style(segment.style, content_base),
                )),
            },
        }
    }
    Line::from(spans)
}

fn to_lines(view_lines: &[ViewLine], mut highlighter: Option<CodeHighlighter>) -> Vec<Line<'static>> {
    view_lines
        .iter()
        .map(|line| to_line(line, &mut highlighter))
        .collect()
}

/// Styled lines for one item at `width` columns.
pub fn render_item(item: &CommittedItem, width: usize) -> Vec<Line<'static>> {
    let highlighter = match &item.kind {
        ItemKind::CodePanel { name, .. } => Some(CodeHighlighter::for_file(name, code_style())),
        _ => None,
    };
    to_lines(&view::item_lines(item, width), highlighter)
}

fn height_of(lines: &[Line<'_>]) -> u16 {
    u16::try_from(lines.len()).unwrap_or(u16::MAX)
}

/// Layout and scroll state for the transcript.
/// Must be persisted in the parent TuiState.
pub struct TranscriptState {
    pub scroll_state: ScrollViewState,
    pub layout: LayoutCache,
    /// When true, auto-scroll to bottom on new content
    pub stick_to_bottom: bool,
    /// Last known viewport height (for scroll clamping between frames)
    pub viewport_height: u16,
}

impl Default for TranscriptState {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptState {
    pub fn new() -> Self {
        Self {
            scroll_state: ScrollViewState::default(),
            layout: LayoutCache::new(),
            stick_to_bottom: true,
            viewport_height: 0,
        }
    }

    fn max_offset(&self, content_height: u16) -> u16 {
        content_height.saturating_sub(self.viewport_height)
    }

    /// Clamp scroll offset so it never exceeds the content bounds.
    pub fn clamp_scroll(&mut self, content_height: u16) {
        let max_y = self.max_offset(content_height);
        let current = self.scroll_state.offset();
        if current.y > max_y {
            self.scroll_state.set_offset(Position { x: current.x, y: max_y });
        }
    }

    /// Re-engage auto-scroll once the user scrolls back to the bottom.
    pub fn repin_if_at_bottom(&mut self) {
        let max_y = self.max_offset(self.layout.total_height());
        let current = self.scroll_state.offset();
        if current.y >= max_y {
            self.stick_to_bottom = true;
            self.scroll_state.set_offset(Position { x: current.x, y: max_y });
        }
    }

    /// Whether content exists below the viewport.
    pub fn has_unseen_content(&self) -> bool {
        !self.stick_to_bottom
            && self.scroll_state.offset().y < self.max_offset(self.layout.total_height())
    }
}

impl EventHandler for TranscriptState {
    type Event = ();

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::ScrollUp => {
                self.scroll_state.scroll_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollDown => {
                self.scroll_state.scroll_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollPageUp => {
                self.scroll_state.scroll_page_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollPageDown => {
                self.scroll_state.scroll_page_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollToBottom => {
                self.stick_to_bottom = true;
            }
            _ => {}
        }
        None
    }
}

/// Rendered lines and heights for every committed item.
pub struct LayoutCache {
    pub rendered: Vec<Vec<Line<'static>>>,
    pub heights: Vec<u16>,
    pub prefix_heights: Vec<u16>,
    content_width: u16,
    /// Id of the last cached item; a mismatch means the log was replaced.
    last_id: Option<String>,
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutCache {
    pub fn new() -> Self {
        Self {
            rendered: Vec::new(),
            heights: Vec::new(),
            prefix_heights: Vec::new(),
            content_width: 0,
            last_id: None,
        }
    }

    pub fn reusable_count(&self, items: &[CommittedItem], content_width: u16) -> usize {
        let cached = self.rendered.len();
        if self.content_width != content_width || cached == 0 || items.len() < cached {
            return 0;
        }
        if items[cached - 1].id.as_str() != self.last_id.as_deref().unwrap_or_default() {
            return 0;
        }
        cached
    }

    /// Bring the cache in line with `items`, rendering only what changed.
    pub fn update(&mut self, items: &[CommittedItem], content_width: u16) {
        let reusable = self.reusable_count(items, content_width);
        self.rendered.truncate(reusable);
        self.heights.truncate(reusable);
        for item in &items[reusable..] {
            let lines = render_item(item, content_width as usize);
            self.heights.push(height_of(&lines));
            self.rendered.push(lines);
        }
        self.rebuild_prefix_heights();
        self.content_width = content_width;
        self.last_id = items.last().map(|item| item.id.clone());
    }

    pub fn total_height(&self) -> u16 {
        self.prefix_heights.last().copied().unwrap_or(0)
    }

    fn rebuild_prefix_heights(&mut self) {
        self.prefix_heights = self
            .heights
            .iter()
            .scan(0u16, |acc, &h| {
                *acc = acc.saturating_add(h);
                Some(*acc)
            })
            .collect();
    }

    pub fn visible_range(&self, scroll_offset: u16, viewport_height: u16) -> std::ops::Range<usize> {
        let buffer = viewport_height / 2;
        let buffered_start = scroll_offset.saturating_sub(buffer);
        let buffered_end = scroll_offset
            .saturating_add(viewport_height)
            .saturating_add(buffer);

        let start = self
            .prefix_heights
            .partition_point(|&end| end <= buffered_start);
        let end = self
            .prefix_heights
            .partition_point(|&end| end < buffered_end)
            .saturating_add(1)
            .min(self.prefix_heights.len());

        start..end
    }
}

/// Streaming text drawn below the log until its item is committed.
pub struct Preview<'a> {
    pub title: String,
    pub body: &'a str,
}

/// Scrollable transcript. Created fresh each frame.
pub struct Transcript<'a> {
    pub state: &'a mut TranscriptState,
    pub items: &'a [CommittedItem],
    pub preview: Option<Preview<'a>>,
}

impl Component for Transcript<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let content_width = area.width.saturating_sub(1); // scrollbar column
        self.state.layout.update(self.items, content_width);

        let preview = self
            .preview
            .as_ref()
            .filter(|p| !p.body.trim().is_empty())
            .map(|p| {
                let mut lines = vec![Line::from(Span::styled(
                    p.title.clone(),
                    tone_style(Tone::Muted).add_modifier(Modifier::ITALIC),
                ))];
                lines.extend(to_lines(
                    &view::prose_lines(p.body, content_width as usize, Tone::Muted),
                    None,
                ));
                lines
            })
            .unwrap_or_default();

        let items_height = self.state.layout.total_height();
        let content_height = items_height.saturating_add(height_of(&preview));

        self.state.viewport_height = area.height;
        if self.state.stick_to_bottom {
            let bottom = self.state.max_offset(content_height);
            self.state.scroll_state.set_offset(Position { x: 0, y: bottom });
        } else {
            self.state.clamp_scroll(content_height);
        }

        let scroll_offset = self.state.scroll_state.offset().y;
        let layout = &self.state.layout;
        let visible = layout.visible_range(scroll_offset, area.height);

        let mut scroll_view = ScrollView::new(Size::new(content_width, content_height.max(1)))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Always)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);

        let mut y = if visible.start > 0 {
            layout.prefix_heights[visible.start - 1]
        } else {
            0
        };
        for i in visible {
            let height = layout.heights[i];
            if height > 0 {
                let text = Text::from(layout.rendered[i].clone());
                scroll_view.render_widget(Paragraph::new(text), Rect::new(0, y, content_width, height));
            }
            y = y.saturating_add(height);
        }

        if !preview.is_empty() {
            let height = height_of(&preview);
            scroll_view.render_widget(
                Paragraph::new(Text::from(preview)),
                Rect::new(0, items_height, content_width, height),
            );
        }

        frame.render_stateful_widget(scroll_view, area, &mut self.state.scroll_state);
    }
}
