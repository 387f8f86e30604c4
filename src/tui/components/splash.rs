//! # Splash Component
//!
//! Start-up surface shown until the worker reports the system ready (or the
//! retrieval index finishes), then swapped for the transcript after a short
//! delay.

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Gauge, Paragraph};

use crate::protocol::message::{RagState, RagStatusInfo};
use crate::tui::component::Component;

const LOGO: [&str; 5] = [
    "  ___  _   _   _   ____    _    ____  ",
    " / _ \\| | | | / \\ / ___|  / \\  |  _ \\ ",
    "| | | | | | |/ _ \\\\___ \\ / _ \\ | |_) |",
    "| |_| | |_| / ___ \\___) / ___ \\|  _ < ",
    " \\__\\_\\\\___/_/   \\_\\____/_/   \\_\\_| \\_\\",
];

const GAUGE_WIDTH: u16 = 40;

pub struct Splash<'a> {
    pub status_message: &'a str,
    pub rag: Option<&'a RagStatusInfo>,
    pub spinner_frame: usize,
}

impl Splash<'_> {
    fn rag_color(&self) -> Color {
        match self.rag.map(|r| r.status) {
            Some(RagState::Error) => Color::Red,
            Some(RagState::Done) => Color::Green,
            _ => Color::Cyan,
        }
    }

    fn text_lines(&self) -> Vec<Line<'static>> {
        let dots = ".".repeat(self.spinner_frame % 4);
        let mut lines = vec![
            Line::from(Span::styled(
                format!("v{}", env!("CARGO_PKG_VERSION")),
                Style::default().fg(Color::DarkGray),
            )),
            Line::default(),
            Line::from(Span::styled(
                format!("{}{dots}", self.status_message),
                Style::default().fg(Color::Yellow),
            )),
        ];
        if let Some(detail) = self.rag.and_then(|r| r.detail.as_deref()) {
            lines.push(Line::from(Span::styled(
                detail.to_string(),
                Style::default().fg(self.rag_color()),
            )));
        }
        lines
    }
}

impl Component for Splash<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let text = self.text_lines();
        let progress = self
            .rag
            .and_then(|r| r.progress)
            .filter(|p| p.total > 0);

        let [logo_area, _, text_area, gauge_area] = Layout::vertical([
            Constraint::Length(LOGO.len() as u16),
            Constraint::Length(1),
            Constraint::Length(text.len() as u16),
            Constraint::Length(u16::from(progress.is_some())),
        ])
        .flex(Flex::Center)
        .areas(area);

        let logo: Vec<Line> = LOGO
            .iter()
            .map(|row| {
                Line::from(Span::styled(
                    *row,
                    Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
                ))
            })
            .collect();
        frame.render_widget(Paragraph::new(logo).alignment(Alignment::Center), logo_area);
        frame.render_widget(Paragraph::new(text).alignment(Alignment::Center), text_area);

        if let Some(progress) = progress {
            let ratio = (f64::from(progress.current) / f64::from(progress.total)).clamp(0.0, 1.0);
            let [gauge_area] = Layout::horizontal([Constraint::Length(GAUGE_WIDTH)])
                .flex(Flex::Center)
                .areas(gauge_area);
            let gauge = Gauge::default()
                .ratio(ratio)
                .label(format!("{}/{}", progress.current, progress.total))
                .gauge_style(Style::default().fg(self.rag_color()));
            frame.render_widget(gauge, gauge_area);
        }
    }
}
