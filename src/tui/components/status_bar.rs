//! # StatusBar Component
//!
//! One-line bar at the top of the main surface.
//!
//! Purely presentational: all data arrives as props, so it is rendered and
//! tested without an `App`. Pieces are joined with ` | ` and dropped when
//! empty:
//!
//! ```text
//! Quasar (model) | ⠋ Operator: Running pw.x | Task 2/5 · Relax the cell | Running... | ↓ New
//! ```
//!
//! An armed gesture replaces the status message with its warning so the
//! "press again" hint is impossible to miss.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::core::state::TaskProgress;
use crate::tui::component::Component;
use crate::view::display_name;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Default)]
pub struct StatusBar {
    pub model_name: Option<String>,
    pub status_message: String,
    /// `(agent, status text)` of the agent currently working.
    pub active_agent: Option<(String, String)>,
    pub task_progress: TaskProgress,
    /// Armed gesture warning, shown in place of the status message.
    pub warning: Option<&'static str>,
    pub has_unseen_content: bool,
    pub busy: bool,
    pub spinner_frame: usize,
}

impl StatusBar {
    fn title(&self) -> String {
        match self.model_name.as_deref() {
            Some(model) if !model.is_empty() => format!("Quasar ({model})"),
            _ => String::from("Quasar"),
        }
    }

    fn agent_text(&self) -> Option<String> {
        let (agent, status) = self.active_agent.as_ref()?;
        let spinner = if self.busy {
            format!("{} ", SPINNER[self.spinner_frame % SPINNER.len()])
        } else {
            String::new()
        };
        Some(if status.is_empty() {
            format!("{spinner}{}", display_name(agent))
        } else {
            format!("{spinner}{}: {status}", display_name(agent))
        })
    }

    fn task_text(&self) -> Option<String> {
        let progress = &self.task_progress;
        if progress.total == 0 {
            return None;
        }
        let mut text = format!("Task {}/{}", progress.current, progress.total);
        if let Some(title) = progress.title.as_deref().filter(|t| !t.is_empty()) {
            text.push_str(" · ");
            text.push_str(title);
        }
        Some(text)
    }

    fn spans(&self) -> Vec<Span<'static>> {
        let separator = || Span::styled(" | ", Style::default().fg(Color::DarkGray));
        let mut spans = vec![Span::styled(
            self.title(),
            Style::default().add_modifier(Modifier::BOLD),
        )];
        let mut push = |span: Span<'static>| {
            spans.push(separator());
            spans.push(span);
        };

        if let Some(agent) = self.agent_text() {
            push(Span::styled(agent, Style::default().fg(Color::Cyan)));
        }
        if let Some(task) = self.task_text() {
            push(Span::styled(task, Style::default().fg(Color::Magenta)));
        }
        if let Some(warning) = self.warning {
            push(Span::styled(
                warning,
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ));
        } else if !self.status_message.is_empty() {
            push(Span::raw(self.status_message.clone()));
        }
        if self.has_unseen_content {
            push(Span::styled("↓ New", Style::default().fg(Color::Green)));
        }
        spans
    }

    /// Plain text of the bar.
    pub fn text(&self) -> String {
        self.spans().iter().map(|s| s.content.as_ref()).collect()
    }
}

impl Component for StatusBar {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(Line::from(self.spans()), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn rendered(bar: &mut StatusBar, width: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, 1)).unwrap();
        terminal.draw(|f| bar.render(f, f.area())).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_default_shows_title_only() {
        let bar = StatusBar::default();
        assert_eq!(bar.text(), "Quasar");
    }

    #[test]
    fn test_full_bar() {
        let bar = StatusBar {
            model_name: Some("gpt-4o".into()),
            status_message: "Running...".into(),
            active_agent: Some(("operator".into(), "Running pw.x".into())),
            task_progress: TaskProgress {
                current: 2,
                total: 5,
                title: Some("Relax the cell".into()),
            },
            busy: true,
            ..Default::default()
        };
        assert_eq!(
            bar.text(),
            "Quasar (gpt-4o) | ⠋ Operator: Running pw.x | Task 2/5 · Relax the cell | Running..."
        );
    }

    #[test]
    fn test_warning_replaces_status() {
        let mut bar = StatusBar {
            status_message: "Running...".into(),
            warning: Some("Press Esc again to interrupt the run"),
            has_unseen_content: true,
            ..Default::default()
        };
        let text = rendered(&mut bar, 100);
        assert!(text.contains("Press Esc again"));
        assert!(!text.contains("Running..."));
        assert!(text.contains("↓ New"));
    }

    #[test]
    fn test_spinner_advances() {
        let mut bar = StatusBar {
            active_agent: Some(("strategist".into(), String::new())),
            busy: true,
            spinner_frame: 1,
            ..Default::default()
        };
        assert_eq!(bar.text(), "Quasar | ⠙ Strategist");
        bar.busy = false;
        assert_eq!(bar.text(), "Quasar | Strategist");
    }
}
