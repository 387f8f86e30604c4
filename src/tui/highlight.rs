//! Syntax highlighting for code panels.
//!
//! Wraps `syntect`: the syntax is picked from the file extension in the panel
//! title, and each code row is fed through one stateful highlighter so
//! multi-line constructs (strings, comments) keep their colors.

use std::path::Path;
use std::sync::LazyLock;

use ratatui::style::{Color, Style};
use ratatui::text::Span;
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const THEME: &str = "base16-ocean.dark";

pub struct CodeHighlighter {
    inner: Option<HighlightLines<'static>>,
    fallback: Style,
}

impl CodeHighlighter {
    /// Highlighter for `file_name`, or a plain one if the extension is unknown.
    pub fn for_file(file_name: &str, fallback: Style) -> Self {
        let syntax = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| SYNTAX_SET.find_syntax_by_extension(ext));
        let inner = syntax
            .zip(THEME_SET.themes.get(THEME))
            .map(|(syntax, theme)| HighlightLines::new(syntax, theme));
        Self { inner, fallback }
    }

    pub fn is_plain(&self) -> bool {
        self.inner.is_none()
    }

    /// Styled spans for one line of code.
    pub fn spans(&mut self, line: &str) -> Vec<Span<'static>> {
        let Some(highlighter) = self.inner.as_mut() else {
            return vec![Span::styled(line.to_string(), self.fallback)];
        };
        let with_newline = format!("{line}\n");
        match highlighter.highlight_line(&with_newline, &SYNTAX_SET) {
            Ok(ranges) => ranges
                .into_iter()
                .filter_map(|(style, fragment)| {
                    let content = fragment.trim_end_matches('\n');
                    if content.is_empty() {
                        return None;
                    }
                    let fg = Color::Rgb(style.foreground.r, style.foreground.g, style.foreground.b);
                    Some(Span::styled(content.to_string(), Style::default().fg(fg)))
                })
                .collect(),
            Err(e) => {
                log::debug!("Highlighting failed: {e}");
                vec![Span::styled(line.to_string(), self.fallback)]
            }
        }
    }
}
