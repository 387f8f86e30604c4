use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};

/// TUI-specific input events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TuiEvent {
    // Gesture keys (passed to core::update)
    Escape,
    ExitKey,
    ClearCheckpoint,
    Submit,

    // Editing (handled by the prompt box)
    InputChar(char),
    Paste(String), // Bracketed paste - preserves newlines
    Backspace,
    Delete,
    CursorLeft,
    CursorRight,
    WordLeft,
    WordRight,
    CursorHome,
    CursorEnd,

    // Transcript scrolling
    ScrollUp,
    ScrollDown,
    ScrollPageUp,
    ScrollPageDown,
    ScrollToBottom, // End key with Ctrl - also re-enables stick-to-bottom

    Resize,
}

/// Poll for an event without blocking (returns immediately)
pub fn poll_event_immediate() -> Option<TuiEvent> {
    poll_event_timeout(Duration::ZERO)
}

/// Poll for an event, blocking up to `timeout`. Terminal read errors count
/// as "no event".
pub fn poll_event_timeout(timeout: Duration) -> Option<TuiEvent> {
    if !event::poll(timeout).ok()? {
        return None;
    }
    translate(event::read().ok()?)
}

fn translate_key(key: KeyEvent) -> Option<TuiEvent> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    log::trace!("Key event: {:?} with modifiers {:?}", key.code, key.modifiers);
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('d') if ctrl => Some(TuiEvent::ExitKey),
        KeyCode::Char('x') if ctrl => Some(TuiEvent::ClearCheckpoint),
        // Ctrl+J inserts newline (ASCII LF; Ctrl+Enter sends this in most terminals)
        KeyCode::Char('j') if ctrl => Some(TuiEvent::InputChar('\n')),
        KeyCode::Char(_) if ctrl => None,
        KeyCode::Char(c) => Some(TuiEvent::InputChar(c)),
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {
            Some(TuiEvent::InputChar('\n'))
        }
        KeyCode::Enter => Some(TuiEvent::Submit),
        KeyCode::Esc => Some(TuiEvent::Escape),
        KeyCode::Backspace => Some(TuiEvent::Backspace),
        KeyCode::Delete => Some(TuiEvent::Delete),
        KeyCode::Left if ctrl => Some(TuiEvent::WordLeft),
        KeyCode::Right if ctrl => Some(TuiEvent::WordRight),
        KeyCode::Left => Some(TuiEvent::CursorLeft),
        KeyCode::Right => Some(TuiEvent::CursorRight),
        KeyCode::Home => Some(TuiEvent::CursorHome),
        KeyCode::End if ctrl => Some(TuiEvent::ScrollToBottom),
        KeyCode::End => Some(TuiEvent::CursorEnd),
        KeyCode::Up => Some(TuiEvent::ScrollUp),
        KeyCode::Down => Some(TuiEvent::ScrollDown),
        KeyCode::PageUp => Some(TuiEvent::ScrollPageUp),
        KeyCode::PageDown => Some(TuiEvent::ScrollPageDown),
        _ => None,
    }
}

pub fn translate(event: Event) -> Option<TuiEvent> {
    match event {
        Event::Key(key) => translate_key(key),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => Some(TuiEvent::ScrollUp),
            MouseEventKind::ScrollDown => Some(TuiEvent::ScrollDown),
            _ => None,
        },
        Event::Paste(data) => Some(TuiEvent::Paste(data)),
        Event::Resize(_, _) => Some(TuiEvent::Resize),
        _ => None,
    }
}
