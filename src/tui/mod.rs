//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI,
//! and translates keyboard events into `core::Action` values.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Event Loop
//!
//! One loop on the main thread: draw, poll the terminal, drain every pending
//! key event, drain every pending worker event, tick the timers. Worker I/O
//! runs on tokio tasks and only reaches this loop through the session
//! channel, so all state changes happen here, in order.
//!
//! ## Redraw Strategy
//!
//! - **Animating** (splash, run in progress): draws every ~80ms for the spinner.
//! - **Idle**: polls every 200ms and only redraws on events or timer changes.

mod component;
pub mod components;
mod event;
mod highlight;
mod ui;

use std::io::stdout;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use log::{debug, info, warn};

use crate::core::action::{Action, Effect, update};
use crate::core::config::ResolvedConfig;
use crate::core::dispatch::handle_session_event;
use crate::core::state::{App, Mode, Surface};
use crate::protocol::{Command, SessionEvent, WorkerSession};
use crate::tui::component::EventHandler;
use crate::tui::components::{PromptBox, PromptEvent, TranscriptState};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

const ANIMATION_TICK: Duration = Duration::from_millis(80);
const IDLE_TICK: Duration = Duration::from_millis(200);

/// TUI-specific presentation state (not part of core session logic)
pub struct TuiState {
    pub transcript: TranscriptState,
    pub prompt: PromptBox,
}

impl Default for TuiState {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            transcript: TranscriptState::new(),
            prompt: PromptBox::new(),
        }
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        // Kitty keyboard protocol lets Shift+Enter through; terminals without
        // it ignore the request.
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBlock, // blinking resets on every draw
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )?;
        info!("Terminal modes enabled (mouse, bracketed paste, keyboard enhancement)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            PopKeyboardEnhancementFlags,
            DisableMouseCapture,
            DisableBracketedPaste,
            Hide
        );
    }
}

/// Keys answering a pending yes/no question.
fn confirmation(mode: &Mode, event: &TuiEvent) -> Option<Action> {
    let yes = matches!(event, TuiEvent::Submit | TuiEvent::InputChar('y' | 'Y'));
    let no = matches!(event, TuiEvent::InputChar('n' | 'N'));
    match mode {
        Mode::ConfirmResume { .. } if yes => Some(Action::ConfirmResume),
        Mode::ConfirmResume { .. } if no => Some(Action::DeclineResume),
        Mode::ConfirmImprove { .. } if yes => Some(Action::ConfirmImprove),
        Mode::ConfirmImprove { .. } if no => Some(Action::DeclineImprove),
        _ => None,
    }
}

/// Route one terminal event to the transcript, the prompt box, or `update`.
fn handle_event(app: &mut App, tui: &mut TuiState, event: TuiEvent, now: Instant) -> Effect {
    match event {
        TuiEvent::Resize => Effect::None,
        TuiEvent::Escape => update(app, Action::Escape(now)),
        TuiEvent::ExitKey => update(app, Action::ExitKey(now)),
        TuiEvent::ClearCheckpoint => update(app, Action::ClearCheckpoint),
        TuiEvent::ScrollUp
        | TuiEvent::ScrollDown
        | TuiEvent::ScrollPageUp
        | TuiEvent::ScrollPageDown
        | TuiEvent::ScrollToBottom => {
            tui.transcript.handle_event(&event);
            Effect::None
        }
        _ if app.surface == Surface::Splash => Effect::None,
        _ => match &app.mode {
            Mode::Input => {
                // Keep the draft when the prompt would be refused.
                if event == TuiEvent::Submit && !app.accepts_prompt() {
                    return update(app, Action::Submit(tui.prompt.buffer.clone()));
                }
                match tui.prompt.handle_event(&event) {
                    Some(PromptEvent::Submit(text)) => {
                        tui.transcript.stick_to_bottom = true;
                        update(app, Action::Submit(text))
                    }
                    _ => Effect::None,
                }
            }
            mode => match confirmation(mode, &event) {
                Some(action) => update(app, action),
                None => Effect::None,
            },
        },
    }
}

/// Carry out an effect. Returns the exit code when the loop should stop.
fn apply_effect(session: &mut WorkerSession, app: &mut App, effect: Effect) -> Option<i32> {
    match effect {
        Effect::None => None,
        Effect::Send(command) => {
            if let Err(e) = session.send(&command) {
                warn!("Failed to send {:?}: {}", command, e);
                app.status_message = format!("Worker unreachable: {e}");
            }
            None
        }
        Effect::RestartWorker => {
            if let Err(e) = session.send(&Command::Interrupt) {
                debug!("Interrupt not delivered: {e}");
            }
            if let Err(e) = session.restart() {
                warn!("Worker restart failed: {e}");
                app.mode = Mode::Fatal(format!("Worker restart failed: {e}"));
            }
            None
        }
        Effect::Exit(code) => {
            app.shutting_down = true;
            Some(code)
        }
    }
}

/// Run the dashboard until the user exits. Returns the process exit code.
///
/// Must be called from inside a tokio runtime.
pub fn run(config: &ResolvedConfig) -> std::io::Result<i32> {
    let (tx, rx) = mpsc::channel::<SessionEvent>();
    let mut session = WorkerSession::new(config.worker.clone(), tx);
    if let Err(e) = session.spawn(false) {
        eprintln!("quasar: {e}");
        return Ok(1);
    }

    let mut app = App::new(config);
    let mut tui = TuiState::new();

    let mut terminal = ratatui::init();
    let terminal_mode_guard = TerminalModeGuard::new();
    if let Err(e) = &terminal_mode_guard {
        warn!("Terminal modes unavailable: {e}");
    }

    let start_time = Instant::now();
    let mut needs_redraw = true;

    let exit_code = loop {
        let animating = app.busy || app.surface == Surface::Splash;
        if needs_redraw || animating {
            let spinner_frame = (start_time.elapsed().as_millis() / ANIMATION_TICK.as_millis()) as usize;
            terminal.draw(|f| ui::draw_ui(f, &app, &mut tui, spinner_frame))?;
            needs_redraw = false;
        }

        let timeout = if animating { ANIMATION_TICK } else { IDLE_TICK };
        let first_event = poll_event_timeout(timeout);

        // Terminal events first, then everything the worker sent meanwhile.
        let mut outcome = None;
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            needs_redraw = true;
            let effect = handle_event(&mut app, &mut tui, event, Instant::now());
            outcome = apply_effect(&mut session, &mut app, effect);
            if outcome.is_some() {
                break;
            }
        }
        while outcome.is_none()
            && let Ok(event) = rx.try_recv()
        {
            needs_redraw = true;
            let effect = handle_session_event(&mut app, event, session.generation(), Instant::now());
            outcome = apply_effect(&mut session, &mut app, effect);
        }

        if app.tick(Instant::now()) {
            needs_redraw = true;
        }
        if let Some(code) = outcome {
            break code;
        }
    };

    info!("Leaving event loop (exit code {exit_code})");
    session.shutdown();
    drop(terminal_mode_guard);
    ratatui::restore();
    if let Some(reason) = &app.exit_reason {
        eprintln!("quasar: {reason}");
    }
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::ItemKind;
    use crate::test_support::test_app;

    fn main_app() -> App {
        let mut app = test_app();
        app.surface = Surface::Main;
        app.system_ready = true;
        app
    }

    fn type_text(app: &mut App, tui: &mut TuiState, text: &str) {
        for c in text.chars() {
            handle_event(app, tui, TuiEvent::InputChar(c), Instant::now());
        }
    }

    #[test]
    fn test_typed_prompt_is_submitted() {
        let mut app = main_app();
        let mut tui = TuiState::new();
        type_text(&mut app, &mut tui, "Relax Si");
        let effect = handle_event(&mut app, &mut tui, TuiEvent::Submit, Instant::now());
        assert_eq!(effect, Effect::Send(Command::prompt("Relax Si")));
        assert!(tui.prompt.buffer.is_empty());
        assert!(app.busy);
    }

    #[test]
    fn test_refused_submit_keeps_draft() {
        let mut app = main_app();
        app.busy = true;
        let mut tui = TuiState::new();
        type_text(&mut app, &mut tui, "next");
        let effect = handle_event(&mut app, &mut tui, TuiEvent::Submit, Instant::now());
        assert_eq!(effect, Effect::None);
        assert_eq!(tui.prompt.buffer, "next");
        assert_eq!(app.status_message, "Run in progress");
    }

    #[test]
    fn test_keys_ignored_on_splash() {
        let mut app = test_app();
        let mut tui = TuiState::new();
        type_text(&mut app, &mut tui, "early");
        assert!(tui.prompt.buffer.is_empty());
    }

    #[test]
    fn test_confirmation_keys() {
        let mut app = main_app();
        let mut tui = TuiState::new();
        app.mode = Mode::ConfirmResume {
            previous_input: String::new(),
            task: 2,
            total: 3,
        };
        // Unrelated keys neither answer nor reach the prompt box.
        let effect = handle_event(&mut app, &mut tui, TuiEvent::InputChar('x'), Instant::now());
        assert_eq!(effect, Effect::None);
        assert!(tui.prompt.buffer.is_empty());

        let effect = handle_event(&mut app, &mut tui, TuiEvent::InputChar('y'), Instant::now());
        assert_eq!(effect, Effect::Send(Command::resume()));
        assert!(matches!(
            app.log.last().map(|i| &i.kind),
            Some(ItemKind::ResumeBanner { .. })
        ));

        app.mode = Mode::ConfirmImprove {
            previous_input: String::new(),
        };
        let effect = handle_event(&mut app, &mut tui, TuiEvent::InputChar('n'), Instant::now());
        assert_eq!(effect, Effect::Send(Command::FreshStart));
    }

    #[test]
    fn test_double_escape_requests_restart() {
        let mut app = main_app();
        app.busy = true;
        let mut tui = TuiState::new();
        let now = Instant::now();
        assert_eq!(handle_event(&mut app, &mut tui, TuiEvent::Escape, now), Effect::None);
        assert_eq!(
            handle_event(&mut app, &mut tui, TuiEvent::Escape, now + Duration::from_millis(500)),
            Effect::RestartWorker
        );
    }

    #[test]
    fn test_scroll_works_on_any_surface() {
        let mut app = test_app();
        let mut tui = TuiState::new();
        handle_event(&mut app, &mut tui, TuiEvent::ScrollUp, Instant::now());
        assert!(!tui.transcript.stick_to_bottom);
    }
}
