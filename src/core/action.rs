//! # Actions
//!
//! Everything the user can do becomes an `Action`.
//! User presses Enter? That's `Action::Submit(text)`.
//! User presses Esc twice during a run? That's two `Action::Escape`s.
//!
//! The `update()` function takes the current state and an action, mutates
//! the state, and returns an `Effect` describing the I/O the event loop must
//! perform. No side effects here. Worker messages take the same route
//! through `dispatch`.
//!
//! ```text
//! State + Action  →  update()  →  New State + Effect
//! ```

use std::time::Instant;

use log::{debug, info};

use super::gesture::GestureOutcome;
use super::item::{CommittedItem, ItemKind};
use super::state::{App, Mode};
use crate::protocol::message::Command;

pub const INTERRUPTED_TEXT: &str = "Run Interrupted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Submit(String),
    ConfirmResume,
    DeclineResume,
    ConfirmImprove,
    DeclineImprove,
    /// Drop the stored checkpoint without touching the transcript.
    ClearCheckpoint,
    Escape(Instant),
    ExitKey(Instant),
}

/// I/O requested by a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    Send(Command),
    /// Kill the worker and start a fresh one.
    RestartWorker,
    /// Leave the event loop with this exit code.
    Exit(i32),
}

pub fn update(app: &mut App, action: Action) -> Effect {
    debug!("Action: {:?}", action);
    match action {
        Action::Submit(text) => submit(app, text),
        Action::ConfirmResume => {
            if !matches!(app.mode, Mode::ConfirmResume { .. }) {
                return Effect::None;
            }
            let Mode::ConfirmResume {
                previous_input,
                task,
                total,
            } = std::mem::take(&mut app.mode)
            else {
                return Effect::None;
            };
            app.append(|_, batch| {
                batch.push(CommittedItem::new(ItemKind::ResumeBanner {
                    previous_input,
                    task,
                    total,
                }));
            });
            app.busy = true;
            app.status_message = String::from("Resuming from checkpoint...");
            Effect::Send(Command::resume())
        }
        Action::DeclineResume => {
            if !matches!(app.mode, Mode::ConfirmResume { .. }) {
                return Effect::None;
            }
            app.mode = Mode::Input;
            app.status_message = String::from("Starting fresh...");
            Effect::Send(Command::FreshStart)
        }
        Action::ConfirmImprove => {
            if !matches!(app.mode, Mode::ConfirmImprove { .. }) {
                return Effect::None;
            }
            app.mode = Mode::Input;
            app.improve_pending = true;
            app.status_message = String::from("Archiving previous run...");
            Effect::Send(Command::ArchiveAndContinue)
        }
        Action::DeclineImprove => {
            if !matches!(app.mode, Mode::ConfirmImprove { .. }) {
                return Effect::None;
            }
            app.mode = Mode::Input;
            app.status_message = String::from("Starting fresh...");
            Effect::Send(Command::FreshStart)
        }
        Action::ClearCheckpoint => {
            if app.busy {
                app.status_message = String::from("Cannot clear the checkpoint during a run");
                return Effect::None;
            }
            Effect::Send(Command::ClearCheckpoint)
        }
        Action::Escape(now) => match app.gesture.press_cancel(app.busy, now) {
            GestureOutcome::Interrupt => interrupt(app),
            outcome => {
                debug!("Escape: {:?}", outcome);
                Effect::None
            }
        },
        Action::ExitKey(now) => match app.gesture.press_exit(app.busy, now) {
            GestureOutcome::Exit => {
                info!("Exit confirmed");
                app.shutting_down = true;
                Effect::Exit(0)
            }
            GestureOutcome::Ignored(hint) => {
                app.status_message = hint.to_string();
                Effect::None
            }
            _ => Effect::None,
        },
    }
}

fn submit(app: &mut App, text: String) -> Effect {
    let text = text.trim();
    if text.is_empty() {
        return Effect::None;
    }
    if !app.accepts_prompt() {
        app.status_message = if app.busy {
            String::from("Run in progress")
        } else {
            String::from("Worker is not ready for a prompt")
        };
        return Effect::None;
    }
    info!("Submitting prompt ({} chars)", text.len());
    app.busy = true;
    app.plan_committed = false;
    app.last_code_result_error = false;
    app.status_message = String::from("Running...");
    Effect::Send(Command::prompt(text))
}

/// Stop the current run: one "Run Interrupted" entry, guard set, worker
/// restarted by the event loop.
pub fn interrupt(app: &mut App) -> Effect {
    let agent = app
        .agents
        .active()
        .map(|a| a.name.clone())
        .or_else(|| app.log.last().and_then(|i| i.agent.clone()));
    info!("Interrupting run (active agent: {:?})", agent);

    app.append(|_, batch| {
        batch.push(
            CommittedItem::log(INTERRUPTED_TEXT)
                .tagged(agent.as_deref())
                .error(true),
        );
    });
    app.interrupted = true;
    app.worker_ready = false;
    app.gesture.reset();
    app.end_run();
    app.status_message = String::from("Interrupted. Restarting worker...");
    Effect::RestartWorker
}
