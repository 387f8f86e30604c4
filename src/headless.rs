//! # Headless Mode
//!
//! Runs one prompt without the TUI. The worker is driven by the same
//! `dispatch` reducer; new transcript items are printed to stdout as plain
//! text and the process exit code comes from the reducer's `Effect::Exit`.

use std::io::Write;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::core::action::Effect;
use crate::core::config::ResolvedConfig;
use crate::core::dispatch::handle_session_event;
use crate::core::state::App;
use crate::protocol::{SessionEvent, WorkerSession};
use crate::view;

const FALLBACK_WIDTH: usize = 100;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn output_width() -> usize {
    crossterm::terminal::size()
        .map(|(cols, _)| cols as usize)
        .unwrap_or(FALLBACK_WIDTH)
}

/// Prints items committed since `printed` and returns the new count.
fn print_new_items(app: &App, printed: usize, out: &mut impl Write) -> std::io::Result<usize> {
    let items = app.log.items();
    // The log shrinks only when a fresh start wipes it.
    let start = if printed > items.len() { 0 } else { printed };
    let width = output_width();
    for item in &items[start..] {
        for line in view::item_lines(item, width) {
            writeln!(out, "{}", line.text().trim_end())?;
        }
    }
    out.flush()?;
    Ok(items.len())
}

/// Run `prompt` to completion and return the process exit code.
///
/// Must be called from inside a tokio runtime.
pub fn run(config: &ResolvedConfig, prompt: String) -> std::io::Result<i32> {
    let (tx, rx) = mpsc::channel::<SessionEvent>();
    let mut session = WorkerSession::new(config.worker.clone(), tx);
    if let Err(e) = session.spawn(false) {
        eprintln!("quasar: {e}");
        return Ok(1);
    }
    info!("Headless run started");

    let mut app = App::single_prompt(config, prompt);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut printed = 0;

    loop {
        let event = match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => Some(event),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                warn!("Session channel closed");
                return Ok(1);
            }
        };

        let now = Instant::now();
        app.tick(now);
        let Some(event) = event else { continue };

        let effect = handle_session_event(&mut app, event, session.generation(), now);
        printed = print_new_items(&app, printed, &mut out)?;

        match effect {
            Effect::None => {}
            Effect::Send(command) => {
                if let Err(e) = session.send(&command) {
                    warn!("Failed to send {:?}: {}", command, e);
                }
            }
            Effect::RestartWorker => {
                if let Err(e) = session.restart() {
                    eprintln!("quasar: {e}");
                    return Ok(1);
                }
            }
            Effect::Exit(code) => {
                info!("Headless run finished with exit code {code}");
                app.shutting_down = true;
                session.shutdown();
                return Ok(code);
            }
        }
    }
}
