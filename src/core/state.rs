//! # Application State
//!
//! Session state for Quasar. This module contains domain logic only -
//! no TUI-specific types. Presentation state lives in the `tui` module.
//!
//! ```text
//! App
//! ├── log: ItemLog                   // committed transcript
//! ├── agents: AgentRegistry          // live agent records
//! ├── plan / plan_preview            // parsed plan, streaming preview
//! ├── stream_preview                 // agent reply still streaming
//! ├── task_progress: TaskProgress    // step currently executing
//! ├── rag: Option<RagStatusInfo>     // retrieval-index start-up
//! ├── interrupted: bool              // stale-message guard
//! ├── last_code_result_error: bool   // consumed by the next "Executed" step
//! ├── mode: Mode                     // what the input area is asking for
//! ├── surface: Surface               // splash until start-up settles
//! └── gesture: GestureState          // armed cancel / exit
//! ```
//!
//! State changes only happen through `dispatch` (worker messages) and
//! `update` (user actions). Neither performs I/O; both hand back an
//! `Effect` for the event loop to carry out.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::agents::AgentRegistry;
use super::config::ResolvedConfig;
use super::gesture::GestureState;
use super::item::{Batch, ItemLog};
use crate::protocol::message::RagStatusInfo;

/// Delay between start-up finishing and the main surface replacing the splash.
pub const MAIN_SURFACE_DELAY: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskProgress {
    pub current: u32,
    pub total: u32,
    pub title: Option<String>,
}

/// What the input area is currently for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Input,
    /// A checkpoint exists: resume it or start fresh.
    ConfirmResume {
        previous_input: String,
        task: u32,
        total: u32,
    },
    /// A finished run exists: continue improving it or start fresh.
    ConfirmImprove { previous_input: String },
    /// Nothing more can happen in this session.
    Fatal(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Surface {
    #[default]
    Splash,
    Main,
}

/// An agent's reply while it is still streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPreview {
    pub agent: String,
    pub text: String,
    /// Reasoning text rather than the reply itself.
    pub thinking: bool,
}

pub struct App {
    pub log: ItemLog,
    pub agents: AgentRegistry,
    pub plan: Vec<String>,
    pub plan_preview: Option<String>,
    pub stream_preview: Option<StreamPreview>,
    /// A plan box has been committed during the current run.
    pub plan_committed: bool,
    pub task_progress: TaskProgress,
    pub rag: Option<RagStatusInfo>,
    pub worker_ready: bool,
    pub system_ready: bool,
    pub busy: bool,
    /// Stale-message guard. Set by an interrupt, cleared by the next `ready`.
    pub interrupted: bool,
    pub last_code_result_error: bool,
    pub status_message: String,
    pub model_name: Option<String>,
    pub mode: Mode,
    pub surface: Surface,
    pub main_surface_at: Option<Instant>,
    pub gesture: GestureState,
    /// Set in headless mode: the one prompt to run.
    pub single_prompt: Option<String>,
    /// Prompt to send once a fresh start completes.
    pub pending_prompt: Option<String>,
    /// `archive_and_continue` was requested to improve a finished run.
    pub improve_pending: bool,
    pub exit_on_completion: bool,
    pub auto_restart: bool,
    pub workspace_root: PathBuf,
    /// The user asked to quit; a worker exit is expected.
    pub shutting_down: bool,
    /// Why the session ended before the main surface was shown. Printed to
    /// stderr once the terminal is restored.
    pub exit_reason: Option<String>,
}

impl App {
    pub fn new(config: &ResolvedConfig) -> Self {
        Self {
            log: ItemLog::new(),
            agents: AgentRegistry::new(),
            plan: Vec::new(),
            plan_preview: None,
            stream_preview: None,
            plan_committed: false,
            task_progress: TaskProgress::default(),
            rag: None,
            worker_ready: false,
            system_ready: false,
            busy: false,
            interrupted: false,
            last_code_result_error: false,
            status_message: String::from("Starting worker..."),
            model_name: None,
            mode: Mode::Input,
            surface: Surface::Splash,
            main_surface_at: None,
            gesture: GestureState::default(),
            single_prompt: None,
            pending_prompt: None,
            improve_pending: false,
            exit_on_completion: config.exit_on_completion,
            auto_restart: config.auto_restart,
            workspace_root: config.worker.workspace_root.clone(),
            shutting_down: false,
            exit_reason: None,
        }
    }

    /// Headless variant: runs `prompt` and exits when the worker is done.
    pub fn single_prompt(config: &ResolvedConfig, prompt: impl Into<String>) -> Self {
        Self {
            single_prompt: Some(prompt.into()),
            ..Self::new(config)
        }
    }

    /// Task number to tag worker and reviewer headers with.
    pub fn active_task(&self) -> Option<u32> {
        (self.task_progress.current > 0).then_some(self.task_progress.current)
    }

    /// Whether the input box accepts a new prompt.
    pub fn accepts_prompt(&self) -> bool {
        self.system_ready && !self.busy && self.mode == Mode::Input
    }

    /// Stage items against the current log and commit them in one step.
    /// Returns the number of items appended.
    pub fn append(&mut self, build: impl FnOnce(&App, &mut Batch<'_>)) -> usize {
        let staged = {
            let mut batch = self.log.batch();
            build(self, &mut batch);
            batch.finish()
        };
        self.log.commit(staged)
    }

    /// Show the main surface at `now + MAIN_SURFACE_DELAY`, unless already
    /// shown or scheduled.
    pub fn schedule_main_surface(&mut self, now: Instant) {
        if self.surface == Surface::Splash && self.main_surface_at.is_none() {
            self.main_surface_at = Some(now + MAIN_SURFACE_DELAY);
        }
    }

    /// Advance timers. Returns true if anything visible changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = self.gesture.tick(now);
        if let Some(at) = self.main_surface_at
            && now >= at
        {
            self.surface = Surface::Main;
            self.main_surface_at = None;
            changed = true;
        }
        changed
    }

    /// Drop everything tied to the current run, including the transcript.
    pub fn reset_run(&mut self) {
        self.log.replace(Vec::new());
        self.reset_progress();
    }

    /// Drop plan, progress and agents but keep the transcript.
    pub fn reset_progress(&mut self) {
        self.agents.clear();
        self.plan.clear();
        self.plan_preview = None;
        self.stream_preview = None;
        self.plan_committed = false;
        self.task_progress = TaskProgress::default();
        self.last_code_result_error = false;
    }

    /// Transient state of a run that just stopped. The transcript is kept.
    pub fn end_run(&mut self) {
        self.busy = false;
        self.plan_preview = None;
        self.stream_preview = None;
        self.agents.complete_all();
    }
}
