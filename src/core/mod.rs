//! # Core Session Logic
//!
//! This module contains Quasar's session logic.
//! It knows nothing about any specific UI technology.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • State (App)          │
//!                    │  • dispatch() (worker)  │
//!                    │  • update() (user)      │
//!                    │                         │
//!                    │  No I/O. No UI. Pure.   │
//!                    └───────────┬─────────────┘
//!                                │ Effect
//!                  ┌─────────────┴─────────────┐
//!                  ▼                           ▼
//!           ┌────────────┐              ┌────────────┐
//!           │    TUI     │              │  Headless  │
//!           │  Adapter   │              │  (stdout)  │
//!           │ (ratatui)  │              │            │
//!           └────────────┘              └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`state`]: The `App` struct, all session state in one place
//! - [`dispatch`]: worker messages → state, with the stale-message guard
//! - [`action`]: user actions → state, returning an `Effect`
//! - [`item`]: the append-only transcript and its batches
//! - [`header`]: per-agent header state machine
//! - [`checkpoint`]: transcript reconstruction from a checkpoint
//! - [`agents`], [`gesture`], [`config`]

pub mod action;
pub mod agents;
pub mod checkpoint;
pub mod config;
pub mod dispatch;
pub mod gesture;
pub mod header;
pub mod item;
pub mod state;

pub use action::{Action, Effect, update};
pub use dispatch::{dispatch, handle_session_event};
pub use state::App;
