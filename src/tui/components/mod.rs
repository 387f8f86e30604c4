//! # TUI Components
//!
//! ## Component Architecture
//!
//! Components follow two patterns:
//!
//! ### Stateless Components (Props-Based Rendering)
//!
//! Built every frame from `App` fields and rendered once:
//! - `StatusBar`: model, active agent, task progress, status or gesture warning
//! - `Splash`: start-up surface with retrieval-index progress
//!
//! ### Stateful Components (Event-Driven)
//!
//! Persistent state lives in `TuiState`; the component either owns it
//! (`PromptBox`) or borrows it for one frame (`Transcript`):
//! - `PromptBox`: multi-line prompt editor, or the pending yes/no question
//! - `Transcript`: scrollable item log with a per-item layout cache
//!
//! Props are passed explicitly; no component reads `App` on its own.
//!
//! ```text
//! components/
//! ├── mod.rs
//! ├── status_bar.rs
//! ├── splash.rs
//! ├── transcript.rs
//! └── prompt_box/     (editing motions, wrapping and cursor layout)
//! ```

pub mod prompt_box;
pub mod splash;
pub mod status_bar;
pub mod transcript;

pub use prompt_box::{PromptBox, PromptEvent};
pub use splash::Splash;
pub use status_bar::StatusBar;
pub use transcript::{Preview, Transcript, TranscriptState};
