//! # Worker Protocol
//!
//! Newline-delimited JSON over the worker's stdin/stdout.
//!
//! - [`message`]: the closed `Command` / `Inbound` unions and payload types
//! - [`codec`]: line reassembly and per-line decoding
//! - [`session`]: the subprocess itself, with restart counter and teardown

pub mod codec;
pub mod message;
pub mod session;

pub use message::{Command, Inbound};
pub use session::{SessionError, SessionEvent, SessionEventKind, WorkerSession, WorkerSpec};
