//! `osh`, a small interactive shell with job control.
//!
//! The shell reads a line, records it in a bounded history, splits it on
//! whitespace and either runs a built-in in-process or launches an external
//! program. Programs started with a trailing `&`, and foreground programs that
//! get stopped, are tracked in a bounded job table and can be resumed with
//! `fg` and `bg`.
//!
//! Child termination is observed by a dedicated reaper thread that forwards
//! state changes over a channel; the job table itself is only ever touched by
//! the thread running the [`Interpreter`].

mod builtin;
pub mod command;
pub mod config;
pub mod errors;
pub mod history;
mod interpreter;
pub mod jobs;
pub mod launcher;
pub mod line;
pub mod logging;
pub mod reaper;
pub mod session;
pub mod tokenizer;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, default_commands};

pub use config::ShellConfig;
