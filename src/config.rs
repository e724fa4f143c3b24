//! Runtime limits of the shell.

use crate::errors::{OshError, Result};

pub const DEFAULT_PROMPT: &str = "osh> ";
pub const DEFAULT_LINE_CAPACITY: usize = 80;
pub const DEFAULT_MAX_ARGS: usize = 10;
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;
pub const DEFAULT_JOB_CAPACITY: usize = 10;

/// Limits and prompt used by an [`Interpreter`](crate::Interpreter).
///
/// The defaults reproduce the classic `osh` behavior: 80-byte lines,
/// 10 arguments, 10 history entries and 10 job slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub prompt: String,
    /// Maximum number of bytes kept from one input line.
    pub line_capacity: usize,
    /// Maximum number of arguments, program name included.
    pub max_args: usize,
    pub history_capacity: usize,
    pub job_capacity: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            line_capacity: DEFAULT_LINE_CAPACITY,
            max_args: DEFAULT_MAX_ARGS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            job_capacity: DEFAULT_JOB_CAPACITY,
        }
    }
}

impl ShellConfig {
    /// Reject limits the shell cannot work with.
    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("line capacity", self.line_capacity),
            ("max args", self.max_args),
            ("history size", self.history_capacity),
            ("max jobs", self.job_capacity),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(OshError::Config(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }
}
