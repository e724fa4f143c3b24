//! Error types shared across the shell.
//!
//! Each concern has its own small enum so callers can match on the cases
//! they recover from. [`OshError`] carries what escapes the dispatch loop:
//! bad configuration, fatal launch failures, terminal I/O and built-in
//! failures that could not even be reported.

use nix::errno::Errno;
use nix::unistd::Pid;
use thiserror::Error;

/// Failures while splitting an input line into arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("too many arguments ({found}, at most {max} allowed)")]
    TooManyArguments { found: usize, max: usize },
}

/// Failures of job-table and job-control operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Job list full, cannot add more jobs")]
    TableFull,

    #[error("Invalid job number: {0}")]
    InvalidJobNumber(usize),

    #[error("Failed to continue job {pid}: {errno}")]
    Signal { pid: Pid, errno: Errno },

    #[error("child state notifications are no longer available")]
    ReaperGone,
}

/// Failures of the process launcher.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The OS refused to create a child. Treated as fatal by the dispatch loop.
    #[error("Fork failed: {0}")]
    Fork(Errno),

    #[error("argument contains an interior NUL byte: {0:?}")]
    InvalidArgument(String),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LaunchError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, LaunchError::Fork(_))
    }
}

#[derive(Error, Debug)]
pub enum OshError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, OshError>;
