use crate::session::Session;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Processes killed by a signal report `128 + signal`, as POSIX shells do.
pub type ExitCode = i32;

/// Object-safe trait for any command the dispatch loop can run in-process.
///
/// This is implemented by built-ins via a blanket impl.
pub trait ExecutableCommand {
    /// Executes the command.
    ///
    /// Regular output goes to `stdout`; failures the command recovers from are
    /// reported on `stderr` and turned into a non-zero exit code.
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`; the dispatch
/// loop then hands the line to the process launcher.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}
