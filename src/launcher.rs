//! Starting external programs.
//!
//! The launcher forks, `execvp`s the requested program in the child and, in
//! the parent, either registers the child as a background job or waits for it
//! through the reaper channel. It never calls `waitpid` itself.

use std::ffi::CString;
use std::io::{self, Write};

use nix::libc;
use nix::sys::signal::{self, SigHandler, SigSet, Signal};
use nix::unistd::{self, ForkResult, execvp, fork};
use tracing::{debug, error};

use crate::command::ExitCode;
use crate::errors::LaunchError;
use crate::jobs::{JobControl, JobState};
use crate::line::BoundedLine;
use crate::reaper::ChildState;
use crate::tokenizer::ParsedLine;

/// Exit status of a child whose program could not be executed.
///
/// Distinct from 0 so a missing program never looks like a successful run.
pub const EXEC_FAILURE_STATUS: i32 = 127;

/// Signals the shell ignores while children get the default behavior back.
const INTERACTIVE_SIGNALS: [Signal; 2] = [Signal::SIGINT, Signal::SIGTSTP];

/// Keep Ctrl-C and Ctrl-Z from stopping or killing the shell itself.
pub fn ignore_interactive_signals() -> nix::Result<()> {
    for sig in INTERACTIVE_SIGNALS {
        // SAFETY: SigIgn installs no handler code.
        unsafe { signal::signal(sig, SigHandler::SigIgn) }?;
    }
    Ok(())
}

/// Run `parsed` as a child process.
///
/// Background children are registered as `Running` and the call returns at
/// once with exit code 0. Foreground children are waited for; a child that
/// stops instead of exiting is registered as a `Stopped` job.
///
/// # Errors
/// [`LaunchError::Fork`] is fatal for the shell. Every other error leaves the
/// shell usable.
pub fn launch(
    parsed: &ParsedLine,
    command_line: &BoundedLine,
    jobs: &mut JobControl,
    stdout: &mut dyn Write,
) -> Result<ExitCode, LaunchError> {
    let argv = to_c_args(&parsed.argv)?;
    let failure_prefix = format!("osh: {}: ", parsed.program());

    // Anything still buffered would otherwise be written twice.
    stdout.flush()?;
    io::stderr().flush()?;

    // SAFETY: the child only touches signal state, execs, and on failure
    // writes to fd 2 and `_exit`s.
    match unsafe { fork() } {
        Err(errno) => {
            error!(%errno, program = parsed.program(), "fork failed");
            Err(LaunchError::Fork(errno))
        }
        Ok(ForkResult::Child) => exec_child(&argv, failure_prefix.as_bytes()),
        Ok(ForkResult::Parent { child }) => {
            debug!(pid = %child, program = parsed.program(), background = parsed.background, "spawned child");

            if parsed.background {
                let number = jobs.register(child, command_line.clone(), JobState::Running)?;
                writeln!(stdout, "[{}] {}", number, child)?;
                return Ok(0);
            }

            let state = jobs.wait_for(child)?;
            match state {
                ChildState::Stopped(sig) => {
                    let number = jobs.register(child, command_line.clone(), JobState::Stopped)?;
                    writeln!(stdout)?;
                    writeln!(stdout, "[{}]+ Stopped  {}", number, command_line)?;
                    Ok(128 + sig as i32)
                }
                other => {
                    let code = other.exit_code().unwrap_or(0);
                    debug!(pid = %child, code, "foreground child finished");
                    Ok(code)
                }
            }
        }
    }
}

fn to_c_args(argv: &[String]) -> Result<Vec<CString>, LaunchError> {
    argv.iter()
        .map(|arg| {
            CString::new(arg.as_bytes()).map_err(|_| LaunchError::InvalidArgument(arg.clone()))
        })
        .collect()
}

fn exec_child(argv: &[CString], failure_prefix: &[u8]) -> ! {
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGCHLD);
    let _ = mask.thread_unblock();
    for sig in INTERACTIVE_SIGNALS {
        // SAFETY: restores the default disposition, no handler code involved.
        let _ = unsafe { signal::signal(sig, SigHandler::SigDfl) };
    }

    let errno = match execvp(&argv[0], argv) {
        Ok(never) => match never {},
        Err(errno) => errno,
    };

    let stderr = io::stderr();
    let _ = unistd::write(&stderr, failure_prefix);
    let _ = unistd::write(&stderr, errno.desc().as_bytes());
    let _ = unistd::write(&stderr, b"\n");
    // SAFETY: `_exit` skips atexit handlers and stdio buffers owned by the parent.
    unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
}
