use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::interpreter::Factory;
use crate::reaper::ChildState;
use crate::session::Session;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use nix::sys::signal::{self, Signal};
use nix::sys::{sysinfo, utsname};
use nix::unistd::Pid;
use std::env;
use std::fs;
use std::io::Write;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "jobs" or "cd".
    fn name() -> &'static str;

    /// Executes the command against the session state.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, stdout, session) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stderr, "{:#}", e)?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        _session: &mut Session,
    ) -> Result<ExitCode> {
        if self.is_error {
            writeln!(stderr, "{}", self.output.trim_end())?;
            Ok(1)
        } else {
            writeln!(stdout, "{}", self.output.trim_end())?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Leave the shell.
pub struct Exit {
    #[argh(positional)]
    /// status the shell exits with, 0 when omitted
    pub status: Option<i32>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        let status = self.status.unwrap_or(0);
        session.should_exit = true;
        session.exit_status = status;
        Ok(status)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: String,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        env::set_current_dir(&self.target)
            .with_context(|| format!("cd failed: {}", self.target))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show the most recent input lines, oldest first.
pub struct History {}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        session.history.show(stdout)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List jobs that have not finished yet.
pub struct Jobs {}

impl BuiltinCommand for Jobs {
    fn name() -> &'static str {
        "jobs"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        session.jobs.sync();
        session.jobs.table().list(stdout)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Resume a job and wait for it in the foreground.
pub struct Fg {
    #[argh(positional)]
    /// job number as shown by `jobs`.
    pub job: usize,
}

impl BuiltinCommand for Fg {
    fn name() -> &'static str {
        "fg"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        let state = session.jobs.bring_to_foreground(self.job, stdout)?;
        Ok(match state {
            ChildState::Stopped(signal) => 128 + signal as i32,
            other => other.exit_code().unwrap_or(0),
        })
    }
}

#[derive(FromArgs)]
/// Resume a stopped job without waiting for it.
pub struct Bg {
    #[argh(positional)]
    /// job number as shown by `jobs`.
    pub job: usize,
}

impl BuiltinCommand for Bg {
    fn name() -> &'static str {
        "bg"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        session.jobs.continue_in_background(self.job, stdout)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List the entries of the current directory.
pub struct MyLs {}

impl BuiltinCommand for MyLs {
    fn name() -> &'static str {
        "my_ls"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        let entries =
            fs::read_dir(".").context("Could not open current directory")?;
        writeln!(stdout, ".")?;
        writeln!(stdout, "..")?;
        for entry in entries {
            let entry = entry.context("Could not read directory entry")?;
            writeln!(stdout, "{}", entry.file_name().to_string_lossy())?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Create an empty file, truncating it if it exists.
pub struct MyCreate {
    #[argh(positional)]
    /// name of the file to create.
    pub file: String,
}

impl BuiltinCommand for MyCreate {
    fn name() -> &'static str {
        "my_create"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        fs::File::create(&self.file)
            .with_context(|| format!("File creation failed: {}", self.file))?;
        writeln!(stdout, "File created: {}", self.file)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Delete a file.
pub struct MyDelete {
    #[argh(positional)]
    /// name of the file to delete.
    pub file: String,
}

impl BuiltinCommand for MyDelete {
    fn name() -> &'static str {
        "my_delete"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        fs::remove_file(&self.file)
            .with_context(|| format!("File deletion failed: {}", self.file))?;
        writeln!(stdout, "Deleted file: {}", self.file)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List every process of the system.
pub struct MyPs {}

impl BuiltinCommand for MyPs {
    fn name() -> &'static str {
        "my_ps"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        // Read /proc directly: a `ps` child would be reaped by the shell's
        // reaper before anyone could wait for it.
        let mut processes: Vec<(i32, String)> = Vec::new();
        for entry in fs::read_dir("/proc").context("Could not read /proc")? {
            let Ok(entry) = entry else { continue };
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse().ok()) else {
                continue;
            };
            // The process may exit between listing and reading.
            let Ok(comm) = fs::read_to_string(entry.path().join("comm")) else {
                continue;
            };
            processes.push((pid, comm.trim_end().to_string()));
        }
        processes.sort_unstable_by_key(|(pid, _)| *pid);

        writeln!(stdout, "{:>7} CMD", "PID")?;
        for (pid, comm) in processes {
            writeln!(stdout, "{:>7} {}", pid, comm)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Kill a process with SIGKILL.
pub struct MyKill {
    #[argh(positional)]
    /// id of the process to kill.
    pub pid: i32,
}

impl BuiltinCommand for MyKill {
    fn name() -> &'static str {
        "my_kill"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        if self.pid <= 0 {
            return Err(anyhow::anyhow!("my_kill: invalid process id {}", self.pid));
        }
        signal::kill(Pid::from_raw(self.pid), Signal::SIGKILL)
            .with_context(|| format!("Failed to kill process {}", self.pid))?;
        writeln!(stdout, "Process {} killed", self.pid)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show total and free memory.
pub struct MyMeminfo {}

impl BuiltinCommand for MyMeminfo {
    fn name() -> &'static str {
        "my_meminfo"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        const MIB: u64 = 1024 * 1024;
        let info = sysinfo::sysinfo().context("sysinfo failed")?;
        writeln!(stdout, "Total RAM: {} MB", info.ram_total() / MIB)?;
        writeln!(stdout, "Free RAM: {} MB", info.ram_unused() / MIB)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show the operating system and kernel version.
pub struct MySysinfo {}

impl BuiltinCommand for MySysinfo {
    fn name() -> &'static str {
        "my_sysinfo"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        let uts = utsname::uname().context("uname failed")?;
        writeln!(stdout, "System information:")?;
        writeln!(stdout, "OS: {}", uts.sysname().to_string_lossy())?;
        writeln!(stdout, "Kernel version: {}", uts.release().to_string_lossy())?;
        Ok(0)
    }
}
