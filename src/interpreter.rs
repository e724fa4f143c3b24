use crate::command::{CommandFactory, ExitCode};
use crate::config::ShellConfig;
use crate::errors::{OshError, Result};
use crate::jobs::KillSender;
use crate::launcher;
use crate::line::BoundedLine;
use crate::reaper::spawn_reaper;
use crate::session::Session;
use crate::tokenizer::tokenize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};
use tracing::{debug, error, warn};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate, i.e. the built-ins.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Every built-in the shell knows, matched by exact first word.
pub fn default_commands() -> Vec<Box<dyn CommandFactory>> {
    use crate::builtin::*;
    vec![
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<History>::default()),
        Box::new(Factory::<Jobs>::default()),
        Box::new(Factory::<Fg>::default()),
        Box::new(Factory::<Bg>::default()),
        Box::new(Factory::<MyLs>::default()),
        Box::new(Factory::<MyCreate>::default()),
        Box::new(Factory::<MyDelete>::default()),
        Box::new(Factory::<MyPs>::default()),
        Box::new(Factory::<MyKill>::default()),
        Box::new(Factory::<MyMeminfo>::default()),
        Box::new(Factory::<MySysinfo>::default()),
    ]
}

/// The dispatch loop: reads lines, records them, and routes each one to a
/// built-in or to the process launcher.
///
/// Example
/// ```no_run
/// use osh::{Interpreter, ShellConfig};
/// let mut sh = Interpreter::new(ShellConfig::default()).unwrap();
/// sh.repl().unwrap();
/// ```
pub struct Interpreter {
    session: Session,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create an interpreter with the default built-ins and a running reaper.
    ///
    /// Starts the reaper thread, so call this before spawning other threads.
    pub fn new(config: ShellConfig) -> Result<Self> {
        config.validate()?;
        let events = spawn_reaper()?;
        let session = Session::new(config, events, Box::new(KillSender));
        Ok(Self::with_commands(session, default_commands()))
    }

    /// Create an interpreter around an existing session and command set.
    pub fn with_commands(session: Session, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self { session, commands }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn should_exit(&self) -> bool {
        self.session.should_exit
    }

    /// Process one input line.
    ///
    /// Recoverable failures are reported on `stderr` and yield a non-zero exit
    /// code. An `Err` means the shell cannot go on (the OS refused to create a
    /// process, or the output streams are gone).
    pub fn execute_line(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<ExitCode> {
        self.session.history.record(line);

        let config = &self.session.config;
        let bounded = BoundedLine::new(line, config.line_capacity);
        if bounded.was_truncated() {
            warn!(limit = config.line_capacity, "input line truncated");
        }
        let max_args = config.max_args;
        let line_capacity = config.line_capacity;

        self.session.jobs.sync();

        let parsed = match tokenize(bounded.as_str(), max_args) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return Ok(0),
            Err(e) => {
                writeln!(stderr, "osh: {}", e)?;
                return Ok(1);
            }
        };

        let args: Vec<&str> = parsed.args().iter().map(String::as_str).collect();
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(parsed.program(), &args) {
                debug!(builtin = parsed.program(), "dispatching built-in");
                return Ok(cmd.execute(stdout, stderr, &mut self.session)?);
            }
        }

        let command_line = BoundedLine::new(bounded.as_str().trim(), line_capacity);
        match launcher::launch(&parsed, &command_line, &mut self.session.jobs, stdout) {
            Ok(code) => Ok(code),
            Err(e) if e.is_fatal() => Err(OshError::Launch(e)),
            Err(e) => {
                warn!(error = %e, "launch failed");
                writeln!(stderr, "osh: {}", e)?;
                Ok(1)
            }
        }
    }

    /// Interactive Read-Eval-Print Loop on the terminal.
    ///
    /// Returns the status the shell should exit with once `exit` is entered
    /// or input ends.
    pub fn repl(&mut self) -> anyhow::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;
        let prompt = self.session.config.prompt.clone();

        while !self.should_exit() {
            match rl.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    // Unlocked handles: the reaper thread may log while a
                    // foreground wait is in progress.
                    if let Err(e) = self.execute_line(&line, &mut io::stdout(), &mut io::stderr()) {
                        error!(error = %e, "fatal error, leaving the shell");
                        return Err(e.into());
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(self.session.exit_status)
    }
}
