use argh::FromArgs;
use osh::config::{DEFAULT_HISTORY_CAPACITY, DEFAULT_JOB_CAPACITY};
use osh::launcher::ignore_interactive_signals;
use osh::logging::{LogLevel, init_logging};
use osh::{Interpreter, ShellConfig};
use tracing::warn;

#[derive(FromArgs)]
/// An interactive shell with background jobs.
struct Args {
    #[argh(option, default = "DEFAULT_HISTORY_CAPACITY")]
    /// number of input lines kept by `history`
    history_size: usize,

    #[argh(option, default = "DEFAULT_JOB_CAPACITY")]
    /// number of job slots available for the whole session
    max_jobs: usize,

    #[argh(option)]
    /// log verbosity: error, warn, info, debug or trace
    log_level: Option<LogLevel>,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    init_logging(args.log_level)?;

    if let Err(errno) = ignore_interactive_signals() {
        warn!(%errno, "could not ignore SIGINT/SIGTSTP");
    }

    let config = ShellConfig {
        history_capacity: args.history_size,
        job_capacity: args.max_jobs,
        ..ShellConfig::default()
    };
    let mut sh = Interpreter::new(config)?;
    let status = sh.repl()?;
    std::process::exit(status)
}
