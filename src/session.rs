use std::sync::mpsc::Receiver;

use crate::command::ExitCode;
use crate::config::ShellConfig;
use crate::history::History;
use crate::jobs::{JobControl, SignalSender};
use crate::reaper::ChildEvent;

/// Mutable state of one interactive session.
///
/// Everything a command may touch lives here and is handed to it by
/// `&mut`, so no table is reachable as ambient global state.
pub struct Session {
    pub config: ShellConfig,
    pub history: History,
    pub jobs: JobControl,
    /// When set to true, the dispatch loop stops after the current line.
    pub should_exit: bool,
    /// Status the shell process ends with, set by `exit N`.
    pub exit_status: ExitCode,
}

impl Session {
    pub fn new(
        config: ShellConfig,
        events: Receiver<ChildEvent>,
        signals: Box<dyn SignalSender>,
    ) -> Self {
        let history = History::new(config.history_capacity, config.line_capacity);
        let jobs = JobControl::new(config.job_capacity, events, signals);
        Self {
            config,
            history,
            jobs,
            should_exit: false,
            exit_status: 0,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::jobs::tests::{RecordingSender, recording_sender};
    use std::sync::mpsc::{self, Sender};

    /// A session wired to a fake reaper channel and a recording signal sender.
    pub(crate) fn test_session() -> (Session, Sender<ChildEvent>, RecordingSender) {
        let (tx, rx) = mpsc::channel();
        let sender = recording_sender(tx.clone());
        let session = Session::new(ShellConfig::default(), rx, Box::new(sender.clone()));
        (session, tx, sender)
    }

    #[test]
    fn test_new_session_uses_config_limits() {
        let (session, _tx, _) = test_session();
        assert_eq!(session.history.capacity(), 10);
        assert_eq!(session.jobs.table().capacity(), 10);
        assert!(!session.should_exit);
        assert_eq!(session.exit_status, 0);
    }
}
