//! Asynchronous reaping of child processes.
//!
//! `SIGCHLD` is blocked in the thread that calls [`spawn_reaper`] and in every
//! thread created afterwards, so the only place it is ever consumed is the
//! reaper thread, which waits for it synchronously with `sigwait`. Each wakeup
//! collects every child with a pending state change and forwards one
//! [`ChildEvent`] per change over a channel. The reaper never touches the job
//! table; the main flow applies the events when it drains the channel.
//!
//! The reaper is the only caller of `waitpid` in the process. Foreground
//! waits therefore observe their child through the same channel instead of
//! racing the reaper for its status.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use nix::errno::Errno;
use nix::sys::signal::{SigSet, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::{debug, trace, warn};

use crate::errors::{OshError, Result};

/// What happened to a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    Exited(i32),
    Signaled(Signal),
    Stopped(Signal),
    Continued,
}

impl ChildState {
    /// True when the process no longer exists (exited or killed).
    pub fn is_terminated(&self) -> bool {
        matches!(self, ChildState::Exited(_) | ChildState::Signaled(_))
    }

    /// Shell-style exit code for a terminated process.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ChildState::Exited(code) => Some(*code),
            ChildState::Signaled(signal) => Some(128 + *signal as i32),
            _ => None,
        }
    }
}

/// A state change of one child, as reported by `waitpid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildEvent {
    pub pid: Pid,
    pub state: ChildState,
}

impl ChildEvent {
    pub fn new(pid: Pid, state: ChildState) -> Self {
        Self { pid, state }
    }

    /// Translate a `waitpid` result, dropping statuses that carry no change.
    pub fn from_wait_status(status: WaitStatus) -> Option<Self> {
        let (pid, state) = match status {
            WaitStatus::Exited(pid, code) => (pid, ChildState::Exited(code)),
            WaitStatus::Signaled(pid, signal, _) => (pid, ChildState::Signaled(signal)),
            WaitStatus::Stopped(pid, signal) => (pid, ChildState::Stopped(signal)),
            WaitStatus::Continued(pid) => (pid, ChildState::Continued),
            _ => return None,
        };
        Some(Self { pid, state })
    }
}

/// Start the reaper thread and return the receiving end of its events.
///
/// Must be called before any other thread is spawned so that all of them
/// inherit the blocked `SIGCHLD` mask. The thread exits once the receiver is
/// dropped and the next child changes state.
pub fn spawn_reaper() -> Result<Receiver<ChildEvent>> {
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGCHLD);
    mask.thread_block()
        .map_err(|errno| OshError::Io(std::io::Error::from(errno)))?;

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("osh-reaper".to_string())
        .spawn(move || reap_loop(mask, tx))?;

    debug!("reaper thread started");
    Ok(rx)
}

fn reap_loop(mask: SigSet, tx: Sender<ChildEvent>) {
    loop {
        match mask.wait() {
            Ok(signal) => trace!(?signal, "reaper woke up"),
            Err(errno) => {
                warn!(%errno, "sigwait failed");
                continue;
            }
        }
        if !drain_children(&tx) {
            debug!("event receiver dropped, reaper exiting");
            return;
        }
    }
}

/// Collect every pending child status. Returns false once nobody listens.
fn drain_children(tx: &Sender<ChildEvent>) -> bool {
    let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
    loop {
        match waitpid(Pid::from_raw(-1), Some(flags)) {
            Ok(WaitStatus::StillAlive) => return true,
            Ok(status) => {
                let Some(event) = ChildEvent::from_wait_status(status) else {
                    continue;
                };
                debug!(pid = %event.pid, state = ?event.state, "child changed state");
                if tx.send(event).is_err() {
                    return false;
                }
            }
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return true,
            Err(errno) => {
                warn!(%errno, "waitpid failed");
                return true;
            }
        }
    }
}
