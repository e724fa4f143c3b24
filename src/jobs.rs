//! Job table and the `fg`/`bg` job-control operations.
//!
//! [`JobTable`] is plain data: a bounded list of slots in registration order.
//! Slots are never reused or renumbered, so a job number stays valid (and
//! keeps pointing at the same process) for the whole session, and a table
//! whose slots were all used once stays full.
//!
//! [`JobControl`] owns the table together with the receiving end of the
//! reaper channel. It is the only code that mutates job state.

use std::fmt;
use std::io::{self, Write};
use std::sync::mpsc::{Receiver, TryRecvError};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::errors::JobError;
use crate::line::BoundedLine;
use crate::reaper::{ChildEvent, ChildState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Done,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Running => "Running",
            JobState::Stopped => "Stopped",
            JobState::Done => "Done",
        };
        f.write_str(s)
    }
}

/// One tracked child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pid: Pid,
    command: BoundedLine,
    state: JobState,
}

impl Job {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn command(&self) -> &str {
        self.command.as_str()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }

    /// `Done` is terminal; every other transition is allowed.
    fn set_state(&mut self, state: JobState) {
        if !self.is_done() {
            self.state = state;
        }
    }
}

/// Bounded registry of jobs, indexed by 1-based job number.
#[derive(Debug, Clone)]
pub struct JobTable {
    slots: Vec<Job>,
    capacity: usize,
}

impl JobTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Register a job in the next free slot and return its job number.
    pub fn add(
        &mut self,
        pid: Pid,
        command: BoundedLine,
        state: JobState,
    ) -> Result<usize, JobError> {
        if self.slots.len() >= self.capacity {
            return Err(JobError::TableFull);
        }
        self.slots.push(Job {
            pid,
            command,
            state,
        });
        Ok(self.slots.len())
    }

    /// Mark the job running `pid` as `Done`. Unknown pids are ignored.
    pub fn remove_by_pid(&mut self, pid: Pid) {
        self.set_state_by_pid(pid, JobState::Done);
    }

    /// Apply a state change reported by the reaper.
    pub fn apply(&mut self, event: &ChildEvent) {
        if event.state.is_terminated() {
            self.remove_by_pid(event.pid);
        } else if let ChildState::Stopped(_) = event.state {
            self.set_state_by_pid(event.pid, JobState::Stopped);
        } else {
            self.set_state_by_pid(event.pid, JobState::Running);
        }
    }

    // Done slots keep their pid, which the kernel may hand out again.
    fn set_state_by_pid(&mut self, pid: Pid, state: JobState) {
        if let Some(job) = self
            .slots
            .iter_mut()
            .find(|job| job.pid == pid && !job.is_done())
        {
            job.set_state(state);
        }
    }

    /// Look up a live job by its number.
    pub fn get(&self, job_number: usize) -> Result<&Job, JobError> {
        job_number
            .checked_sub(1)
            .and_then(|idx| self.slots.get(idx))
            .filter(|job| !job.is_done())
            .ok_or(JobError::InvalidJobNumber(job_number))
    }

    fn get_mut(&mut self, job_number: usize) -> Result<&mut Job, JobError> {
        job_number
            .checked_sub(1)
            .and_then(|idx| self.slots.get_mut(idx))
            .filter(|job| !job.is_done())
            .ok_or(JobError::InvalidJobNumber(job_number))
    }

    /// Every job that is not `Done`, with its job number, in slot order.
    pub fn active(&self) -> impl Iterator<Item = (usize, &Job)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, job)| !job.is_done())
            .map(|(idx, job)| (idx + 1, job))
    }

    pub fn list(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Job List:")?;
        for (number, job) in self.active() {
            writeln!(out, "[{}] {} {}", number, job.pid, job.command)?;
        }
        Ok(())
    }

    /// Number of slots ever used, live or not.
    pub fn slots_used(&self) -> usize {
        self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Delivery of signals to processes.
///
/// Production code uses [`KillSender`]; tests record the calls instead.
pub trait SignalSender {
    fn send(&self, pid: Pid, signal: Signal) -> nix::Result<()>;
}

/// Sends real signals with `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KillSender;

impl SignalSender for KillSender {
    fn send(&self, pid: Pid, signal: Signal) -> nix::Result<()> {
        signal::kill(pid, signal)
    }
}

/// The job table plus everything needed to keep it in sync with the OS.
pub struct JobControl {
    table: JobTable,
    events: Receiver<ChildEvent>,
    signals: Box<dyn SignalSender>,
}

impl JobControl {
    pub fn new(
        capacity: usize,
        events: Receiver<ChildEvent>,
        signals: Box<dyn SignalSender>,
    ) -> Self {
        Self {
            table: JobTable::new(capacity),
            events,
            signals,
        }
    }

    pub fn table(&self) -> &JobTable {
        &self.table
    }

    /// Apply every reaper notification that is already queued.
    pub fn sync(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.table.apply(&event),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    warn!("reaper channel closed, job states may be stale");
                    return;
                }
            }
        }
    }

    pub fn register(
        &mut self,
        pid: Pid,
        command: BoundedLine,
        state: JobState,
    ) -> Result<usize, JobError> {
        let number = self.table.add(pid, command, state)?;
        debug!(job = number, %pid, %state, "job registered");
        Ok(number)
    }

    /// Block until `pid` terminates or stops, applying every notification
    /// received in the meantime. A `Continued` notification for `pid` does not
    /// end the wait.
    pub fn wait_for(&mut self, pid: Pid) -> Result<ChildState, JobError> {
        loop {
            let event = self.events.recv().map_err(|_| JobError::ReaperGone)?;
            self.table.apply(&event);
            if event.pid == pid && event.state != ChildState::Continued {
                return Ok(event.state);
            }
        }
    }

    /// Resume job `job_number` and wait until it exits or stops again.
    pub fn bring_to_foreground(
        &mut self,
        job_number: usize,
        out: &mut dyn Write,
    ) -> anyhow::Result<ChildState> {
        self.sync();
        let job = self.table.get(job_number)?;
        let pid = job.pid();
        let command = job.command().to_string();
        writeln!(out, "Bringing job [{}] {} to foreground", job_number, pid)?;
        out.flush()?;

        self.continue_job(pid)?;
        self.table.get_mut(job_number)?.set_state(JobState::Running);

        let state = self.wait_for(pid)?;
        if let ChildState::Stopped(_) = state {
            writeln!(out, "[{}]+ Stopped  {}", job_number, command)?;
        }
        Ok(state)
    }

    /// Resume job `job_number` without waiting for it.
    pub fn continue_in_background(
        &mut self,
        job_number: usize,
        out: &mut dyn Write,
    ) -> anyhow::Result<()> {
        self.sync();
        let pid = self.table.get(job_number)?.pid();
        writeln!(out, "Continuing job [{}] {} in background", job_number, pid)?;
        self.continue_job(pid)?;
        Ok(())
    }

    fn continue_job(&self, pid: Pid) -> Result<(), JobError> {
        self.signals
            .send(pid, Signal::SIGCONT)
            .map_err(|errno| JobError::Signal { pid, errno })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use nix::errno::Errno;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc::{self, Sender};

    /// Records every signal instead of delivering it. A successful send
    /// releases the queued `replies` into the reaper channel, the way a real
    /// process reacts to `SIGCONT`.
    #[derive(Default, Clone)]
    pub(crate) struct RecordingSender {
        pub sent: Rc<RefCell<Vec<(Pid, Signal)>>>,
        pub replies: Rc<RefCell<Vec<ChildEvent>>>,
        pub fail_with: Option<Errno>,
        events: Option<Sender<ChildEvent>>,
    }

    impl SignalSender for RecordingSender {
        fn send(&self, pid: Pid, signal: Signal) -> nix::Result<()> {
            self.sent.borrow_mut().push((pid, signal));
            if let Some(errno) = self.fail_with {
                return Err(errno);
            }
            if let Some(tx) = &self.events {
                for event in self.replies.borrow_mut().drain(..) {
                    tx.send(event).expect("receiver alive");
                }
            }
            Ok(())
        }
    }

    /// A recorder that answers signals on `tx`.
    pub(crate) fn recording_sender(tx: Sender<ChildEvent>) -> RecordingSender {
        RecordingSender {
            events: Some(tx),
            ..RecordingSender::default()
        }
    }

    pub(crate) fn job_control(
        capacity: usize,
    ) -> (JobControl, Sender<ChildEvent>, RecordingSender) {
        let (tx, rx) = mpsc::channel();
        let sender = recording_sender(tx.clone());
        let control = JobControl::new(capacity, rx, Box::new(sender.clone()));
        (control, tx, sender)
    }

    fn pid(raw: i32) -> Pid {
        Pid::from_raw(raw)
    }

    fn line(text: &str) -> BoundedLine {
        BoundedLine::new(text, 80)
    }

    fn listing(table: &JobTable) -> String {
        let mut out = Vec::new();
        table.list(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_add_assigns_sequential_numbers() {
        let mut table = JobTable::new(10);
        assert_eq!(table.add(pid(100), line("sleep 5 &"), JobState::Running), Ok(1));
        assert_eq!(table.add(pid(101), line("vim"), JobState::Stopped), Ok(2));
        assert_eq!(
            listing(&table),
            "Job List:\n[1] 100 sleep 5 &\n[2] 101 vim\n"
        );
    }

    #[test]
    fn test_table_full_is_rejected_without_mutation() {
        let mut table = JobTable::new(2);
        table.add(pid(1), line("a"), JobState::Running).unwrap();
        table.add(pid(2), line("b"), JobState::Running).unwrap();

        assert_eq!(
            table.add(pid(3), line("c"), JobState::Running),
            Err(JobError::TableFull)
        );
        assert_eq!(table.slots_used(), 2);
        assert!(table.active().all(|(_, job)| job.pid() != pid(3)));
    }

    #[test]
    fn test_done_slots_are_not_reused() {
        let mut table = JobTable::new(1);
        table.add(pid(1), line("a"), JobState::Running).unwrap();
        table.remove_by_pid(pid(1));
        assert_eq!(
            table.add(pid(2), line("b"), JobState::Running),
            Err(JobError::TableFull)
        );
    }

    #[test]
    fn test_numbers_are_stable_after_done() {
        let mut table = JobTable::new(10);
        table.add(pid(1), line("first"), JobState::Running).unwrap();
        table.add(pid(2), line("second"), JobState::Running).unwrap();
        table.add(pid(3), line("third"), JobState::Running).unwrap();
        table.remove_by_pid(pid(2));

        assert_eq!(listing(&table), "Job List:\n[1] 1 first\n[3] 3 third\n");
        assert_eq!(table.get(3).map(Job::pid), Ok(pid(3)));
        assert_eq!(table.get(2), Err(JobError::InvalidJobNumber(2)));
    }

    #[test]
    fn test_get_validates_range() {
        let mut table = JobTable::new(10);
        table.add(pid(1), line("a"), JobState::Running).unwrap();
        assert_eq!(table.get(0), Err(JobError::InvalidJobNumber(0)));
        assert_eq!(table.get(2), Err(JobError::InvalidJobNumber(2)));
        assert!(table.get(1).is_ok());
    }

    #[test]
    fn test_remove_unknown_pid_is_noop() {
        let mut table = JobTable::new(10);
        table.add(pid(1), line("a"), JobState::Running).unwrap();
        table.remove_by_pid(pid(99));
        assert_eq!(table.get(1).map(Job::state), Ok(JobState::Running));
    }

    #[test]
    fn test_recycled_pid_updates_the_live_job() {
        let mut table = JobTable::new(10);
        table.add(pid(4242), line("sleep 1 &"), JobState::Running).unwrap();
        table.remove_by_pid(pid(4242));
        table.add(pid(4242), line("sleep 9 &"), JobState::Running).unwrap();

        table.apply(&ChildEvent::new(pid(4242), ChildState::Stopped(Signal::SIGSTOP)));
        assert_eq!(table.get(2).map(Job::state), Ok(JobState::Stopped));

        table.remove_by_pid(pid(4242));
        assert_eq!(table.get(2).map(Job::state), Err(JobError::InvalidJobNumber(2)));
        assert_eq!(table.active().count(), 0);
    }

    #[test]
    fn test_apply_follows_state_machine() {
        let mut table = JobTable::new(10);
        table.add(pid(1), line("a"), JobState::Running).unwrap();

        table.apply(&ChildEvent::new(pid(1), ChildState::Stopped(Signal::SIGTSTP)));
        assert_eq!(table.get(1).map(Job::state), Ok(JobState::Stopped));

        table.apply(&ChildEvent::new(pid(1), ChildState::Continued));
        assert_eq!(table.get(1).map(Job::state), Ok(JobState::Running));

        table.apply(&ChildEvent::new(pid(1), ChildState::Signaled(Signal::SIGKILL)));
        assert_eq!(table.active().count(), 0);

        // Done is terminal.
        table.apply(&ChildEvent::new(pid(1), ChildState::Continued));
        assert_eq!(table.active().count(), 0);
    }

    #[test]
    fn test_sync_applies_queued_events() {
        let (mut control, tx, _) = job_control(10);
        control
            .register(pid(10), line("sleep 5 &"), JobState::Running)
            .unwrap();

        tx.send(ChildEvent::new(pid(10), ChildState::Exited(0))).unwrap();
        assert_eq!(control.table().active().count(), 1);

        control.sync();
        assert_eq!(control.table().active().count(), 0);
    }

    #[test]
    fn test_fg_invalid_job_sends_no_signal() {
        let (mut control, tx, sender) = job_control(10);
        control.register(pid(10), line("a &"), JobState::Running).unwrap();
        tx.send(ChildEvent::new(pid(10), ChildState::Exited(0))).unwrap();

        let mut out = Vec::new();
        for number in [0, 1, 2] {
            let err = control.bring_to_foreground(number, &mut out).unwrap_err();
            assert_eq!(
                err.downcast_ref::<JobError>(),
                Some(&JobError::InvalidJobNumber(number))
            );
        }
        assert!(control.continue_in_background(5, &mut out).is_err());
        assert!(sender.sent.borrow().is_empty());
    }

    #[test]
    fn test_fg_waits_until_exit() {
        let (mut control, _tx, sender) = job_control(10);
        control.register(pid(7), line("other &"), JobState::Running).unwrap();
        control.register(pid(8), line("sleep 5 &"), JobState::Stopped).unwrap();

        sender.replies.borrow_mut().extend([
            ChildEvent::new(pid(8), ChildState::Continued),
            ChildEvent::new(pid(7), ChildState::Exited(0)),
            ChildEvent::new(pid(8), ChildState::Exited(3)),
        ]);

        // pid 7 exits while the shell is blocked on job 2; both end up Done.
        let mut out = Vec::new();
        let state = control.bring_to_foreground(2, &mut out).unwrap();
        assert_eq!(state, ChildState::Exited(3));
        assert_eq!(*sender.sent.borrow(), vec![(pid(8), Signal::SIGCONT)]);
        assert_eq!(control.table().active().count(), 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Bringing job [2] 8 to foreground\n"
        );
    }

    #[test]
    fn test_fg_job_stopped_again() {
        let (mut control, _tx, sender) = job_control(10);
        control.register(pid(8), line("vim"), JobState::Stopped).unwrap();
        sender.replies.borrow_mut().extend([
            ChildEvent::new(pid(8), ChildState::Continued),
            ChildEvent::new(pid(8), ChildState::Stopped(Signal::SIGTSTP)),
        ]);

        let mut out = Vec::new();
        let state = control.bring_to_foreground(1, &mut out).unwrap();
        assert_eq!(state, ChildState::Stopped(Signal::SIGTSTP));
        assert_eq!(control.table().get(1).map(Job::state), Ok(JobState::Stopped));
        assert!(String::from_utf8(out).unwrap().contains("[1]+ Stopped  vim"));
    }

    #[test]
    fn test_fg_signal_failure_is_reported() {
        let (_tx, rx) = mpsc::channel();
        let sender = RecordingSender {
            fail_with: Some(Errno::ESRCH),
            ..RecordingSender::default()
        };
        let mut control = JobControl::new(10, rx, Box::new(sender));
        control.register(pid(8), line("vim"), JobState::Stopped).unwrap();

        let err = control.bring_to_foreground(1, &mut Vec::new()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<JobError>(),
            Some(&JobError::Signal {
                pid: pid(8),
                errno: Errno::ESRCH
            })
        );
        assert_eq!(control.table().get(1).map(Job::state), Ok(JobState::Stopped));
    }

    #[test]
    fn test_bg_does_not_change_state() {
        let (mut control, _tx, sender) = job_control(10);
        control.register(pid(8), line("vim"), JobState::Stopped).unwrap();

        let mut out = Vec::new();
        control.continue_in_background(1, &mut out).unwrap();
        assert_eq!(*sender.sent.borrow(), vec![(pid(8), Signal::SIGCONT)]);
        assert_eq!(control.table().get(1).map(Job::state), Ok(JobState::Stopped));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Continuing job [1] 8 in background\n"
        );
    }

    #[test]
    fn test_wait_for_reports_dead_reaper() {
        let (tx, rx) = mpsc::channel();
        let mut control = JobControl::new(10, rx, Box::new(RecordingSender::default()));
        drop(tx);
        assert_eq!(control.wait_for(pid(1)), Err(JobError::ReaperGone));
    }
}
