//! The launched container process and how it ended.

use chrono::{DateTime, Utc};
use nix::sched::CloneFlags;
use nix::unistd::Pid;

use nestbox_common::error::Result;

use crate::process::StartGate;

/// How the container's init process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// Exited normally with the given status code.
    Exited(i32),
    /// Killed by the given signal number.
    Signaled(i32),
    /// The kernel reported no such child; its status is unknown.
    Vanished,
}

impl ChildExit {
    /// Exit code the supervisor should report, following shell conventions
    /// (`128 + signal` for signal deaths).
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::Signaled(signal) => 128 + signal,
            Self::Vanished => 1,
        }
    }
}

/// A container init process, owned by the engine from launch to reap.
#[derive(Debug)]
pub struct ContainerProcess {
    /// Pid as seen from the host namespace.
    pub pid: Pid,
    /// Namespace flags the process was created with.
    pub flags: CloneFlags,
    /// When the process was launched.
    pub started_at: DateTime<Utc>,
    /// Termination status, once reaped.
    pub exit: Option<ChildExit>,
    gate: Option<StartGate>,
}

impl ContainerProcess {
    /// Records a freshly launched process.
    #[must_use]
    pub fn new(pid: Pid, flags: CloneFlags) -> Self {
        Self {
            pid,
            flags,
            started_at: Utc::now(),
            exit: None,
            gate: None,
        }
    }

    /// Holds the process until [`ContainerProcess::release`] is called.
    pub(crate) fn with_gate(mut self, gate: StartGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Lets a held process continue into the container and waits until it
    /// has run its shell. Does nothing for a process that was never held
    /// or was already released.
    ///
    /// # Errors
    ///
    /// Returns [`nestbox_common::error::NestboxError::ContainerInit`] if
    /// the process failed before reaching its shell.
    pub fn release(&mut self) -> Result<()> {
        match self.gate.take() {
            Some(gate) => gate.open(self.pid),
            None => Ok(()),
        }
    }

    /// Returns `true` once the process has been reaped.
    #[must_use]
    pub const fn has_exited(&self) -> bool {
        self.exit.is_some()
    }

    /// Sends `SIGKILL`. A process that is already reaped or gone is ignored.
    pub fn kill(&self) {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, kill};

        // A reaped pid may already belong to an unrelated process.
        if self.has_exited() {
            return;
        }

        match kill(self.pid, Signal::SIGKILL) {
            Ok(()) => tracing::info!(pid = %self.pid, "sent SIGKILL"),
            Err(Errno::ESRCH) => {}
            Err(e) => tracing::warn!(pid = %self.pid, error = %e, "failed to kill container process"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_shell_conventions() {
        assert_eq!(ChildExit::Exited(0).code(), 0);
        assert_eq!(ChildExit::Exited(3).code(), 3);
        assert_eq!(ChildExit::Signaled(9).code(), 137);
        assert_eq!(ChildExit::Vanished.code(), 1);
    }

    #[test]
    fn new_process_has_not_exited() {
        let process = ContainerProcess::new(Pid::from_raw(42), CloneFlags::CLONE_NEWPID);
        assert!(!process.has_exited());
        assert!(process.started_at <= Utc::now());
    }

    #[test]
    fn ungated_release_is_a_no_op() {
        let mut process = ContainerProcess::new(Pid::from_raw(42), CloneFlags::empty());
        assert!(process.release().is_ok());
        assert!(process.release().is_ok());
    }
}
