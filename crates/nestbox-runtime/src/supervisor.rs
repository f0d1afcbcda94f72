//! Blocking wait for the container's termination.

use std::time::Duration;

use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

use nestbox_common::error::{NestboxError, Result};

use crate::container::ChildExit;

/// Blocks until `pid` terminates, using `wait` for each attempt.
///
/// A wait interrupted by a signal (`EINTR`) is retried after `backoff`;
/// it never counts as the child exiting. `ECHILD` ends the loop with
/// [`ChildExit::Vanished`] since retrying could never succeed.
///
/// # Errors
///
/// Returns [`NestboxError::Wait`] for any other wait failure.
pub fn wait_for_exit<F>(pid: Pid, backoff: Duration, mut wait: F) -> Result<ChildExit>
where
    F: FnMut(Pid) -> nix::Result<WaitStatus>,
{
    loop {
        match wait(pid) {
            Ok(WaitStatus::Exited(_, code)) => {
                tracing::info!(%pid, code, "container exited");
                return Ok(ChildExit::Exited(code));
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                tracing::info!(%pid, %signal, "container killed by signal");
                return Ok(ChildExit::Signaled(signal as i32));
            }
            Ok(status) => tracing::debug!(%pid, ?status, "container state changed"),
            Err(Errno::EINTR) => {
                tracing::warn!(%pid, "wait interrupted, retrying");
                std::thread::sleep(backoff);
            }
            Err(Errno::ECHILD) => {
                tracing::warn!(%pid, "no such child, giving up wait");
                return Ok(ChildExit::Vanished);
            }
            Err(e) => {
                return Err(NestboxError::Wait {
                    pid: pid.as_raw(),
                    source: e.into(),
                });
            }
        }
    }
}

/// A single blocking `waitpid(2)` on `pid`.
///
/// # Errors
///
/// Returns the raw errno on failure.
pub fn wait_pid(pid: Pid) -> nix::Result<WaitStatus> {
    waitpid(pid, None)
}
