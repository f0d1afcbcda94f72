//! Invocation of external helper programs.
//!
//! Arguments are always passed as a discrete list, never through a shell,
//! so paths and addresses cannot break out of the intended command.

use std::ffi::OsStr;
use std::process::{Command, Stdio};

use nestbox_common::error::{NestboxError, Result};

/// Runs `program` with `args` and requires a zero exit status.
///
/// `program` is resolved through `PATH` first so a missing tool is
/// reported as such rather than as an opaque spawn failure.
///
/// # Errors
///
/// Returns [`NestboxError::ExternalTool`] if the program cannot be found or
/// started, or exits unsuccessfully.
pub fn run<I, S>(program: &str, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let resolved = which::which(program).map_err(|e| NestboxError::ExternalTool {
        tool: program.to_string(),
        status: format!("not runnable: {e}"),
    })?;

    let mut command = Command::new(&resolved);
    let _ = command.args(args).stdin(Stdio::null());
    tracing::debug!(tool = %resolved.display(), ?command, "running external tool");

    let status = command.status().map_err(|e| NestboxError::ExternalTool {
        tool: program.to_string(),
        status: format!("failed to start: {e}"),
    })?;
    if !status.success() {
        return Err(NestboxError::ExternalTool {
            tool: program.to_string(),
            status: status.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_reported_by_name() {
        let err = run("nestbox-no-such-tool", ["x"]).unwrap_err();
        assert!(matches!(err, NestboxError::ExternalTool { ref tool, .. } if tool == "nestbox-no-such-tool"));
    }

    #[test]
    fn nonzero_exit_is_an_error() {
        if which::which("false").is_err() {
            return;
        }
        let err = run("false", std::iter::empty::<&str>()).unwrap_err();
        assert!(err.to_string().contains("expected exit status 0"));
    }

    #[test]
    fn zero_exit_succeeds() {
        if which::which("true").is_err() {
            return;
        }
        run("true", std::iter::empty::<&str>()).unwrap();
    }
}
