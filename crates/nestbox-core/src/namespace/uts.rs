//! UTS namespace configuration.
//!
//! Gives the container its own hostname.

use nestbox_common::error::{NestboxError, Result};

/// Sets the hostname inside the caller's UTS namespace.
///
/// # Errors
///
/// Returns an error if `sethostname(2)` fails.
pub fn set_hostname(hostname: &str) -> Result<()> {
    nix::unistd::sethostname(hostname).map_err(|e| NestboxError::Syscall {
        operation: "sethostname",
        path: hostname.into(),
        source: e.into(),
    })?;
    tracing::debug!(hostname, "container hostname set");
    Ok(())
}
