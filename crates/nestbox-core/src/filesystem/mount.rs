//! Mount utilities for the container's own mount namespace.
//!
//! Handles mount propagation and the namespace-scoped `/proc`.

use std::path::Path;

use nestbox_common::error::Result;

/// Marks every mount in the current namespace as private, so later mounts
/// and the root switch neither propagate to nor are blocked by the host.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn make_mounts_private() -> Result<()> {
    use nix::mount::{MsFlags, mount};

    let root = Path::new("/");
    mount(
        None::<&str>,
        root,
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(super::syscall_error("make mounts private", root))?;
    tracing::debug!("mount propagation set to private");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; mount namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn make_mounts_private() -> Result<()> {
    Err(nestbox_common::error::NestboxError::config(
        "Linux required for native container operations",
    ))
}

/// Mounts a `proc` filesystem at `target`, creating the directory if the
/// image lacks it.
///
/// The mount is `noexec`, `nosuid` and `nodev`, and shows the pid
/// namespace of the calling process.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the mount fails.
#[cfg(target_os = "linux")]
pub fn mount_proc(target: &Path) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    std::fs::create_dir_all(target).map_err(super::io_error(target))?;
    mount(
        Some("proc"),
        target,
        Some("proc"),
        MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
        None::<&str>,
    )
    .map_err(super::syscall_error("mount proc", target))?;
    tracing::debug!(target = %target.display(), "proc mounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; `proc` mounts require Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_proc(_target: &Path) -> Result<()> {
    Err(nestbox_common::error::NestboxError::config(
        "Linux required for native container operations",
    ))
}
