//! Root filesystem switching via `pivot_root(2)`.
//!
//! More secure than `chroot` because the old root is detached from the
//! mount namespace rather than merely hidden from path lookup.

use std::path::Path;

use nestbox_common::error::Result;

/// Makes `new_root` the root of the calling process's mount namespace and
/// detaches the previous root.
///
/// Must run inside a private mount namespace (see
/// [`super::mount::make_mounts_private`]) and before anything else looks
/// at the filesystem. Every step is fatal on failure: a process whose
/// switch did not complete must never go on to run container commands.
///
/// # Errors
///
/// Returns [`nestbox_common::error::NestboxError::Syscall`] naming the
/// first step that failed.
#[cfg(target_os = "linux")]
pub fn switch_root(new_root: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    use nix::mount::{MntFlags, MsFlags, mount, umount2};
    use nix::unistd::{chdir, pivot_root};

    use nestbox_common::constants::PIVOT_PUT_OLD;

    use super::{io_error, syscall_error};

    tracing::info!(new_root = %new_root.display(), "performing pivot_root");

    // pivot_root(2) requires new_root to be a mount point.
    mount(
        Some(new_root),
        new_root,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(syscall_error("bind mount", new_root))?;

    let put_old = new_root.join(PIVOT_PUT_OLD);
    std::fs::DirBuilder::new()
        .mode(0o700)
        .create(&put_old)
        .map_err(io_error(&put_old))?;

    pivot_root(new_root, &put_old).map_err(syscall_error("pivot_root", new_root))?;

    // The old working directory now points outside the namespace root.
    chdir("/").map_err(syscall_error("chdir", Path::new("/")))?;

    let old_root = Path::new("/").join(PIVOT_PUT_OLD);
    umount2(&old_root, MntFlags::MNT_DETACH).map_err(syscall_error("umount2", &old_root))?;
    std::fs::remove_dir(&old_root).map_err(io_error(&old_root))?;

    tracing::debug!("old root detached");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; `pivot_root` requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn switch_root(_new_root: &Path) -> Result<()> {
    Err(nestbox_common::error::NestboxError::config(
        "Linux required for native container operations",
    ))
}
