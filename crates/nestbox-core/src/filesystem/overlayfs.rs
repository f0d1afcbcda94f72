//! Union mounts for layered container filesystems.
//!
//! Stacks a writable upper layer over a read-only lower layer so the
//! container sees the image contents and writes never reach the image.

use std::path::{Path, PathBuf};

use nestbox_common::constants::OVERLAY_WORK_DIR;
use nestbox_common::error::{NestboxError, Result};

/// Provider of a union view over a lower and an upper directory.
pub trait UnionMount: Send + Sync {
    /// Mounts `upper` over `lower` at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the union view cannot be mounted.
    fn mount(&self, lower: &Path, upper: &Path, target: &Path) -> Result<()>;

    /// Detaches the union view at `target`. A target that is not mounted
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount fails for any other reason.
    fn unmount(&self, target: &Path) -> Result<()>;
}

/// Kernel `OverlayFS` provider.
///
/// Its work directory lives next to the upper layer, at
/// `<parent of upper>/.overlay-work`, because the kernel requires both on
/// the same filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayMount;

impl OverlayMount {
    /// Work directory used for a given upper layer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `upper` has no parent directory.
    pub fn work_dir(upper: &Path) -> Result<PathBuf> {
        upper
            .parent()
            .map(|parent| parent.join(OVERLAY_WORK_DIR))
            .ok_or_else(|| {
                NestboxError::config(format!("upper layer has no parent: {}", upper.display()))
            })
    }
}

/// Builds the overlay mount data string.
///
/// Paths containing option separators are rejected instead of escaped.
fn overlay_options(lower: &Path, upper: &Path, work: &Path) -> Result<String> {
    for path in [lower, upper, work] {
        let text = path.to_str().ok_or_else(|| {
            NestboxError::config(format!("overlay path is not UTF-8: {}", path.display()))
        })?;
        if text.contains([',', ':', '\\']) {
            return Err(NestboxError::config(format!(
                "overlay path contains a reserved character: {text}"
            )));
        }
    }
    Ok(format!(
        "lowerdir={},upperdir={},workdir={}",
        lower.display(),
        upper.display(),
        work.display()
    ))
}

#[cfg(target_os = "linux")]
impl UnionMount for OverlayMount {
    fn mount(&self, lower: &Path, upper: &Path, target: &Path) -> Result<()> {
        use nix::mount::{MsFlags, mount};

        let work = Self::work_dir(upper)?;
        let opts = overlay_options(lower, upper, &work)?;
        std::fs::create_dir_all(&work).map_err(super::io_error(&work))?;

        mount(
            Some("overlay"),
            target,
            Some("overlay"),
            MsFlags::empty(),
            Some(opts.as_str()),
        )
        .map_err(super::syscall_error("overlay mount", target))?;

        tracing::info!(target = %target.display(), "overlayfs mounted");
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        use nix::errno::Errno;
        use nix::mount::{MntFlags, umount2};

        match umount2(target, MntFlags::MNT_DETACH) {
            Ok(()) => {
                tracing::info!(path = %target.display(), "overlayfs unmounted");
                Ok(())
            }
            Err(Errno::EINVAL | Errno::ENOENT) => {
                tracing::debug!(path = %target.display(), "overlay not mounted, skipping unmount");
                Ok(())
            }
            Err(e) => Err(super::syscall_error("overlay unmount", target)(e)),
        }
    }
}

/// Stub for non-Linux platforms.
#[cfg(not(target_os = "linux"))]
impl UnionMount for OverlayMount {
    fn mount(&self, _lower: &Path, _upper: &Path, _target: &Path) -> Result<()> {
        Err(NestboxError::config("Linux required for overlay mounts"))
    }

    fn unmount(&self, _target: &Path) -> Result<()> {
        Err(NestboxError::config("Linux required for overlay mounts"))
    }
}
