//! Filesystem management for container isolation.
//!
//! Provides layered root composition (archive extraction plus a union
//! mount), `pivot_root` for switching into the composed root, and the
//! container's `/proc` mount.

pub mod extract;
pub mod layered;
pub mod mount;
pub mod overlayfs;
pub mod pivot_root;

use std::path::Path;

use nestbox_common::error::NestboxError;

pub use extract::{ArchiveExtractor, TarCommand};
pub use layered::{Composer, LayeredRoot};
pub use overlayfs::{OverlayMount, UnionMount};

/// Builds a mapper from a failed `nix` call to [`NestboxError::Syscall`].
pub(crate) fn syscall_error(
    operation: &'static str,
    path: &Path,
) -> impl FnOnce(nix::Error) -> NestboxError {
    let path = path.to_path_buf();
    move |errno| NestboxError::Syscall {
        operation,
        path,
        source: std::io::Error::from(errno),
    }
}

/// Maps a failed `std::fs` call to [`NestboxError::Io`].
pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> NestboxError {
    let path = path.to_path_buf();
    move |source| NestboxError::Io { path, source }
}
