//! Image archive extraction.

use std::ffi::OsStr;
use std::path::Path;

use nestbox_common::constants::DEFAULT_EXTRACT_TOOL;
use nestbox_common::error::Result;

/// Unpacks an image archive into a directory.
pub trait ArchiveExtractor: Send + Sync {
    /// Extracts `archive` into the existing directory `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction does not complete successfully.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Extracts archives with an external `tar`-compatible tool.
///
/// Runs `<program> -xf <archive> -C <dest>`; compression is detected by
/// the tool itself.
#[derive(Debug, Clone)]
pub struct TarCommand {
    program: String,
}

impl TarCommand {
    /// Uses `program` instead of the default `tar`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for TarCommand {
    fn default() -> Self {
        Self::new(DEFAULT_EXTRACT_TOOL)
    }
}

impl ArchiveExtractor for TarCommand {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        tracing::info!(
            archive = %archive.display(),
            dest = %dest.display(),
            "extracting image"
        );
        crate::tool::run(
            &self.program,
            [
                OsStr::new("-xf"),
                archive.as_os_str(),
                OsStr::new("-C"),
                dest.as_os_str(),
            ],
        )
    }
}
