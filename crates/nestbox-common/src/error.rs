//! Unified error type for the Nestbox workspace.
//!
//! Every fatal condition carries the operation that failed plus the
//! underlying OS error, so a single log line is enough to diagnose it.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum NestboxError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The target root directory is already present.
    #[error("root directory already exists: {path}")]
    RootExists {
        /// The pre-existing directory.
        path: PathBuf,
    },

    /// A system call failed.
    #[error("{operation} failed on {path}: {source}")]
    Syscall {
        /// Name of the failed operation (e.g. `pivot_root`).
        operation: &'static str,
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// An external tool could not be run or exited unsuccessfully.
    #[error("{tool} failed: expected exit status 0, got {status}")]
    ExternalTool {
        /// Program that was invoked.
        tool: String,
        /// Observed exit status, or the reason the tool could not start.
        status: String,
    },

    /// Writing a subsystem control file failed.
    #[error("{subsystem} subsystem: writing {file} failed: {source}")]
    Subsystem {
        /// Subsystem that rejected the write.
        subsystem: &'static str,
        /// Control file that was written.
        file: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A pid was attached to a control group that was never configured.
    #[error("{subsystem} subsystem: control group {group} not found")]
    GroupNotFound {
        /// Subsystem missing the group directory.
        subsystem: &'static str,
        /// Name of the control group.
        group: String,
    },

    /// The container process could not be created.
    #[error("failed to spawn container process: {source}")]
    Spawn {
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The container's init process failed before running the shell.
    #[error("container init (pid {pid}) failed before exec; see its log output")]
    ContainerInit {
        /// Host pid of the init process.
        pid: i32,
    },

    /// Waiting for the container process failed.
    #[error("waiting for pid {pid} failed: {source}")]
    Wait {
        /// Pid being waited on.
        pid: i32,
        /// Underlying OS error.
        source: std::io::Error,
    },
}

/// Failure classes a caller can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Preparing the container failed; nothing is left running.
    Setup,
    /// A pid could not join its control group, which means the
    /// configure/attach sequence was broken.
    Attachment,
    /// Supervising the running container failed.
    Supervision,
}

impl NestboxError {
    /// Returns the failure class of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::GroupNotFound { .. } => ErrorCategory::Attachment,
            Self::Wait { .. } => ErrorCategory::Supervision,
            Self::Io { .. }
            | Self::Config { .. }
            | Self::RootExists { .. }
            | Self::Syscall { .. }
            | Self::ExternalTool { .. }
            | Self::Subsystem { .. }
            | Self::Spawn { .. }
            | Self::ContainerInit { .. } => ErrorCategory::Setup,
        }
    }

    /// Shorthand for a [`NestboxError::Config`] error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, NestboxError>;
