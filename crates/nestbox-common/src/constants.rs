//! System-wide constants and default paths.

/// Root of the cgroup v1 hierarchies; each subsystem is mounted beneath it.
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Directory (inside the layered root) holding the extracted image.
pub const READ_LAYER: &str = "readlayer";

/// Directory (inside the layered root) receiving container writes.
pub const WRITE_LAYER: &str = "writelayer";

/// Directory (inside the layered root) where the union view is mounted.
pub const MOUNT_POINT: &str = "mountpoint";

/// Scratch directory owned by the overlay union mount provider.
pub const OVERLAY_WORK_DIR: &str = ".overlay-work";

/// Hidden directory that receives the old root during a root switch.
pub const PIVOT_PUT_OLD: &str = ".pivot_root";

/// Shell executed as the container's final process.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Archive extraction tool invoked to unpack images.
pub const DEFAULT_EXTRACT_TOOL: &str = "tar";

/// Tool invoked to wire a network namespace for a container pid.
pub const DEFAULT_NETWORK_TOOL: &str = "nestbox-netns";

/// Stack size reserved for the cloned child process.
pub const DEFAULT_STACK_SIZE: usize = 4 * 1024 * 1024;

/// Delay before retrying a wait interrupted by a signal.
pub const DEFAULT_WAIT_BACKOFF_MS: u64 = 100;

/// Minimum CPU CFS period or quota accepted by the kernel, in microseconds.
pub const MIN_CPU_MICROS: u64 = 1000;

/// Number of container id characters used for the default hostname.
pub const SHORT_ID_LEN: usize = 12;

/// Environment variable overriding the cgroup root.
pub const ENV_CGROUP_ROOT: &str = "NESTBOX_CGROUP_ROOT";

/// Environment variable overriding the container shell.
pub const ENV_SHELL: &str = "NESTBOX_SHELL";

/// Environment variable overriding the archive extraction tool.
pub const ENV_EXTRACT_TOOL: &str = "NESTBOX_EXTRACT_TOOL";

/// Environment variable overriding the network attach tool.
pub const ENV_NETWORK_TOOL: &str = "NESTBOX_NET_TOOL";

/// Application name shown in CLI usage text.
pub const APP_NAME: &str = "nestbox";
