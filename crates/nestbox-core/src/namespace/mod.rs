//! Linux namespace configuration for container isolation.
//!
//! The launcher creates all namespaces at once through `clone(2)`; this
//! module decides which ones and configures the UTS namespace from inside.

pub mod uts;

use nix::sched::CloneFlags;

pub use uts::set_hostname;

/// Which namespaces a container process is created in.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Isolate hostname and domain name.
    pub uts: bool,
    /// Isolate the process id tree.
    pub pid: bool,
    /// Isolate the mount table.
    pub mount: bool,
    /// Isolate the network stack.
    pub network: bool,
}

impl NamespaceConfig {
    /// Namespaces for a container; a network namespace is only created when
    /// the container gets its own address.
    #[must_use]
    pub const fn for_container(network: bool) -> Self {
        Self {
            uts: true,
            pid: true,
            mount: true,
            network,
        }
    }

    /// Converts to `clone(2)` flags.
    #[must_use]
    pub fn to_clone_flags(self) -> CloneFlags {
        let mut flags = CloneFlags::empty();
        if self.uts {
            flags |= CloneFlags::CLONE_NEWUTS;
        }
        if self.pid {
            flags |= CloneFlags::CLONE_NEWPID;
        }
        if self.mount {
            flags |= CloneFlags::CLONE_NEWNS;
        }
        if self.network {
            flags |= CloneFlags::CLONE_NEWNET;
        }
        flags
    }
}
