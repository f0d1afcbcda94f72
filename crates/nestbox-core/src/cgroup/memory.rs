//! Memory resource control via the cgroup v1 memory subsystem.
//!
//! Manages `memory.limit_in_bytes` and `memory.oom_control`.

use std::path::Path;

use nestbox_common::error::Result;
use nestbox_common::types::ResourceConfig;

use super::{Subsystem, write_control};

/// Hard memory ceiling, in bytes.
pub const LIMIT_FILE: &str = "memory.limit_in_bytes";

/// OOM killer switch; `1` keeps over-limit processes alive.
pub const OOM_CONTROL_FILE: &str = "memory.oom_control";

/// The `memory` cgroup subsystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemorySubsystem;

impl Subsystem for MemorySubsystem {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn configure(&self, group_dir: &Path, config: &ResourceConfig) -> Result<()> {
        if let Some(limit) = config.memory_limit {
            write_control(self.name(), &group_dir.join(LIMIT_FILE), &limit.to_string())?;
        }
        if config.memory_oom_keep {
            write_control(self.name(), &group_dir.join(OOM_CONTROL_FILE), "1")?;
        }
        Ok(())
    }
}
