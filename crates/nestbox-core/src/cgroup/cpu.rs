//! CPU bandwidth control via the cgroup v1 `cpu` subsystem.
//!
//! Manages `cpu.cfs_period_us` and `cpu.cfs_quota_us`.

use std::path::Path;

use nestbox_common::error::Result;
use nestbox_common::types::ResourceConfig;

use super::{Subsystem, write_control};

/// Length of one CFS scheduling period, in microseconds.
pub const PERIOD_FILE: &str = "cpu.cfs_period_us";

/// CPU time the group may use per period, in microseconds.
pub const QUOTA_FILE: &str = "cpu.cfs_quota_us";

/// The `cpu` cgroup subsystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuSubsystem;

impl Subsystem for CpuSubsystem {
    fn name(&self) -> &'static str {
        "cpu"
    }

    /// The period is written first: the kernel validates a new quota
    /// against the current period.
    fn configure(&self, group_dir: &Path, config: &ResourceConfig) -> Result<()> {
        if let Some(period) = config.cpu_period {
            write_control(self.name(), &group_dir.join(PERIOD_FILE), &period.to_string())?;
        }
        if let Some(quota) = config.cpu_quota {
            write_control(self.name(), &group_dir.join(QUOTA_FILE), &quota.to_string())?;
        }
        Ok(())
    }
}
