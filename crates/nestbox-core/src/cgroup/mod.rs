//! Cgroups v1 resource management.
//!
//! Every subsystem has its own hierarchy at `<cgroup_root>/<subsystem>`,
//! and a container's group is the directory `<subsystem>/<group>` in each
//! of them. The [`ResourceController`] drives the subsystems in a fixed
//! order (memory, then CPU) so control-file writes are deterministic.

pub mod cpu;
pub mod memory;

use std::path::{Path, PathBuf};

use nix::unistd::Pid;

use nestbox_common::error::{NestboxError, Result};
use nestbox_common::types::ResourceConfig;

pub use cpu::CpuSubsystem;
pub use memory::MemorySubsystem;

/// Control file listing the pids that belong to a group.
pub const TASKS_FILE: &str = "tasks";

/// One resource category managed independently within a control group.
pub trait Subsystem: Send + Sync {
    /// Name of the subsystem hierarchy under the cgroup root.
    fn name(&self) -> &'static str;

    /// Writes the fields of `config` this subsystem owns into `group_dir`.
    ///
    /// Unset fields must not cause a write.
    ///
    /// # Errors
    ///
    /// Returns [`NestboxError::Subsystem`] if a control file rejects the value.
    fn configure(&self, group_dir: &Path, config: &ResourceConfig) -> Result<()>;

    /// Registers `pid` as a member of the group at `group_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`NestboxError::Subsystem`] if the tasks file rejects the pid.
    fn attach(&self, group_dir: &Path, pid: Pid) -> Result<()> {
        write_control(self.name(), &group_dir.join(TASKS_FILE), &pid.to_string())
    }
}

/// Writes `value` to a subsystem control file.
pub(crate) fn write_control(subsystem: &'static str, file: &Path, value: &str) -> Result<()> {
    std::fs::write(file, value).map_err(|e| NestboxError::Subsystem {
        subsystem,
        file: file.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(subsystem, file = %file.display(), value, "control file written");
    Ok(())
}

/// Creates and populates a named control group across all subsystems.
pub struct ResourceController {
    root: PathBuf,
    subsystems: Vec<Box<dyn Subsystem>>,
}

impl ResourceController {
    /// Creates a controller for the memory and CPU subsystems mounted
    /// under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_subsystems(
            root,
            vec![Box::new(MemorySubsystem), Box::new(CpuSubsystem)],
        )
    }

    /// Creates a controller over an explicit, ordered subsystem list.
    #[must_use]
    pub fn with_subsystems(root: impl Into<PathBuf>, subsystems: Vec<Box<dyn Subsystem>>) -> Self {
        Self {
            root: root.into(),
            subsystems,
        }
    }

    /// Names of the driven subsystems, in application order.
    #[must_use]
    pub fn subsystem_names(&self) -> Vec<&'static str> {
        self.subsystems.iter().map(|s| s.name()).collect()
    }

    /// Directory of `group` inside the hierarchy of `subsystem`.
    #[must_use]
    pub fn group_path(&self, subsystem: &str, group: &str) -> PathBuf {
        self.root.join(subsystem).join(group)
    }

    /// Creates `group` in every subsystem (if absent) and writes the
    /// constraints present in `config`.
    ///
    /// Calling this twice with the same arguments is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the group name or config is invalid, or if a
    /// directory or control file cannot be written.
    pub fn configure(&self, group: &str, config: &ResourceConfig) -> Result<()> {
        validate_group_name(group)?;
        config.validate()?;
        if config.is_unconstrained() {
            tracing::debug!(group, "no limits requested, creating bare groups");
        }
        for subsystem in &self.subsystems {
            let dir = self.group_path(subsystem.name(), group);
            create_group_dir(subsystem.name(), &dir)?;
            subsystem.configure(&dir, config)?;
        }
        tracing::info!(group, subsystems = ?self.subsystem_names(), "control group configured");
        Ok(())
    }

    /// Adds `pid` to `group` in every subsystem.
    ///
    /// # Errors
    ///
    /// Returns [`NestboxError::GroupNotFound`] if the group was never
    /// configured for some subsystem, or a subsystem error if the tasks
    /// file rejects the pid.
    pub fn attach(&self, group: &str, pid: Pid) -> Result<()> {
        validate_group_name(group)?;
        for subsystem in &self.subsystems {
            let dir = self.group_path(subsystem.name(), group);
            if !dir.is_dir() {
                return Err(NestboxError::GroupNotFound {
                    subsystem: subsystem.name(),
                    group: group.to_string(),
                });
            }
            subsystem.attach(&dir, pid)?;
        }
        tracing::info!(group, %pid, "process attached to control group");
        Ok(())
    }

    /// Removes `group` from every subsystem. Missing directories are skipped.
    ///
    /// The kernel only allows this once the group has no member tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if a group directory exists but cannot be removed.
    pub fn remove(&self, group: &str) -> Result<()> {
        validate_group_name(group)?;
        for subsystem in self.subsystems.iter().rev() {
            let dir = self.group_path(subsystem.name(), group);
            match std::fs::remove_dir(&dir) {
                Ok(()) => tracing::debug!(path = %dir.display(), "control group removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(NestboxError::Io { path: dir, source: e }),
            }
        }
        Ok(())
    }
}

fn create_group_dir(subsystem: &'static str, dir: &Path) -> Result<()> {
    match std::fs::create_dir(dir) {
        Ok(()) => {
            tracing::debug!(subsystem, path = %dir.display(), "control group created");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(NestboxError::Subsystem {
            subsystem,
            file: dir.to_path_buf(),
            source: e,
        }),
    }
}

/// A group name is a single path segment under each hierarchy.
fn validate_group_name(group: &str) -> Result<()> {
    if group.is_empty() || group == "." || group == ".." || group.contains('/') || group.contains('\0')
    {
        return Err(NestboxError::config(format!("invalid control group name: {group:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use nestbox_common::types::ByteSize;

    use super::*;

    fn cgroup_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("memory")).unwrap();
        std::fs::create_dir(dir.path().join("cpu")).unwrap();
        dir
    }

    fn read(path: PathBuf) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    fn full_config() -> ResourceConfig {
        ResourceConfig {
            memory_limit: Some("100m".parse().unwrap()),
            memory_oom_keep: true,
            cpu_period: Some(100_000),
            cpu_quota: Some(50_000),
        }
    }

    #[test]
    fn empty_config_creates_bare_groups() {
        let root = cgroup_root();
        let controller = ResourceController::new(root.path());
        controller.configure("c1", &ResourceConfig::default()).unwrap();

        for subsystem in ["memory", "cpu"] {
            let dir = controller.group_path(subsystem, "c1");
            assert!(dir.is_dir());
            assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
        }
    }

    #[test]
    fn configure_writes_limits_to_control_files() {
        let root = cgroup_root();
        let controller = ResourceController::new(root.path());
        controller.configure("c1", &full_config()).unwrap();

        let memory = controller.group_path("memory", "c1");
        let cpu = controller.group_path("cpu", "c1");
        assert_eq!(read(memory.join("memory.limit_in_bytes")), "104857600");
        assert_eq!(read(memory.join("memory.oom_control")), "1");
        assert_eq!(read(cpu.join("cpu.cfs_period_us")), "100000");
        assert_eq!(read(cpu.join("cpu.cfs_quota_us")), "50000");
    }

    #[test]
    fn configure_twice_is_idempotent() {
        let root = cgroup_root();
        let controller = ResourceController::new(root.path());
        controller.configure("c1", &full_config()).unwrap();
        controller.configure("c1", &full_config()).unwrap();

        let memory = controller.group_path("memory", "c1");
        assert_eq!(read(memory.join("memory.limit_in_bytes")), "104857600");
    }

    #[test]
    fn configure_writes_only_present_fields() {
        let root = cgroup_root();
        let controller = ResourceController::new(root.path());
        let config = ResourceConfig {
            memory_limit: Some(ByteSize::from_bytes(4096)),
            ..ResourceConfig::default()
        };
        controller.configure("c1", &config).unwrap();

        assert!(controller.group_path("memory", "c1").join("memory.limit_in_bytes").exists());
        assert!(!controller.group_path("memory", "c1").join("memory.oom_control").exists());
        assert_eq!(std::fs::read_dir(controller.group_path("cpu", "c1")).unwrap().count(), 0);
    }

    #[test]
    fn attach_before_configure_reports_missing_group() {
        let root = cgroup_root();
        let controller = ResourceController::new(root.path());
        let err = controller.attach("c1", Pid::from_raw(4242)).unwrap_err();
        assert!(matches!(
            err,
            NestboxError::GroupNotFound { subsystem: "memory", ref group } if group == "c1"
        ));
    }

    #[test]
    fn attach_registers_pid_in_every_subsystem() {
        let root = cgroup_root();
        let controller = ResourceController::new(root.path());
        controller.configure("c1", &ResourceConfig::default()).unwrap();
        controller.attach("c1", Pid::from_raw(4242)).unwrap();

        for subsystem in ["memory", "cpu"] {
            assert_eq!(read(controller.group_path(subsystem, "c1").join(TASKS_FILE)), "4242");
        }
    }

    #[test]
    fn missing_hierarchy_is_a_subsystem_error() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("memory")).unwrap();
        let controller = ResourceController::new(root.path());
        let err = controller.configure("c1", &ResourceConfig::default()).unwrap_err();
        assert!(matches!(err, NestboxError::Subsystem { subsystem: "cpu", .. }));
    }

    #[test]
    fn remove_deletes_groups_and_tolerates_absence() {
        let root = cgroup_root();
        let controller = ResourceController::new(root.path());
        controller.configure("c1", &ResourceConfig::default()).unwrap();
        controller.remove("c1").unwrap();
        assert!(!controller.group_path("memory", "c1").exists());
        assert!(!controller.group_path("cpu", "c1").exists());
        controller.remove("c1").unwrap();
    }

    #[test]
    fn rejects_group_names_that_escape_the_hierarchy() {
        let root = cgroup_root();
        let controller = ResourceController::new(root.path());
        for name in ["", ".", "..", "a/b"] {
            assert!(controller.configure(name, &ResourceConfig::default()).is_err());
        }
    }

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Subsystem for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn configure(&self, _group_dir: &Path, _config: &ResourceConfig) -> Result<()> {
            self.log.lock().unwrap().push(format!("configure {}", self.name));
            Ok(())
        }

        fn attach(&self, _group_dir: &Path, pid: Pid) -> Result<()> {
            self.log.lock().unwrap().push(format!("attach {} {pid}", self.name));
            Ok(())
        }
    }

    #[test]
    fn subsystems_apply_in_fixed_order() {
        let root = cgroup_root();
        let log = Arc::new(Mutex::new(Vec::new()));
        let controller = ResourceController::with_subsystems(
            root.path(),
            vec![
                Box::new(Recording { name: "memory", log: Arc::clone(&log) }),
                Box::new(Recording { name: "cpu", log: Arc::clone(&log) }),
            ],
        );
        controller.configure("c1", &full_config()).unwrap();
        controller.attach("c1", Pid::from_raw(7)).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["configure memory", "configure cpu", "attach memory 7", "attach cpu 7"]
        );
    }

    #[test]
    fn default_controller_orders_memory_before_cpu() {
        let controller = ResourceController::new("/sys/fs/cgroup");
        assert_eq!(controller.subsystem_names(), vec!["memory", "cpu"]);
    }
}
