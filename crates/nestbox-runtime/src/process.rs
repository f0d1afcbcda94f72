//! Process spawning inside isolated namespaces.
//!
//! Clones the container's init process into fresh UTS, PID, mount and
//! (optionally) network namespaces. The child sets its hostname, then
//! holds until the parent has placed it in its control groups and
//! released it. Only then does it switch to the container root, mount its
//! own `/proc` and replace itself with the configured shell.

use std::convert::Infallible;
use std::ffi::CString;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use nix::unistd::Pid;

use nestbox_common::config::RuntimeConfig;
use nestbox_common::error::{NestboxError, Result};
use nestbox_common::types::{ContainerSpec, RootSource};
use nestbox_core::filesystem::{Composer, OverlayMount, TarCommand};
use nestbox_core::namespace::NamespaceConfig;

use crate::container::ContainerProcess;

/// Exit status of an init process that failed before `exec`.
const INIT_FAILURE: isize = 1;

/// Byte the parent sends to let the child continue.
const RELEASE: u8 = b'R';

/// Byte the child sends when its initialization failed.
const FAILED: u8 = b'F';

/// Creates the container's init process.
pub trait Spawner: Send + Sync {
    /// Launches `spec` and returns the process as seen from the host.
    ///
    /// The process must not run the container's shell before
    /// [`Spawner::release`] is called for it.
    ///
    /// # Errors
    ///
    /// Returns [`NestboxError::Spawn`] if the process cannot be created.
    fn spawn(&self, spec: &ContainerSpec) -> Result<ContainerProcess>;

    /// Lets a spawned process continue once its constraints are in place.
    ///
    /// # Errors
    ///
    /// Returns [`NestboxError::ContainerInit`] if the process failed before
    /// running its shell.
    fn release(&self, process: &mut ContainerProcess) -> Result<()> {
        process.release()
    }
}

/// Parent's ends of the start handshake with a held init process.
#[derive(Debug)]
pub(crate) struct StartGate {
    go: File,
    report: File,
}

/// Child's ends of the start handshake.
struct ChildGate {
    go: File,
    report: File,
}

/// Opens the two close-on-exec pipes of a start handshake.
fn start_gate() -> Result<(StartGate, ChildGate)> {
    use nix::fcntl::OFlag;
    use nix::unistd::pipe2;

    let spawn_error = |e: nix::Error| NestboxError::Spawn { source: e.into() };
    let (go_read, go_write) = pipe2(OFlag::O_CLOEXEC).map_err(spawn_error)?;
    let (report_read, report_write) = pipe2(OFlag::O_CLOEXEC).map_err(spawn_error)?;
    Ok((
        StartGate {
            go: File::from(go_write),
            report: File::from(report_read),
        },
        ChildGate {
            go: File::from(go_read),
            report: File::from(report_write),
        },
    ))
}

impl StartGate {
    fn raw_fds(&self) -> [RawFd; 2] {
        [self.go.as_raw_fd(), self.report.as_raw_fd()]
    }

    /// Releases the child and waits for the outcome of its initialization.
    ///
    /// The report pipe reaches end-of-file when the child's `exec` closes
    /// it, and carries [`FAILED`] when initialization failed instead.
    pub(crate) fn open(self, pid: Pid) -> Result<()> {
        match write_byte(&self.go, RELEASE) {
            // A child that already died cannot read; its report says why.
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Err(source) => return Err(NestboxError::Spawn { source }),
        }
        drop(self.go);

        match read_byte(&self.report) {
            Ok(None) => {
                tracing::debug!(%pid, "container released");
                Ok(())
            }
            Ok(Some(_)) => Err(NestboxError::ContainerInit { pid: pid.as_raw() }),
            Err(source) => Err(NestboxError::Spawn { source }),
        }
    }
}

impl ChildGate {
    /// Blocks until the parent sends [`RELEASE`]. End-of-file means the
    /// parent went away without releasing.
    fn wait_for_release(&self) -> Result<()> {
        match read_byte(&self.go) {
            Ok(Some(RELEASE)) => Ok(()),
            Ok(_) => Err(NestboxError::Spawn {
                source: io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "supervisor exited before releasing the container",
                ),
            }),
            Err(source) => Err(NestboxError::Spawn { source }),
        }
    }

    fn report_failure(&self) {
        if let Err(e) = write_byte(&self.report, FAILED) {
            tracing::warn!(error = %e, "could not report init failure");
        }
    }
}

fn write_byte(mut pipe: &File, byte: u8) -> io::Result<()> {
    pipe.write_all(&[byte])
}

/// Reads one byte, retrying on `EINTR`. `None` means end-of-file.
fn read_byte(mut pipe: &File) -> io::Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match pipe.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

/// Launches containers with `clone(2)`.
pub struct Launcher {
    shell: PathBuf,
    stack_size: usize,
    composer: Composer,
}

impl Launcher {
    /// Builds a launcher from the runtime configuration.
    #[must_use]
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            stack_size: config.stack_size,
            composer: Composer::new(
                Box::new(TarCommand::new(config.extract_tool.clone())),
                Box::new(OverlayMount),
            ),
        }
    }

    /// The program the init process runs.
    #[must_use]
    pub fn shell(&self) -> &Path {
        &self.shell
    }
}

impl Spawner for Launcher {
    fn spawn(&self, spec: &ContainerSpec) -> Result<ContainerProcess> {
        use nix::sched::clone;

        let flags = NamespaceConfig::for_container(spec.network.is_some()).to_clone_flags();
        let shell = shell_cstring(&self.shell)?;
        let (gate, child_gate) = start_gate()?;
        let parent_fds = gate.raw_fds();
        let composer = &self.composer;
        let shell = &shell;
        let mut stack = vec![0u8; self.stack_size];

        // Dropped in the parent once `clone` returns, which closes the
        // parent's copies of the child's pipe ends.
        let child = Box::new(move || {
            for fd in parent_fds {
                // SAFETY: these descriptors belong to the parent's
                // `StartGate`; the child never uses its copies.
                let _ = unsafe { libc::close(fd) };
            }
            match init_container(spec, shell, composer, &child_gate) {
                Ok(never) => match never {},
                Err(e) => {
                    tracing::error!(error = %e, "container init failed");
                    child_gate.report_failure();
                    INIT_FAILURE
                }
            }
        });

        // SAFETY: the child only runs `init_container`, which execs or
        // returns; the stack outlives the call and is not shared.
        let pid = unsafe { clone(child, &mut stack, flags, Some(libc::SIGCHLD)) }
            .map_err(|e| NestboxError::Spawn { source: e.into() })?;

        tracing::info!(%pid, id = %spec.id, ?flags, "container process launched");
        Ok(ContainerProcess::new(pid, flags).with_gate(gate))
    }
}

fn shell_cstring(shell: &Path) -> Result<CString> {
    CString::new(shell.as_os_str().as_bytes()).map_err(|_| {
        NestboxError::config(format!("shell path contains a NUL byte: {}", shell.display()))
    })
}

/// Runs inside the new namespaces. Returns only on failure.
fn init_container(
    spec: &ContainerSpec,
    shell: &CString,
    composer: &Composer,
    gate: &ChildGate,
) -> Result<Infallible> {
    use nestbox_core::filesystem::{mount, pivot_root};
    use nestbox_core::namespace::set_hostname;

    set_hostname(spec.hostname())?;
    mount::make_mounts_private()?;

    let new_root = match &spec.root {
        RootSource::Prepared(path) => path.clone(),
        RootSource::Image { archive, root_dir } => composer.build(archive, root_dir)?.mount_point(),
    };

    gate.wait_for_release()?;

    pivot_root::switch_root(&new_root)?;
    mount::mount_proc(Path::new("/proc"))?;

    tracing::debug!(shell = ?shell, "exec container shell");
    nix::unistd::execv(shell, &[shell]).map_err(|e| NestboxError::Syscall {
        operation: "execv",
        path: PathBuf::from(shell.to_string_lossy().into_owned()),
        source: e.into(),
    })
}
