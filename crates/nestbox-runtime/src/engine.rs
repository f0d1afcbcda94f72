//! Runtime engine that orchestrates a container's lifecycle.
//!
//! One [`Engine::run`] call owns a single container from root composition
//! to teardown: compose, launch, constrain, attach the network, wait, and
//! clean up.

use std::time::Duration;

use nestbox_common::config::RuntimeConfig;
use nestbox_common::error::{NestboxError, Result};
use nestbox_common::types::{ContainerSpec, RootSource};
use nestbox_core::cgroup::ResourceController;
use nestbox_core::filesystem::{Composer, LayeredRoot, OverlayMount, TarCommand};

use crate::container::ContainerProcess;
use crate::network::{CommandAttacher, NetworkAttacher};
use crate::process::{Launcher, Spawner};
use crate::supervisor;

/// The runtime engine that coordinates all container operations.
pub struct Engine {
    spawner: Box<dyn Spawner>,
    controller: ResourceController,
    composer: Composer,
    network: Box<dyn NetworkAttacher>,
    wait_backoff: Duration,
}

impl Engine {
    /// Creates an engine wired to the host facilities named in `config`.
    #[must_use]
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            spawner: Box::new(Launcher::new(config)),
            controller: ResourceController::new(&config.cgroup_root),
            composer: Composer::new(
                Box::new(TarCommand::new(config.extract_tool.clone())),
                Box::new(OverlayMount),
            ),
            network: Box::new(CommandAttacher::new(config.network_tool.clone())),
            wait_backoff: Duration::from_millis(config.wait_backoff_ms),
        }
    }

    /// Creates an engine from explicit components.
    #[must_use]
    pub fn with_components(
        spawner: Box<dyn Spawner>,
        controller: ResourceController,
        composer: Composer,
        network: Box<dyn NetworkAttacher>,
        wait_backoff: Duration,
    ) -> Self {
        Self {
            spawner,
            controller,
            composer,
            network,
            wait_backoff,
        }
    }

    /// Runs the container described by `spec` until its init process exits.
    ///
    /// Image roots are composed here, before launch, so the host side can
    /// tear them down afterwards. Teardown runs exactly once whether or not
    /// the run succeeded, except when the root directory already existed:
    /// that directory is never touched.
    ///
    /// # Errors
    ///
    /// Returns the first error of the run. If only teardown failed, its
    /// error is returned instead of the exit status.
    pub fn run(&self, spec: &ContainerSpec) -> Result<ContainerProcess> {
        spec.validate()?;
        let group = spec.id.as_str();

        let (launch_spec, composed) = match &spec.root {
            RootSource::Image { archive, root_dir } => {
                match self.composer.build(archive, root_dir) {
                    Ok(layered) => {
                        let mut launch_spec = spec.clone();
                        launch_spec.root = RootSource::Prepared(layered.mount_point());
                        (launch_spec, Some(layered))
                    }
                    Err(e @ NestboxError::RootExists { .. }) => return Err(e),
                    Err(e) => {
                        self.teardown(Some(&LayeredRoot::new(root_dir)), group)
                            .unwrap_or_else(|t| log_teardown_failure(&t));
                        return Err(e);
                    }
                }
            }
            RootSource::Prepared(_) => (spec.clone(), None),
        };

        let outcome = self.supervise(&launch_spec);
        let cleanup = self.teardown(composed.as_ref(), group);

        match (outcome, cleanup) {
            (Ok(process), Ok(())) => Ok(process),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), cleanup) => {
                if let Err(t) = cleanup {
                    log_teardown_failure(&t);
                }
                Err(e)
            }
        }
    }

    /// Launches the process, constrains it, and blocks until it exits.
    ///
    /// The process is held before entering its root and only released once
    /// it sits in its control groups and network namespace.
    fn supervise(&self, spec: &ContainerSpec) -> Result<ContainerProcess> {
        let mut process = self.spawner.spawn(spec)?;

        let setup = self
            .attach(spec, &process)
            .and_then(|()| self.spawner.release(&mut process));
        if let Err(e) = setup {
            tracing::error!(pid = %process.pid, error = %e, "setup failed, killing container");
            process.kill();
            if let Err(w) =
                supervisor::wait_for_exit(process.pid, self.wait_backoff, supervisor::wait_pid)
            {
                tracing::warn!(pid = %process.pid, error = %w, "failed to reap container");
            }
            return Err(e);
        }

        let exit = supervisor::wait_for_exit(process.pid, self.wait_backoff, supervisor::wait_pid)?;
        process.exit = Some(exit);
        Ok(process)
    }

    fn attach(&self, spec: &ContainerSpec, process: &ContainerProcess) -> Result<()> {
        let group = spec.id.as_str();
        self.controller.configure(group, &spec.resources)?;
        self.controller.attach(group, process.pid)?;
        if let Some(address) = &spec.network {
            self.network.attach(process.pid, address)?;
        }
        Ok(())
    }

    /// Removes the composed root, if any, and the control group.
    ///
    /// Both steps are attempted; the first failure is returned.
    fn teardown(&self, layered: Option<&LayeredRoot>, group: &str) -> Result<()> {
        let root = layered.map_or(Ok(()), |layered| self.composer.teardown(layered));
        let cgroup = self.controller.remove(group);
        tracing::info!(group, "container torn down");
        root.and(cgroup)
    }
}

fn log_teardown_failure(error: &NestboxError) {
    tracing::warn!(error = %error, "teardown failed");
}
