//! Boots the container described on the command line.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use nestbox_common::config::RuntimeConfig;
use nestbox_runtime::container::ChildExit;
use nestbox_runtime::engine::Engine;

use crate::cli::Cli;

/// Runs the container and maps its termination to this process's exit code.
///
/// # Errors
///
/// Returns an error if the configuration is unusable or any part of the
/// container lifecycle fails.
pub fn execute(cli: &Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    let spec = cli.to_spec();

    // The terminal's interrupt reaches the container's shell too; the
    // supervisor must outlive it to tear down.
    ctrlc::set_handler(|| tracing::debug!("interrupt received, waiting for container"))
        .context("failed to set Ctrl+C handler")?;

    tracing::info!(
        id = %spec.id,
        hostname = spec.hostname(),
        shell = %config.shell.display(),
        "starting container"
    );
    let engine = Engine::new(&config);
    let process = engine
        .run(&spec)
        .with_context(|| format!("container {} failed", spec.id.short()))?;

    let exit = process.exit.unwrap_or(ChildExit::Vanished);
    tracing::info!(id = %spec.id, code = exit.code(), "container finished");
    Ok(ExitCode::from(exit_status(exit)))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    }
    .with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Codes outside `0..=255` cannot be reported faithfully and become 1.
fn exit_status(exit: ChildExit) -> u8 {
    u8::try_from(exit.code()).unwrap_or(1)
}
