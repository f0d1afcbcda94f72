//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use nestbox_common::types::{
    ByteSize, ContainerId, ContainerSpec, NetworkAddress, ResourceConfig, RootSource,
};

/// Nestbox: boots one isolated container and waits for its shell to exit.
#[derive(Parser, Debug)]
#[command(name = nestbox_common::constants::APP_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Absolute path of the image archive to extract into a layered root.
    #[arg(short = 'i', long = "image", value_name = "PATH", requires = "root")]
    pub image: Option<PathBuf>,

    /// Target root directory. Without `-i`, an existing root used as-is.
    #[arg(short = 'r', long = "root", value_name = "PATH")]
    pub root: PathBuf,

    /// Memory limit, e.g. `500m` or `200k`.
    #[arg(short = 'm', long = "memory", value_name = "SIZE")]
    pub memory: Option<ByteSize>,

    /// Keep the container alive when it exceeds its memory limit.
    #[arg(short = 'k', long = "oom-keep")]
    pub oom_keep: bool,

    /// CPU scheduling period in microseconds.
    #[arg(
        short = 'c',
        long = "cpu-period",
        value_name = "US",
        value_parser = clap::value_parser!(u64).range(1000..)
    )]
    pub cpu_period: Option<u64>,

    /// CPU quota per period in microseconds.
    #[arg(
        short = 'q',
        long = "cpu-quota",
        value_name = "US",
        value_parser = clap::value_parser!(u64).range(1000..)
    )]
    pub cpu_quota: Option<u64>,

    /// Address to assign inside a fresh network namespace.
    #[arg(short = 'a', long = "address", value_name = "ADDR")]
    pub address: Option<NetworkAddress>,

    /// Container id, also used as the control-group name.
    #[arg(long)]
    pub name: Option<String>,

    /// Hostname inside the container. Defaults to the short container id.
    #[arg(long)]
    pub hostname: Option<String>,

    /// JSON runtime configuration file.
    #[arg(long, value_name = "FILE", env = "NESTBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// How log events are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

impl Cli {
    /// Builds the container spec described by the flags.
    #[must_use]
    pub fn to_spec(&self) -> ContainerSpec {
        let id = self
            .name
            .as_ref()
            .map_or_else(ContainerId::generate, ContainerId::new);
        let root = match &self.image {
            Some(archive) => RootSource::Image {
                archive: archive.clone(),
                root_dir: self.root.clone(),
            },
            None => RootSource::Prepared(self.root.clone()),
        };
        let mut spec = ContainerSpec::new(id, root);
        spec.resources = ResourceConfig {
            memory_limit: self.memory,
            memory_oom_keep: self.oom_keep,
            cpu_period: self.cpu_period,
            cpu_quota: self.cpu_quota,
        };
        spec.network = self.address;
        spec.hostname.clone_from(&self.hostname);
        spec
    }
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("nestbox").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn full_flag_set_builds_image_spec() {
        let cli = parse(&[
            "-i", "/images/alpine.tar", "-r", "/tmp/c1", "-m", "100m", "-c", "100000", "-q",
            "50000", "-a", "10.0.0.2/24", "--name", "web",
        ])
        .unwrap();

        let spec = cli.to_spec();

        assert_eq!(spec.id.as_str(), "web");
        assert_eq!(
            spec.root,
            RootSource::Image {
                archive: PathBuf::from("/images/alpine.tar"),
                root_dir: PathBuf::from("/tmp/c1"),
            }
        );
        assert_eq!(spec.resources.memory_limit.map(ByteSize::bytes), Some(104_857_600));
        assert_eq!(spec.resources.cpu_period, Some(100_000));
        assert_eq!(spec.resources.cpu_quota, Some(50_000));
        assert!(!spec.resources.memory_oom_keep);
        let address = spec.network.as_ref().map(ToString::to_string);
        assert_eq!(address.as_deref(), Some("10.0.0.2/24"));
    }

    #[test]
    fn root_alone_is_a_prepared_root() {
        let spec = parse(&["-r", "/srv/rootfs", "-k"]).unwrap().to_spec();
        assert_eq!(spec.root, RootSource::Prepared(PathBuf::from("/srv/rootfs")));
        assert!(spec.resources.memory_oom_keep);
        assert!(spec.network.is_none());
    }

    #[test]
    fn generated_id_drives_default_hostname() {
        let spec = parse(&["-r", "/srv/rootfs"]).unwrap().to_spec();
        assert_eq!(spec.hostname(), spec.id.short());

        let named = parse(&["-r", "/srv/rootfs", "--hostname", "box"]).unwrap().to_spec();
        assert_eq!(named.hostname(), "box");
    }

    #[test]
    fn image_requires_root() {
        let err = parse(&["-i", "/images/alpine.tar"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn cpu_values_below_minimum_are_rejected() {
        let err = parse(&["-r", "/tmp/c1", "-c", "999"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(parse(&["-r", "/tmp/c1", "-q", "10"]).is_err());
    }

    #[test]
    fn malformed_sizes_and_addresses_are_rejected() {
        assert!(parse(&["-r", "/tmp/c1", "-m", "lots"]).is_err());
        assert!(parse(&["-r", "/tmp/c1", "-m", "0"]).is_err());
        assert!(parse(&["-r", "/tmp/c1", "-a", "10.0.0.2; reboot"]).is_err());
    }

    #[test]
    fn unknown_flag_is_reported() {
        let err = parse(&["-r", "/tmp/c1", "-z"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        assert!(err.to_string().contains("-z"));
    }

    #[test]
    fn help_is_not_an_error_exit() {
        let err = parse(&["-h"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }
}
