//! Domain primitive types used across the Nestbox workspace.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MIN_CPU_MICROS, SHORT_ID_LEN};
use crate::error::{NestboxError, Result};

/// Unique identifier for a container instance.
///
/// The identifier doubles as the container's control-group name, so two
/// containers never share resource-control state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random container ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the leading characters of the ID, as shown to users.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0
            .char_indices()
            .nth(SHORT_ID_LEN)
            .map_or(self.0.as_str(), |(idx, _)| &self.0[..idx])
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A memory size in bytes, parsed from human-readable input such as `500m`.
///
/// Suffixes `k`, `m` and `g` are powers of 1024 and may be followed by `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ByteSize(u64);

impl ByteSize {
    /// Creates a size from a raw byte count.
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Returns the size in bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = NestboxError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let body = lower.strip_suffix('b').unwrap_or(&lower);
        let (number, shift) = match body.as_bytes().last() {
            Some(b'k') => (&body[..body.len() - 1], 10),
            Some(b'm') => (&body[..body.len() - 1], 20),
            Some(b'g') => (&body[..body.len() - 1], 30),
            _ => (body, 0),
        };
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NestboxError::config(format!("invalid memory size: {s:?}")));
        }
        let bytes = number
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(1_u64 << shift))
            .ok_or_else(|| NestboxError::config(format!("memory size out of range: {s:?}")))?;
        if bytes == 0 {
            return Err(NestboxError::config("memory size must be greater than 0"));
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address assigned to the container's network interface, with an
/// optional prefix length (`10.0.0.2/24`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkAddress {
    /// Interface address.
    pub ip: IpAddr,
    /// Prefix length, if given.
    pub prefix: Option<u8>,
}

impl FromStr for NetworkAddress {
    type Err = NestboxError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || NestboxError::config(format!("invalid network address: {s:?}"));
        let (ip, prefix) = match s.split_once('/') {
            Some((ip, prefix)) => (ip, Some(prefix.parse::<u8>().map_err(|_| invalid())?)),
            None => (s, None),
        };
        let ip: IpAddr = ip.parse().map_err(|_| invalid())?;
        let max_prefix = if ip.is_ipv4() { 32 } else { 128 };
        if prefix.is_some_and(|p| p > max_prefix) {
            return Err(invalid());
        }
        Ok(Self { ip, prefix })
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(prefix) => write!(f, "{}/{prefix}", self.ip),
            None => write!(f, "{}", self.ip),
        }
    }
}

/// Resource constraints for one container.
///
/// Every field is independently optional; an unset field never causes a
/// control-file write. `memory_oom_keep == false` counts as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Memory ceiling.
    pub memory_limit: Option<ByteSize>,
    /// Keep the process alive (instead of OOM-killing it) above the ceiling.
    pub memory_oom_keep: bool,
    /// CFS scheduling period in microseconds.
    pub cpu_period: Option<u64>,
    /// CFS quota per period in microseconds.
    pub cpu_quota: Option<u64>,
}

impl ResourceConfig {
    /// Returns `true` if no constraint is set.
    #[must_use]
    pub const fn is_unconstrained(&self) -> bool {
        self.memory_limit.is_none()
            && !self.memory_oom_keep
            && self.cpu_period.is_none()
            && self.cpu_quota.is_none()
    }

    /// Checks that every set field is within the range the kernel accepts.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending field.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("cpu_period", self.cpu_period), ("cpu_quota", self.cpu_quota)] {
            match value {
                Some(us) if us < MIN_CPU_MICROS => {
                    return Err(NestboxError::config(format!(
                        "{name} must be at least {MIN_CPU_MICROS}us, got {us}us"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Where the container's root filesystem comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RootSource {
    /// Extract `archive` and compose a layered root under `root_dir`.
    Image {
        /// Absolute path of the image archive.
        archive: PathBuf,
        /// Directory that will hold the layered root. Must not exist yet.
        root_dir: PathBuf,
    },
    /// Use an already-materialized root directory as-is.
    Prepared(PathBuf),
}

/// Immutable description of the container to boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container identifier, also used as the control-group name.
    pub id: ContainerId,
    /// Root filesystem source.
    pub root: RootSource,
    /// Resource constraints.
    pub resources: ResourceConfig,
    /// Address to assign inside a fresh network namespace.
    pub network: Option<NetworkAddress>,
    /// Hostname inside the UTS namespace; defaults to the short ID.
    pub hostname: Option<String>,
}

impl ContainerSpec {
    /// Creates a spec with no resource constraints and no networking.
    #[must_use]
    pub fn new(id: ContainerId, root: RootSource) -> Self {
        Self {
            id,
            root,
            resources: ResourceConfig::default(),
            network: None,
            hostname: None,
        }
    }

    /// Hostname the container will see.
    #[must_use]
    pub fn hostname(&self) -> &str {
        self.hostname.as_deref().unwrap_or_else(|| self.id.short())
    }

    /// Validates the spec before anything touches the host.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the id cannot name a control group,
    /// the image path is relative, the hostname is unusable, or a resource
    /// field is out of range.
    pub fn validate(&self) -> Result<()> {
        let id = self.id.as_str();
        if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\0']) {
            return Err(NestboxError::config(format!(
                "container id must be a single path segment: {id:?}"
            )));
        }
        match &self.root {
            RootSource::Image { archive, .. } if !archive.is_absolute() => {
                return Err(NestboxError::config(format!(
                    "image path must be absolute: {}",
                    archive.display()
                )));
            }
            RootSource::Image { .. } | RootSource::Prepared(_) => {}
        }
        let hostname = self.hostname();
        if hostname.is_empty() || hostname.len() > 64 {
            return Err(NestboxError::config(format!(
                "hostname must be 1-64 bytes: {hostname:?}"
            )));
        }
        self.resources.validate()
    }
}
