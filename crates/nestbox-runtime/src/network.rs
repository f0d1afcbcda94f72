//! Network attachment for containers launched with their own network stack.

use nix::unistd::Pid;

use nestbox_common::error::Result;
use nestbox_common::types::NetworkAddress;

/// Wires a network interface into a container's network namespace.
pub trait NetworkAttacher: Send + Sync {
    /// Gives the namespace of `pid` an interface configured with `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the attachment did not succeed.
    fn attach(&self, pid: Pid, address: &NetworkAddress) -> Result<()>;
}

/// Delegates attachment to an external program invoked as
/// `<program> <pid> <address>`.
#[derive(Debug, Clone)]
pub struct CommandAttacher {
    program: String,
}

impl CommandAttacher {
    /// Uses `program` as the attach tool.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments passed to the attach tool.
    fn args(pid: Pid, address: &NetworkAddress) -> [String; 2] {
        [pid.to_string(), address.to_string()]
    }
}

impl NetworkAttacher for CommandAttacher {
    fn attach(&self, pid: Pid, address: &NetworkAddress) -> Result<()> {
        nestbox_core::tool::run(&self.program, Self::args(pid, address))?;
        tracing::info!(%pid, %address, tool = %self.program, "network attached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nestbox_common::error::NestboxError;

    use super::*;

    #[test]
    fn args_are_pid_then_address() {
        let address: NetworkAddress = "10.0.0.2/24".parse().unwrap();
        let args = CommandAttacher::args(Pid::from_raw(812), &address);
        assert_eq!(args, ["812".to_string(), "10.0.0.2/24".to_string()]);
    }

    #[test]
    fn missing_tool_is_an_external_tool_error() {
        let attacher = CommandAttacher::new("nestbox-no-such-netns-tool");
        let address: NetworkAddress = "10.0.0.2".parse().unwrap();

        let err = attacher.attach(Pid::from_raw(1), &address).unwrap_err();

        assert!(matches!(err, NestboxError::ExternalTool { .. }));
    }

    #[test]
    fn failing_tool_status_is_reported() {
        if which::which("false").is_err() {
            return;
        }
        let attacher = CommandAttacher::new("false");
        let address: NetworkAddress = "10.0.0.2".parse().unwrap();

        let err = attacher.attach(Pid::from_raw(1), &address).unwrap_err();

        assert!(matches!(err, NestboxError::ExternalTool { ref tool, .. } if tool == "false"));
    }
}
