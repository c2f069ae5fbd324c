//! Multipass VM control
//!
//! This module provides the control interface the lifecycle controller drives:
//! - `VmControl` - launch, info, live config and delete over a named instance
//! - `MultipassCli` - production implementation shelling out to `multipass`
//! - `MockControl` - in-memory implementation for tests

pub mod cli;
pub mod mock;
pub mod types;

use std::fmt;

pub use cli::MultipassCli;
pub use mock::{MockControl, MockInstance};
pub use types::*;

/// Operations over a named Multipass instance
///
/// Each call runs to completion before returning; implementations do not
/// retry and do not apply timeouts of their own.
#[allow(async_fn_in_trait)]
pub trait VmControl {
    /// Launch a new instance
    async fn launch(&self, request: &LaunchRequest) -> Result<(), ControlError>;

    /// Look up an instance. `Ok(None)` means no such instance.
    async fn info(&self, name: &str) -> Result<Option<InstanceInfo>, ControlError>;

    /// Fetch the instance's live resource settings
    async fn live_config(&self, name: &str) -> Result<LiveConfig, ControlError>;

    /// Delete and purge an instance
    async fn delete(&self, name: &str) -> Result<(), ControlError>;
}

/// Error type for VM control operations
#[derive(Debug)]
pub enum ControlError {
    /// The control command could not be started
    Spawn {
        command: String,
        source: std::io::Error,
    },
    /// The control command ran and reported failure
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    /// The control command succeeded but its output made no sense
    Parse { command: String, message: String },
}

impl ControlError {
    /// Whether Multipass said the instance does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            ControlError::Failed { stderr, .. } => stderr.contains("does not exist"),
            _ => false,
        }
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Spawn { command, source } => {
                write!(f, "failed to run `{}`: {}", command, source)
            }
            ControlError::Failed {
                command,
                status: Some(code),
                stderr,
            } => write!(f, "`{}` exited with status {}: {}", command, code, stderr),
            ControlError::Failed { command, stderr, .. } => {
                write!(f, "`{}` was terminated: {}", command, stderr)
            }
            ControlError::Parse { command, message } => {
                write!(f, "unexpected output from `{}`: {}", command, message)
            }
        }
    }
}

impl std::error::Error for ControlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ControlError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = ControlError::Failed {
            command: "multipass info ghost --format json".into(),
            status: Some(2),
            stderr: "info failed: instance \"ghost\" does not exist".into(),
        };
        assert!(err.is_not_found());

        let err = ControlError::Failed {
            command: "multipass info vm --format json".into(),
            status: Some(1),
            stderr: "cannot connect to the multipass socket".into(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_display_includes_stderr() {
        let err = ControlError::Failed {
            command: "multipass launch --name vm".into(),
            status: Some(2),
            stderr: "launch failed: not enough disk".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("multipass launch --name vm"));
        assert!(msg.contains("status 2"));
        assert!(msg.contains("not enough disk"));
    }
}
