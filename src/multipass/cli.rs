//! `multipass` command-line client
//!
//! Every operation is one or more invocations of the `multipass` binary.
//! Output is captured; nothing is inherited from or written to our own
//! stdio, which carries the host protocol.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::types::{InfoOutput, InstanceInfo, LaunchRequest, LiveConfig};
use super::{ControlError, VmControl};

/// Instance state Multipass keeps for deleted but unpurged instances
const DELETED_STATE: &str = "Deleted";

/// Client that drives the `multipass` binary
#[derive(Debug, Clone)]
pub struct MultipassCli {
    binary: PathBuf,
}

impl MultipassCli {
    /// Create a client for the given `multipass` binary
    ///
    /// # Arguments
    /// * `binary` - Path or name of the binary (looked up on PATH if bare)
    pub fn new(binary: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.binary.display(), args.join(" "))
    }

    /// Run `multipass` with the given arguments and return stdout
    async fn run(&self, args: &[String]) -> Result<String, ControlError> {
        let command = self.command_line(args);
        debug!(command = %command, "running multipass");

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ControlError::Spawn {
                command: command.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(ControlError::Failed {
                command,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Read one `local.<name>.<key>` setting
    async fn get(&self, name: &str, key: &str) -> Result<Option<String>, ControlError> {
        let args = vec!["get".to_string(), format!("local.{}.{}", name, key)];
        let value = self.run(&args).await?.trim().to_string();
        Ok(Some(value).filter(|v| !v.is_empty()))
    }
}

impl VmControl for MultipassCli {
    async fn launch(&self, request: &LaunchRequest) -> Result<(), ControlError> {
        self.run(&request.args()).await.map(|_| ())
    }

    async fn info(&self, name: &str) -> Result<Option<InstanceInfo>, ControlError> {
        let args = vec![
            "info".to_string(),
            name.to_string(),
            "--format".to_string(),
            "json".to_string(),
        ];

        let stdout = match self.run(&args).await {
            Ok(stdout) => stdout,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        parse_info(&stdout, name).map_err(|message| ControlError::Parse {
            command: self.command_line(&args),
            message,
        })
    }

    async fn live_config(&self, name: &str) -> Result<LiveConfig, ControlError> {
        let cpus = match self.get(name, "cpus").await? {
            Some(raw) => Some(raw.parse::<u32>().map_err(|e| ControlError::Parse {
                command: self.command_line(&["get".to_string(), format!("local.{}.cpus", name)]),
                message: format!("cpu count {:?}: {}", raw, e),
            })?),
            None => None,
        };

        Ok(LiveConfig {
            cpus,
            memory: self.get(name, "memory").await?,
            disk: self.get(name, "disk").await?,
        })
    }

    async fn delete(&self, name: &str) -> Result<(), ControlError> {
        let args = vec!["delete".to_string(), name.to_string(), "--purge".to_string()];
        self.run(&args).await.map(|_| ())
    }
}

/// Pull one instance out of `multipass info --format json` output.
/// Deleted-but-unpurged instances count as missing.
fn parse_info(stdout: &str, name: &str) -> Result<Option<InstanceInfo>, String> {
    let output: InfoOutput = serde_json::from_str(stdout).map_err(|e| e.to_string())?;
    for error in &output.errors {
        debug!(instance = name, error = %error, "multipass info reported an error");
    }

    Ok(output
        .info
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, entry)| entry.into_info(name))
        .filter(|info| info.state != DELETED_STATE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info_finds_instance() {
        let stdout = r#"{"errors": [], "info": {"vm": {"ipv4": ["10.1.2.3"], "state": "Running"}}}"#;
        let info = parse_info(stdout, "vm").unwrap().unwrap();
        assert_eq!(info.ipv4.as_deref(), Some("10.1.2.3"));
    }

    #[test]
    fn test_parse_info_missing_instance() {
        let stdout = r#"{"errors": [], "info": {"other": {"state": "Running"}}}"#;
        assert_eq!(parse_info(stdout, "vm").unwrap(), None);
    }

    #[test]
    fn test_parse_info_deleted_instance_is_missing() {
        let stdout = r#"{"errors": [], "info": {"vm": {"state": "Deleted"}}}"#;
        assert_eq!(parse_info(stdout, "vm").unwrap(), None);
    }

    #[test]
    fn test_parse_info_with_reported_errors() {
        let stdout = r#"{"errors": ["instance \"ghost\" does not exist"],
                         "info": {"vm": {"ipv4": [], "state": "Stopped"}}}"#;
        let info = parse_info(stdout, "vm").unwrap().unwrap();
        assert_eq!(info.state, "Stopped");
        assert_eq!(parse_info(stdout, "ghost").unwrap(), None);
    }

    #[test]
    fn test_parse_info_garbage() {
        assert!(parse_info("not json", "vm").is_err());
    }

    #[test]
    fn test_command_line() {
        let cli = MultipassCli::new("/usr/local/bin/multipass");
        let line = cli.command_line(&["delete".to_string(), "vm".to_string(), "--purge".to_string()]);
        assert_eq!(line, "/usr/local/bin/multipass delete vm --purge");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let cli = MultipassCli::new("/nonexistent/multipass-binary");
        let err = cli.delete("vm").await.unwrap_err();
        assert!(matches!(err, ControlError::Spawn { .. }));
    }
}
