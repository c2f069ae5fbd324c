//! In-memory VM control for testing.
//!
//! Keeps a table of instances, records every call and can be told to fail
//! specific operations, making lifecycle tests deterministic without a
//! Multipass installation.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::types::{InstanceInfo, LaunchRequest, LiveConfig};
use super::{ControlError, VmControl};
use crate::size::to_canonical_bytes;

const GIB: f64 = (1u64 << 30) as f64;

/// One instance known to the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockInstance {
    pub info: InstanceInfo,
    pub live: LiveConfig,
}

#[derive(Debug, Default)]
struct MockState {
    instances: BTreeMap<String, MockInstance>,
    calls: Vec<String>,
    launch_error: Option<String>,
    delete_error: Option<String>,
    info_error: Option<String>,
    live_config_error: Option<String>,
    launched: usize,
}

/// A test double for [`VmControl`]
#[derive(Debug, Default)]
pub struct MockControl {
    state: Mutex<MockState>,
}

impl MockControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock with one instance already running
    pub fn with_instance(name: &str, cpus: u32, memory: &str, disk: &str) -> Self {
        let mock = Self::new();
        mock.insert(
            name,
            MockInstance {
                info: InstanceInfo {
                    name: name.to_string(),
                    ipv4: Some("192.168.64.2".to_string()),
                    state: "Running".to_string(),
                    image: Some("22.04 LTS".to_string()),
                    image_hash: Some("mock-image-hash".to_string()),
                },
                live: LiveConfig {
                    cpus: Some(cpus),
                    memory: Some(memory.to_string()),
                    disk: Some(disk.to_string()),
                },
            },
        );
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, name: &str, instance: MockInstance) {
        self.lock().instances.insert(name.to_string(), instance);
    }

    /// Remove an instance behind the controller's back
    pub fn remove(&self, name: &str) -> Option<MockInstance> {
        self.lock().instances.remove(name)
    }

    pub fn instance(&self, name: &str) -> Option<MockInstance> {
        self.lock().instances.get(name).cloned()
    }

    /// Change live resources, as if someone ran `multipass set`
    pub fn set_live_config(&self, name: &str, live: LiveConfig) {
        if let Some(instance) = self.lock().instances.get_mut(name) {
            instance.live = live;
        }
    }

    pub fn fail_launch(&self, stderr: &str) {
        self.lock().launch_error = Some(stderr.to_string());
    }

    pub fn fail_delete(&self, stderr: &str) {
        self.lock().delete_error = Some(stderr.to_string());
    }

    pub fn fail_info(&self, stderr: &str) {
        self.lock().info_error = Some(stderr.to_string());
    }

    pub fn fail_live_config(&self, stderr: &str) {
        self.lock().live_config_error = Some(stderr.to_string());
    }

    /// Every call made, in order, as "<operation> <name>"
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }
}

fn failure(command: String, stderr: &str) -> ControlError {
    ControlError::Failed {
        command,
        status: Some(2),
        stderr: stderr.to_string(),
    }
}

/// Render a requested size the way `multipass get` reports it, e.g. "2.0GiB"
fn reported_size(literal: &str) -> Option<String> {
    let bytes = to_canonical_bytes(literal).ok()?;
    Some(format!("{:.1}GiB", bytes as f64 / GIB))
}

impl VmControl for MockControl {
    async fn launch(&self, request: &LaunchRequest) -> Result<(), ControlError> {
        let mut state = self.lock();
        let command = format!("launch {}", request.name);
        state.calls.push(command.clone());

        if let Some(stderr) = &state.launch_error {
            return Err(failure(command, stderr));
        }
        if state.instances.contains_key(&request.name) {
            return Err(failure(
                command,
                &format!("instance \"{}\" already exists", request.name),
            ));
        }

        let mut sizes = Vec::new();
        for (requested, default) in [(&request.memory, "1.0GiB"), (&request.disk, "5.0GiB")] {
            match requested {
                Some(literal) => match reported_size(literal) {
                    Some(reported) => sizes.push(reported),
                    None => return Err(failure(command, &format!("invalid size {:?}", literal))),
                },
                None => sizes.push(default.to_string()),
            }
        }
        let disk = sizes.pop();
        let memory = sizes.pop();

        state.launched += 1;
        let instance = MockInstance {
            info: InstanceInfo {
                name: request.name.clone(),
                ipv4: Some(format!("192.168.64.{}", state.launched + 1)),
                state: "Running".to_string(),
                image: Some(request.image.clone().unwrap_or_else(|| "24.04 LTS".to_string())),
                image_hash: Some("mock-image-hash".to_string()),
            },
            live: LiveConfig {
                cpus: Some(request.cpus.unwrap_or(1)),
                memory,
                disk,
            },
        };
        state.instances.insert(request.name.clone(), instance);
        Ok(())
    }

    async fn info(&self, name: &str) -> Result<Option<InstanceInfo>, ControlError> {
        let mut state = self.lock();
        let command = format!("info {}", name);
        state.calls.push(command.clone());

        if let Some(stderr) = &state.info_error {
            return Err(failure(command, stderr));
        }
        Ok(state.instances.get(name).map(|i| i.info.clone()))
    }

    async fn live_config(&self, name: &str) -> Result<LiveConfig, ControlError> {
        let mut state = self.lock();
        let command = format!("get {}", name);
        state.calls.push(command.clone());

        if let Some(stderr) = &state.live_config_error {
            return Err(failure(command, stderr));
        }
        match state.instances.get(name) {
            Some(instance) => Ok(instance.live.clone()),
            None => Err(failure(command, &format!("instance \"{}\" does not exist", name))),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), ControlError> {
        let mut state = self.lock();
        let command = format!("delete {}", name);
        state.calls.push(command.clone());

        if let Some(stderr) = &state.delete_error {
            return Err(failure(command, stderr));
        }
        match state.instances.remove(name) {
            Some(_) => Ok(()),
            None => Err(failure(command, &format!("instance \"{}\" does not exist", name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_size() {
        assert_eq!(reported_size("2GiB").as_deref(), Some("2.0GiB"));
        assert_eq!(reported_size("512MiB").as_deref(), Some("0.5GiB"));
        assert_eq!(reported_size("5XB"), None);
    }

    #[tokio::test]
    async fn test_launch_then_info() {
        let mock = MockControl::new();
        let request = LaunchRequest {
            name: "vm".into(),
            cpus: Some(2),
            memory: Some("2GiB".into()),
            ..LaunchRequest::default()
        };
        mock.launch(&request).await.unwrap();

        let info = mock.info("vm").await.unwrap().unwrap();
        assert_eq!(info.state, "Running");

        let live = mock.live_config("vm").await.unwrap();
        assert_eq!(live.cpus, Some(2));
        assert_eq!(live.memory.as_deref(), Some("2.0GiB"));
        assert_eq!(live.disk.as_deref(), Some("5.0GiB"));

        assert_eq!(mock.calls(), vec!["launch vm", "info vm", "get vm"]);
    }

    #[tokio::test]
    async fn test_duplicate_launch_fails() {
        let mock = MockControl::with_instance("vm", 1, "1.0GiB", "5.0GiB");
        let request = LaunchRequest {
            name: "vm".into(),
            ..LaunchRequest::default()
        };
        assert!(mock.launch(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_instance() {
        let mock = MockControl::new();
        let err = mock.delete("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let mock = MockControl::with_instance("vm", 1, "1.0GiB", "5.0GiB");
        mock.fail_info("daemon unavailable");
        assert!(mock.info("vm").await.is_err());

        mock.fail_live_config("daemon unavailable");
        assert!(mock.live_config("vm").await.is_err());
    }
}
