//! Multipass request and response structures
//!
//! `LaunchRequest` becomes `multipass launch` arguments; `InfoOutput` mirrors
//! the JSON printed by `multipass info --format json`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Parameters for `multipass launch`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchRequest {
    pub name: String,
    pub image: Option<String>,
    pub cpus: Option<u32>,
    pub memory: Option<String>,
    pub disk: Option<String>,
    pub cloud_init_file: Option<String>,
    pub network: Option<String>,
    pub bridged: bool,
}

impl LaunchRequest {
    /// Command-line arguments after the `multipass` binary
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["launch".to_string()];

        if let Some(image) = &self.image {
            args.push(image.clone());
        }
        args.push("--name".to_string());
        args.push(self.name.clone());

        if let Some(cpus) = self.cpus {
            args.push("--cpus".to_string());
            args.push(cpus.to_string());
        }
        if let Some(memory) = &self.memory {
            args.push("--memory".to_string());
            args.push(memory.clone());
        }
        if let Some(disk) = &self.disk {
            args.push("--disk".to_string());
            args.push(disk.clone());
        }
        if let Some(file) = &self.cloud_init_file {
            args.push("--cloud-init".to_string());
            args.push(file.clone());
        }
        if let Some(network) = &self.network {
            args.push("--network".to_string());
            args.push(network.clone());
        }
        if self.bridged {
            args.push("--bridged".to_string());
        }

        args
    }
}

/// What `multipass info` says about an instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub name: String,
    pub ipv4: Option<String>,
    /// e.g. "Running", "Stopped", "Suspended"
    pub state: String,
    pub image: Option<String>,
    pub image_hash: Option<String>,
}

/// Resource settings from `multipass get local.<name>.*`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveConfig {
    pub cpus: Option<u32>,
    /// As reported, e.g. "1.0GiB"
    pub memory: Option<String>,
    pub disk: Option<String>,
}

/// Top-level JSON from `multipass info --format json`
#[derive(Debug, Deserialize)]
pub struct InfoOutput {
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
    #[serde(default)]
    pub info: HashMap<String, InfoEntry>,
}

/// One instance in `InfoOutput`
#[derive(Debug, Deserialize)]
pub struct InfoEntry {
    #[serde(default)]
    pub ipv4: Vec<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub image_hash: String,
    #[serde(default)]
    pub image_release: String,
    #[serde(default)]
    pub release: String,
}

impl InfoEntry {
    pub fn into_info(self, name: &str) -> InstanceInfo {
        let image = if !self.image_release.is_empty() {
            Some(self.image_release)
        } else if !self.release.is_empty() {
            Some(self.release)
        } else {
            None
        };

        InstanceInfo {
            name: name.to_string(),
            ipv4: self.ipv4.into_iter().next(),
            state: self.state,
            image,
            image_hash: Some(self.image_hash).filter(|h| !h.is_empty()),
        }
    }
}
