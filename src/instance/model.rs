//! Instance records
//!
//! Three shapes of the same instance:
//!
//! - [`DeclaredSpec`] - what the caller asked for
//! - [`ObservedState`] - what Multipass reports right now
//! - [`ReconciledRecord`] - what gets persisted as current truth
//!
//! Unset optional attributes are `None` everywhere and serialize as `null`.
//! Every attribute is addressable through [`Field`] so drift policy can be
//! applied field by field.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::multipass::{InstanceInfo, LiveConfig};

/// Attribute of an instance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Image,
    Cpus,
    Memory,
    Disk,
    #[serde(rename = "cloudinit_file")]
    CloudInitFile,
    Network,
    Bridged,
    Ipv4,
}

impl Field {
    /// Every field, in schema order
    pub const ALL: [Field; 9] = [
        Field::Name,
        Field::Image,
        Field::Cpus,
        Field::Memory,
        Field::Disk,
        Field::CloudInitFile,
        Field::Network,
        Field::Bridged,
        Field::Ipv4,
    ];

    /// Attribute name as exposed to the host
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Image => "image",
            Field::Cpus => "cpus",
            Field::Memory => "memory",
            Field::Disk => "disk",
            Field::CloudInitFile => "cloudinit_file",
            Field::Network => "network",
            Field::Bridged => "bridged",
            Field::Ipv4 => "ipv4",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attribute value, typed by what the attribute holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Count(u32),
    Flag(bool),
}

/// The caller's desired configuration for an instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredSpec {
    /// Instance name, the external identity
    pub name: String,
    /// Image alias, release or URL; Multipass picks the current LTS if unset
    pub image: Option<String>,
    pub cpus: Option<u32>,
    /// Memory size literal, e.g. "2GiB"
    pub memory: Option<String>,
    /// Disk size literal, e.g. "10GiB"
    pub disk: Option<String>,
    /// Path to a cloud-init user-data file
    #[serde(rename = "cloudinit_file")]
    pub cloud_init_file: Option<String>,
    /// Network spec passed to `--network`
    pub network: Option<String>,
    /// Attach to the configured bridged network
    pub bridged: Option<bool>,
}

impl DeclaredSpec {
    /// A spec with only a name; everything else deferred to Multipass defaults
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declared value of a field. `Ipv4` is never declared.
    pub fn get(&self, field: Field) -> Option<Value> {
        match field {
            Field::Name => Some(Value::Text(self.name.clone())),
            Field::Image => self.image.clone().map(Value::Text),
            Field::Cpus => self.cpus.map(Value::Count),
            Field::Memory => self.memory.clone().map(Value::Text),
            Field::Disk => self.disk.clone().map(Value::Text),
            Field::CloudInitFile => self.cloud_init_file.clone().map(Value::Text),
            Field::Network => self.network.clone().map(Value::Text),
            Field::Bridged => self.bridged.map(Value::Flag),
            Field::Ipv4 => None,
        }
    }
}

/// A live snapshot of an instance, assembled from `info` and the live config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservedState {
    pub name: String,
    pub ipv4: Option<String>,
    /// Lifecycle state as reported, e.g. "Running" or "Stopped"
    pub state: String,
    pub image: Option<String>,
    pub image_hash: Option<String>,
    pub cpus: Option<u32>,
    pub memory: Option<String>,
    pub disk: Option<String>,
}

impl ObservedState {
    pub fn new(name: impl Into<String>, info: InstanceInfo, live: LiveConfig) -> Self {
        Self {
            name: name.into(),
            ipv4: info.ipv4,
            state: info.state,
            image: info.image,
            image_hash: info.image_hash,
            cpus: live.cpus,
            memory: live.memory,
            disk: live.disk,
        }
    }

    /// Observed value of a field. Fields Multipass cannot report back
    /// (image spelling, cloud-init, network options) are `None`.
    pub fn get(&self, field: Field) -> Option<Value> {
        match field {
            Field::Name => Some(Value::Text(self.name.clone())),
            Field::Cpus => self.cpus.map(Value::Count),
            Field::Memory => self.memory.clone().map(Value::Text),
            Field::Disk => self.disk.clone().map(Value::Text),
            Field::Ipv4 => self.ipv4.clone().map(Value::Text),
            Field::Image | Field::CloudInitFile | Field::Network | Field::Bridged => None,
        }
    }
}

/// The persisted current truth for an instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledRecord {
    pub name: String,
    pub image: Option<String>,
    pub cpus: Option<u32>,
    pub memory: Option<String>,
    pub disk: Option<String>,
    #[serde(rename = "cloudinit_file")]
    pub cloud_init_file: Option<String>,
    pub network: Option<String>,
    pub bridged: Option<bool>,
    /// First IPv4 address; only known after a read
    pub ipv4: Option<String>,
}

impl ReconciledRecord {
    /// The record right after launch: the declared spec, nothing observed yet
    pub fn from_declared(spec: DeclaredSpec) -> Self {
        Self {
            name: spec.name,
            image: spec.image,
            cpus: spec.cpus,
            memory: spec.memory,
            disk: spec.disk,
            cloud_init_file: spec.cloud_init_file,
            network: spec.network,
            bridged: spec.bridged,
            ipv4: None,
        }
    }

    /// The declared portion of this record, used as the baseline for the
    /// next refresh
    pub fn declared(&self) -> DeclaredSpec {
        DeclaredSpec {
            name: self.name.clone(),
            image: self.image.clone(),
            cpus: self.cpus,
            memory: self.memory.clone(),
            disk: self.disk.clone(),
            cloud_init_file: self.cloud_init_file.clone(),
            network: self.network.clone(),
            bridged: self.bridged,
        }
    }

    pub fn get(&self, field: Field) -> Option<Value> {
        match field {
            Field::Ipv4 => self.ipv4.clone().map(Value::Text),
            other => self.declared().get(other),
        }
    }

    /// Store a value into a field.
    ///
    /// Fails with the field when the value's type does not fit it, or when
    /// `Name` is cleared.
    pub fn set(&mut self, field: Field, value: Option<Value>) -> Result<(), Field> {
        match field {
            Field::Name => match value {
                Some(Value::Text(name)) => self.name = name,
                _ => return Err(field),
            },
            Field::Image => self.image = text(field, value)?,
            Field::Cpus => self.cpus = count(field, value)?,
            Field::Memory => self.memory = text(field, value)?,
            Field::Disk => self.disk = text(field, value)?,
            Field::CloudInitFile => self.cloud_init_file = text(field, value)?,
            Field::Network => self.network = text(field, value)?,
            Field::Bridged => self.bridged = flag(field, value)?,
            Field::Ipv4 => self.ipv4 = text(field, value)?,
        }
        Ok(())
    }
}

fn text(field: Field, value: Option<Value>) -> Result<Option<String>, Field> {
    match value {
        None => Ok(None),
        Some(Value::Text(s)) => Ok(Some(s)),
        Some(_) => Err(field),
    }
}

fn count(field: Field, value: Option<Value>) -> Result<Option<u32>, Field> {
    match value {
        None => Ok(None),
        Some(Value::Count(n)) => Ok(Some(n)),
        Some(_) => Err(field),
    }
}

fn flag(field: Field, value: Option<Value>) -> Result<Option<bool>, Field> {
    match value {
        None => Ok(None),
        Some(Value::Flag(b)) => Ok(Some(b)),
        Some(_) => Err(field),
    }
}
