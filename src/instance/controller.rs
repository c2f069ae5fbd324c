//! Instance Lifecycle Controller - create, read, delete and import
//!
//! The controller sequences calls to a [`VmControl`] implementation and runs
//! the drift resolver on every read. It keeps no state of its own: the host
//! framework hands in the last persisted record and stores whatever comes
//! back.
//!
//! ```text
//!  absent ──create──► present ◄──read──► present ──delete──► absent
//!                        │
//!                        └── read finds nothing ──► absent
//! ```
//!
//! There is no update: every declared attribute forces a replacement, which
//! the host carries out as delete followed by create.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::drift::{resolve, ResolveError};
use super::model::{DeclaredSpec, ObservedState, ReconciledRecord};
use crate::metrics::{observe_operation, DRIFTED_FIELDS};
use crate::multipass::{ControlError, InstanceInfo, LaunchRequest, VmControl};

/// Whether the instance exists after an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InstanceState {
    /// The instance exists; persist this record
    Present(ReconciledRecord),
    /// The instance is gone; drop it from persisted state
    Absent,
}

/// Error type for lifecycle operations
#[derive(Debug)]
pub enum LifecycleError {
    /// Launch failed; the instance is considered never to have existed
    Provisioning { name: String, source: ControlError },
    /// Delete failed; the persisted record should be kept for a retry
    Deletion { name: String, source: ControlError },
    /// The instance exists but its live state could not be fetched
    Query { name: String, source: ControlError },
    /// Declared and observed state could not be reconciled
    Drift { name: String, source: ResolveError },
    /// No instance with this name exists
    NotFound(String),
}

impl LifecycleError {
    /// Stable identifier of the error kind, as reported to the host
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::Provisioning { .. } => "provisioning_error",
            LifecycleError::Deletion { .. } => "deletion_error",
            LifecycleError::Query { .. } => "query_error",
            LifecycleError::Drift { source, .. } => source.kind(),
            LifecycleError::NotFound(_) => "not_found",
        }
    }
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::Provisioning { name, source } => {
                write!(f, "could not create instance {}: {}", name, source)
            }
            LifecycleError::Deletion { name, source } => {
                write!(f, "could not delete instance {}: {}", name, source)
            }
            LifecycleError::Query { name, source } => {
                write!(f, "could not query instance {}: {}", name, source)
            }
            LifecycleError::Drift { name, source } => {
                write!(f, "could not reconcile instance {}: {}", name, source)
            }
            LifecycleError::NotFound(name) => write!(f, "instance {} not found", name),
        }
    }
}

impl std::error::Error for LifecycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LifecycleError::Provisioning { source, .. }
            | LifecycleError::Deletion { source, .. }
            | LifecycleError::Query { source, .. } => Some(source),
            LifecycleError::Drift { source, .. } => Some(source),
            LifecycleError::NotFound(_) => None,
        }
    }
}

/// Metric label for the outcome of an operation
fn outcome<T>(result: &Result<T, LifecycleError>, absent: impl Fn(&T) -> bool) -> &'static str {
    match result {
        Ok(value) if absent(value) => "absent",
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}

fn is_absent(state: &InstanceState) -> bool {
    matches!(state, InstanceState::Absent)
}

fn launch_request(spec: &DeclaredSpec) -> LaunchRequest {
    LaunchRequest {
        name: spec.name.clone(),
        image: spec.image.clone(),
        cpus: spec.cpus,
        memory: spec.memory.clone(),
        disk: spec.disk.clone(),
        cloud_init_file: spec.cloud_init_file.clone(),
        network: spec.network.clone(),
        bridged: spec.bridged.unwrap_or(false),
    }
}

/// Lifecycle controller over a VM control implementation
pub struct InstanceController<C> {
    control: C,
}

impl<C: VmControl> InstanceController<C> {
    /// Create a new controller
    ///
    /// # Arguments
    /// * `control` - VM control implementation (`MultipassCli` in production)
    pub fn new(control: C) -> Self {
        Self { control }
    }

    /// The underlying VM control implementation
    pub fn control(&self) -> &C {
        &self.control
    }

    /// Launch an instance from a declared spec
    ///
    /// # Returns
    /// The declared spec as the initial record; nothing has been observed yet.
    pub async fn create(&self, spec: &DeclaredSpec) -> Result<ReconciledRecord, LifecycleError> {
        let span = info_span!("create", instance = %spec.name, op_id = %Uuid::now_v7());
        let start = Instant::now();

        let result = async {
            info!(
                image = spec.image.as_deref().unwrap_or("default"),
                cpus = ?spec.cpus,
                memory = spec.memory.as_deref().unwrap_or("default"),
                disk = spec.disk.as_deref().unwrap_or("default"),
                "launching instance"
            );

            self.control
                .launch(&launch_request(spec))
                .await
                .map_err(|source| LifecycleError::Provisioning {
                    name: spec.name.clone(),
                    source,
                })?;

            info!("instance launched");
            Ok(ReconciledRecord::from_declared(spec.clone()))
        }
        .instrument(span)
        .await;

        observe_operation("create", outcome(&result, |_| false), start.elapsed().as_secs_f64());
        result
    }

    /// Refresh a persisted record against the live instance
    ///
    /// A missing instance, or one whose existence cannot be confirmed, is
    /// reported as `Absent` rather than as an error.
    pub async fn read(&self, record: &ReconciledRecord) -> Result<InstanceState, LifecycleError> {
        let span = info_span!("read", instance = %record.name, op_id = %Uuid::now_v7());
        let start = Instant::now();

        let result = self.refresh(record).instrument(span).await;

        observe_operation("read", outcome(&result, is_absent), start.elapsed().as_secs_f64());
        result
    }

    async fn refresh(&self, record: &ReconciledRecord) -> Result<InstanceState, LifecycleError> {
        let name = record.name.as_str();

        let info = match self.control.info(name).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                warn!("instance not found, removing from state");
                return Ok(InstanceState::Absent);
            }
            Err(e) => {
                warn!(error = %e, "instance probe failed, removing from state");
                return Ok(InstanceState::Absent);
            }
        };

        self.reconcile(record, info).await.map(InstanceState::Present)
    }

    /// Fetch live config and resolve it against `record`, reusing `info`
    async fn reconcile(
        &self,
        record: &ReconciledRecord,
        info: InstanceInfo,
    ) -> Result<ReconciledRecord, LifecycleError> {
        let name = record.name.as_str();
        let live = self
            .control
            .live_config(name)
            .await
            .map_err(|source| LifecycleError::Query {
                name: name.to_string(),
                source,
            })?;

        let observed = ObservedState::new(name, info, live);
        let resolution =
            resolve(&record.declared(), &observed).map_err(|source| LifecycleError::Drift {
                name: name.to_string(),
                source,
            })?;

        for field in &resolution.drifted {
            DRIFTED_FIELDS.with_label_values(&[field.as_str()]).inc();
            info!(field = %field, "live value differs from record, adopting it");
        }

        Ok(resolution.record)
    }

    /// Delete and purge an instance
    ///
    /// On failure the caller should keep the record so the delete can be
    /// retried.
    pub async fn delete(&self, record: &ReconciledRecord) -> Result<InstanceState, LifecycleError> {
        let span = info_span!("delete", instance = %record.name, op_id = %Uuid::now_v7());
        let start = Instant::now();

        let result = async {
            self.control
                .delete(&record.name)
                .await
                .map_err(|source| LifecycleError::Deletion {
                    name: record.name.clone(),
                    source,
                })?;

            info!("instance deleted");
            Ok(InstanceState::Absent)
        }
        .instrument(span)
        .await;

        observe_operation("delete", outcome(&result, |_| false), start.elapsed().as_secs_f64());
        result
    }

    /// Adopt an existing instance by name
    ///
    /// Only the name is recorded as declared; the read that follows leaves
    /// every optional attribute unset and fills in `ipv4`.
    pub async fn import(&self, id: &str) -> Result<ReconciledRecord, LifecycleError> {
        let span = info_span!("import", instance = %id, op_id = %Uuid::now_v7());
        let start = Instant::now();

        let result = async {
            let info = self.probe(id).await?;
            let baseline = ReconciledRecord::from_declared(DeclaredSpec::new(id));
            let record = self.reconcile(&baseline, info).await?;

            info!("instance imported");
            Ok(record)
        }
        .instrument(span)
        .await;

        observe_operation("import", outcome(&result, |_| false), start.elapsed().as_secs_f64());
        result
    }

    /// Look up an instance's address, state and image by name
    pub async fn describe(&self, name: &str) -> Result<InstanceInfo, LifecycleError> {
        let span = info_span!("describe", instance = %name, op_id = %Uuid::now_v7());
        let start = Instant::now();

        let result = self
            .probe(name)
            .instrument(span)
            .await;

        observe_operation("describe", outcome(&result, |_| false), start.elapsed().as_secs_f64());
        result
    }

    /// Info for an instance that must exist
    async fn probe(&self, name: &str) -> Result<InstanceInfo, LifecycleError> {
        self.control
            .info(name)
            .await
            .map_err(|source| LifecycleError::Query {
                name: name.to_string(),
                source,
            })?
            .ok_or_else(|| LifecycleError::NotFound(name.to_string()))
    }
}
