//! Multipass instance resource
//!
//! This module provides the declarative lifecycle of a single instance:
//! - Record shapes (declared, observed, reconciled)
//! - Drift resolution between declared and live state
//! - Attribute schema and replacement planning
//! - The lifecycle controller (create, read, delete, import)

pub mod controller;
pub mod drift;
pub mod model;
pub mod schema;

pub use controller::{InstanceController, InstanceState, LifecycleError};
pub use drift::{policy, resolve, Policy, Resolution, ResolveError};
pub use model::{DeclaredSpec, Field, ObservedState, ReconciledRecord, Value};
pub use schema::{instance_data_source_schema, instance_schema, requires_replace, Schema};
