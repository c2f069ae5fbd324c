//! multipass-provider - declarative lifecycle for Multipass VM instances
//!
//! This library lets a declarative infrastructure host manage Multipass
//! instances: it launches, refreshes, deletes and adopts instances by driving
//! the `multipass` command line, and reconciles what the user declared with
//! what is actually running.
//!
//! # Modules
//!
//! - `size` - Data-size literal normalization ("5GiB" == "5.0GiB")
//! - `instance` - Records, drift resolution, schema and the lifecycle controller
//! - `multipass` - VM control interface, CLI client and in-memory mock
//! - `protocol` - JSON-lines request/response loop over stdio
//! - `config` - Environment and flag configuration
//! - `metrics` - Prometheus metrics for lifecycle operations
//! - `tracing` - Structured logging setup
//!
//! # Quick Start
//!
//! ```ignore
//! use multipass_provider::{DeclaredSpec, InstanceController, MultipassCli};
//!
//! let controller = InstanceController::new(MultipassCli::new("multipass"));
//! let record = controller.create(&DeclaredSpec::new("primary")).await?;
//! let state = controller.read(&record).await?;
//! ```

pub mod config;
pub mod instance;
pub mod metrics;
pub mod multipass;
pub mod protocol;
pub mod size;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use config::{LogFormat, ProviderConfig};
pub use instance::{
    DeclaredSpec, InstanceController, InstanceState, LifecycleError, ReconciledRecord,
};
pub use multipass::{MockControl, MultipassCli, VmControl};
pub use protocol::ProtocolServer;
