//! Drift resolution
//!
//! Merges a declared spec with a freshly observed state into the record that
//! is persisted as current truth. Which side wins is decided per field by the
//! policy table in [`policy`]:
//!
//! ```text
//! ┌────────────────────────────────────────────┬───────────────┐
//! │ name, image, cloudinit_file, network,      │ PassThrough   │
//! │ bridged                                    │               │
//! │ cpus                                       │ IgnoreIfUnset │
//! │ memory, disk                               │ SizeAware     │
//! │ ipv4                                       │ AlwaysSync    │
//! └────────────────────────────────────────────┴───────────────┘
//! ```
//!
//! An unset declared field stays unset no matter what Multipass reports:
//! the caller deferred to the default, and syncing the live default back
//! would show up as drift on every refresh.

use std::fmt;

use serde::Serialize;

use super::model::{DeclaredSpec, Field, ObservedState, ReconciledRecord, Value};
use crate::size::{equal_sizes, strip_zero_decimal, SizeError};

/// How a field is reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Always the declared value; the field is not re-observed
    PassThrough,
    /// Unset stays unset; once set, the observed value wins if different
    IgnoreIfUnset,
    /// Like IgnoreIfUnset, but compared by byte count and keeping the
    /// declared spelling when the magnitudes agree
    SizeAware,
    /// Always the observed value
    AlwaysSync,
}

/// The drift policy table
pub fn policy(field: Field) -> Policy {
    match field {
        Field::Name => Policy::PassThrough,
        Field::Image => Policy::PassThrough,
        Field::CloudInitFile => Policy::PassThrough,
        Field::Network => Policy::PassThrough,
        Field::Bridged => Policy::PassThrough,
        Field::Cpus => Policy::IgnoreIfUnset,
        Field::Memory => Policy::SizeAware,
        Field::Disk => Policy::SizeAware,
        Field::Ipv4 => Policy::AlwaysSync,
    }
}

/// Outcome of applying a policy to one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Value to store in the reconciled record
    pub value: Option<Value>,
    /// Whether the declared value was replaced by a different live one
    pub drifted: bool,
}

impl Decision {
    fn keep(value: Option<Value>) -> Self {
        Self {
            value,
            drifted: false,
        }
    }

    fn adopt(value: Value) -> Self {
        Self {
            value: Some(value),
            drifted: true,
        }
    }
}

/// Result of reconciling one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub record: ReconciledRecord,
    /// Fields whose live value replaced the declared one, in schema order
    pub drifted: Vec<Field>,
}

/// Error type for drift resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A declared or observed size literal could not be parsed
    Size { field: Field, source: SizeError },
    /// A value of the wrong type reached a field
    Mismatch { field: Field },
}

impl ResolveError {
    /// Stable identifier of the error kind, as reported to the host
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::Size { .. } => "invalid_size_format",
            ResolveError::Mismatch { .. } => "drift_error",
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Size { field, source } => {
                write!(f, "error comparing {} size: {}", field, source)
            }
            ResolveError::Mismatch { field } => {
                write!(f, "value of unexpected type for field {}", field)
            }
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::Size { source, .. } => Some(source),
            ResolveError::Mismatch { .. } => None,
        }
    }
}

/// Reconcile a declared spec against an observed state
///
/// Pure: the same inputs always give the same record.
pub fn resolve(
    declared: &DeclaredSpec,
    observed: &ObservedState,
) -> Result<Resolution, ResolveError> {
    let mut record = ReconciledRecord::from_declared(declared.clone());
    let mut drifted = Vec::new();

    for field in Field::ALL {
        let decision = apply(policy(field), field, declared.get(field), observed.get(field))?;
        if decision.drifted {
            drifted.push(field);
        }
        record
            .set(field, decision.value)
            .map_err(|field| ResolveError::Mismatch { field })?;
    }

    Ok(Resolution { record, drifted })
}

/// Apply one policy to one field's declared and observed values
pub fn apply(
    policy: Policy,
    field: Field,
    declared: Option<Value>,
    observed: Option<Value>,
) -> Result<Decision, ResolveError> {
    match policy {
        Policy::PassThrough => Ok(Decision::keep(declared)),
        Policy::AlwaysSync => Ok(Decision::keep(observed)),
        Policy::IgnoreIfUnset => Ok(match (declared, observed) {
            (None, _) => Decision::keep(None),
            (Some(declared), None) => Decision::keep(Some(declared)),
            (Some(declared), Some(observed)) if declared == observed => {
                Decision::keep(Some(declared))
            }
            (Some(_), Some(observed)) => Decision::adopt(observed),
        }),
        Policy::SizeAware => match (declared, observed) {
            (None, _) => Ok(Decision::keep(None)),
            (Some(Value::Text(declared)), None) => Ok(Decision::keep(Some(Value::Text(declared)))),
            (Some(Value::Text(declared)), Some(Value::Text(observed))) => {
                let equal = equal_sizes(&declared, &observed)
                    .map_err(|source| ResolveError::Size { field, source })?;
                if equal {
                    Ok(Decision::keep(Some(Value::Text(declared))))
                } else {
                    Ok(Decision::adopt(Value::Text(strip_zero_decimal(&observed))))
                }
            }
            _ => Err(ResolveError::Mismatch { field }),
        },
    }
}
