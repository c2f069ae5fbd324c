//! Prometheus metrics for lifecycle operations
//!
//! The provider runs as a short-lived plugin process, so nothing scrapes these
//! directly; `render()` produces the text exposition for the binary to dump
//! on exit.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Lifecycle operations by outcome.
    ///
    /// Labels:
    /// - operation: "create", "read", "delete", "import", "describe"
    /// - outcome: "ok", "absent", or the error kind (e.g. "provisioning_error")
    pub static ref OPERATIONS: CounterVec = register_counter_vec!(
        "multipass_provider_operations_total",
        "Lifecycle operations by outcome",
        &["operation", "outcome"]
    ).expect("failed to register OPERATIONS metric");

    /// Wall-clock time per lifecycle operation, dominated by `multipass` itself.
    pub static ref OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "multipass_provider_operation_duration_seconds",
        "Lifecycle operation duration in seconds",
        &["operation"],
        vec![0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]
    ).expect("failed to register OPERATION_DURATION metric");

    /// Fields whose live value replaced the recorded one during a read.
    pub static ref DRIFTED_FIELDS: CounterVec = register_counter_vec!(
        "multipass_provider_drifted_fields_total",
        "Fields that drifted from the recorded value",
        &["field"]
    ).expect("failed to register DRIFTED_FIELDS metric");
}

/// Record the outcome and duration of one lifecycle operation
pub fn observe_operation(operation: &str, outcome: &str, seconds: f64) {
    OPERATIONS.with_label_values(&[operation, outcome]).inc();
    OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(seconds);
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
