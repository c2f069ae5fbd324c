//! Structured logging setup
//!
//! Logs always go to stderr: stdout carries the host protocol, and a stray
//! log line there would corrupt it.
//!
//! ```text
//! tracing spans/events → EnvFilter → fmt layer (plain | json) → stderr
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogFormat;

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info,multipass_provider=debug";

/// Initialize the tracing subscriber
///
/// # Arguments
/// * `format` - Plain text or one JSON object per line
/// * `debug` - Log everything at debug level instead of the default filter
///
/// # Example
/// ```ignore
/// init_tracing(LogFormat::Plain, false)?;
/// ```
pub fn init_tracing(
    format: LogFormat,
    debug: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let fmt_layer = match format {
        LogFormat::Plain => fmt_layer.boxed(),
        LogFormat::Json => fmt_layer.json().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!(format = ?format, "tracing initialized");

    Ok(())
}
