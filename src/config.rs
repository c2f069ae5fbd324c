//! Provider process configuration
//!
//! Settings come from defaults, then the environment, then command-line
//! flags, each layer overriding the one before.
//!
//! | Setting            | Environment                     | Flag               |
//! |--------------------|---------------------------------|--------------------|
//! | `multipass` binary | `MULTIPASS_BIN`                 | `--multipass PATH` |
//! | log format         | `MULTIPASS_PROVIDER_LOG_FORMAT` | `--json-logs`      |
//! | verbose logging    |                                 | `--debug`          |
//! | metrics dump       |                                 | `--metrics`        |

use std::fmt;
use std::path::PathBuf;

/// Environment variable naming the `multipass` binary
pub const ENV_MULTIPASS_BIN: &str = "MULTIPASS_BIN";

/// Environment variable selecting the log format ("plain" or "json")
pub const ENV_LOG_FORMAT: &str = "MULTIPASS_PROVIDER_LOG_FORMAT";

/// How log lines are written to stderr
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" => Some(LogFormat::Plain),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// What the process should do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Answer protocol requests on stdin until EOF
    #[default]
    Serve,
    /// Print the resource and data-source schemas and exit
    Schema,
    Help,
    Version,
}

/// Configuration for the provider process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// `multipass` binary, looked up on PATH if bare
    pub multipass_bin: PathBuf,
    pub log_format: LogFormat,
    /// Log everything at debug level, ignoring the default filter
    pub debug: bool,
    /// Write the Prometheus text exposition to stderr on exit
    pub dump_metrics: bool,
    pub mode: Mode,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            multipass_bin: PathBuf::from("multipass"),
            log_format: LogFormat::Plain,
            debug: false,
            dump_metrics: false,
            mode: Mode::Serve,
        }
    }
}

/// Error type for configuration loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownArgument(String),
    MissingValue(String),
    InvalidLogFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownArgument(arg) => write!(f, "unknown argument: {}", arg),
            ConfigError::MissingValue(flag) => write!(f, "{} requires a value", flag),
            ConfigError::InvalidLogFormat(value) => write!(
                f,
                "invalid {} value {:?} (expected \"plain\" or \"json\")",
                ENV_LOG_FORMAT, value
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

pub const USAGE: &str = "\
Usage: multipass-provider [OPTIONS] [COMMAND]

Commands:
  serve     Answer lifecycle requests, one JSON object per line on stdin (default)
  schema    Print the resource and data-source schemas

Options:
  --multipass <PATH>  multipass binary to run [env: MULTIPASS_BIN]
  --json-logs         Write logs as JSON [env: MULTIPASS_PROVIDER_LOG_FORMAT=json]
  --debug             Log at debug level
  --metrics           Print Prometheus metrics to stderr on exit
  -h, --help          Print help
  -V, --version       Print version
";

impl ProviderConfig {
    /// Load configuration from the process environment and arguments
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key| std::env::var(key).ok(), std::env::args().skip(1))
    }

    /// Load configuration from an environment lookup and an argument list
    /// (without the program name)
    pub fn load<E, I, S>(env: E, args: I) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Self::default();

        if let Some(bin) = env(ENV_MULTIPASS_BIN).filter(|v| !v.is_empty()) {
            config.multipass_bin = PathBuf::from(bin);
        }
        if let Some(format) = env(ENV_LOG_FORMAT).filter(|v| !v.is_empty()) {
            config.log_format =
                LogFormat::parse(&format).ok_or(ConfigError::InvalidLogFormat(format))?;
        }

        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--multipass" => {
                    let path = args
                        .next()
                        .ok_or_else(|| ConfigError::MissingValue(arg.clone()))?;
                    config.multipass_bin = PathBuf::from(path);
                }
                "--json-logs" => config.log_format = LogFormat::Json,
                "--debug" => config.debug = true,
                "--metrics" => config.dump_metrics = true,
                "-h" | "--help" => config.mode = Mode::Help,
                "-V" | "--version" => config.mode = Mode::Version,
                "serve" => config.mode = Mode::Serve,
                "schema" => config.mode = Mode::Schema,
                _ => match arg.strip_prefix("--multipass=") {
                    Some(path) if !path.is_empty() => config.multipass_bin = PathBuf::from(path),
                    Some(_) => return Err(ConfigError::MissingValue("--multipass".to_string())),
                    None => return Err(ConfigError::UnknownArgument(arg.clone())),
                },
            }
        }

        Ok(config)
    }
}
