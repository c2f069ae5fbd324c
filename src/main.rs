use std::process::ExitCode;

use tokio::io::BufReader;
use tracing::{error, info};

use multipass_provider::config::{Mode, ProviderConfig, USAGE};
use multipass_provider::instance::{instance_data_source_schema, instance_schema};
use multipass_provider::protocol::Response;
use multipass_provider::tracing::init_tracing;
use multipass_provider::{metrics, InstanceController, MultipassCli, ProtocolServer};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ProviderConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };

    match config.mode {
        Mode::Help => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Mode::Version => {
            println!("multipass-provider {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Mode::Schema => {
            let schema = Response::Schema {
                resource: instance_schema(),
                data_source: instance_data_source_schema(),
            };
            return match serde_json::to_string_pretty(&schema) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: could not render schema: {}", e);
                    ExitCode::FAILURE
                }
            };
        }
        Mode::Serve => {}
    }

    if let Err(e) = init_tracing(config.log_format, config.debug) {
        eprintln!("error: could not initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        multipass = %config.multipass_bin.display(),
        version = env!("CARGO_PKG_VERSION"),
        "multipass provider starting"
    );

    let server = ProtocolServer::new(InstanceController::new(MultipassCli::new(
        &config.multipass_bin,
    )));
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    let code = match server.serve(stdin, stdout).await {
        Ok(answered) => {
            info!(answered, "multipass provider shutting down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "protocol stream failed");
            ExitCode::FAILURE
        }
    };

    if config.dump_metrics {
        match metrics::render() {
            Ok(text) => eprint!("{}", text),
            Err(e) => error!(error = %e, "could not render metrics"),
        }
    }

    code
}
