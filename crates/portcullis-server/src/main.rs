//! Portcullis entry point.

use std::path::PathBuf;

use anyhow::Context;
use portcullis_config::ConfigLoader;
use portcullis_server::{App, Server, VERSION};
use portcullis_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

const ENV_PREFIX: &str = "PORTCULLIS";
const DEFAULT_CONFIG_FILE: &str = "portcullis.toml";

struct Args {
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("portcullis {VERSION}");
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"Portcullis - request gate for multi-tenant web applications

USAGE:
    portcullis [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Configuration file (TOML or JSON); defaults to
                           ./portcullis.toml when present
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    PORTCULLIS__SERVER__HTTP_ADDR          Listen address (default: 0.0.0.0:8080)
    PORTCULLIS__IDENTITY__BASE_URL         Identity provider base URL
    PORTCULLIS__MEMBERSHIP__BASE_URL       Membership store base URL
    PORTCULLIS__MEMBERSHIP__API_KEY        Membership store api key
    PORTCULLIS__SCHEDULER__SECRET          Shared secret for scheduled triggers
    PORTCULLIS__TELEMETRY__LOGGING__LEVEL  Log level or filter directive
    RUST_LOG                               Overrides the configured log filter

A .env file in the working directory is loaded first.
"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let loader = ConfigLoader::new().with_dotenv();
    let loader = match &args.config {
        Some(path) => loader
            .with_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => loader.with_optional_file(DEFAULT_CONFIG_FILE)?,
    };
    let config = loader
        .with_env_prefix(ENV_PREFIX)
        .load()
        .context("invalid configuration")?;

    init_telemetry(&TelemetryConfig::from(&config.telemetry))?;
    info!(
        version = VERSION,
        environment = %config.telemetry.environment,
        "starting portcullis"
    );

    let app = App::from_config(&config)?;
    Server::new(app, &config.server).run().await?;
    Ok(())
}
