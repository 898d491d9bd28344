use airsense::config::{Settings, API_KEY_ENV, USER_AGENT_ENV};
use airsense::resolution::{Outcome, ResolutionService};
use airsense::server;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// AirSense: current PM2.5 air quality index for any city.
///
/// Geocodes the city with OpenStreetMap Nominatim, finds the nearest OpenAQ
/// monitoring stations and reports the freshest PM2.5 reading as a US EPA AQI.
///
/// Examples:
///   airsense lookup Stockholm
///   airsense lookup "New York" --api-key <KEY>
///   airsense forecast Delhi
///   airsense station 2178
///   airsense serve --port 8080
#[derive(Parser)]
#[command(name = "airsense", version, about, long_about = None)]
struct Cli {
    /// TOML config file. Defaults to <config dir>/airsense/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// OpenAQ API key.
    #[arg(long, global = true, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// User-Agent sent to Nominatim and the other providers.
    #[arg(long, global = true, env = USER_AGENT_ENV)]
    user_agent: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, short = 'p', default_value_t = 8080)]
        port: u16,
    },
    /// Resolve one city and print the AQI report as JSON.
    Lookup { city: String },
    /// Print the hourly PM2.5 forecast for a city as JSON.
    Forecast { city: String },
    /// Print the latest PM2.5 reading of one OpenAQ location as JSON.
    Station { id: u64 },
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let service = match build_service(&cli) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Serve { host, port } => serve(&host, port, service),
        Command::Lookup { city } => print_outcome(service.resolve(&city)),
        Command::Forecast { city } => print_outcome(service.forecast(&city)),
        Command::Station { id } => print_outcome(service.station(id)),
    }
}

fn build_service(cli: &Cli) -> Result<ResolutionService, airsense::config::ConfigError> {
    let settings = Settings::load(cli.config.as_deref())?
        .with_overrides(cli.api_key.clone(), cli.user_agent.clone())
        .validate()?;
    ResolutionService::from_settings(&settings)
}

fn serve(host: &str, port: u16, service: Arc<ResolutionService>) -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: cannot start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(server::start(host, port, service)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: server on {}:{} failed: {}", host, port, e);
            ExitCode::FAILURE
        }
    }
}

/// JSON to stdout on success, message to stderr otherwise.
fn print_outcome<T: Serialize>(
    result: Result<Outcome<T>, airsense::upstream::UpstreamError>,
) -> ExitCode {
    match result {
        Ok(Outcome::Found(body)) => match serde_json::to_string_pretty(&body) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Ok(Outcome::Missing(miss)) => {
            eprintln!("{}", miss.message());
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
