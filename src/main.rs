//! CLI entry point for the gateway speed logger.
//!
//! Collects tower metrics from the gateway, runs a speed test and appends one
//! row to the CSV log. Meant to be run from a scheduler.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use gateway_speed_log::{
    fetch::BasicClient,
    gateway::{
        Credentials, DEFAULT_ENDPOINT, GatewayClient, GatewayConfig, GatewaySchema,
    },
    output::{LogColumns, MetricsLogWriter},
    probe::run_probe,
    speedtest::{SpeedTestConfig, SpeedtestNet},
};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const DEFAULT_LOG_FILE: &str = "./speed_test_nokia_gateway.csv";

#[derive(Parser)]
#[command(name = "gateway-speed-log")]
#[command(about = "Log speed tests alongside gateway tower metrics", long_about = None)]
struct Cli {
    /// Root endpoint URL of the gateway
    #[arg(short = 'u', long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// CSV file to append results to
    #[arg(short = 'f', long, default_value = DEFAULT_LOG_FILE)]
    logfile: PathBuf,

    /// Status document layout served by the gateway firmware
    #[arg(short, long, value_enum, default_value_t = GatewaySchema::CellStatus)]
    schema: GatewaySchema,

    /// Gateway admin username (required for cell-status)
    #[arg(long)]
    username: Option<String>,

    /// Gateway admin password; falls back to GATEWAY_PASSWORD
    #[arg(long)]
    password: Option<String>,

    /// Timeout in seconds for the radio status request
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Number of nearby speed test servers to probe for latency
    #[arg(long, default_value_t = 5)]
    servers: usize,

    /// Only record tower metrics
    #[arg(long, default_value_t = false)]
    skip_speed_test: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/gateway_speed_log.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gateway_speed_log.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("RUST_LOG", "info"));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(env_filter("RUST_LOG_JSON", "debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let credentials = resolve_credentials(
        cli.schema,
        cli.username,
        cli.password,
        std::env::var("GATEWAY_PASSWORD").ok(),
    )?;

    let config = GatewayConfig {
        endpoint: cli.endpoint,
        schema: cli.schema,
        credentials,
        timeout: Duration::from_secs(cli.timeout),
    };
    info!(endpoint = %config.endpoint, schema = config.schema.name(), "Starting run");

    let gateway = GatewayClient::new(BasicClient::new(), config)?;
    let writer = MetricsLogWriter::new(cli.logfile, LogColumns::standard());

    let mut provider = SpeedtestNet::new(
        BasicClient::new(),
        SpeedTestConfig {
            candidate_servers: cli.servers,
            ..Default::default()
        },
    );
    let provider = if cli.skip_speed_test {
        None
    } else {
        Some(&mut provider)
    };

    if let Err(e) = run_probe(&gateway, provider, &writer).await {
        error!(error = %format!("{e:#}"), "Run aborted");
        return Err(e);
    }

    Ok(())
}

/// Pairs the login flags. `env_password` is only consulted when a login can
/// actually happen, so a stray `GATEWAY_PASSWORD` never breaks an open schema.
fn resolve_credentials(
    schema: GatewaySchema,
    username: Option<String>,
    password: Option<String>,
    env_password: Option<String>,
) -> Result<Option<Credentials>> {
    let wants_login = username.is_some() || schema.requires_login();
    let password = match password {
        Some(password) => Some(password),
        None if wants_login => env_password,
        None => None,
    };

    match (username, password) {
        (Some(username), Some(password)) => Ok(Some(Credentials { username, password })),
        (None, None) => Ok(None),
        (Some(_), None) => {
            anyhow::bail!("--username needs a password (--password or GATEWAY_PASSWORD)")
        }
        (None, Some(_)) => anyhow::bail!(
            "schema `{}` needs --username to go with the password",
            schema.name()
        ),
    }
}

/// Reads a filter from `var`, falling back to `default` when unset or invalid.
fn env_filter(var: &str, default: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn test_radio_status_ignores_env_password() {
        let credentials =
            resolve_credentials(GatewaySchema::RadioStatus, None, None, owned("from-env")).unwrap();
        assert_eq!(credentials, None);
    }

    #[test]
    fn test_radio_status_without_anything_needs_no_login() {
        let credentials =
            resolve_credentials(GatewaySchema::RadioStatus, None, None, None).unwrap();
        assert_eq!(credentials, None);
    }

    #[test]
    fn test_env_password_fills_in_for_username() {
        let credentials =
            resolve_credentials(GatewaySchema::CellStatus, owned("admin"), None, owned("from-env"))
                .unwrap();
        assert_eq!(
            credentials,
            Some(Credentials {
                username: "admin".to_string(),
                password: "from-env".to_string(),
            })
        );
    }

    #[test]
    fn test_flag_password_wins_over_env() {
        let credentials = resolve_credentials(
            GatewaySchema::RadioStatus,
            owned("admin"),
            owned("from-flag"),
            owned("from-env"),
        )
        .unwrap()
        .unwrap();
        assert_eq!(credentials.password, "from-flag");
    }

    #[test]
    fn test_cell_status_env_password_without_username_fails() {
        let result =
            resolve_credentials(GatewaySchema::CellStatus, None, None, owned("from-env"));
        assert!(result.unwrap_err().to_string().contains("--username"));
    }

    #[test]
    fn test_username_without_any_password_fails() {
        assert!(
            resolve_credentials(GatewaySchema::CellStatus, owned("admin"), None, None).is_err()
        );
    }

    #[test]
    fn test_password_flag_without_username_fails() {
        assert!(
            resolve_credentials(GatewaySchema::RadioStatus, None, owned("from-flag"), None)
                .is_err()
        );
    }
}
