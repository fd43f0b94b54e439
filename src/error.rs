//! Error types for the gateway client, speed test and CSV writer.
//!
//! Only [`GatewayError`] and [`OutputError`] ever reach the binary. Fetch and
//! measurement errors are logged and folded into empty values where they occur.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Fatal errors raised while preparing or authenticating a gateway session.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway answered the login form with something other than 200.
    #[error("gateway rejected login with status {status}: {body}")]
    Authentication { status: StatusCode, body: String },

    /// The login request never got an answer.
    #[error("login request failed: {0}")]
    LoginTransport(#[source] reqwest::Error),

    /// The selected schema needs a username and password but none were given.
    #[error("schema `{0}` requires a username and password")]
    MissingCredentials(&'static str),

    #[error("invalid gateway endpoint `{url}`: {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

/// Recoverable failures while fetching or decoding the radio status document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("status request timed out after {0:?}")]
    Timeout(Duration),

    #[error("status request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("status endpoint returned {0}")]
    Status(StatusCode),

    #[error("failed to read status body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("status body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("status body is not a JSON object")]
    NotAnObject,
}

/// Recoverable failures raised by a speed test provider.
#[derive(Debug, Error)]
pub enum MeasurementError {
    #[error("no speed test servers available")]
    NoServers,

    #[error("no server selected; call select_server first")]
    NoServerSelected,

    #[error("invalid server url `{0}`")]
    InvalidServer(String),

    #[error("speed test request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("speed test endpoint returned {0}")]
    Status(StatusCode),

    #[error("{0}")]
    Provider(String),
}

/// Failures while appending to the CSV log.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error on log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
