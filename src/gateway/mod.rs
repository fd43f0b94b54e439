//! Client for the gateway's radio status API.
//!
//! [`GatewayClient::fetch_radio_metrics`] always yields a 4G and a 5G record.
//! Only a failed login is reported to the caller; every problem with the
//! status document itself degrades to [`RadioMetrics::EMPTY`].

mod schema;

pub use schema::GatewaySchema;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{StatusCode, Url};
use tracing::{debug, info, warn};

use crate::error::{FetchError, GatewayError};
use crate::fetch::auth::SessionCookie;
use crate::fetch::{HttpClient, form_request, get_request};
use crate::metrics::RadioMetrics;

pub const DEFAULT_ENDPOINT: &str = "http://192.168.12.1:80/";

/// Upper bound on the status request, body included.
pub const DEFAULT_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const LOGIN_PATH: &str = "login_app.cgi";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub endpoint: String,
    pub schema: GatewaySchema,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            schema: GatewaySchema::CellStatus,
            credentials: None,
            timeout: DEFAULT_HTTP_REQUEST_TIMEOUT,
        }
    }
}

pub struct GatewayClient<C> {
    http: C,
    root: Url,
    login_url: Url,
    status_url: Url,
    schema: GatewaySchema,
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl<C: HttpClient> GatewayClient<C> {
    /// Validates `config` and prepares a client. No request is sent yet.
    pub fn new(http: C, config: GatewayConfig) -> Result<Self, GatewayError> {
        if config.schema.requires_login() && config.credentials.is_none() {
            return Err(GatewayError::MissingCredentials(config.schema.name()));
        }

        let root = parse_root(&config.endpoint)?;
        let join = |path: &str| {
            root.join(path).map_err(|e| GatewayError::InvalidEndpoint {
                url: root.to_string(),
                reason: e.to_string(),
            })
        };
        let login_url = join(LOGIN_PATH)?;
        let status_url = join(config.schema.status_path())?;

        Ok(Self {
            http,
            root,
            login_url,
            status_url,
            schema: config.schema,
            credentials: config.credentials,
            timeout: config.timeout,
        })
    }

    pub fn schema(&self) -> GatewaySchema {
        self.schema
    }

    /// Logs in when credentials are configured, then reads the status document.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Authentication`] or [`GatewayError::LoginTransport`]
    /// when the login step fails; the status document is not requested in
    /// that case. Status failures never surface here.
    #[tracing::instrument(skip(self), fields(schema = self.schema.name(), root = %self.root))]
    pub async fn fetch_radio_metrics(&self) -> Result<(RadioMetrics, RadioMetrics), GatewayError> {
        let metrics = match &self.credentials {
            Some(credentials) => {
                let session = self.login(credentials).await?;
                self.radio_status_or_empty(&session).await
            }
            None => self.radio_status_or_empty(&self.http).await,
        };
        Ok(metrics)
    }

    async fn login(&self, credentials: &Credentials) -> Result<SessionCookie<&C>, GatewayError> {
        let req = form_request(
            self.login_url.clone(),
            &[
                ("name", credentials.username.as_str()),
                ("pswd", credentials.password.as_str()),
            ],
        );

        let resp = self
            .http
            .execute(req)
            .await
            .map_err(GatewayError::LoginTransport)?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Authentication { status, body });
        }

        let session = SessionCookie::from_login_headers(&self.http, resp.headers());
        info!(
            username = %credentials.username,
            session_cookie = session.has_cookie(),
            "Logged in to gateway"
        );
        Ok(session)
    }

    async fn radio_status_or_empty<H: HttpClient>(&self, http: &H) -> (RadioMetrics, RadioMetrics) {
        match self.fetch_radio_status(http).await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(error = %e, "Radio status unavailable, recording empty tower metrics");
                (RadioMetrics::EMPTY, RadioMetrics::EMPTY)
            }
        }
    }

    async fn fetch_radio_status<H: HttpClient>(
        &self,
        http: &H,
    ) -> Result<(RadioMetrics, RadioMetrics), FetchError> {
        let request = read_status_body(http, self.status_url.clone());
        let body = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        debug!(bytes = body.len(), "Radio status received");
        self.schema.parse(&body)
    }
}

async fn read_status_body<H: HttpClient>(http: &H, url: Url) -> Result<Bytes, FetchError> {
    let resp = http
        .execute(get_request(url))
        .await
        .map_err(FetchError::Transport)?;
    if !resp.status().is_success() {
        return Err(FetchError::Status(resp.status()));
    }
    resp.bytes().await.map_err(FetchError::Body)
}

/// Parses the gateway root so relative endpoint paths join beneath it.
fn parse_root(endpoint: &str) -> Result<Url, GatewayError> {
    let invalid = |reason: String| GatewayError::InvalidEndpoint {
        url: endpoint.to_string(),
        reason,
    };

    let mut root = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if !matches!(root.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme `{}`", root.scheme())));
    }
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    root.set_query(None);
    Ok(root)
}
