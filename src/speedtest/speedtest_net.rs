use std::future::Future;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::SpeedTestProvider;
use crate::error::MeasurementError;
use crate::fetch::{HttpClient, fetch_bytes, get_request};

/// Public list of speedtest.net servers, nearest first.
pub const SERVER_LIST_URL: &str = "https://www.speedtest.net/api/js/servers";

#[derive(Debug, Clone)]
pub struct SpeedTestConfig {
    pub server_list_url: String,
    /// How many servers from the head of the list get a latency probe.
    pub candidate_servers: usize,
    pub latency_samples: usize,
    /// Edge lengths of the `randomNxN.jpg` images fetched during download.
    pub download_sizes: Vec<u32>,
    pub download_repeats: usize,
    /// Payload sizes in bytes posted during upload.
    pub upload_sizes: Vec<usize>,
    pub upload_repeats: usize,
    /// Transfers kept in flight at once.
    pub concurrency: usize,
}

impl Default for SpeedTestConfig {
    fn default() -> Self {
        Self {
            server_list_url: SERVER_LIST_URL.to_string(),
            candidate_servers: 5,
            latency_samples: 3,
            download_sizes: vec![350, 500, 750, 1000, 1500, 2000],
            download_repeats: 2,
            upload_sizes: vec![262_144, 524_288, 1_048_576],
            upload_repeats: 4,
            concurrency: 4,
        }
    }
}

/// One entry of the server list. Only the fields used here are decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    /// Upload endpoint; the other test files live next to it.
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sponsor: String,
    #[serde(default)]
    pub host: String,
}

/// [`SpeedTestProvider`] backed by the speedtest.net server network.
pub struct SpeedtestNet<C> {
    http: C,
    config: SpeedTestConfig,
    selected: Option<(Server, Url)>,
}

impl<C: HttpClient> SpeedtestNet<C> {
    pub fn new(http: C, config: SpeedTestConfig) -> Self {
        Self {
            http,
            config,
            selected: None,
        }
    }

    pub fn selected_server(&self) -> Option<&Server> {
        self.selected.as_ref().map(|(server, _)| server)
    }

    async fn list_servers(&self) -> Result<Vec<Server>, MeasurementError> {
        let mut url = Url::parse(&self.config.server_list_url)
            .map_err(|_| MeasurementError::InvalidServer(self.config.server_list_url.clone()))?;
        url.query_pairs_mut()
            .append_pair("engine", "js")
            .append_pair("https_functional", "true")
            .append_pair("limit", &self.config.candidate_servers.to_string());

        let resp = self.http.execute(get_request(url)).await?;
        if !resp.status().is_success() {
            return Err(MeasurementError::Status(resp.status()));
        }
        let servers: Vec<Server> = resp.json().await?;
        Ok(servers)
    }

    /// Average round trip to `latency.txt` in milliseconds.
    async fn probe_latency(&self, upload_url: &Url) -> Result<f64, MeasurementError> {
        let samples = self.config.latency_samples.max(1);
        let mut total = 0.0;

        for i in 0..samples {
            let mut url = upload_url
                .join("latency.txt")
                .map_err(|_| MeasurementError::InvalidServer(upload_url.to_string()))?;
            url.query_pairs_mut().append_pair("x", &cache_buster(i));

            let start = Instant::now();
            let resp = self.http.execute(get_request(url)).await?;
            if !resp.status().is_success() {
                return Err(MeasurementError::Status(resp.status()));
            }
            resp.bytes().await?;
            total += start.elapsed().as_secs_f64();
        }

        Ok(round3(total / samples as f64 * 1000.0))
    }

    fn server_url(&self) -> Result<&Url, MeasurementError> {
        self.selected
            .as_ref()
            .map(|(_, url)| url)
            .ok_or(MeasurementError::NoServerSelected)
    }
}

#[async_trait]
impl<C: HttpClient> SpeedTestProvider for SpeedtestNet<C> {
    #[tracing::instrument(skip(self))]
    async fn select_server(&mut self) -> Result<f64, MeasurementError> {
        let servers = self.list_servers().await?;
        debug!(count = servers.len(), "Speed test servers listed");

        let mut best: Option<(Server, Url, f64)> = None;
        for server in servers.into_iter().take(self.config.candidate_servers.max(1)) {
            let Ok(url) = Url::parse(&server.url) else {
                warn!(url = %server.url, "Skipping server with an invalid url");
                continue;
            };
            match self.probe_latency(&url).await {
                Ok(latency) => {
                    debug!(host = %server.host, latency_ms = latency, "Latency probed");
                    if best.as_ref().is_none_or(|(_, _, current)| latency < *current) {
                        best = Some((server, url, latency));
                    }
                }
                Err(e) => warn!(host = %server.host, error = %e, "Latency probe failed"),
            }
        }

        let (server, url, latency) = best.ok_or(MeasurementError::NoServers)?;
        info!(
            host = %server.host,
            sponsor = %server.sponsor,
            name = %server.name,
            latency_ms = latency,
            "Selected speed test server"
        );
        self.selected = Some((server, url));
        Ok(latency)
    }

    #[tracing::instrument(skip(self))]
    async fn download(&mut self) -> Result<f64, MeasurementError> {
        let base = self.server_url()?;
        let mut urls = Vec::new();
        for size in &self.config.download_sizes {
            for i in 0..self.config.download_repeats {
                let mut url = base
                    .join(&format!("random{size}x{size}.jpg"))
                    .map_err(|_| MeasurementError::InvalidServer(base.to_string()))?;
                url.query_pairs_mut().append_pair("x", &cache_buster(i));
                urls.push(url);
            }
        }

        let http = &self.http;
        let start = Instant::now();
        let transfers = urls
            .into_iter()
            .map(|url| async move { fetch_bytes(http, url).await.map(|body| body.len()) });
        let outcomes = run_bounded(transfers, self.config.concurrency).await;
        let elapsed = start.elapsed().as_secs_f64();

        let bytes = total_transferred(outcomes, "download")?;
        rate_bps(bytes, elapsed)
    }

    #[tracing::instrument(skip(self))]
    async fn upload(&mut self) -> Result<f64, MeasurementError> {
        let url = self.server_url()?.clone();
        let payloads: Vec<Bytes> = self
            .config
            .upload_sizes
            .iter()
            .map(|&size| upload_payload(size))
            .collect();
        let jobs: Vec<Bytes> = payloads
            .iter()
            .flat_map(|payload| std::iter::repeat_n(payload.clone(), self.config.upload_repeats))
            .collect();

        let http = &self.http;
        let start = Instant::now();
        let transfers = jobs.into_iter().map(|payload| {
            let url = url.clone();
            async move {
                let len = payload.len();
                let mut req = Request::new(Method::POST, url);
                req.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
                *req.body_mut() = Some(payload.into());
                let resp = http.execute(req).await?.error_for_status()?;
                resp.bytes().await?;
                Ok::<_, reqwest::Error>(len)
            }
        });
        let outcomes = run_bounded(transfers, self.config.concurrency).await;
        let elapsed = start.elapsed().as_secs_f64();

        let bytes = total_transferred(outcomes, "upload")?;
        rate_bps(bytes, elapsed)
    }
}

/// Drives every job to completion with at most `limit` running at once.
async fn run_bounded<F, T>(jobs: impl IntoIterator<Item = F>, limit: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    let semaphore = Semaphore::new(limit.max(1));
    let semaphore = &semaphore;
    join_all(jobs.into_iter().map(|job| async move {
        let _permit = semaphore.acquire().await;
        job.await
    }))
    .await
}

/// Sums successful transfers. Individual failures are tolerated as long as
/// at least one transfer went through.
fn total_transferred(
    outcomes: Vec<reqwest::Result<usize>>,
    direction: &str,
) -> Result<usize, MeasurementError> {
    let mut total = 0;
    let mut succeeded = 0;
    let mut last_error = None;

    for outcome in outcomes {
        match outcome {
            Ok(bytes) => {
                total += bytes;
                succeeded += 1;
            }
            Err(e) => {
                warn!(direction, error = %e, "Transfer failed");
                last_error = Some(e);
            }
        }
    }

    match (succeeded, last_error) {
        (0, Some(e)) => Err(MeasurementError::Transport(e)),
        (0, None) => Err(MeasurementError::Provider(format!(
            "no {direction} transfers configured"
        ))),
        _ => Ok(total),
    }
}

fn rate_bps(bytes: usize, elapsed_secs: f64) -> Result<f64, MeasurementError> {
    if elapsed_secs <= 0.0 {
        return Err(MeasurementError::Provider("transfer finished in zero time".to_string()));
    }
    Ok(bytes as f64 * 8.0 / elapsed_secs)
}

/// Form-encoded filler of exactly `size` bytes.
fn upload_payload(size: usize) -> Bytes {
    const PREFIX: &[u8] = b"content1=";
    const CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    let mut payload = Vec::with_capacity(size);
    payload.extend(PREFIX.iter().take(size));
    payload.extend(CHARS.iter().cycle().take(size.saturating_sub(PREFIX.len())));
    Bytes::from(payload)
}

fn cache_buster(i: usize) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{millis}.{i}")
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
