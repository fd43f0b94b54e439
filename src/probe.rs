//! One complete run: tower metrics, speed test, CSV row.

use anyhow::{Context, Result};
use tracing::info;

use crate::fetch::HttpClient;
use crate::gateway::GatewayClient;
use crate::metrics::{RadioMetrics, SpeedTestResult};
use crate::output::MetricsLogWriter;
use crate::speedtest::{SpeedTestProvider, TIMESTAMP_FORMAT, perform_speed_test};

/// Everything one run recorded, as written to the CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub speed: SpeedTestResult,
    pub lte: RadioMetrics,
    pub nr: RadioMetrics,
}

/// Queries the gateway, runs the speed test (when a provider is given) and
/// appends the combined row.
///
/// # Errors
///
/// Fails only on a rejected gateway login or when the row cannot be written.
#[tracing::instrument(skip_all, fields(log_file = %writer.path().display()))]
pub async fn run_probe<C, P>(
    gateway: &GatewayClient<C>,
    provider: Option<&mut P>,
    writer: &MetricsLogWriter,
) -> Result<ProbeOutcome>
where
    C: HttpClient,
    P: SpeedTestProvider + ?Sized,
{
    let (lte, nr) = gateway
        .fetch_radio_metrics()
        .await
        .context("Failed to authenticate with the gateway")?;
    info!(lte_band = %lte.band, nr_band = %nr.band, "Tower metrics collected");

    let speed = match provider {
        Some(provider) => perform_speed_test(provider).await,
        None => {
            info!("Speed test skipped");
            SpeedTestResult::unmeasured(chrono::Local::now().format(TIMESTAMP_FORMAT).to_string())
        }
    };

    writer
        .append_row(&speed, &lte, &nr)
        .with_context(|| format!("Failed to append to {}", writer.path().display()))?;
    info!("Run recorded");

    Ok(ProbeOutcome { speed, lte, nr })
}
