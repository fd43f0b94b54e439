//! Internet speed test: the provider seam and the measurement sequence.
//!
//! [`perform_speed_test`] never fails. Whatever the provider could not
//! measure is left as `None` in the returned [`SpeedTestResult`].

mod speedtest_net;

pub use speedtest_net::{SERVER_LIST_URL, Server, SpeedTestConfig, SpeedtestNet};

use async_trait::async_trait;
use chrono::Local;
use tracing::{error, info};

use crate::error::MeasurementError;
use crate::metrics::{SpeedTestResult, bps_to_mbps};

/// Timestamp layout used in the CSV, local time with numeric offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Something that can measure latency and throughput against a remote server.
///
/// `select_server` must be called before the transfer measurements.
#[async_trait]
pub trait SpeedTestProvider: Send {
    /// Picks a measurement server and returns its latency in milliseconds.
    async fn select_server(&mut self) -> Result<f64, MeasurementError>;

    /// Download rate in bits per second.
    async fn download(&mut self) -> Result<f64, MeasurementError>;

    /// Upload rate in bits per second.
    async fn upload(&mut self) -> Result<f64, MeasurementError>;
}

/// Runs ping, download and upload in that order.
///
/// The timestamp is taken before anything is measured. The first failure
/// stops the sequence; values measured before it are kept.
#[tracing::instrument(skip(provider))]
pub async fn perform_speed_test<P>(provider: &mut P) -> SpeedTestResult
where
    P: SpeedTestProvider + ?Sized,
{
    let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
    let mut result = SpeedTestResult::unmeasured(timestamp);

    if let Err(e) = measure(provider, &mut result).await {
        error!(error = %e, "Speed test failed");
    }

    info!(
        ping_ms = ?result.ping_ms,
        download_mbps = ?result.download_mbps,
        upload_mbps = ?result.upload_mbps,
        "Speed test finished"
    );
    result
}

async fn measure<P: SpeedTestProvider + ?Sized>(
    provider: &mut P,
    result: &mut SpeedTestResult,
) -> Result<(), MeasurementError> {
    result.ping_ms = Some(provider.select_server().await?);
    result.download_mbps = Some(bps_to_mbps(provider.download().await?));
    result.upload_mbps = Some(bps_to_mbps(provider.upload().await?));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        latency: Result<f64, &'static str>,
        download: Result<f64, &'static str>,
        upload: Result<f64, &'static str>,
        calls: Vec<&'static str>,
    }

    impl FixedProvider {
        fn new(latency: f64, download: f64, upload: f64) -> Self {
            Self {
                latency: Ok(latency),
                download: Ok(download),
                upload: Ok(upload),
                calls: Vec::new(),
            }
        }
    }

    fn lift(value: Result<f64, &'static str>) -> Result<f64, MeasurementError> {
        value.map_err(|e| MeasurementError::Provider(e.to_string()))
    }

    #[async_trait]
    impl SpeedTestProvider for FixedProvider {
        async fn select_server(&mut self) -> Result<f64, MeasurementError> {
            self.calls.push("select_server");
            lift(self.latency)
        }

        async fn download(&mut self) -> Result<f64, MeasurementError> {
            self.calls.push("download");
            lift(self.download)
        }

        async fn upload(&mut self) -> Result<f64, MeasurementError> {
            self.calls.push("upload");
            lift(self.upload)
        }
    }

    #[tokio::test]
    async fn test_speed_test_success() {
        let mut provider = FixedProvider::new(12.0, 8.0 * 1_000_000.0, 1.9 * 1_000_000.0);

        let result = perform_speed_test(&mut provider).await;

        assert_eq!(provider.calls, vec!["select_server", "download", "upload"]);
        assert_eq!(result.ping_ms, Some(12.0));
        assert_eq!(result.download_mbps, Some(8.0));
        assert_eq!(result.upload_mbps, Some(1.9));
        assert!(!result.timestamp.is_empty());
    }

    #[tokio::test]
    async fn test_server_selection_failure_leaves_everything_absent() {
        let mut provider = FixedProvider::new(0.0, 1.0, 1.0);
        provider.latency = Err("no servers");

        let result = perform_speed_test(&mut provider).await;

        assert_eq!(provider.calls, vec!["select_server"]);
        assert_eq!(result.ping_ms, None);
        assert_eq!(result.download_mbps, None);
        assert_eq!(result.upload_mbps, None);
        assert!(!result.timestamp.is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_earlier_values() {
        let mut provider = FixedProvider::new(20.5, 50_123_000.0, 0.0);
        provider.upload = Err("connection reset");

        let result = perform_speed_test(&mut provider).await;

        assert_eq!(result.ping_ms, Some(20.5));
        assert_eq!(result.download_mbps, Some(50.12));
        assert_eq!(result.upload_mbps, None);
    }

    #[tokio::test]
    async fn test_measured_zero_is_not_absent() {
        let mut provider = FixedProvider::new(1.0, 0.0, 0.0);

        let result = perform_speed_test(&mut provider).await;

        assert_eq!(result.download_mbps, Some(0.0));
        assert_eq!(result.upload_mbps, Some(0.0));
    }
}
