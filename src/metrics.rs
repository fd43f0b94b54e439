//! Per-run records: tower metrics for each radio generation and the speed
//! test outcome.

/// Normalized tower metrics for one radio generation.
///
/// Every field is always present; anything the gateway did not report is an
/// empty string. Field order matches [`RadioMetrics::FIELD_NAMES`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadioMetrics {
    pub rsrp: String,
    pub rsrq: String,
    pub rssi: String,
    pub snr: String,
    pub band: String,
    pub cell_id: String,
    pub ecgi: String,
    pub enbid: String,
}

impl RadioMetrics {
    /// Field names in column order.
    pub const FIELD_NAMES: [&'static str; 8] = [
        "rsrp", "rsrq", "rssi", "snr", "band", "cell_id", "ecgi", "enbid",
    ];

    /// The all-empty record used whenever the gateway data is unavailable.
    pub const EMPTY: RadioMetrics = RadioMetrics {
        rsrp: String::new(),
        rsrq: String::new(),
        rssi: String::new(),
        snr: String::new(),
        band: String::new(),
        cell_id: String::new(),
        ecgi: String::new(),
        enbid: String::new(),
    };

    /// Field values in the same order as [`RadioMetrics::FIELD_NAMES`].
    pub fn values(&self) -> [&str; 8] {
        [
            self.rsrp.as_str(),
            self.rsrq.as_str(),
            self.rssi.as_str(),
            self.snr.as_str(),
            self.band.as_str(),
            self.cell_id.as_str(),
            self.ecgi.as_str(),
            self.enbid.as_str(),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.values().iter().all(|v| v.is_empty())
    }
}

/// Radio generation a [`RadioMetrics`] record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// 4G LTE, the current generation.
    Lte,
    /// 5G NR, the next generation.
    Nr5g,
}

impl Generation {
    /// Prefix used for this generation's CSV columns.
    pub fn column_tag(self) -> &'static str {
        match self {
            Generation::Lte => "4g",
            Generation::Nr5g => "5g",
        }
    }
}

/// Outcome of one speed test. A `None` value was not measured, which is not
/// the same thing as a measured zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeedTestResult {
    pub timestamp: String,
    pub ping_ms: Option<f64>,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
}

impl SpeedTestResult {
    /// A result with only the timestamp recorded.
    pub fn unmeasured(timestamp: String) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }
}

/// Converts a provider rate in bits per second into Mbps rounded to 2 decimals.
pub fn bps_to_mbps(bps: f64) -> f64 {
    (bps / 1_000_000.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_has_every_field_blank() {
        assert!(RadioMetrics::EMPTY.is_empty());
        assert_eq!(RadioMetrics::EMPTY, RadioMetrics::default());
    }

    #[test]
    fn test_values_follow_field_order() {
        let metrics = RadioMetrics {
            rsrp: "-95".into(),
            band: "B71".into(),
            enbid: "879386".into(),
            ..RadioMetrics::EMPTY
        };

        let values = metrics.values();
        assert_eq!(values[0], "-95");
        assert_eq!(values[4], "B71");
        assert_eq!(values[7], "879386");
        assert!(!metrics.is_empty());
    }

    #[test]
    fn test_bps_to_mbps_rounds_to_two_decimals() {
        assert_eq!(bps_to_mbps(8_000_000.0), 8.0);
        assert_eq!(bps_to_mbps(1_900_000.0), 1.9);
        assert_eq!(bps_to_mbps(123_456_789.0), 123.46);
        assert_eq!(bps_to_mbps(0.0), 0.0);
    }

    #[test]
    fn test_unmeasured_keeps_timestamp() {
        let result = SpeedTestResult::unmeasured("2026-10-19 08:00:00 +0000".into());
        assert_eq!(result.timestamp, "2026-10-19 08:00:00 +0000");
        assert!(result.ping_ms.is_none());
        assert!(result.download_mbps.is_none());
        assert!(result.upload_mbps.is_none());
    }
}
