//! The two status document layouts shipped by gateway firmware.
//!
//! Older firmware serves an authenticated `cell_status_app.cgi` whose cells are
//! flat maps. Newer firmware serves `fastmile_radio_status_web_app.cgi` without
//! a login, nesting each cell's readings under `stat` and dropping the ECGI and
//! eNB identifiers. Which one a gateway speaks is a deployment fact, so the
//! choice is made up front rather than sniffed from the response.

use clap::ValueEnum;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::metrics::{Generation, RadioMetrics};

/// Source keys for each [`RadioMetrics`] field, in field order. `None` means
/// the layout never carries that field.
type FieldKeys = [Option<&'static str>; 8];

const CELL_STATUS_KEYS: FieldKeys = [
    Some("RSRPCurrent"),
    Some("RSRQCurrent"),
    Some("RSSICurrent"),
    Some("SNRCurrent"),
    Some("Band"),
    Some("Cellid"),
    Some("ECGI"),
    Some("eNBID"),
];

const RADIO_STATUS_KEYS: FieldKeys = [
    Some("RSRPCurrent"),
    Some("RSRQCurrent"),
    Some("RSSICurrent"),
    Some("SNRCurrent"),
    Some("Band"),
    Some("PhysicalCellID"),
    None,
    None,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GatewaySchema {
    /// `cell_status_app.cgi`, needs a login, flat cell maps.
    CellStatus,
    /// `fastmile_radio_status_web_app.cgi`, open, cells nested under `stat`.
    RadioStatus,
}

impl GatewaySchema {
    pub fn name(self) -> &'static str {
        match self {
            GatewaySchema::CellStatus => "cell-status",
            GatewaySchema::RadioStatus => "radio-status",
        }
    }

    /// Path of the status document, relative to the gateway root.
    pub fn status_path(self) -> &'static str {
        match self {
            GatewaySchema::CellStatus => "cell_status_app.cgi",
            GatewaySchema::RadioStatus => "fastmile_radio_status_web_app.cgi",
        }
    }

    pub fn requires_login(self) -> bool {
        matches!(self, GatewaySchema::CellStatus)
    }

    /// Top-level key holding the cell array for `generation`.
    pub fn generation_key(self, generation: Generation) -> &'static str {
        match (self, generation) {
            (GatewaySchema::CellStatus, Generation::Lte) => "cell_stat_lte",
            (GatewaySchema::CellStatus, Generation::Nr5g) => "cell_stat_5G",
            (GatewaySchema::RadioStatus, Generation::Lte) => "cell_LTE_stats_cfg",
            (GatewaySchema::RadioStatus, Generation::Nr5g) => "cell_5G_stats_cfg",
        }
    }

    fn field_keys(self) -> &'static FieldKeys {
        match self {
            GatewaySchema::CellStatus => &CELL_STATUS_KEYS,
            GatewaySchema::RadioStatus => &RADIO_STATUS_KEYS,
        }
    }

    /// Decodes a raw status body into `(4G, 5G)` metrics.
    ///
    /// # Errors
    ///
    /// Fails only when the body is not JSON or not a JSON object. Missing or
    /// oddly shaped generation entries fall back to [`RadioMetrics::EMPTY`].
    pub fn parse(self, body: &[u8]) -> Result<(RadioMetrics, RadioMetrics), FetchError> {
        let doc: Value = serde_json::from_slice(body)?;
        match doc {
            Value::Object(map) => Ok(self.extract(&map)),
            _ => Err(FetchError::NotAnObject),
        }
    }

    /// Extracts `(4G, 5G)` metrics from an already decoded status document.
    pub fn extract(self, doc: &Map<String, Value>) -> (RadioMetrics, RadioMetrics) {
        (
            self.extract_generation(doc, Generation::Lte),
            self.extract_generation(doc, Generation::Nr5g),
        )
    }

    fn extract_generation(self, doc: &Map<String, Value>, generation: Generation) -> RadioMetrics {
        let key = self.generation_key(generation);
        let Some(cells) = doc.get(key) else {
            debug!(key, "Generation not reported by gateway");
            return RadioMetrics::EMPTY;
        };

        // One active cell per generation; anything after the first is ignored.
        let first = match cells {
            Value::Array(items) => items.first(),
            _ => None,
        };
        let cell = match (self, first) {
            (GatewaySchema::CellStatus, Some(Value::Object(cell))) => Some(cell),
            (GatewaySchema::RadioStatus, Some(entry)) => {
                entry.get("stat").and_then(Value::as_object)
            }
            _ => None,
        };

        match cell {
            Some(cell) => metrics_from_cell(cell, self.field_keys()),
            None => {
                warn!(key, "Generation entry has an unexpected shape, using empty metrics");
                RadioMetrics::EMPTY
            }
        }
    }
}

fn metrics_from_cell(cell: &Map<String, Value>, keys: &FieldKeys) -> RadioMetrics {
    let field = |i: usize| -> String {
        keys[i]
            .and_then(|key| cell.get(key))
            .map(stringify)
            .unwrap_or_default()
    };

    RadioMetrics {
        rsrp: field(0),
        rsrq: field(1),
        rssi: field(2),
        snr: field(3),
        band: field(4),
        cell_id: field(5),
        ecgi: field(6),
        enbid: field(7),
    }
}

/// Renders a JSON scalar the way it should appear in a CSV cell.
// Booleans stay lowercase and null is blank, same as a missing key.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
