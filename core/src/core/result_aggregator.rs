use std::collections::BTreeMap;
use std::fs;

use chrono::{SecondsFormat, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::core::engine::FuzzReport;
use crate::error::Result;
use crate::SinkRef;

/// Outcome of one attempted request.
///
/// Either the three response fields are set or `error` is, never both. Build
/// values through `from_response` / `from_error` to keep it that way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzResult {
    pub timestamp: String,
    pub request_url: String,
    pub base_host_path: String,
    pub parameter: String,
    pub payload: String,
    pub status_code: Option<u16>,
    pub response_headers: Option<BTreeMap<String, String>>,
    pub response_body_snippet: Option<String>,
    pub error: Option<String>,
}

impl FuzzResult {
    pub fn from_response(
        request_url: String,
        host_path: &str,
        parameter: &str,
        payload: &str,
        status_code: u16,
        headers: BTreeMap<String, String>,
        body_snippet: String,
    ) -> Self {
        Self {
            timestamp: now_iso(),
            request_url,
            base_host_path: host_path.to_string(),
            parameter: parameter.to_string(),
            payload: payload.to_string(),
            status_code: Some(status_code),
            response_headers: Some(headers),
            response_body_snippet: Some(body_snippet),
            error: None,
        }
    }

    pub fn from_error(
        request_url: String,
        host_path: &str,
        parameter: &str,
        payload: &str,
        error: String,
    ) -> Self {
        Self {
            timestamp: now_iso(),
            request_url,
            base_host_path: host_path.to_string(),
            parameter: parameter.to_string(),
            payload: payload.to_string(),
            status_code: None,
            response_headers: None,
            response_body_snippet: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Writes the collected results once a run has completed.
pub struct ResultAggregator;

impl ResultAggregator {
    /// Pretty-prints `results` as a JSON array to `path`.
    ///
    /// Written to `<path>.tmp` first and renamed over `path`, so a killed
    /// process never leaves a half-written file behind.
    pub fn save(results: &[FuzzResult], path: &str) -> Result<()> {
        let tmp = format!("{}.tmp", path);
        let json = serde_json::to_string_pretty(results)?;
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, path)?;
        info!("wrote {} results to {}", results.len(), path);
        Ok(())
    }

    pub fn load(path: &str) -> Result<Vec<FuzzResult>> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn report_summary(report: &FuzzReport, sink: &SinkRef) {
        if report.cancelled {
            sink.on_log("warn", "[!] Fuzzing cancelled before all targets were processed.");
        }
        sink.on_log(
            "phase",
            &format!("\nFuzzing complete. Total requests made: {}", report.request_count),
        );
        sink.on_log(
            "info",
            &format!(
                "[+] Responses: {} | Failed: {} | Skipped targets: {}",
                report.success_count(),
                report.failure_count(),
                report.skipped_targets
            ),
        );
    }
}
