pub mod core;
pub mod error;
pub mod http;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

pub use crate::core::engine::{plan_requests, FuzzEngine, FuzzReport, RunState};
pub use crate::core::executor::{RequestExecutor, DEFAULT_SNIPPET_LIMIT};
pub use crate::core::result_aggregator::{FuzzResult, ResultAggregator};
pub use crate::core::target::TargetDescriptor;
pub use crate::error::{FuzzError, Result};
pub use crate::http::{HttpClient, HttpResponse, Transport};
pub use crate::utils::corpus_loader::Corpus;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0";

/// Run configuration shared by the CLI and library callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzConfig {
    pub target_file: String,
    pub payload_file: String,
    pub output_file: String,
    /// Per-request timeout in seconds.
    pub request_timeout: u64,
    /// Pause after every request, in milliseconds.
    pub rate_limit_delay: u64,
    pub user_agent: String,
    /// `https` unless pointed at a plain-HTTP test server.
    pub scheme: String,
    /// Body characters kept per result.
    pub snippet_limit: usize,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            target_file: "target.txt".to_string(),
            payload_file: "payload.txt".to_string(),
            output_file: "fuzzing_results.json".to_string(),
            request_timeout: 10,
            rate_limit_delay: crate::core::throttle::DEFAULT_DELAY_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            scheme: "https".to_string(),
            snippet_limit: DEFAULT_SNIPPET_LIMIT,
        }
    }
}

impl FuzzConfig {
    /// Reads a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: &str) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheme != "https" && self.scheme != "http" {
            return Err(FuzzError::config(format!(
                "unsupported scheme '{}' (expected 'https' or 'http')",
                self.scheme
            )));
        }
        if self.request_timeout == 0 {
            return Err(FuzzError::config("request_timeout must be at least 1 second"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay)
    }
}

/// Output abstraction for the fuzz pipeline.
/// The CLI prints through `ConsoleSink`; tests record messages instead.
pub trait FuzzEventSink: Send + Sync {
    fn on_log(&self, level: &str, message: &str);
    fn on_request(&self, counter: u64, url: &str);
    fn on_progress(&self, phase: &str, current: usize, total: usize);
}

pub type SinkRef = Arc<dyn FuzzEventSink>;

/// Terminal output sink for CLI usage.
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new_ref() -> SinkRef {
        Arc::new(Self)
    }
}

impl FuzzEventSink for ConsoleSink {
    fn on_log(&self, level: &str, message: &str) {
        use colored::*;
        let colored = match level {
            "success" => message.green().to_string(),
            "error"   => message.red().to_string(),
            "warn"    => message.yellow().to_string(),
            "phase"   => message.bright_cyan().bold().to_string(),
            _         => message.to_string(),
        };
        println!("{}", colored);
    }

    fn on_request(&self, counter: u64, url: &str) {
        use colored::*;
        println!("{} Testing URL: {}", format!("[{}]", counter).dimmed(), url);
    }

    fn on_progress(&self, phase: &str, current: usize, total: usize) {
        use colored::*;
        if total > 0 {
            println!("{}", format!("[*] {} ({}/{})", phase, current, total).bright_cyan());
        } else {
            println!("{}", format!("[*] {}", phase).bright_cyan());
        }
    }
}

/// Runs a complete fuzz session: load the corpus, fuzz every combination
/// over HTTP, print the summary and write the JSON results.
///
/// Fails without writing anything when the config is invalid or a corpus
/// file is missing.
pub async fn run_fuzz(
    config: &FuzzConfig,
    sink: SinkRef,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<FuzzReport> {
    config.validate()?;
    let client = HttpClient::from_config(config)?;
    let mut engine = FuzzEngine::new(config.clone(), client, Arc::clone(&sink));
    if let Some(flag) = cancel {
        engine = engine.with_cancel_flag(flag);
    }

    let report = engine.run().await?;

    ResultAggregator::report_summary(&report, &sink);
    ResultAggregator::save(&report.results, &config.output_file)?;
    sink.on_log(
        "success",
        &format!("All results saved to '{}'", config.output_file),
    );
    Ok(report)
}

/// Prints every URL a run would request without sending anything.
/// Returns the number of planned requests.
pub fn dry_run(config: &FuzzConfig, sink: SinkRef) -> Result<usize> {
    config.validate()?;
    let corpus = Corpus::load(&config.target_file, &config.payload_file)?;
    sink.on_log(
        "info",
        &format!(
            "Loaded {} payloads and {} targets.",
            corpus.payloads.len(),
            corpus.targets.len()
        ),
    );
    let planned = plan_requests(&corpus, &config.scheme, &sink);
    sink.on_log(
        "phase",
        &format!(
            "\n[DRY RUN] {} request(s) planned of {} target/payload combinations, none sent.",
            planned.len(),
            corpus.combinations()
        ),
    );
    Ok(planned.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = FuzzConfig::default();
        assert_eq!(config.target_file, "target.txt");
        assert_eq!(config.payload_file, "payload.txt");
        assert_eq!(config.output_file, "fuzzing_results.json");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.delay(), Duration::from_millis(100));
        assert_eq!(config.scheme, "https");
        assert_eq!(config.snippet_limit, 20_000);
        assert!(config.user_agent.contains("Firefox/124.0"));
    }

    #[test]
    fn test_config_file_fills_missing_keys_with_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"target_file": "t.txt", "rate_limit_delay": 250}}"#).unwrap();

        let config = FuzzConfig::from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.target_file, "t.txt");
        assert_eq!(config.rate_limit_delay, 250);
        assert_eq!(config.payload_file, "payload.txt");
        assert_eq!(config.request_timeout, 10);
    }

    #[test]
    fn test_validate_rejects_unknown_scheme() {
        let config = FuzzConfig { scheme: "ftp".to_string(), ..FuzzConfig::default() };
        assert!(matches!(config.validate(), Err(FuzzError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = FuzzConfig { request_timeout: 0, ..FuzzConfig::default() };
        assert!(matches!(config.validate(), Err(FuzzError::Config(_))));
    }

    #[test]
    fn test_dry_run_counts_without_sending() {
        let mut targets = NamedTempFile::new().unwrap();
        writeln!(targets, "a.com/x,id\nmalformed\nb.com/y,q").unwrap();
        let mut payloads = NamedTempFile::new().unwrap();
        writeln!(payloads, "1\n2\n3").unwrap();

        let config = FuzzConfig {
            target_file: targets.path().to_str().unwrap().to_string(),
            payload_file: payloads.path().to_str().unwrap().to_string(),
            ..FuzzConfig::default()
        };
        let recording = test_support::RecordingSink::new_ref();
        let planned = dry_run(&config, recording.clone()).unwrap();

        assert_eq!(planned, 6);
        assert!(recording.contains("[DRY RUN] 6 request(s) planned of 9 target/payload combinations"));
    }
}
