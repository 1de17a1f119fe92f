use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::core::executor::RequestExecutor;
use crate::core::result_aggregator::FuzzResult;
use crate::core::target::TargetDescriptor;
use crate::core::throttle::ThrottleController;
use crate::error::{FuzzError, Result};
use crate::http::{build_fuzz_url, Transport};
use crate::utils::corpus_loader::Corpus;
use crate::{FuzzConfig, SinkRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
}

/// Everything a finished run hands to the result sink.
#[derive(Debug, Clone, Default)]
pub struct FuzzReport {
    /// In request order: targets outer, payloads inner.
    pub results: Vec<FuzzResult>,
    pub request_count: u64,
    pub skipped_targets: usize,
    pub cancelled: bool,
}

impl FuzzReport {
    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }

    pub fn success_count(&self) -> usize {
        self.results.len() - self.failure_count()
    }
}

/// Sequential cross-product fuzzer.
///
/// For every parsed target (file order) and every payload (file order) the
/// engine sends exactly one request, records exactly one `FuzzResult`, then
/// sleeps the fixed throttle delay. Nothing runs concurrently: each request
/// is awaited before the next one is built.
pub struct FuzzEngine<T: Transport> {
    config: FuzzConfig,
    executor: RequestExecutor<T>,
    throttle: ThrottleController,
    sink: SinkRef,
    cancel: Arc<AtomicBool>,
    state: RunState,
    request_counter: u64,
    results: Vec<FuzzResult>,
}

impl<T: Transport> FuzzEngine<T> {
    pub fn new(config: FuzzConfig, transport: T, sink: SinkRef) -> Self {
        let executor = RequestExecutor::new(transport, config.scheme.clone(), config.snippet_limit);
        let throttle = ThrottleController::new(config.delay());
        Self {
            config,
            executor,
            throttle,
            sink,
            cancel: Arc::new(AtomicBool::new(false)),
            state: RunState::Idle,
            request_counter: 0,
            results: Vec::new(),
        }
    }

    /// Shares an externally owned cancellation flag (e.g. set on Ctrl-C).
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Setting the returned flag stops the run before the next target.
    /// A request already in flight is allowed to finish.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn request_count(&self) -> u64 {
        self.request_counter
    }

    /// Loads the corpus named by the config and fuzzes it.
    ///
    /// A missing corpus file aborts before any request is sent.
    pub async fn run(&mut self) -> Result<FuzzReport> {
        self.ensure_idle()?;
        let corpus = Corpus::load(&self.config.target_file, &self.config.payload_file)?;
        self.run_corpus(&corpus).await
    }

    pub async fn run_corpus(&mut self, corpus: &Corpus) -> Result<FuzzReport> {
        self.ensure_idle()?;
        self.state = RunState::Running;

        self.sink.on_log(
            "info",
            &format!(
                "Loaded {} payloads and {} targets.",
                corpus.payloads.len(),
                corpus.targets.len()
            ),
        );

        let total_targets = corpus.targets.len();
        let mut skipped_targets = 0;
        let mut cancelled = false;

        for (index, row) in corpus.targets.iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                info!("cancellation requested, stopping before target {}", index + 1);
                cancelled = true;
                break;
            }

            let target = match TargetDescriptor::parse(row) {
                Ok(target) => target,
                Err(e) => {
                    debug!("{}", e);
                    self.sink.on_log("warn", &e.to_string());
                    skipped_targets += 1;
                    continue;
                }
            };

            self.sink.on_progress(
                &format!("Target {} [param: {}]", target.host_path(), target.parameter()),
                index + 1,
                total_targets,
            );

            for payload in &corpus.payloads {
                self.fuzz_one(&target, payload).await;
            }
        }

        self.state = RunState::Completed;
        debug!(
            "run completed: {} requests, {} skipped targets",
            self.request_counter, skipped_targets
        );

        Ok(FuzzReport {
            results: mem::take(&mut self.results),
            request_count: self.request_counter,
            skipped_targets,
            cancelled,
        })
    }

    async fn fuzz_one(&mut self, target: &TargetDescriptor, payload: &str) {
        self.request_counter += 1;
        let url = self.executor.url_for(target, payload);
        self.sink.on_request(self.request_counter, &url);

        let result = self.executor.send(url, target, payload).await;
        if let Some(ref error) = result.error {
            self.sink.on_log("error", &format!("  -> Request failed: {}", error));
        }
        self.results.push(result);

        self.throttle.wait().await;
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.state != RunState::Idle {
            return Err(FuzzError::AlreadyCompleted);
        }
        Ok(())
    }
}

/// Walks the corpus like a real run without sending anything and returns
/// the URLs that would be requested, in request order.
pub fn plan_requests(corpus: &Corpus, scheme: &str, sink: &SinkRef) -> Vec<String> {
    let mut urls = Vec::new();
    for row in &corpus.targets {
        let target = match TargetDescriptor::parse(row) {
            Ok(target) => target,
            Err(e) => {
                sink.on_log("warn", &e.to_string());
                continue;
            }
        };
        for payload in &corpus.payloads {
            let url = build_fuzz_url(scheme, target.host_path(), target.parameter(), payload);
            sink.on_log("info", &format!("[{}] Would test URL: {}", urls.len() + 1, url));
            urls.push(url);
        }
    }
    urls
}
