//! Shared helpers for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{FuzzError, Result};
use crate::http::{HttpResponse, Transport};
use crate::FuzzEventSink;

enum Canned {
    Respond(HttpResponse),
    Fail(String),
}

/// Transport that answers from a table of canned responses and records
/// every URL it was asked for. Unknown URLs get `200` with body `ok`.
#[derive(Default)]
pub struct MockTransport {
    canned: HashMap<String, Canned>,
    requested: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, status: u16, headers: Vec<(&str, &str)>, body: &str) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.canned.insert(
            url.to_string(),
            Canned::Respond(HttpResponse { status, headers, body: body.to_string() }),
        );
        self
    }

    pub fn fail(mut self, url: &str, message: &str) -> Self {
        self.canned.insert(url.to_string(), Canned::Fail(message.to_string()));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.canned.get(url) {
            Some(Canned::Respond(response)) => Ok(response.clone()),
            Some(Canned::Fail(message)) => Err(FuzzError::transport(message.clone())),
            None => Ok(HttpResponse {
                status: 200,
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                body: "ok".to_string(),
            }),
        }
    }
}

/// Sink that keeps every message so tests can assert on console output.
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new_ref() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl FuzzEventSink for RecordingSink {
    fn on_log(&self, level: &str, message: &str) {
        self.lines.lock().unwrap().push(format!("{}: {}", level, message));
    }

    fn on_request(&self, counter: u64, url: &str) {
        self.lines.lock().unwrap().push(format!("request: [{}] {}", counter, url));
    }

    fn on_progress(&self, phase: &str, current: usize, total: usize) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("progress: {} ({}/{})", phase, current, total));
    }
}
