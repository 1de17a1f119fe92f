use std::collections::BTreeMap;

use log::debug;

use crate::core::result_aggregator::FuzzResult;
use crate::core::target::TargetDescriptor;
use crate::error::FuzzError;
use crate::http::{build_fuzz_url, HttpResponse, Transport};

/// Characters of response body kept per result.
pub const DEFAULT_SNIPPET_LIMIT: usize = 20_000;

/// Turns one `(target, payload)` pair into exactly one `FuzzResult`.
pub struct RequestExecutor<T: Transport> {
    transport: T,
    scheme: String,
    snippet_limit: usize,
}

impl<T: Transport> RequestExecutor<T> {
    pub fn new(transport: T, scheme: impl Into<String>, snippet_limit: usize) -> Self {
        Self {
            transport,
            scheme: scheme.into(),
            snippet_limit,
        }
    }

    pub fn url_for(&self, target: &TargetDescriptor, payload: &str) -> String {
        build_fuzz_url(&self.scheme, target.host_path(), target.parameter(), payload)
    }

    /// Sends the request once. Transport failures land in `FuzzResult::error`
    /// and are never returned to the caller.
    pub async fn execute(&self, target: &TargetDescriptor, payload: &str) -> FuzzResult {
        let url = self.url_for(target, payload);
        self.send(url, target, payload).await
    }

    /// Like `execute`, for callers that already built the URL via `url_for`.
    pub async fn send(&self, url: String, target: &TargetDescriptor, payload: &str) -> FuzzResult {
        match self.transport.get(&url).await {
            Ok(response) => self.capture(url, target, payload, response),
            Err(e) => {
                let message = match e {
                    FuzzError::RequestTransportFailure(msg) => msg,
                    other => other.to_string(),
                };
                debug!("request to {} failed: {}", url, message);
                FuzzResult::from_error(url, target.host_path(), target.parameter(), payload, message)
            }
        }
    }

    fn capture(
        &self,
        url: String,
        target: &TargetDescriptor,
        payload: &str,
        response: HttpResponse,
    ) -> FuzzResult {
        let headers = flatten_headers(response.headers);
        let snippet = truncate_chars(&response.body, self.snippet_limit);
        FuzzResult::from_response(
            url,
            target.host_path(),
            target.parameter(),
            payload,
            response.status,
            headers,
            snippet,
        )
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// One value per header name; a repeated header keeps its last value.
pub fn flatten_headers(pairs: Vec<(String, String)>) -> BTreeMap<String, String> {
    pairs.into_iter().collect()
}

/// Keeps the first `limit` chars. Never splits a UTF-8 sequence.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
