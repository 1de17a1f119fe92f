pub mod client;

pub use client::HttpClient;

use async_trait::async_trait;

use crate::error::Result;

/// A response reduced to what a fuzz result records.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header pairs in wire order. Repeated names appear repeatedly.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Sends a single GET and hands back the decoded response.
///
/// Implementations must map every network or protocol failure to
/// `FuzzError::RequestTransportFailure` instead of panicking.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// Builds `{scheme}://{host_path}?{parameter}={payload}`.
///
/// The payload is interpolated verbatim. Percent-encoding it would stop raw
/// injection characters from reaching the server.
pub fn build_fuzz_url(scheme: &str, host_path: &str, parameter: &str, payload: &str) -> String {
    format!("{}://{}?{}={}", scheme, host_path, parameter, payload)
}
