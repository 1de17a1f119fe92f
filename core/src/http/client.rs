use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1::{self, SendRequest};
use hyper::header::{HeaderMap, HeaderValue, HOST, LOCATION, USER_AGENT};
use hyper::{Request, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use log::debug;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_rustls::TlsConnector;

use super::{HttpResponse, Transport};
use crate::error::{FuzzError, Result};
use crate::FuzzConfig;

/// Redirect hops followed before a request is reported as a redirect loop.
pub const MAX_REDIRECTS: usize = 30;

type Sender = SendRequest<Empty<Bytes>>;

/// Session-style HTTP/1.1 client: keep-alive connections reused per
/// endpoint, one User-Agent, one timeout for every request of a run.
///
/// The request-target goes on the wire exactly as the caller wrote it.
/// Nothing is percent-encoded; a URL the request line cannot carry fails.
pub struct HttpClient {
    tls: Arc<ClientConfig>,
    user_agent: HeaderValue,
    timeout: Duration,
    idle: Mutex<HashMap<String, Sender>>,
}

impl HttpClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|e| FuzzError::config(format!("invalid user agent '{}': {}", user_agent, e)))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let tls = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| FuzzError::client(e.to_string()))?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(Self {
            tls: Arc::new(tls),
            user_agent,
            timeout,
            idle: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &FuzzConfig) -> Result<Self> {
        Self::new(config.timeout(), &config.user_agent)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, url: &str) -> Result<HttpResponse> {
        let mut uri = verbatim_uri(url)?;
        let mut current = url.to_string();

        for _ in 0..=MAX_REDIRECTS {
            let endpoint = Endpoint::from_uri(&uri)?;
            let (status, headers, body) = self.exchange(&endpoint, &uri).await?;

            if let Some(next) = redirect_target(&current, status, &headers)? {
                debug!("{} redirected to {}", current, next);
                uri = next
                    .parse()
                    .map_err(|e| FuzzError::transport(format!("bad redirect to '{}': {}", next, e)))?;
                current = next;
                continue;
            }

            return Ok(HttpResponse {
                status: status.as_u16(),
                headers: headers_to_vec(&headers),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Err(FuzzError::transport(format!(
            "too many redirects (more than {}) starting at {}",
            MAX_REDIRECTS, url
        )))
    }

    /// One GET on a pooled connection. A reused connection that the server
    /// already closed is replaced once before anything is reported.
    async fn exchange(&self, endpoint: &Endpoint, uri: &Uri) -> Result<(StatusCode, HeaderMap, Bytes)> {
        let key = endpoint.to_string();
        let (mut sender, reused) = match self.take_idle(&key).await {
            Some(sender) => (sender, true),
            None => (self.connect(endpoint).await?, false),
        };

        let response = match sender.send_request(self.request(endpoint, uri)?).await {
            Ok(response) => response,
            Err(e) if reused && (e.is_canceled() || e.is_incomplete_message()) => {
                debug!("idle connection to {} went away, reconnecting", key);
                sender = self.connect(endpoint).await?;
                sender
                    .send_request(self.request(endpoint, uri)?)
                    .await
                    .map_err(|e| FuzzError::transport(FuzzError::describe(&e)))?
            }
            Err(e) => return Err(FuzzError::transport(FuzzError::describe(&e))),
        };

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| FuzzError::transport(FuzzError::describe(&e)))?
            .to_bytes();

        self.idle.lock().await.insert(key, sender);
        Ok((parts.status, parts.headers, body))
    }

    fn request(&self, endpoint: &Endpoint, uri: &Uri) -> Result<Request<Empty<Bytes>>> {
        // Origin form; `host?query` with no path is sent as `/?query`.
        let raw = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let target: Uri = if raw.starts_with('/') {
            raw.parse()
        } else {
            format!("/{}", raw).parse()
        }
        .map_err(|e| FuzzError::transport(format!("bad request target '{}': {}", raw, e)))?;

        Request::get(target)
            .header(HOST, endpoint.host_header())
            .header(USER_AGENT, self.user_agent.clone())
            .body(Empty::new())
            .map_err(|e| FuzzError::transport(format!("failed to build request: {}", e)))
    }

    async fn take_idle(&self, key: &str) -> Option<Sender> {
        let mut sender = self.idle.lock().await.remove(key)?;
        if sender.is_closed() {
            return None;
        }
        sender.ready().await.ok()?;
        Some(sender)
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<Sender> {
        let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| FuzzError::transport(format!("failed to connect to {}: {}", endpoint, e)))?;

        if !endpoint.tls {
            return handshake(tcp).await;
        }

        let server_name = ServerName::try_from(endpoint.host.clone())
            .map_err(|e| FuzzError::transport(format!("invalid server name '{}': {}", endpoint.host, e)))?;
        let stream = TlsConnector::from(Arc::clone(&self.tls))
            .connect(server_name, tcp)
            .await
            .map_err(|e| FuzzError::transport(format!("TLS connection to {} failed: {}", endpoint.host, e)))?;
        handshake(stream).await
    }
}

async fn handshake<S>(stream: S) -> Result<Sender>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (sender, conn) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| FuzzError::transport(format!("HTTP handshake failed: {}", e)))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!("connection error: {}", e);
        }
    });
    Ok(sender)
}

#[async_trait]
impl Transport for HttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        debug!("GET {}", url);

        let response = tokio::time::timeout(self.timeout, self.fetch(url))
            .await
            .map_err(|_| {
                FuzzError::transport(format!("operation timed out after {}s", self.timeout.as_secs()))
            })??;

        debug!("{} -> {} ({} bytes)", url, response.status, response.body.len());
        Ok(response)
    }
}

/// Parses `url` without rewriting it. Fails when any part of the query would
/// not reach the server byte for byte.
pub fn verbatim_uri(url: &str) -> Result<Uri> {
    if url.contains('#') {
        return Err(FuzzError::transport(format!(
            "cannot send '{}' verbatim: '#' would start a fragment and never reach the server",
            url
        )));
    }

    let uri: Uri = url
        .parse()
        .map_err(|e| FuzzError::transport(format!("cannot send '{}' verbatim: {}", url, e)))?;

    let raw_query = url.split_once('?').map(|(_, q)| q);
    if uri.query() != raw_query {
        return Err(FuzzError::transport(format!(
            "cannot send '{}' verbatim: query would be altered",
            url
        )));
    }
    Ok(uri)
}

/// Where a redirect response points, resolved against the URL that produced it.
fn redirect_target(current: &str, status: StatusCode, headers: &HeaderMap) -> Result<Option<String>> {
    if !matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308) {
        return Ok(None);
    }
    let Some(location) = headers.get(LOCATION) else {
        return Ok(None);
    };
    let location = String::from_utf8_lossy(location.as_bytes());

    let base = url::Url::parse(current)
        .map_err(|e| FuzzError::transport(format!("cannot resolve redirect from '{}': {}", current, e)))?;
    let mut next = base
        .join(&location)
        .map_err(|e| FuzzError::transport(format!("bad redirect location '{}': {}", location, e)))?;
    next.set_fragment(None);
    Ok(Some(next.to_string()))
}

/// Connection identity for the keep-alive pool.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    tls: bool,
    host: String,
    port: u16,
}

impl Endpoint {
    fn from_uri(uri: &Uri) -> Result<Self> {
        let tls = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            other => {
                return Err(FuzzError::transport(format!(
                    "unsupported scheme '{}' in {}",
                    other.unwrap_or(""),
                    uri
                )))
            }
        };
        let host = uri
            .host()
            .ok_or_else(|| FuzzError::transport(format!("no host in {}", uri)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = uri.port_u16().unwrap_or(if tls { 443 } else { 80 });
        Ok(Self { tls, host, port })
    }

    fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let default_port = if self.tls { 443 } else { 80 };
        if self.port == default_port {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "https" } else { "http" };
        write!(f, "{}://{}", scheme, self.host_header())
    }
}

fn headers_to_vec(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
        .collect()
}
