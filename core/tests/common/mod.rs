#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use parafuzz_core::FuzzEventSink;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;
use wiremock::MockServer;

/// `host:port` of a mock server, without the scheme.
pub fn host_of(server: &MockServer) -> String {
    server.uri().trim_start_matches("http://").to_string()
}

/// A local port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// One-shot HTTP server that hands back the request line exactly as it
/// arrived on the socket, before any URL parsing.
pub async fn raw_request_line_server() -> (String, oneshot::Receiver<String>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
            .await
            .unwrap();
        let text = String::from_utf8_lossy(&head).into_owned();
        let _ = tx.send(text.lines().next().unwrap_or_default().to_string());
    });

    (addr, rx)
}

#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new_ref() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|l| l.contains(needle))
    }
}

impl FuzzEventSink for RecordingSink {
    fn on_log(&self, level: &str, message: &str) {
        self.lines.lock().unwrap().push(format!("{}: {}", level, message));
    }

    fn on_request(&self, counter: u64, url: &str) {
        self.lines.lock().unwrap().push(format!("[{}] Testing URL: {}", counter, url));
    }

    fn on_progress(&self, phase: &str, current: usize, total: usize) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("{} ({}/{})", phase, current, total));
    }
}
