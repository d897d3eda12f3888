//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use resilient_client::config::{ClientConfig, EndpointConfig};

/// A raw-TCP HTTP/1.1 backend on an ephemeral local port.
pub struct MockBackend {
    pub url: String,
    hits: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl MockBackend {
    /// Requests answered so far, health probes included.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Requests answered for `path`.
    pub fn hits_for(&self, path: &str) -> usize {
        self.paths.lock().unwrap().iter().filter(|p| p.as_str() == path).count()
    }

    /// Whether `endpoint` (as reported in a `Response`) is this backend.
    pub fn is(&self, endpoint: &str) -> bool {
        endpoint.trim_end_matches('/') == self.url
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start a backend whose reply to each request target is computed by `f`.
pub async fn spawn_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let paths = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let handle = {
        let hits = hits.clone();
        let paths = paths.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let f = f.clone();
                let hits = hits.clone();
                let paths = paths.clone();
                tokio::spawn(async move {
                    let _ = serve_one(socket, f.as_ref(), &hits, &paths).await;
                });
            }
        })
    };

    MockBackend { url, hits, paths, handle }
}

async fn serve_one<F, Fut>(
    mut socket: TcpStream,
    f: &F,
    hits: &AtomicUsize,
    paths: &Mutex<Vec<String>>,
) -> std::io::Result<()>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = (u16, String)>,
{
    let target = read_request(&mut socket).await?;
    hits.fetch_add(1, Ordering::SeqCst);
    paths.lock().unwrap().push(target.split('?').next().unwrap_or_default().to_string());

    let (status, body) = f(target).await;
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason(status),
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

/// Read the request head and any declared body; return the request target.
async fn read_request(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let mut remaining = content_length.saturating_sub(buf.len() - head_end);
    while remaining > 0 {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        remaining = remaining.saturating_sub(n);
    }

    Ok(head.split_whitespace().nth(1).unwrap_or("/").to_string())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// A backend that always answers `status` with `body`.
pub async fn fixed_backend(status: u16, body: &'static str) -> MockBackend {
    spawn_backend(move |_| async move { (status, body.to_string()) }).await
}

/// A backend that answers `statuses` in order, then 200 forever.
pub async fn sequence_backend(statuses: Vec<u16>) -> MockBackend {
    let next = Arc::new(AtomicUsize::new(0));
    spawn_backend(move |_| {
        let i = next.fetch_add(1, Ordering::SeqCst);
        let status = statuses.get(i).copied().unwrap_or(200);
        async move { (status, format!("reply {}", i)) }
    })
    .await
}

/// A backend that waits `delay` before answering 200.
pub async fn slow_backend(delay: Duration) -> MockBackend {
    spawn_backend(move |_| async move {
        tokio::time::sleep(delay).await;
        (200, "slow".to_string())
    })
    .await
}

/// A URL nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

/// Config over `urls` with fast, deterministic retries and no health loop.
pub fn config_for(urls: &[&str]) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.endpoints = urls
        .iter()
        .map(|url| EndpointConfig {
            url: url.to_string(),
            weight: 1.0,
        })
        .collect();
    config.retries.base_delay_secs = 0.01;
    config.retries.max_delay_secs = 0.05;
    config.retries.jitter = false;
    config.timeouts.request_secs = 2.0;
    config.load_balancer.health_check.enabled = false;
    config
}
