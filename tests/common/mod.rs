//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use api_shield::fetch::{HttpTransport, TransportError, TransportResponse};
use api_shield::security::DnsResolver;
use api_shield::ShieldConfig;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

pub const TODO_JSON: &str =
    r#"{"userId": 1, "id": 1, "title": "delectus aut autem", "completed": false}"#;

/// Start a programmable mock backend on an ephemeral port.
///
/// Each connection gets one response built from `(status, body)`; 3xx
/// responses point `Location` back at `/`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            302 => "302 Found",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let location = if (300..400).contains(&status) {
                            format!("Location: http://{}/\r\n", addr)
                        } else {
                            String::new()
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            location,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that always answers with the same status and body.
pub async fn start_mock_backend(status: u16, body: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (status, body.to_string()) }).await
}

/// Reply of a [`MockTransport`].
#[derive(Clone)]
pub enum Reply {
    Status(u16, &'static str),
    Fail,
    Delay(Duration),
}

/// Transport returning canned replies and counting calls.
pub struct MockTransport {
    reply: Reply,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, _url: &Url) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply.clone() {
            Reply::Status(status, body) => Ok(TransportResponse {
                status,
                body: body.as_bytes().to_vec(),
            }),
            Reply::Fail => Err(TransportError::Connect("connection refused".into())),
            Reply::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(TransportResponse {
                    status: 200,
                    body: TODO_JSON.as_bytes().to_vec(),
                })
            }
        }
    }
}

/// Resolver answering from a fixed table; unknown names fail.
pub struct StaticResolver(HashMap<String, Vec<IpAddr>>);

impl StaticResolver {
    pub fn with(entries: &[(&str, &str)]) -> Arc<Self> {
        let mut table: HashMap<String, Vec<IpAddr>> = HashMap::new();
        for (host, addr) in entries {
            table
                .entry(host.to_string())
                .or_default()
                .push(addr.parse().unwrap());
        }
        Arc::new(Self(table))
    }

    /// The default allow-listed hosts, resolving to public addresses.
    pub fn public() -> Arc<Self> {
        Self::with(&[
            ("jsonplaceholder.typicode.com", "104.21.59.19"),
            ("external-api.trusted.com", "93.184.216.34"),
        ])
    }
}

#[async_trait]
impl DnsResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.0
            .get(host)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown host"))
    }
}

/// Default configuration with the given rate-limit capacity.
pub fn config_with_capacity(capacity: u32) -> ShieldConfig {
    let mut config = ShieldConfig::default();
    config.rate_limit.capacity = capacity;
    config
}
