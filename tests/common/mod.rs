//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use redirects::content::{ContentResolver, ResolveError, ResolveFuture};
use redirects::model::{DestinationKind, NodeRef, RedirectRule};
use redirects::routing::ResolutionEngine;

/// Parse a rule from its stored JSON form.
pub fn rule(json: serde_json::Value) -> RedirectRule {
    serde_json::from_value(json).expect("valid rule json")
}

/// An engine over `rules` with the given resolver.
pub fn engine(
    resolver: Arc<dyn ContentResolver>,
    rules: Vec<RedirectRule>,
) -> Arc<ResolutionEngine> {
    let engine = ResolutionEngine::new(resolver).with_resolve_timeout(Duration::from_millis(100));
    engine.load_rules(rules);
    Arc::new(engine)
}

/// Scripted content resolver.
#[derive(Debug, Default)]
pub struct FakeResolver {
    /// `(node id, url)` pairs that resolve.
    pub nodes: Vec<(i32, String)>,
    /// Node ids whose lookup fails as unavailable.
    pub failing: Vec<i32>,
    /// Node ids whose lookup never finishes.
    pub hanging: Vec<i32>,
    pub calls: AtomicUsize,
}

impl FakeResolver {
    pub fn with_node(mut self, id: i32, url: &str) -> Self {
        self.nodes.push((id, url.to_string()));
        self
    }

    pub fn failing(mut self, id: i32) -> Self {
        self.failing.push(id);
        self
    }

    pub fn hanging(mut self, id: i32) -> Self {
        self.hanging.push(id);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContentResolver for FakeResolver {
    fn resolve_node_url(&self, _kind: DestinationKind, node: NodeRef) -> ResolveFuture<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hanging.contains(&node.id) {
            return std::future::pending().boxed();
        }
        let result = if self.failing.contains(&node.id) {
            Err(ResolveError::Unavailable("scripted failure".into()))
        } else {
            self.nodes
                .iter()
                .find(|(id, _)| *id == node.id)
                .map(|(_, url)| url.clone())
                .ok_or(ResolveError::NotFound)
        };
        futures_util::future::ready(result).boxed()
    }
}

/// Start a programmable HTTP backend on an ephemeral port.
///
/// `f` receives the request path and returns `(status, body, delay)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String, Duration)> + Send + 'static,
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
                        let mut buf = vec![0u8; 4096];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let head = String::from_utf8_lossy(&buf[..n]);
                        let path = head
                            .lines()
                            .next()
                            .and_then(|line| line.split_whitespace().nth(1))
                            .unwrap_or("/")
                            .to_string();

                        let (status, body, delay) = f(path).await;
                        tokio::time::sleep(delay).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            410 => "410 Gone",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
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

/// HTTP client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
