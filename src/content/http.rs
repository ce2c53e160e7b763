//! Content resolution over HTTP.
//!
//! Asks the host CMS for the current URL of a node:
//!
//! ```text
//! GET {base_url}/{content|media}/{key or id}
//!     200 {"url": "/current/url"}   → Ok
//!     404 / 410                     → NotFound
//!     anything else                 → Unavailable
//! ```

use std::time::Duration;

use futures_util::FutureExt;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::content::{ContentResolver, ResolveError, ResolveFuture};
use crate::model::{DestinationKind, NodeRef};

#[derive(Debug, Deserialize)]
struct NodeUrlResponse {
    #[serde(default)]
    url: String,
}

/// Failure to set up an [`HttpContentResolver`].
#[derive(Debug, Error)]
pub enum HttpResolverError {
    #[error("invalid base url: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Resolver backed by the host's content API.
#[derive(Debug, Clone)]
pub struct HttpContentResolver {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpContentResolver {
    /// Create a resolver for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HttpResolverError> {
        let base_url = Url::parse(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("redirects/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { base_url, client })
    }

    /// Lookup URL for a node. Keys are preferred over numeric ids.
    pub fn node_url(&self, kind: DestinationKind, node: NodeRef) -> String {
        let ident = match node.key {
            Some(key) => key.to_string(),
            None => node.id.to_string(),
        };
        format!(
            "{}/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            kind.as_str(),
            ident
        )
    }

    async fn fetch(&self, kind: DestinationKind, node: NodeRef) -> Result<String, ResolveError> {
        let url = self.node_url(kind, node);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ResolveError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => return Err(ResolveError::NotFound),
            status if !status.is_success() => {
                return Err(ResolveError::Unavailable(format!("status {}", status)));
            }
            _ => {}
        }

        let body: NodeUrlResponse = response
            .json()
            .await
            .map_err(|e| ResolveError::Unavailable(e.to_string()))?;
        if body.url.trim().is_empty() {
            return Err(ResolveError::NotFound);
        }
        Ok(body.url)
    }
}

impl ContentResolver for HttpContentResolver {
    fn resolve_node_url(&self, kind: DestinationKind, node: NodeRef) -> ResolveFuture<'_> {
        async move {
            let result = self.fetch(kind, node).await;
            if let Err(ResolveError::Unavailable(reason)) = &result {
                tracing::warn!(%node, kind = kind.as_str(), %reason, "Content lookup failed");
            }
            result
        }
        .boxed()
    }
}
