//! Request inspection.
//!
//! # Responsibilities
//! - Extract the host a request was addressed to
//! - Map that host to a site root via the configured sites
//!
//! # Design Decisions
//! - Host matching is case-insensitive and ignores the port
//! - Unknown hosts resolve against global rules only

use std::collections::HashMap;

use axum::http::{header, Request};

use crate::config::SiteConfig;
use crate::model::RootNodeId;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Host name → site root lookup.
#[derive(Debug, Clone, Default)]
pub struct SiteMap {
    hosts: HashMap<String, RootNodeId>,
}

impl SiteMap {
    pub fn new(sites: impl IntoIterator<Item = (String, RootNodeId)>) -> Self {
        let hosts = sites
            .into_iter()
            .map(|(host, root)| (canonical_host(&host), root))
            .collect();
        Self { hosts }
    }

    pub fn from_config(sites: &[SiteConfig]) -> Self {
        Self::new(sites.iter().map(|s| (s.host.clone(), s.root_node_id)))
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Root serving `host`, if the host is configured.
    pub fn root_for(&self, host: Option<&str>) -> Option<RootNodeId> {
        let host = canonical_host(host?);
        self.hosts.get(&host).copied()
    }
}

/// The host a request was addressed to (`Host` header, else the URI authority).
pub fn request_host<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())
}

/// Lower-case, without port or trailing dot.
fn canonical_host(raw: &str) -> String {
    let raw = raw.trim();
    let host = if raw.starts_with('[') {
        // IPv6 literal: keep the brackets, drop the port.
        raw.split_inclusive(']').next().unwrap_or(raw)
    } else {
        raw.split(':').next().unwrap_or(raw)
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}
