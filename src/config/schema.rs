//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the redirect
//! service. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{DestinationKind, RootNodeId};

/// Placeholder admin key; the service refuses to start the admin API with it.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Root configuration for the redirect service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RedirectsConfig {
    /// Listener configuration for redirect traffic.
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rule storage.
    pub store: StoreConfig,

    /// Content node resolution.
    pub content: ContentConfig,

    /// Host name to site root mapping.
    pub sites: Vec<SiteConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Rule storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the JSON rules file.
    pub path: String,

    /// Reload rules when the file is edited externally.
    pub watch: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "redirects.json".to_string(),
            watch: true,
        }
    }
}

/// Content node resolution.
///
/// With `base_url` set, node URLs are looked up over HTTP. Otherwise the
/// static `nodes` table is used.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Content service endpoint, e.g. "http://localhost:5000/api/content".
    pub base_url: Option<String>,

    /// Bound on a single node lookup, in milliseconds.
    pub timeout_ms: u64,

    /// Statically published nodes.
    pub nodes: Vec<ContentNodeConfig>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 250,
            nodes: Vec::new(),
        }
    }
}

/// A node published through the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentNodeConfig {
    pub id: i32,

    #[serde(default)]
    pub key: Option<Uuid>,

    #[serde(default = "default_node_kind")]
    pub kind: DestinationKind,

    /// Public URL of the node.
    pub url: String,
}

fn default_node_kind() -> DestinationKind {
    DestinationKind::Content
}

/// Maps a request host to a site root.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    /// Host name, without port (matched case-insensitively).
    pub host: String,

    pub root_node_id: RootNodeId,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
