//! Redirect resolution service.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │              REDIRECT SERVICE                │
//!     Client Request    │  ┌─────────┐    ┌──────────┐    ┌─────────┐  │
//!     ──────────────────┼─▶│  http   │───▶│ routing  │───▶│  index  │  │
//!                       │  │ server  │    │  engine  │    │snapshot │  │
//!                       │  └─────────┘    └────┬─────┘    └────▲────┘  │
//!     301/302 or 404    │                      │               │       │
//!     ◀─────────────────┼──────────────────────┘          rebuild      │
//!                       │                      │               │       │
//!                       │               ┌──────▼─────┐   ┌─────┴────┐  │
//!                       │               │  content   │   │  store   │◀─┼── admin API
//!                       │               │  resolver  │   │ (JSON)   │  │
//!                       │               └────────────┘   └──────────┘  │
//!                       └──────────────────────────────────────────────┘
//! ```
//!
//! Usage: `redirects [config.toml]` (or `REDIRECTS_CONFIG`). Without a
//! config file every default applies.

use std::path::PathBuf;

use redirects::config::{load_config, RedirectsConfig};
use redirects::lifecycle::{signals, startup, Shutdown};
use redirects::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("REDIRECTS_CONFIG").ok())
        .map(PathBuf::from);

    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => RedirectsConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!("redirects v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config = ?config_path,
        bind_address = %config.listener.bind_address,
        store = %config.store.path,
        sites = config.sites.len(),
        admin = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let services = startup::initialize(config).await?;
    startup::run(services, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
