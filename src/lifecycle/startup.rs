//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the rule store and build the initial index
//! - Choose the content resolver
//! - Start background tasks (rebuild loop, store watcher)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The first index is installed before any listener binds
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::{ContentConfig, RedirectsConfig};
use crate::content::{ContentResolver, HttpContentResolver, HttpResolverError, NodeTable};
use crate::error::StoreError;
use crate::http::{HttpServer, SiteMap};
use crate::lifecycle::Shutdown;
use crate::routing::ResolutionEngine;
use crate::store::{FileRepository, RuleRepository, StoreWatcher};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("rule store: {0}")]
    Store(#[from] StoreError),

    #[error("content resolver: {0}")]
    Content(#[from] HttpResolverError),

    #[error("rules file watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the service runs on, wired but not yet serving.
pub struct Services {
    pub config: RedirectsConfig,
    pub repo: Arc<FileRepository>,
    pub engine: Arc<ResolutionEngine>,
    pub sites: Arc<SiteMap>,
}

/// Pick the content resolver described by the config.
pub fn content_resolver(config: &ContentConfig) -> Result<Arc<dyn ContentResolver>, StartupError> {
    let timeout = Duration::from_millis(config.timeout_ms);
    match &config.base_url {
        Some(base_url) => {
            tracing::info!(base_url = %base_url, "Resolving nodes over HTTP");
            Ok(Arc::new(HttpContentResolver::new(base_url, timeout)?))
        }
        None => {
            tracing::info!(nodes = config.nodes.len(), "Resolving nodes from the static table");
            Ok(Arc::new(NodeTable::from_config(&config.nodes)))
        }
    }
}

/// Open the store and install the first index.
pub async fn initialize(config: RedirectsConfig) -> Result<Services, StartupError> {
    let repo = Arc::new(FileRepository::open(&config.store.path)?);
    let resolver = content_resolver(&config.content)?;
    let engine = Arc::new(
        ResolutionEngine::new(resolver)
            .with_resolve_timeout(Duration::from_millis(config.content.timeout_ms)),
    );
    engine.rebuild(repo.as_ref()).await?;
    let sites = Arc::new(SiteMap::from_config(&config.sites));

    Ok(Services {
        config,
        repo,
        engine,
        sites,
    })
}

/// Serve until `shutdown` fires.
pub async fn run(services: Services, shutdown: &Shutdown) -> Result<(), StartupError> {
    let Services {
        config,
        repo,
        engine,
        sites,
    } = services;

    let rebuilds = tokio::spawn(Arc::clone(&engine).run_rebuilds(
        Arc::clone(&repo) as Arc<dyn RuleRepository>,
        shutdown.subscribe(),
    ));

    // Dropped (and stopped) when this function returns.
    let _watcher = if config.store.watch {
        Some(StoreWatcher::new(Arc::clone(&repo)).run()?)
    } else {
        None
    };

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let router = setup_admin_router(AdminState {
            engine: Arc::clone(&engine),
            repo: Arc::clone(&repo) as Arc<dyn RuleRepository>,
            sites: Arc::clone(&sites),
            api_key: Arc::from(config.admin.api_key.as_str()),
        });
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    HttpServer::new(&config, engine)
        .run(listener, shutdown.subscribe())
        .await?;

    if let Err(e) = rebuilds.await {
        tracing::warn!(error = %e, "Rebuild task ended abnormally");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentNodeConfig;
    use crate::model::{DestinationKind, NodeRef};

    #[tokio::test]
    async fn test_static_table_resolver() {
        let config = ContentConfig {
            nodes: vec![ContentNodeConfig {
                id: 12,
                key: None,
                kind: DestinationKind::Content,
                url: "/twelve".into(),
            }],
            ..ContentConfig::default()
        };
        let resolver = content_resolver(&config).unwrap();
        let url = resolver
            .resolve_node_url(DestinationKind::Content, NodeRef::new(12, None))
            .await
            .unwrap();
        assert_eq!(url, "/twelve");
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let config = ContentConfig {
            base_url: Some("not a url".into()),
            ..ContentConfig::default()
        };
        assert!(matches!(
            content_resolver(&config),
            Err(StartupError::Content(HttpResolverError::Url(_)))
        ));
    }

    #[tokio::test]
    async fn test_initialize_loads_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"[{"path": "/old", "permanent": true, "destination": {"url": "/new"}}]"#,
        )
        .unwrap();

        let mut config = RedirectsConfig::default();
        config.store.path = path.to_string_lossy().into_owned();
        let services = initialize(config).await.unwrap();

        assert_eq!(services.engine.snapshot().stats().exact_rules, 1);
        let hit = services.engine.resolve(None, "/old", "").await.unwrap();
        assert_eq!(hit.url, "/new");
        assert_eq!(hit.status_code, 301);
    }
}
