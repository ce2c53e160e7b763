//! Rules file watcher for external edits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::store::FileRepository;

/// Watches the rules file and reloads the repository when it changes.
pub struct StoreWatcher {
    repo: Arc<FileRepository>,
}

impl StoreWatcher {
    pub fn new(repo: Arc<FileRepository>) -> Self {
        Self { repo }
    }

    /// Start watching in a background thread. Watching stops when the
    /// returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let repo = Arc::clone(&self.repo);
        let path = self.repo.path().to_path_buf();
        let file_name = path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.kind.is_modify()
                        || event.kind.is_create()
                        || event.kind.is_remove();
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if !relevant || !ours {
                        return;
                    }
                    match repo.reload_from_disk() {
                        Ok(rules) => tracing::debug!(rules, "Rules file checked"),
                        Err(e) => tracing::error!(
                            error = %e,
                            "Failed to reload rules file, keeping current rules"
                        ),
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        // The file itself is replaced on every write, so watch its directory.
        let dir = watch_dir(&path);
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Rules file watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &std::path::Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
