//! JSON file backed rule repository.
//!
//! The file holds a single JSON array of rules. Writes go to a sibling temp
//! file which is then renamed over the original. Entries that cannot be read
//! as rules are kept verbatim and written back after the readable ones.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::model::{RedirectRule, RuleDraft};
use crate::store::{MemoryRepository, RuleRepository};

/// Rules cached in memory and persisted to a JSON file.
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    cache: MemoryRepository,
    /// Contents of the last write or load, to ignore our own file events.
    last_seen: Mutex<Option<String>>,
    /// Raw entries that did not parse as rules.
    unreadable: Mutex<Vec<Value>>,
}

impl FileRepository {
    /// Open the rules file. A missing file is an empty rule set.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let repo = Self {
            path: path.as_ref().to_path_buf(),
            cache: MemoryRepository::new(),
            last_seen: Mutex::new(None),
            unreadable: Mutex::new(Vec::new()),
        };
        let loaded = repo.reload_from_disk()?;
        tracing::info!(path = %repo.path.display(), rules = loaded, "Rule store opened");
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file and replace the cached rules if it changed.
    ///
    /// Returns the number of rules held afterwards.
    pub fn reload_from_disk(&self) -> StoreResult<usize> {
        let _w = self.cache.write_lock();
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };

        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        if last_seen.as_deref() == Some(content.as_str()) {
            return Ok(self.cache.len());
        }

        let (rules, unreadable) = parse_rules(&content)?;
        let count = rules.len();
        self.cache.replace_all(rules);
        *self.unreadable.lock().unwrap_or_else(PoisonError::into_inner) = unreadable;
        *last_seen = Some(content);
        Ok(count)
    }

    fn persist(&self, rules: &[RedirectRule]) -> StoreResult<()> {
        let mut sorted: Vec<&RedirectRule> = rules.iter().collect();
        sorted.sort_by_key(|r| (r.created_utc(), r.id()));
        let mut entries = sorted
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;
        entries.extend(
            self.unreadable
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned(),
        );
        let content = serde_json::to_string_pretty(&entries)?;

        let tmp = temp_path(&self.path);
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        if let Err(err) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }

        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Some(content);
        tracing::debug!(path = %self.path.display(), rules = rules.len(), "Rule store written");
        Ok(())
    }

    fn persist_with(&self, rule: &RedirectRule) -> StoreResult<()> {
        let mut rules: Vec<RedirectRule> = self
            .cache
            .snapshot()
            .into_iter()
            .filter(|r| r.id() != rule.id())
            .collect();
        rules.push(rule.clone());
        self.persist(&rules)
    }
}

impl RuleRepository for FileRepository {
    fn list_all(&self) -> StoreResult<Vec<RedirectRule>> {
        self.cache.list_all()
    }

    fn get(&self, id: Uuid) -> StoreResult<Option<RedirectRule>> {
        self.cache.get(id)
    }

    fn create(&self, draft: RuleDraft) -> StoreResult<RedirectRule> {
        let _w = self.cache.write_lock();
        let rule = self.cache.prepare_create(draft)?;
        self.persist_with(&rule)?;
        self.cache.put(rule.clone());
        tracing::info!(rule_id = %rule.id(), path = %rule.display_url(), "Redirect created");
        Ok(rule)
    }

    fn update(&self, id: Uuid, draft: RuleDraft) -> StoreResult<RedirectRule> {
        let _w = self.cache.write_lock();
        let rule = self.cache.prepare_update(id, draft)?;
        self.persist_with(&rule)?;
        self.cache.put(rule.clone());
        tracing::info!(rule_id = %rule.id(), path = %rule.display_url(), "Redirect updated");
        Ok(rule)
    }

    fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let _w = self.cache.write_lock();
        if !self.cache.contains(id) {
            return Ok(false);
        }
        let rules: Vec<RedirectRule> = self
            .cache
            .snapshot()
            .into_iter()
            .filter(|r| r.id() != id)
            .collect();
        self.persist(&rules)?;
        let removed = self.cache.take(id);
        tracing::info!(rule_id = %id, "Redirect deleted");
        Ok(removed)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.cache.subscribe()
    }
}

/// Parse the file body into readable rules and the raw entries that are not.
fn parse_rules(content: &str) -> StoreResult<(Vec<RedirectRule>, Vec<Value>)> {
    if content.trim().is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let entries: Vec<Value> = serde_json::from_str(content)?;
    let mut rules = Vec::with_capacity(entries.len());
    let mut unreadable = Vec::new();
    for (position, entry) in entries.into_iter().enumerate() {
        match RedirectRule::deserialize(&entry) {
            Ok(rule) => rules.push(rule),
            Err(err) => {
                tracing::warn!(position, error = %err, "Keeping unreadable stored rule as-is");
                unreadable.push(entry);
            }
        }
    }
    Ok((rules, unreadable))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "redirects.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
