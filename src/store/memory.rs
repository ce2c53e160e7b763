//! In-memory rule repository.

use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::model::{RedirectRule, RuleDraft};
use crate::store::RuleRepository;

/// Rules held in a concurrent map. Also the cache behind [`FileRepository`].
///
/// [`FileRepository`]: crate::store::FileRepository
pub struct MemoryRepository {
    rules: DashMap<Uuid, RedirectRule>,
    /// Serializes check-then-write sequences.
    writes: Mutex<()>,
    version: watch::Sender<u64>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            rules: DashMap::new(),
            writes: Mutex::new(()),
            version,
        }
    }

    /// Seed with already-built rules. No duplicate check is applied.
    pub fn with_rules(rules: impl IntoIterator<Item = RedirectRule>) -> Self {
        let repo = Self::new();
        for rule in rules {
            repo.rules.insert(rule.id(), rule);
        }
        repo
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub(crate) fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> Vec<RedirectRule> {
        self.rules.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Reject a non-pattern rule that collides with another stored rule on
    /// (root, path, query).
    pub(crate) fn check_duplicate(&self, rule: &RedirectRule) -> StoreResult<()> {
        if rule.is_pattern() {
            return Ok(());
        }
        let clash = self.rules.iter().find(|entry| {
            let other = entry.value();
            other.id() != rule.id()
                && !other.is_pattern()
                && other.root_node_id() == rule.root_node_id()
                && other.path() == rule.path()
                && other.query_string() == rule.query_string()
        });
        match clash {
            Some(entry) => Err(StoreError::Duplicate {
                path: rule.display_url(),
                existing: *entry.key(),
            }),
            None => Ok(()),
        }
    }

    /// Validate a new rule without storing it.
    pub(crate) fn prepare_create(&self, draft: RuleDraft) -> StoreResult<RedirectRule> {
        let rule = RedirectRule::new(draft)?;
        self.check_duplicate(&rule)?;
        Ok(rule)
    }

    /// Validate the replacement of a stored rule without storing it.
    pub(crate) fn prepare_update(&self, id: Uuid, draft: RuleDraft) -> StoreResult<RedirectRule> {
        let current = self
            .rules
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound(id))?;
        let rule = current.replace(draft)?;
        self.check_duplicate(&rule)?;
        Ok(rule)
    }

    pub(crate) fn contains(&self, id: Uuid) -> bool {
        self.rules.contains_key(&id)
    }

    pub(crate) fn put(&self, rule: RedirectRule) {
        self.rules.insert(rule.id(), rule);
        self.bump();
    }

    pub(crate) fn take(&self, id: Uuid) -> bool {
        let removed = self.rules.remove(&id).is_some();
        if removed {
            self.bump();
        }
        removed
    }

    /// Swap the whole rule set, e.g. after the backing file changed.
    pub(crate) fn replace_all(&self, rules: Vec<RedirectRule>) {
        self.rules.clear();
        for rule in rules {
            self.rules.insert(rule.id(), rule);
        }
        self.bump();
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRepository")
            .field("rules", &self.rules.len())
            .field("version", &*self.version.borrow())
            .finish()
    }
}

impl RuleRepository for MemoryRepository {
    fn list_all(&self) -> StoreResult<Vec<RedirectRule>> {
        Ok(self.snapshot())
    }

    fn get(&self, id: Uuid) -> StoreResult<Option<RedirectRule>> {
        Ok(self.rules.get(&id).map(|entry| entry.value().clone()))
    }

    fn create(&self, draft: RuleDraft) -> StoreResult<RedirectRule> {
        let _w = self.write_lock();
        let rule = self.prepare_create(draft)?;
        self.put(rule.clone());
        Ok(rule)
    }

    fn update(&self, id: Uuid, draft: RuleDraft) -> StoreResult<RedirectRule> {
        let _w = self.write_lock();
        let rule = self.prepare_update(id, draft)?;
        self.put(rule.clone());
        Ok(rule)
    }

    fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let _w = self.write_lock();
        Ok(self.take(id))
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}
