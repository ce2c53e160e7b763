//! Rule persistence.
//!
//! # Data Flow
//! ```text
//! Admin API / CLI
//!     → RuleRepository::{create, update, delete}
//!     → validate (RuleDraft → RedirectRule), reject duplicates
//!     → persist (file.rs: JSON array, temp file + rename)
//!     → bump version (watch channel)
//!     → ResolutionEngine::run_rebuilds picks up the change
//!
//! External edit of the rules file:
//!     watcher.rs detects change
//!     → FileRepository::reload_from_disk
//!     → bump version
//! ```
//!
//! # Design Decisions
//! - Writes are validated eagerly; stored data is loaded leniently
//! - Two non-pattern rules may not share (root, path, query)
//! - Readers never block on writers (DashMap)

pub mod file;
pub mod memory;
pub mod watcher;

use tokio::sync::watch;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::model::{RedirectRule, RuleDraft};

pub use file::FileRepository;
pub use memory::MemoryRepository;
pub use watcher::StoreWatcher;

/// Storage for redirect rules.
pub trait RuleRepository: Send + Sync {
    /// Every stored rule, in no particular order.
    fn list_all(&self) -> StoreResult<Vec<RedirectRule>>;

    fn get(&self, id: Uuid) -> StoreResult<Option<RedirectRule>>;

    fn create(&self, draft: RuleDraft) -> StoreResult<RedirectRule>;

    /// Replace the definition of an existing rule.
    fn update(&self, id: Uuid, draft: RuleDraft) -> StoreResult<RedirectRule>;

    /// Returns false if no rule had this id.
    fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Version token, bumped on every change.
    fn subscribe(&self) -> watch::Receiver<u64>;
}
