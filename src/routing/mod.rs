//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (root, path, query)
//!     → normalize.rs (canonical path + query)
//!     → index.rs (exact probes, then pattern candidates)
//!     → matcher.rs (evaluate match conditions)
//!     → engine.rs (materialize destination, forward query)
//!     → Return: Resolution or NoMatch
//!
//! Index Compilation (on every rule change):
//!     RedirectRule[]
//!     → Sort by creation time
//!     → Split exact map / compiled patterns
//!     → Freeze as immutable RuleIndex
//!     → Atomic swap into the engine
//! ```
//!
//! # Design Decisions
//! - Index immutable once built; rebuilt and swapped as a whole
//! - Exact lookups are O(1); patterns only run when no exact rule resolves
//! - Deterministic: same rules and request always give the same result
//! - First resolvable candidate wins

pub mod engine;
pub mod index;
pub mod matcher;
pub mod normalize;

pub use engine::{MatchKind, Resolution, ResolutionEngine};
pub use index::{IndexStats, RuleIndex};
pub use normalize::{normalize, NormalizedRequest};
