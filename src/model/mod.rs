//! Redirect data model.
//!
//! # Data Flow
//! ```text
//! stored JSON (canonical or legacy field names)
//!     → rule.rs (RuleRecord boundary, aliases resolved)
//!     → RedirectRule (validated, immutable)
//!     → routing::index (derived lookup structure)
//!
//! admin input
//!     → RuleDraft
//!     → RedirectRule::new / RedirectRule::replace (validation, timestamps)
//! ```
//!
//! # Design Decisions
//! - Legacy shapes are normalized at the serde boundary; nothing else sees them
//! - Rules are replaced as a whole, never patched field by field
//! - A destination never panics on access; invalid ones report an empty URL

pub mod destination;
pub mod outbound;
pub mod rule;

pub use destination::{Destination, DestinationKind, NodeRef, RootNodeId};
pub use outbound::OutboundRedirect;
pub use rule::{RedirectRule, RuleDraft};
