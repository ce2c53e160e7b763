//! Content resolution boundary.
//!
//! # Data Flow
//! ```text
//! Destination { kind: Content | Media, node }
//!     → ContentResolver::resolve_node_url
//!         → table.rs (in-memory node table, config seeded)
//!         → http.rs  (host CMS over HTTP)
//!     → current URL | NotFound | Unavailable
//! ```
//!
//! # Design Decisions
//! - Injected into the engine as `Arc<dyn ContentResolver>`, never a global
//! - The engine bounds every call with its own timeout
//! - Any failure means "skip this rule", never an error page

pub mod http;
pub mod table;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::model::{DestinationKind, NodeRef};

pub use http::{HttpContentResolver, HttpResolverError};
pub use table::NodeTable;

/// Why a node reference could not be turned into a URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The node was deleted or is not published.
    #[error("node not found")]
    NotFound,

    /// The content service failed or could not be reached.
    #[error("content service unavailable: {0}")]
    Unavailable(String),
}

pub type ResolveFuture<'a> = BoxFuture<'a, Result<String, ResolveError>>;

/// Host capability turning a content/media node reference into its current URL.
pub trait ContentResolver: Send + Sync {
    fn resolve_node_url(&self, kind: DestinationKind, node: NodeRef) -> ResolveFuture<'_>;
}
