//! Error types shared across the crate.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::model::NodeRef;

/// A rule definition was rejected at write time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("rule path must not be empty")]
    EmptyPath,

    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("rule destination is not valid")]
    InvalidDestination,
}

/// Errors raised by a rule repository.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid rule definition: {0}")]
    Invalid(#[from] RuleError),

    #[error("a redirect for `{path}` already exists (rule {existing})")]
    Duplicate { path: String, existing: Uuid },

    #[error("redirect rule {0} not found")]
    NotFound(Uuid),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A matched rule whose destination could not be turned into a URL.
///
/// Never surfaced to the request path: the rule is skipped and resolution
/// moves on to the next candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationUnresolvable {
    #[error("destination is not valid")]
    Invalid,

    #[error("node {0} not found")]
    NotFound(NodeRef),

    #[error("content service unavailable: {0}")]
    Unavailable(String),

    #[error("content lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl DestinationUnresolvable {
    /// Label used in metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            DestinationUnresolvable::Invalid => "invalid",
            DestinationUnresolvable::NotFound(_) => "not_found",
            DestinationUnresolvable::Unavailable(_) => "unavailable",
            DestinationUnresolvable::Timeout(_) => "timeout",
        }
    }
}
