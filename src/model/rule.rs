//! The persisted redirect rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RuleError;
use crate::model::destination::{Destination, DestinationRecord};
use crate::model::RootNodeId;
use crate::routing::matcher::PatternMatcher;
use crate::routing::normalize::{normalize, normalize_query};

/// Administrative input for creating or replacing a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    #[serde(default, alias = "rootId", skip_serializing_if = "Option::is_none")]
    pub root_node_id: Option<RootNodeId>,

    /// Inbound path, or the pattern source for pattern rules.
    #[serde(default, alias = "url")]
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_string: Option<String>,

    #[serde(default, alias = "regex", alias = "isRegex")]
    pub is_pattern: bool,

    #[serde(default, rename = "permanent", alias = "isPermanent")]
    pub is_permanent: bool,

    #[serde(default, alias = "link")]
    pub destination: Destination,

    #[serde(default, alias = "forward")]
    pub forward_query_string: bool,
}

impl RuleDraft {
    /// A draft redirecting `path` to a literal URL.
    pub fn new(path: impl Into<String>, destination: Destination) -> Self {
        Self {
            path: path.into(),
            destination,
            ..Self::default()
        }
    }

    pub fn root(mut self, root: RootNodeId) -> Self {
        self.root_node_id = Some(root);
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query_string = Some(query.into());
        self
    }

    pub fn pattern(mut self) -> Self {
        self.is_pattern = true;
        self
    }

    pub fn permanent(mut self, is_permanent: bool) -> Self {
        self.is_permanent = is_permanent;
        self
    }

    pub fn forward_query(mut self) -> Self {
        self.forward_query_string = true;
        self
    }
}

/// A redirect rule.
///
/// Rules are immutable once created; edits go through [`RedirectRule::replace`]
/// which validates the full new definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleRecord", into = "RuleRecord")]
pub struct RedirectRule {
    id: Uuid,
    root_node_id: Option<RootNodeId>,
    path: String,
    query_string: Option<String>,
    is_pattern: bool,
    destination: Destination,
    is_permanent: bool,
    forward_query_string: bool,
    created_utc: DateTime<Utc>,
    updated_utc: DateTime<Utc>,
}

impl RedirectRule {
    /// Validate a draft and create a new rule with a fresh id.
    pub fn new(draft: RuleDraft) -> Result<Self, RuleError> {
        let now = Utc::now();
        Self::from_draft(Uuid::new_v4(), draft, now, now)
    }

    /// Validate a draft and produce the replacement of this rule. The id and
    /// creation time are kept.
    pub fn replace(&self, draft: RuleDraft) -> Result<Self, RuleError> {
        let now = Utc::now().max(self.created_utc);
        Self::from_draft(self.id, draft, self.created_utc, now)
    }

    fn from_draft(
        id: Uuid,
        draft: RuleDraft,
        created_utc: DateTime<Utc>,
        updated_utc: DateTime<Utc>,
    ) -> Result<Self, RuleError> {
        let source = draft.path.trim();
        if source.is_empty() {
            return Err(RuleError::EmptyPath);
        }

        let raw_query = draft.query_string.as_deref().unwrap_or_default();
        let (path, query) = if draft.is_pattern {
            PatternMatcher::new(source)?;
            (source.to_string(), normalize_query(raw_query))
        } else {
            let normalized = normalize(source, raw_query);
            (normalized.path, normalized.query)
        };

        if !draft.destination.is_valid() {
            return Err(RuleError::InvalidDestination);
        }
        let mut destination = draft.destination;
        destination.set_permanent(draft.is_permanent);

        Ok(Self {
            id,
            root_node_id: draft.root_node_id.and_then(|r| RootNodeId::from_raw(r.0)),
            path,
            query_string: (!query.is_empty()).then_some(query),
            is_pattern: draft.is_pattern,
            destination,
            is_permanent: draft.is_permanent,
            forward_query_string: draft.forward_query_string,
            created_utc,
            updated_utc,
        })
    }

    /// The editable part of this rule, e.g. as a starting point for an update.
    pub fn to_draft(&self) -> RuleDraft {
        RuleDraft {
            root_node_id: self.root_node_id,
            path: self.path.clone(),
            query_string: self.query_string.clone(),
            is_pattern: self.is_pattern,
            is_permanent: self.is_permanent,
            destination: self.destination.clone(),
            forward_query_string: self.forward_query_string,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn root_node_id(&self) -> Option<RootNodeId> {
        self.root_node_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    pub fn is_pattern(&self) -> bool {
        self.is_pattern
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn is_permanent(&self) -> bool {
        self.is_permanent
    }

    /// HTTP status to emit when this rule fires.
    pub fn status_code(&self) -> u16 {
        if self.is_permanent {
            301
        } else {
            302
        }
    }

    pub fn forward_query_string(&self) -> bool {
        self.forward_query_string
    }

    pub fn created_utc(&self) -> DateTime<Utc> {
        self.created_utc
    }

    pub fn updated_utc(&self) -> DateTime<Utc> {
        self.updated_utc
    }

    pub fn is_valid(&self) -> bool {
        !self.path.is_empty() && self.destination.is_valid()
    }

    /// Inbound URL as shown to administrators (`/path?query`).
    pub fn display_url(&self) -> String {
        match &self.query_string {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

#[cfg(test)]
impl RedirectRule {
    /// Backdate a rule, for ordering tests.
    pub(crate) fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_utc = at;
        self.updated_utc = at;
        self
    }
}

/// Unix epoch, used for legacy records without timestamps.
fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// Stored JSON shape of a rule.
///
/// Deserialization accepts every historic field name; serialization always
/// writes the canonical names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Uuid>,

    #[serde(default, alias = "rootId", skip_serializing_if = "Option::is_none")]
    root_node_id: Option<i32>,

    #[serde(default, alias = "url")]
    path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    query_string: Option<String>,

    #[serde(default, alias = "regex", alias = "isRegex")]
    is_pattern: bool,

    #[serde(default, alias = "isPermanent")]
    permanent: bool,

    #[serde(default)]
    destination: Option<DestinationRecord>,

    /// Legacy name of `destination`; used only when `destination` is empty.
    #[serde(default, skip_serializing)]
    link: Option<DestinationRecord>,

    #[serde(default, alias = "forward")]
    forward_query_string: bool,

    #[serde(default, alias = "created", skip_serializing_if = "Option::is_none")]
    created_utc: Option<DateTime<Utc>>,

    #[serde(default, alias = "updated", skip_serializing_if = "Option::is_none")]
    updated_utc: Option<DateTime<Utc>>,

    // Flat fields written by old versions instead of a link object.
    #[serde(default, skip_serializing)]
    link_id: Option<i32>,

    #[serde(default, skip_serializing)]
    link_udi: Option<String>,

    #[serde(default, skip_serializing)]
    link_name: Option<String>,

    #[serde(default, skip_serializing)]
    link_url: Option<String>,

    #[serde(default, skip_serializing)]
    link_mode: Option<String>,
}

impl RuleRecord {
    fn take_destination(&mut self) -> Destination {
        let record = self
            .destination
            .take()
            .filter(|d| !d.is_empty())
            .or_else(|| self.link.take());
        match record {
            Some(record) if !record.is_empty() => record.into(),
            _ => DestinationRecord {
                id: self.link_id,
                udi: self.link_udi.take(),
                name: self.link_name.take(),
                url: self.link_url.take(),
                mode: self.link_mode.take(),
                ..DestinationRecord::default()
            }
            .into(),
        }
    }
}

impl TryFrom<RuleRecord> for RedirectRule {
    type Error = RuleError;

    fn try_from(mut record: RuleRecord) -> Result<Self, Self::Error> {
        let source = record.path.trim();
        if source.is_empty() {
            return Err(RuleError::EmptyPath);
        }
        let raw_query = record.query_string.as_deref().unwrap_or_default();
        let (path, query) = if record.is_pattern {
            (source.to_string(), normalize_query(raw_query))
        } else {
            let normalized = normalize(source, raw_query);
            (normalized.path, normalized.query)
        };

        let mut destination = record.take_destination();
        destination.set_permanent(record.permanent);

        let created_utc = record.created_utc.unwrap_or_else(epoch);
        let updated_utc = record.updated_utc.unwrap_or(created_utc);

        Ok(Self {
            id: record.id.unwrap_or_else(Uuid::new_v4),
            root_node_id: record.root_node_id.and_then(RootNodeId::from_raw),
            path,
            query_string: (!query.is_empty()).then_some(query),
            is_pattern: record.is_pattern,
            destination,
            is_permanent: record.permanent,
            forward_query_string: record.forward_query_string,
            created_utc,
            updated_utc,
        })
    }
}

impl From<RedirectRule> for RuleRecord {
    fn from(rule: RedirectRule) -> Self {
        Self {
            id: Some(rule.id),
            root_node_id: rule.root_node_id.map(|r| r.0),
            path: rule.path,
            query_string: rule.query_string,
            is_pattern: rule.is_pattern,
            permanent: rule.is_permanent,
            destination: Some(rule.destination.into()),
            forward_query_string: rule.forward_query_string,
            created_utc: Some(rule.created_utc),
            updated_utc: Some(rule.updated_utc),
            ..Self::default()
        }
    }
}
