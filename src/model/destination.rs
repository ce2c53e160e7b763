//! Redirect destinations.
//!
//! A destination is either a literal URL or a reference to a content/media
//! node together with the URL it last resolved to. The JSON boundary accepts
//! the canonical `{ url, name, content | media }` shape as well as the legacy
//! `link` object (`{ id, udi, key, name, url, mode }`); both collapse into the
//! same [`Destination`] immediately.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a site root node. Rules carrying one only apply to
/// requests served under that root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootNodeId(pub i32);

impl RootNodeId {
    /// Returns `None` for the ids the host uses to mean "no root" (0 and below).
    pub fn from_raw(raw: i32) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }
}

impl std::fmt::Display for RootNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a destination points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    #[default]
    Url,
    Content,
    Media,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::Url => "url",
            DestinationKind::Content => "content",
            DestinationKind::Media => "media",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "url" => Some(Self::Url),
            "content" | "document" => Some(Self::Content),
            "media" => Some(Self::Media),
            _ => None,
        }
    }
}

/// Identity of a content or media node in the host CMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    /// Numeric node id (0 when only the key is known).
    #[serde(default)]
    pub id: i32,

    /// Stable node key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Uuid>,
}

impl NodeRef {
    pub fn new(id: i32, key: Option<Uuid>) -> Self {
        Self { id, key }
    }

    /// True if the reference identifies a node at all.
    pub fn is_set(&self) -> bool {
        self.id > 0 || self.key.is_some()
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.key {
            Some(key) => write!(f, "{}/{}", self.id, key),
            None => write!(f, "{}", self.id),
        }
    }
}

/// The target of a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DestinationRecord", into = "DestinationRecord")]
pub struct Destination {
    is_permanent: bool,
    kind: DestinationKind,
    node: Option<NodeRef>,
    name: String,
    cached_url: String,
}

impl Default for Destination {
    fn default() -> Self {
        Self {
            is_permanent: true,
            kind: DestinationKind::Url,
            node: None,
            name: String::new(),
            cached_url: String::new(),
        }
    }
}

impl Destination {
    /// A literal URL destination.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            cached_url: url.into().trim().to_string(),
            ..Self::default()
        }
    }

    /// A content node reference with its last known URL.
    pub fn content(node: NodeRef, cached_url: impl Into<String>) -> Self {
        Self::node(DestinationKind::Content, node, cached_url)
    }

    /// A media node reference with its last known URL.
    pub fn media(node: NodeRef, cached_url: impl Into<String>) -> Self {
        Self::node(DestinationKind::Media, node, cached_url)
    }

    fn node(kind: DestinationKind, node: NodeRef, cached_url: impl Into<String>) -> Self {
        Self {
            kind,
            node: Some(node),
            cached_url: cached_url.into().trim().to_string(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_permanent(mut self, is_permanent: bool) -> Self {
        self.is_permanent = is_permanent;
        self
    }

    pub(crate) fn set_permanent(&mut self, is_permanent: bool) {
        self.is_permanent = is_permanent;
    }

    pub fn is_permanent(&self) -> bool {
        self.is_permanent
    }

    pub fn kind(&self) -> DestinationKind {
        self.kind
    }

    /// The referenced node, for content and media destinations.
    pub fn node_ref(&self) -> Option<NodeRef> {
        self.node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stored URL regardless of validity.
    pub fn cached_url(&self) -> &str {
        &self.cached_url
    }

    /// The destination URL, or an empty string if the destination is not valid.
    pub fn url(&self) -> &str {
        if self.is_valid() {
            &self.cached_url
        } else {
            ""
        }
    }

    /// A destination is valid when it has a URL and, for node references,
    /// actually identifies a node.
    pub fn is_valid(&self) -> bool {
        if self.cached_url.is_empty() {
            return false;
        }
        match self.kind {
            DestinationKind::Url => true,
            DestinationKind::Content | DestinationKind::Media => {
                self.node.is_some_and(|n| n.is_set())
            }
        }
    }
}

/// Wire shape of a destination, canonical and legacy fields side by side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DestinationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<NodeRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<NodeRef>,

    // Legacy `link` fields.
    #[serde(default, skip_serializing)]
    pub id: Option<i32>,

    #[serde(default, skip_serializing)]
    pub key: Option<Uuid>,

    #[serde(default, skip_serializing)]
    pub udi: Option<String>,

    #[serde(default, skip_serializing, alias = "type")]
    pub mode: Option<String>,
}

impl DestinationRecord {
    pub fn is_empty(&self) -> bool {
        self.url.as_deref().map_or(true, |u| u.trim().is_empty())
            && self.content.is_none()
            && self.media.is_none()
            && self.id.unwrap_or(0) <= 0
            && self.key.is_none()
            && self.udi.is_none()
    }
}

/// Parses an `umb://document/<key>` / `umb://media/<key>` reference.
fn parse_udi(udi: &str) -> Option<(DestinationKind, Uuid)> {
    let rest = udi.trim().strip_prefix("umb://")?;
    let (entity, key) = rest.split_once('/')?;
    let kind = match entity.to_ascii_lowercase().as_str() {
        "document" => DestinationKind::Content,
        "media" => DestinationKind::Media,
        _ => return None,
    };
    Uuid::parse_str(key).ok().map(|key| (kind, key))
}

impl From<DestinationRecord> for Destination {
    fn from(record: DestinationRecord) -> Self {
        let url = record.url.unwrap_or_default();
        let name = record.name.unwrap_or_default();

        if let Some(node) = record.content {
            return Destination::content(node, url).with_name(name);
        }
        if let Some(node) = record.media {
            return Destination::media(node, url).with_name(name);
        }

        // Legacy link object.
        let udi = record.udi.as_deref().and_then(parse_udi);
        let node = NodeRef::new(
            record.id.unwrap_or(0),
            record.key.or(udi.map(|(_, key)| key)),
        );
        let kind = record
            .mode
            .as_deref()
            .and_then(DestinationKind::parse)
            .or(udi.map(|(kind, _)| kind))
            .unwrap_or(if node.is_set() {
                DestinationKind::Content
            } else {
                DestinationKind::Url
            });

        match kind {
            DestinationKind::Url => Destination::for_url(url).with_name(name),
            DestinationKind::Content => Destination::content(node, url).with_name(name),
            DestinationKind::Media => Destination::media(node, url).with_name(name),
        }
    }
}

impl From<Destination> for DestinationRecord {
    fn from(destination: Destination) -> Self {
        let (content, media) = match destination.kind {
            DestinationKind::Url => (None, None),
            DestinationKind::Content => (destination.node, None),
            DestinationKind::Media => (None, destination.node),
        };
        Self {
            url: (!destination.cached_url.is_empty()).then_some(destination.cached_url),
            name: (!destination.name.is_empty()).then_some(destination.name),
            content,
            media,
            ..Self::default()
        }
    }
}
