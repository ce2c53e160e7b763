//! Outbound redirects.
//!
//! A content node may carry an outbound redirect as a property value: requests
//! for that node should be sent elsewhere. The stored value is a JSON object
//! `{ "permanent": bool, "destination": {...} }`; older values use `link`
//! instead of `destination`.

use serde::{Deserialize, Serialize};

use crate::model::destination::DestinationRecord;
use crate::model::Destination;

/// Outbound redirect property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OutboundRecord")]
pub struct OutboundRedirect {
    #[serde(rename = "permanent")]
    is_permanent: bool,

    destination: Destination,
}

/// Stored shape; `link` is read only when `destination` is missing or empty.
#[derive(Debug, Default, Deserialize)]
struct OutboundRecord {
    #[serde(default)]
    permanent: bool,

    #[serde(default)]
    destination: Option<DestinationRecord>,

    #[serde(default)]
    link: Option<DestinationRecord>,
}

impl From<OutboundRecord> for OutboundRedirect {
    fn from(record: OutboundRecord) -> Self {
        let destination = record
            .destination
            .filter(|d| !d.is_empty())
            .or(record.link)
            .map(Destination::from)
            .unwrap_or_default();
        Self {
            is_permanent: record.permanent,
            destination,
        }
    }
}

impl Default for OutboundRedirect {
    fn default() -> Self {
        Self {
            is_permanent: true,
            destination: Destination::default(),
        }
    }
}

impl OutboundRedirect {
    pub fn new(destination: Destination, is_permanent: bool) -> Self {
        Self {
            is_permanent,
            destination: destination.with_permanent(is_permanent),
        }
    }

    /// Parse a stored property value.
    ///
    /// Anything that is not a JSON object (null, blank, garbage) yields an
    /// empty redirect rather than an error.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Self::default();
        };
        if !(raw.starts_with('{') && raw.ends_with('}')) {
            return Self::default();
        }
        match serde_json::from_str::<Self>(raw) {
            Ok(mut parsed) => {
                parsed.destination.set_permanent(parsed.is_permanent);
                parsed
            }
            Err(err) => {
                tracing::debug!(error = %err, "Ignoring malformed outbound redirect value");
                Self::default()
            }
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.is_permanent
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Status code to emit for this redirect.
    pub fn status_code(&self) -> u16 {
        if self.is_permanent {
            301
        } else {
            302
        }
    }

    pub fn has_destination(&self) -> bool {
        self.destination.is_valid()
    }

    /// Destination URL, or empty when there is no valid destination.
    pub fn url(&self) -> &str {
        self.destination.url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DestinationKind, NodeRef};

    #[test]
    fn test_empty_inputs() {
        for raw in [None, Some(""), Some("   "), Some("null"), Some("[1,2]"), Some("{oops}")] {
            let redirect = OutboundRedirect::parse(raw);
            assert!(redirect.is_permanent(), "{:?}", raw);
            assert!(!redirect.has_destination());
            assert_eq!(redirect.url(), "");
        }
    }

    #[test]
    fn test_destination_and_link_keys() {
        let current = OutboundRedirect::parse(Some(
            r#"{"permanent": false, "destination": {"url": "/target", "content": {"id": 5}}}"#,
        ));
        let legacy = OutboundRedirect::parse(Some(
            r#"{"permanent": false, "link": {"id": 5, "url": "/target", "mode": "content"}}"#,
        ));
        assert_eq!(current, legacy);
        assert_eq!(current.status_code(), 302);
        assert_eq!(current.destination().kind(), DestinationKind::Content);
        assert_eq!(current.destination().node_ref(), Some(NodeRef::new(5, None)));
        assert_eq!(current.url(), "/target");
        assert!(!current.destination().is_permanent());
    }

    #[test]
    fn test_null_destination_uses_link() {
        let redirect = OutboundRedirect::parse(Some(
            r#"{"permanent": true, "destination": null, "link": {"url": "/moved", "mode": "url"}}"#,
        ));
        assert!(redirect.has_destination());
        assert_eq!(redirect.url(), "/moved");
        assert_eq!(redirect.status_code(), 301);
    }

    #[test]
    fn test_missing_permanent_defaults_to_temporary() {
        let redirect = OutboundRedirect::parse(Some(r#"{"destination": {"url": "/x"}}"#));
        assert!(!redirect.is_permanent());
        assert_eq!(redirect.url(), "/x");
    }
}
