//! Response construction.
//!
//! # Responsibilities
//! - Turn a resolution into a 301/302 with a `Location` header
//! - Produce the plain 404 for unmatched requests
//!
//! # Design Decisions
//! - Characters not allowed in a header value are percent-encoded
//! - A target that still cannot be sent is treated as no match

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::routing::Resolution;

/// Bytes escaped in a `Location` value.
const LOCATION: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`');

/// Redirect response for a resolution.
pub fn redirect(resolution: &Resolution) -> Response {
    let status = if resolution.is_permanent() {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::FOUND
    };

    let location = utf8_percent_encode(&resolution.url, LOCATION).to_string();
    match HeaderValue::from_str(&location) {
        Ok(value) => (status, [(header::LOCATION, value)]).into_response(),
        Err(err) => {
            tracing::warn!(
                rule_id = %resolution.rule_id,
                location = %resolution.url,
                error = %err,
                "Redirect target is not a valid header value"
            );
            not_found()
        }
    }
}

pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::MatchKind;
    use uuid::Uuid;

    fn resolution(url: &str, status_code: u16) -> Resolution {
        Resolution {
            url: url.to_string(),
            status_code,
            rule_id: Uuid::new_v4(),
            forward_query: false,
            matched: MatchKind::Exact,
        }
    }

    #[test]
    fn test_redirect_status_and_location() {
        let permanent = redirect(&resolution("https://example.com/new", 301));
        assert_eq!(permanent.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            permanent.headers()[header::LOCATION],
            "https://example.com/new"
        );

        let temporary = redirect(&resolution("/x", 302));
        assert_eq!(temporary.status(), StatusCode::FOUND);
    }

    #[test]
    fn test_location_is_encoded() {
        let response = redirect(&resolution("/über uns", 301));
        assert_eq!(response.headers()[header::LOCATION], "/%C3%BCber%20uns");
    }
}
