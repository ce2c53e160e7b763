//! Inbound path normalization.
//!
//! # Responsibilities
//! - Split an embedded `?query` off the path and merge it with the query
//! - Percent-decode the path once
//! - Lower-case the path, keep query casing
//! - Trim trailing slashes (root stays `/`)
//!
//! # Design Decisions
//! - Never fails: garbage in, best-effort path out
//! - Idempotent: `normalize` of a normalized pair returns the same pair
//! - Double-encoded or non-UTF-8 paths are left undecoded

use percent_encoding::percent_decode_str;

/// A canonical `(path, query)` pair used as lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NormalizedRequest {
    /// Lower-cased, decoded path. Always starts with `/`.
    pub path: String,
    /// Query string without the leading `?`. Empty when absent.
    pub query: String,
}

impl NormalizedRequest {
    pub fn has_query(&self) -> bool {
        !self.query.is_empty()
    }
}

/// Normalize a raw inbound path and query.
pub fn normalize(raw_path: &str, raw_query: &str) -> NormalizedRequest {
    let raw_path = strip_fragment(raw_path);
    let (path, embedded) = match raw_path.split_once('?') {
        Some((path, query)) => (path, query),
        None => (raw_path, ""),
    };

    let embedded = normalize_query(embedded);
    let query = normalize_query(raw_query);
    let query = match (embedded.is_empty(), query.is_empty()) {
        (_, true) => embedded,
        (true, false) => query,
        (false, false) => format!("{}&{}", embedded, query),
    };

    NormalizedRequest {
        path: normalize_path(path),
        query,
    }
}

/// Normalize a path on its own. Anything after `?` or `#` is discarded.
pub fn normalize_path(raw: &str) -> String {
    let raw = raw.split(['?', '#']).next().unwrap_or_default().trim();
    let raw = strip_origin(raw);

    let decoded = decode_once(raw);
    let lowered = decoded.to_lowercase();
    let trimmed = lowered
        .trim_start()
        .trim_end_matches(|c: char| c == '/' || c.is_whitespace());

    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Normalize a query string: no leading `?`, no fragment, no surrounding
/// whitespace. Casing and parameter order are preserved.
pub fn normalize_query(raw: &str) -> String {
    strip_fragment(raw)
        .trim_start_matches(|c: char| c == '?' || c.is_whitespace())
        .trim_end()
        .to_string()
}

fn strip_fragment(raw: &str) -> &str {
    raw.split('#').next().unwrap_or_default()
}

/// Drop `scheme://authority` from absolute URLs pasted in as paths.
fn strip_origin(raw: &str) -> &str {
    if raw.starts_with('/') {
        return raw;
    }
    let Some((scheme, rest)) = raw.split_once("://") else {
        return raw;
    };
    let is_scheme = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !is_scheme {
        return raw;
    }
    match rest.find('/') {
        Some(idx) => &rest[idx..],
        None => "/",
    }
}

/// Decode percent-escapes exactly once.
///
/// The raw text is kept when decoding would leave escapes behind (double
/// encoding), would introduce `?`/`#`, or does not produce UTF-8.
fn decode_once(raw: &str) -> String {
    if !raw.contains('%') {
        return raw.to_string();
    }
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) if !has_escape(&decoded) && !decoded.contains(['?', '#']) => {
            decoded.into_owned()
        }
        _ => raw.to_string(),
    }
}

fn has_escape(s: &str) -> bool {
    s.as_bytes()
        .windows(3)
        .any(|w| w[0] == b'%' && w[1].is_ascii_hexdigit() && w[2].is_ascii_hexdigit())
}
