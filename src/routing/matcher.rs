//! Rule matching predicates.
//!
//! # Responsibilities
//! - Match the site root of a request (global rules match every root)
//! - Match the rule's own query string, when it has one
//! - Match a normalized path against a compiled pattern
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Patterns are compiled once, when the index is built
//! - Pattern matching is case-insensitive because paths are lower-cased
//! - Patterns use search semantics; authors anchor with `^`/`$`
//! - Empty condition = always matches (wildcard)

use regex::{Regex, RegexBuilder};

use crate::error::RuleError;
use crate::model::RootNodeId;

/// Compiled program size cap for a single pattern.
const PATTERN_SIZE_LIMIT: usize = 10 * (1 << 20);

/// The request facts matchers are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct MatchInput<'a> {
    pub root: Option<RootNodeId>,
    pub path: &'a str,
    pub query: &'a str,
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, input: &MatchInput<'_>) -> bool;
}

/// Matches the site root a rule is restricted to.
#[derive(Debug, Clone)]
pub struct RootScopeMatcher {
    root: Option<RootNodeId>,
}

impl RootScopeMatcher {
    /// `None` creates a global matcher.
    pub fn new(root: Option<RootNodeId>) -> Self {
        Self { root }
    }
}

impl Matcher for RootScopeMatcher {
    fn matches(&self, input: &MatchInput<'_>) -> bool {
        match self.root {
            None => true,
            Some(root) => input.root == Some(root),
        }
    }
}

/// Matches the exact (normalized) query string a rule requires.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    query: Option<String>,
}

impl QueryMatcher {
    pub fn new(query: Option<String>) -> Self {
        Self {
            query: query.filter(|q| !q.is_empty()),
        }
    }
}

impl Matcher for QueryMatcher {
    fn matches(&self, input: &MatchInput<'_>) -> bool {
        match &self.query {
            None => true,
            Some(query) => input.query == query,
        }
    }
}

/// Matches the request path against a compiled pattern.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    /// Compile a pattern source.
    pub fn new(source: &str) -> Result<Self, RuleError> {
        RegexBuilder::new(source.trim())
            .case_insensitive(true)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
            .map(|regex| Self { regex })
            .map_err(|err| RuleError::InvalidPattern {
                pattern: source.to_string(),
                reason: err.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Expand `$1` / `${name}` references in `template` with the captures of
    /// `path`. Returns `None` if the path does not match.
    pub fn expand(&self, path: &str, template: &str) -> Option<String> {
        let caps = self.regex.captures(path)?;
        if !template.contains('$') {
            return Some(template.to_string());
        }
        let mut dst = String::with_capacity(template.len());
        caps.expand(template, &mut dst);
        Some(dst)
    }
}

impl Matcher for PatternMatcher {
    fn matches(&self, input: &MatchInput<'_>) -> bool {
        self.regex.is_match(input.path)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, input: &MatchInput<'_>) -> bool {
        // All matchers must pass (AND)
        self.matchers.iter().all(|m| m.matches(input))
    }
}
