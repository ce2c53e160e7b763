//! Immutable rule index.
//!
//! # Responsibilities
//! - O(1) exact lookup keyed by (scope, path, query)
//! - Ordered list of compiled pattern rules (oldest first)
//! - Produce match candidates in precedence order
//!
//! # Design Decisions
//! - Built in one pass from the full rule set; never mutated afterwards
//! - Exact key collisions: the later-created rule wins
//! - Patterns that fail to compile are skipped, not fatal

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{RedirectRule, RootNodeId};
use crate::routing::matcher::{
    AndMatcher, MatchInput, Matcher, PatternMatcher, QueryMatcher, RootScopeMatcher,
};
use crate::routing::normalize::{normalize, normalize_query};

/// Site scope of an exact entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Applies to every site (`*`).
    Global,
    Root(RootNodeId),
}

impl From<Option<RootNodeId>> for Scope {
    fn from(root: Option<RootNodeId>) -> Self {
        root.map_or(Scope::Global, Scope::Root)
    }
}

/// Key of the exact-match table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExactKey {
    pub scope: Scope,
    pub path: String,
    pub query: String,
}

impl ExactKey {
    pub fn new(scope: Scope, path: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            scope,
            path: path.into(),
            query: query.into(),
        }
    }

    fn for_rule(rule: &RedirectRule) -> Self {
        let normalized = normalize(rule.path(), rule.query_string().unwrap_or_default());
        Self::new(rule.root_node_id().into(), normalized.path, normalized.query)
    }
}

/// A compiled pattern rule.
#[derive(Debug)]
pub struct PatternEntry {
    rule: RedirectRule,
    guard: AndMatcher,
    pattern: PatternMatcher,
}

impl PatternEntry {
    fn compile(rule: RedirectRule) -> Result<Self, crate::error::RuleError> {
        let pattern = PatternMatcher::new(rule.path())?;
        let guard = AndMatcher::new(vec![
            Box::new(RootScopeMatcher::new(rule.root_node_id())),
            Box::new(QueryMatcher::new(rule.query_string().map(normalize_query))),
        ]);
        Ok(Self {
            rule,
            guard,
            pattern,
        })
    }

    pub fn rule(&self) -> &RedirectRule {
        &self.rule
    }

    /// Root scope and query are checked before the pattern runs.
    fn matches(&self, input: &MatchInput<'_>) -> bool {
        self.guard.matches(input) && self.pattern.matches(input)
    }

    /// Expand capture references of this entry's pattern into `template`.
    pub fn expand(&self, path: &str, template: &str) -> Option<String> {
        self.pattern.expand(path, template)
    }
}

/// A rule that matched a request, in precedence order.
#[derive(Debug, Clone, Copy)]
pub enum Candidate<'a> {
    Exact(&'a RedirectRule),
    Pattern(&'a PatternEntry),
}

impl<'a> Candidate<'a> {
    pub fn rule(&self) -> &'a RedirectRule {
        match *self {
            Candidate::Exact(rule) => rule,
            Candidate::Pattern(entry) => entry.rule(),
        }
    }

    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match *self {
            Candidate::Exact(_) => "exact",
            Candidate::Pattern(_) => "pattern",
        }
    }
}

/// Summary of an index, reported after rebuilds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub exact_rules: usize,
    pub pattern_rules: usize,
    /// Rules dropped at build time (pattern did not compile).
    pub skipped_rules: usize,
}

impl IndexStats {
    pub fn total(&self) -> usize {
        self.exact_rules + self.pattern_rules
    }
}

/// Lookup structure derived from the full rule set.
#[derive(Debug, Default)]
pub struct RuleIndex {
    exact: HashMap<ExactKey, RedirectRule>,
    patterns: Vec<PatternEntry>,
    skipped: usize,
}

impl RuleIndex {
    /// An index without rules.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index from a rule set. Pure: the same rules always produce
    /// the same index.
    pub fn build(rules: impl IntoIterator<Item = RedirectRule>) -> Self {
        let mut rules: Vec<RedirectRule> = rules.into_iter().collect();
        // Stable: equal timestamps keep input order.
        rules.sort_by_key(|r| r.created_utc());

        let mut index = Self::empty();
        for rule in rules {
            if rule.is_pattern() {
                let id = rule.id();
                match PatternEntry::compile(rule) {
                    Ok(entry) => index.patterns.push(entry),
                    Err(err) => {
                        tracing::warn!(rule_id = %id, error = %err, "Skipping pattern rule");
                        index.skipped += 1;
                    }
                }
                continue;
            }

            let key = ExactKey::for_rule(&rule);
            if let Some(previous) = index.exact.insert(key, rule) {
                tracing::warn!(
                    replaced = %previous.id(),
                    path = %previous.display_url(),
                    "Duplicate redirect, newer rule wins"
                );
            }
        }
        index
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            exact_rules: self.exact.len(),
            pattern_rules: self.patterns.len(),
            skipped_rules: self.skipped,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.patterns.is_empty()
    }

    /// Look up a single exact key.
    pub fn get_exact(&self, key: &ExactKey) -> Option<&RedirectRule> {
        self.exact.get(key)
    }

    /// Pattern entries in creation order.
    pub fn patterns(&self) -> &[PatternEntry] {
        &self.patterns
    }

    /// All rules matching a normalized request, best first.
    ///
    /// Exact hits come first, probed in the order
    /// `(root, path, query)`, `(root, path, "")`, `(*, path, query)`,
    /// `(*, path, "")`; then every matching pattern rule, oldest first.
    pub fn candidates<'a>(
        &'a self,
        root: Option<RootNodeId>,
        path: &'a str,
        query: &'a str,
    ) -> impl Iterator<Item = Candidate<'a>> + 'a {
        let mut scopes = Vec::with_capacity(2);
        if let Some(root) = root {
            scopes.push(Scope::Root(root));
        }
        scopes.push(Scope::Global);

        // An empty query only needs one probe per scope.
        let probes = if query.is_empty() { 1 } else { 2 };
        let mut exact: Vec<&'a RedirectRule> = Vec::with_capacity(4);
        for scope in scopes {
            for q in [query, ""].into_iter().take(probes) {
                let key = ExactKey::new(scope, path, q);
                if let Some(rule) = self.exact.get(&key) {
                    exact.push(rule);
                }
            }
        }

        let input = MatchInput { root, path, query };
        exact
            .into_iter()
            .map(Candidate::Exact)
            .chain(
                self.patterns
                    .iter()
                    .filter(move |entry| entry.matches(&input))
                    .map(Candidate::Pattern),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Destination, RuleDraft};
    use chrono::{DateTime, Duration, Utc};

    fn rule(draft: RuleDraft) -> RedirectRule {
        RedirectRule::new(draft).unwrap()
    }

    fn minutes_ago(minutes: i64) -> DateTime<Utc> {
        Utc::now() - Duration::minutes(minutes)
    }

    fn ids<'a>(candidates: impl Iterator<Item = Candidate<'a>>) -> Vec<String> {
        candidates
            .map(|c| c.rule().destination().url().to_string())
            .collect()
    }

    #[test]
    fn test_exact_precedence() {
        let rules = vec![
            rule(RuleDraft::new("/a", Destination::for_url("/global"))),
            rule(RuleDraft::new("/a", Destination::for_url("/global-q")).query("x=1")),
            rule(RuleDraft::new("/a", Destination::for_url("/root")).root(RootNodeId(1))),
            rule(
                RuleDraft::new("/a", Destination::for_url("/root-q"))
                    .root(RootNodeId(1))
                    .query("x=1"),
            ),
        ];
        let index = RuleIndex::build(rules);
        assert_eq!(index.stats().exact_rules, 4);

        assert_eq!(
            ids(index.candidates(Some(RootNodeId(1)), "/a", "x=1")),
            vec!["/root-q", "/root", "/global-q", "/global"]
        );
        assert_eq!(
            ids(index.candidates(Some(RootNodeId(1)), "/a", "")),
            vec!["/root", "/global"]
        );
        assert_eq!(ids(index.candidates(None, "/a", "x=1")), vec!["/global-q", "/global"]);
        assert_eq!(ids(index.candidates(Some(RootNodeId(2)), "/a", "")), vec!["/global"]);
    }

    #[test]
    fn test_query_specific_rule_needs_query() {
        let index = RuleIndex::build(vec![rule(
            RuleDraft::new("/a", Destination::for_url("/q")).query("x=1"),
        )]);
        assert_eq!(index.candidates(None, "/a", "").count(), 0);
        assert_eq!(index.candidates(None, "/a", "x=2").count(), 0);
        assert_eq!(index.candidates(None, "/a", "x=1").count(), 1);
    }

    #[test]
    fn test_later_created_rule_wins_on_collision() {
        let older = rule(RuleDraft::new("/dup", Destination::for_url("/old")))
            .created_at(minutes_ago(10));
        let newer = rule(RuleDraft::new("/DUP/", Destination::for_url("/new")))
            .created_at(minutes_ago(5));

        // Input order must not matter.
        let index = RuleIndex::build(vec![newer.clone(), older.clone()]);
        assert_eq!(index.stats().exact_rules, 1);
        assert_eq!(ids(index.candidates(None, "/dup", "")), vec!["/new"]);
    }

    #[test]
    fn test_patterns_in_creation_order() {
        let p1 = rule(RuleDraft::new("^/blog/.*", Destination::for_url("/p1")).pattern())
            .created_at(minutes_ago(2));
        let p2 = rule(RuleDraft::new("^/blog/.*", Destination::for_url("/p2")).pattern())
            .created_at(minutes_ago(1));

        let index = RuleIndex::build(vec![p2, p1]);
        assert_eq!(ids(index.candidates(None, "/blog/post", "")), vec!["/p1", "/p2"]);
        assert_eq!(index.candidates(None, "/news", "").count(), 0);
    }

    #[test]
    fn test_pattern_scope_and_query_filters() {
        let scoped = rule(
            RuleDraft::new("^/shop", Destination::for_url("/scoped"))
                .pattern()
                .root(RootNodeId(3)),
        );
        let with_query = rule(
            RuleDraft::new("^/shop", Destination::for_url("/query"))
                .pattern()
                .query("ref=ad"),
        );
        let index = RuleIndex::build(vec![scoped, with_query]);

        assert_eq!(
            ids(index.candidates(Some(RootNodeId(3)), "/shop/x", "")),
            vec!["/scoped"]
        );
        assert!(ids(index.candidates(Some(RootNodeId(4)), "/shop/x", "")).is_empty());
        assert_eq!(ids(index.candidates(None, "/shop/x", "ref=ad")), vec!["/query"]);
    }

    #[test]
    fn test_exact_before_pattern() {
        let pattern = rule(RuleDraft::new("^/a", Destination::for_url("/pattern")).pattern());
        let exact = rule(RuleDraft::new("/a", Destination::for_url("/exact")));
        let index = RuleIndex::build(vec![pattern, exact]);
        assert_eq!(ids(index.candidates(None, "/a", "")), vec!["/exact", "/pattern"]);
    }

    #[test]
    fn test_broken_stored_pattern_is_skipped() {
        let json = serde_json::json!({
            "path": "/broken(",
            "isPattern": true,
            "destination": { "url": "/x" },
            "createdUtc": (Utc::now() - Duration::days(1)).to_rfc3339()
        });
        let broken: RedirectRule = serde_json::from_value(json).unwrap();
        let index = RuleIndex::build(vec![broken]);
        assert_eq!(
            index.stats(),
            IndexStats {
                exact_rules: 0,
                pattern_rules: 0,
                skipped_rules: 1
            }
        );
        assert!(index.is_empty());
    }
}
