//! Resolution engine.
//!
//! # Responsibilities
//! - Hold the current [`RuleIndex`] snapshot
//! - Resolve a request to a redirect target (or nothing)
//! - Rebuild the index from the repository when rules change
//!
//! # Design Decisions
//! - Readers load the snapshot once per request and never block writers
//! - Rebuilds are serialized; queued requests coalesce into one rebuild
//! - Every rebuild carries a generation; an older index never replaces a newer one
//! - A candidate whose destination cannot be resolved is skipped

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::content::{ContentResolver, ResolveError};
use crate::error::{DestinationUnresolvable, StoreResult};
use crate::model::{DestinationKind, RedirectRule, RootNodeId};
use crate::observability::metrics;
use crate::routing::index::{Candidate, IndexStats, RuleIndex};
use crate::routing::normalize::{normalize, NormalizedRequest};
use crate::store::RuleRepository;

/// Default bound on a single content lookup.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(2);

/// How a request was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Pattern,
}

/// The outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// Final target, with the forwarded query already appended.
    pub url: String,
    /// 301 or 302.
    pub status_code: u16,
    pub rule_id: Uuid,
    /// Whether the inbound query was carried over.
    pub forward_query: bool,
    pub matched: MatchKind,
}

impl Resolution {
    pub fn is_permanent(&self) -> bool {
        self.status_code == 301
    }
}

/// Resolves requests against an atomically swapped rule index.
pub struct ResolutionEngine {
    index: ArcSwap<RuleIndex>,
    resolver: Arc<dyn ContentResolver>,
    resolve_timeout: Duration,
    /// Serializes rebuilds.
    rebuild_lock: tokio::sync::Mutex<()>,
    /// Last generation handed out.
    requested: Mutex<u64>,
    /// Generation of the installed index.
    installed: Mutex<u64>,
}

impl ResolutionEngine {
    /// Create an engine with an empty index.
    pub fn new(resolver: Arc<dyn ContentResolver>) -> Self {
        Self {
            index: ArcSwap::from_pointee(RuleIndex::empty()),
            resolver,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            rebuild_lock: tokio::sync::Mutex::new(()),
            requested: Mutex::new(0),
            installed: Mutex::new(0),
        }
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// The index currently used for resolution.
    pub fn snapshot(&self) -> Arc<RuleIndex> {
        self.index.load_full()
    }

    /// Generation of the installed index (0 until the first rebuild).
    pub fn generation(&self) -> u64 {
        *lock(&self.installed)
    }

    /// Resolve a request.
    ///
    /// `raw_path` may still carry a query, a fragment or an origin; `raw_query`
    /// is the query the transport parsed, if any.
    pub async fn resolve(
        &self,
        root: Option<RootNodeId>,
        raw_path: &str,
        raw_query: &str,
    ) -> Option<Resolution> {
        let started = Instant::now();
        let request = normalize(raw_path, raw_query);
        let index = self.snapshot();

        let mut resolution = None;
        for candidate in index.candidates(root, &request.path, &request.query) {
            let rule = candidate.rule();
            match self.materialize(candidate, &request).await {
                Ok(url) => {
                    resolution = Some(finish(rule, candidate, url, &request));
                    break;
                }
                Err(err) => {
                    tracing::debug!(
                        rule_id = %rule.id(),
                        error = %err,
                        "Skipping rule with unresolvable destination"
                    );
                    metrics::record_destination_failure(err.reason());
                }
            }
        }

        let outcome = match &resolution {
            Some(r) if r.matched == MatchKind::Exact => "exact",
            Some(_) => "pattern",
            None => "no_match",
        };
        metrics::record_resolution(outcome, started.elapsed());

        if let Some(r) = &resolution {
            tracing::debug!(
                path = %request.path,
                rule_id = %r.rule_id,
                status = r.status_code,
                location = %r.url,
                "Resolved redirect"
            );
        }
        resolution
    }

    /// Turn a candidate's destination into a URL.
    async fn materialize(
        &self,
        candidate: Candidate<'_>,
        request: &NormalizedRequest,
    ) -> Result<String, DestinationUnresolvable> {
        let destination = candidate.rule().destination();
        if !destination.is_valid() {
            return Err(DestinationUnresolvable::Invalid);
        }

        match destination.kind() {
            DestinationKind::Url => {
                let url = destination.url();
                let expanded = match candidate {
                    Candidate::Pattern(entry) => entry.expand(&request.path, url),
                    Candidate::Exact(_) => None,
                };
                Ok(expanded.unwrap_or_else(|| url.to_string()))
            }
            kind => {
                let node = destination
                    .node_ref()
                    .ok_or(DestinationUnresolvable::Invalid)?;
                let lookup = self.resolver.resolve_node_url(kind, node);
                match tokio::time::timeout(self.resolve_timeout, lookup).await {
                    Ok(Ok(url)) if !url.is_empty() => Ok(url),
                    Ok(Ok(_)) | Ok(Err(ResolveError::NotFound)) => {
                        Err(DestinationUnresolvable::NotFound(node))
                    }
                    Ok(Err(ResolveError::Unavailable(reason))) => {
                        Err(DestinationUnresolvable::Unavailable(reason))
                    }
                    Err(_) => Err(DestinationUnresolvable::Timeout(self.resolve_timeout)),
                }
            }
        }
    }

    /// Rebuild the index from the repository and install it.
    ///
    /// Calls made while another rebuild runs are folded into the next one.
    /// Returns the stats of the index in effect when the call completes.
    pub async fn rebuild(&self, repo: &dyn RuleRepository) -> StoreResult<IndexStats> {
        let ticket = self.next_generation();
        let _guard = self.rebuild_lock.lock().await;

        if self.generation() >= ticket {
            tracing::debug!(ticket, "Rebuild already covered by a newer one");
            return Ok(self.snapshot().stats());
        }

        // Everything requested up to now is covered by this read.
        let generation = *lock(&self.requested);
        let started = Instant::now();
        let rules = repo.list_all()?;
        let index = RuleIndex::build(rules);
        let stats = index.stats();
        self.install(index, generation);
        metrics::record_rebuild(&stats, started.elapsed());

        tracing::info!(
            generation,
            exact_rules = stats.exact_rules,
            pattern_rules = stats.pattern_rules,
            skipped_rules = stats.skipped_rules,
            "Redirect index rebuilt"
        );
        Ok(self.snapshot().stats())
    }

    /// Build and install an index from an explicit rule set.
    pub fn load_rules(&self, rules: impl IntoIterator<Item = RedirectRule>) -> IndexStats {
        let generation = self.next_generation();
        let index = RuleIndex::build(rules);
        let stats = index.stats();
        self.install(index, generation);
        stats
    }

    /// Install `index` unless a newer generation is already in place.
    fn install(&self, index: RuleIndex, generation: u64) -> bool {
        let mut installed = lock(&self.installed);
        if generation <= *installed {
            tracing::debug!(
                generation,
                installed = *installed,
                "Discarding stale index"
            );
            return false;
        }
        *installed = generation;
        self.index.store(Arc::new(index));
        true
    }

    fn next_generation(&self) -> u64 {
        let mut requested = lock(&self.requested);
        *requested += 1;
        *requested
    }

    /// Rebuild whenever the repository reports a change, until shutdown.
    pub async fn run_rebuilds(
        self: Arc<Self>,
        repo: Arc<dyn RuleRepository>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut changes = repo.subscribe();
        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        tracing::info!("Rule repository closed, stopping rebuilds");
                        break;
                    }
                    let version = *changes.borrow_and_update();
                    tracing::debug!(version, "Rule change notification");
                    if let Err(err) = self.rebuild(repo.as_ref()).await {
                        tracing::error!(error = %err, "Failed to rebuild redirect index, keeping previous");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rebuild loop shutting down");
                    break;
                }
            }
        }
    }
}

impl std::fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("generation", &self.generation())
            .field("stats", &self.snapshot().stats())
            .field("resolve_timeout", &self.resolve_timeout)
            .finish()
    }
}

fn lock(m: &Mutex<u64>) -> std::sync::MutexGuard<'_, u64> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn finish(
    rule: &RedirectRule,
    candidate: Candidate<'_>,
    url: String,
    request: &NormalizedRequest,
) -> Resolution {
    let url = if rule.forward_query_string() {
        let remaining = strip_consumed(&request.query, rule.query_string().unwrap_or_default());
        append_query(&url, &remaining)
    } else {
        url
    };
    Resolution {
        url,
        status_code: rule.status_code(),
        rule_id: rule.id(),
        forward_query: rule.forward_query_string(),
        matched: match candidate {
            Candidate::Exact(_) => MatchKind::Exact,
            Candidate::Pattern(_) => MatchKind::Pattern,
        },
    }
}

/// Inbound query minus the parameters the rule itself matched on.
pub fn strip_consumed(inbound: &str, consumed: &str) -> String {
    if consumed.is_empty() {
        return inbound.to_string();
    }
    let mut consumed: Vec<&str> = consumed.split('&').filter(|p| !p.is_empty()).collect();
    inbound
        .split('&')
        .filter(|param| !param.is_empty())
        .filter(|param| match consumed.iter().position(|c| c == param) {
            Some(i) => {
                consumed.swap_remove(i);
                false
            }
            None => true,
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Append `query` to `url`, keeping any fragment last.
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };

    let mut out = String::with_capacity(url.len() + query.len() + 1);
    out.push_str(base);
    if !(base.ends_with('?') || base.ends_with('&')) {
        out.push(if base.contains('?') { '&' } else { '?' });
    }
    out.push_str(query);
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}
