//! In-memory node table.

use dashmap::DashMap;
use futures_util::FutureExt;
use uuid::Uuid;

use crate::config::ContentNodeConfig;
use crate::content::{ContentResolver, ResolveError, ResolveFuture};
use crate::model::{DestinationKind, NodeRef};

/// Node URLs held in memory, addressable by id and by key.
///
/// Used when the host pushes its URLs into the service (or lists them in the
/// config file) instead of answering lookups over HTTP.
#[derive(Debug, Default)]
pub struct NodeTable {
    by_id: DashMap<(DestinationKind, i32), String>,
    by_key: DashMap<(DestinationKind, Uuid), String>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table from config entries.
    pub fn from_config(nodes: &[ContentNodeConfig]) -> Self {
        let table = Self::new();
        for node in nodes {
            table.insert(node.kind, NodeRef::new(node.id, node.key), node.url.clone());
        }
        table
    }

    /// Publish (or move) a node.
    pub fn insert(&self, kind: DestinationKind, node: NodeRef, url: impl Into<String>) {
        let url = url.into();
        if node.id > 0 {
            self.by_id.insert((kind, node.id), url.clone());
        }
        if let Some(key) = node.key {
            self.by_key.insert((kind, key), url);
        }
    }

    /// Unpublish a node.
    pub fn remove(&self, kind: DestinationKind, node: NodeRef) {
        self.by_id.remove(&(kind, node.id));
        if let Some(key) = node.key {
            self.by_key.remove(&(kind, key));
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len().max(self.by_key.len())
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty() && self.by_key.is_empty()
    }

    /// Key lookups win over id lookups.
    pub fn lookup(&self, kind: DestinationKind, node: NodeRef) -> Option<String> {
        node.key
            .and_then(|key| self.by_key.get(&(kind, key)).map(|r| r.value().clone()))
            .or_else(|| self.by_id.get(&(kind, node.id)).map(|r| r.value().clone()))
            .filter(|url| !url.is_empty())
    }
}

impl ContentResolver for NodeTable {
    fn resolve_node_url(&self, kind: DestinationKind, node: NodeRef) -> ResolveFuture<'_> {
        let result = self.lookup(kind, node).ok_or(ResolveError::NotFound);
        futures_util::future::ready(result).boxed()
    }
}
