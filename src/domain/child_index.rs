//! Lazily rebuilt "children of P, in order" view over a node collection.
//!
//! The index is stamped with the collection's modification version at build
//! time. Every read compares the stamp first and rebuilds the whole mapping
//! from one scan when they differ; there is no incremental patching.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, instrument};

use crate::domain::collection::NodeCollection;
use crate::domain::node::NodeId;

/// Sorted child ids keyed by parent id, plus the sorted root list.
///
/// Sequences are handed out as `Arc<[NodeId]>` snapshots: a later rebuild
/// publishes new sequences and never touches ones already returned.
#[derive(Debug)]
pub struct ChildIndex {
    /// Children per parent id; absent key means no children
    entries: HashMap<NodeId, Arc<[NodeId]>>,
    /// Nodes without a resolvable parent
    roots: Arc<[NodeId]>,
    /// Collection version at last build, None before the first build
    built_at: Option<u64>,
    rebuilds: u64,
}

impl Default for ChildIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ChildIndex {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            roots: Arc::from(Vec::new()),
            built_at: None,
            rebuilds: 0,
        }
    }

    /// Direct children of `parent_id` in sibling order.
    #[instrument(level = "trace", skip(self, scene))]
    pub fn children<C: NodeCollection>(&mut self, scene: &C, parent_id: &str) -> Arc<[NodeId]> {
        self.ensure_fresh(scene);
        self.entries
            .get(parent_id)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Nodes whose parent is absent or does not resolve, in sibling order.
    #[instrument(level = "trace", skip(self, scene))]
    pub fn roots<C: NodeCollection>(&mut self, scene: &C) -> Arc<[NodeId]> {
        self.ensure_fresh(scene);
        Arc::clone(&self.roots)
    }

    pub fn is_fresh<C: NodeCollection>(&self, scene: &C) -> bool {
        self.built_at == Some(scene.modification_version())
    }

    /// Drop the version stamp so the next read rebuilds.
    pub fn invalidate(&mut self) {
        self.built_at = None;
    }

    pub fn built_at(&self) -> Option<u64> {
        self.built_at
    }

    /// Number of full rebuilds performed so far.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    fn ensure_fresh<C: NodeCollection>(&mut self, scene: &C) {
        if !self.is_fresh(scene) {
            self.rebuild(scene);
        }
    }

    /// One scan, one stable sort, then group. The new mapping is assembled
    /// completely before it replaces the old one.
    #[instrument(level = "debug", skip(self, scene))]
    fn rebuild<C: NodeCollection>(&mut self, scene: &C) {
        let version = scene.modification_version();
        let mut groups: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut roots = Vec::new();

        // sorted_by is stable: equal keys keep collection order
        let sorted = scene
            .all_nodes()
            .sorted_by(|a, b| a.sort_key().total_cmp(&b.sort_key()));

        for node in sorted {
            match node.parent_id() {
                Some(parent_id) => {
                    if !resolves(scene, parent_id) {
                        roots.push(node.id().clone());
                    }
                    groups
                        .entry(parent_id.clone())
                        .or_default()
                        .push(node.id().clone());
                }
                None => roots.push(node.id().clone()),
            }
        }

        let entries: HashMap<NodeId, Arc<[NodeId]>> = groups
            .into_iter()
            .map(|(parent, children)| (parent, Arc::from(children)))
            .collect();

        debug!(
            version,
            parents = entries.len(),
            roots = roots.len(),
            "child index rebuilt"
        );

        self.entries = entries;
        self.roots = Arc::from(roots);
        self.built_at = Some(version);
        self.rebuilds += 1;
    }
}

fn resolves<C: NodeCollection>(scene: &C, id: &NodeId) -> bool {
    scene.lookup(id.as_str()).is_some()
}
