//! termtree rendering of a hierarchy.

use std::collections::HashSet;

use itertools::Itertools;
use termtree::Tree;
use tracing::{instrument, warn};

use crate::domain::{Hierarchy, HierarchyNode, NodeCollection};

/// Conversion of a forest or subtree into printable `termtree` trees.
pub trait TreeNodeConvert {
    /// One tree per root, roots in sibling order.
    fn to_forest(&self, show_sort_keys: bool) -> Vec<Tree<String>>;

    /// The subtree below `id`, or `None` if the node does not exist.
    fn to_tree_string(&self, id: &str, show_sort_keys: bool) -> Option<Tree<String>>;
}

impl<C: NodeCollection> TreeNodeConvert for Hierarchy<C> {
    #[instrument(level = "debug", skip(self))]
    fn to_forest(&self, show_sort_keys: bool) -> Vec<Tree<String>> {
        let forest = self
            .roots()
            .into_iter()
            .map(|root| {
                let mut seen = HashSet::new();
                build_tree(self, root, show_sort_keys, &mut seen)
            })
            .collect();
        let unrooted = self.unrooted_ids();
        if !unrooted.is_empty() {
            warn!(
                count = unrooted.len(),
                nodes = %unrooted.iter().join(", "),
                "nodes in parent cycles not rendered"
            );
        }
        forest
    }

    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self, id: &str, show_sort_keys: bool) -> Option<Tree<String>> {
        let node = self.node(id)?;
        let mut seen = HashSet::new();
        Some(build_tree(self, node, show_sort_keys, &mut seen))
    }
}

fn label(node: &HierarchyNode, show_sort_keys: bool) -> String {
    if show_sort_keys {
        format!("{} [{}]", node.id(), node.sort_key())
    } else {
        node.id().to_string()
    }
}

fn build_tree<'a, C: NodeCollection>(
    hierarchy: &'a Hierarchy<C>,
    node: &'a HierarchyNode,
    show_sort_keys: bool,
    seen: &mut HashSet<&'a str>,
) -> Tree<String> {
    let mut tree = Tree::new(label(node, show_sort_keys));
    if !seen.insert(node.id().as_str()) {
        warn!(node = %node.id(), "cycle while rendering, subtree cut");
        return tree;
    }
    for child in hierarchy.children(node.id().as_str()) {
        tree.push(build_tree(hierarchy, child, show_sort_keys, seen));
    }
    tree
}
