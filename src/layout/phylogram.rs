use std::collections::HashMap;

use crate::ir::{NodeId, Tree};
use crate::tree_ops::TreeStats;

use super::{Horizontal, LayoutIssue};

/// Length a branch contributes to the distance from the root. Branches
/// hanging off the root that are missing or not positive get half the mean
/// branch length so the root does not sit on top of its children; other
/// missing or negative lengths count as zero.
pub fn effective_length(length: Option<f64>, root_adjacent: bool, average: f64) -> f64 {
    match length {
        // Non-finite values pass through; the caller records them.
        Some(value) if value > 0.0 || value.is_nan() => value,
        _ if root_adjacent => 0.5 * average,
        _ => 0.0,
    }
}

/// Cumulative branch length from `root` for every visible node.
pub fn distances_to_root(tree: &Tree, root: NodeId) -> (HashMap<NodeId, f64>, Vec<LayoutIssue>) {
    let average = TreeStats::compute(tree, root)
        .mean_branch_length
        .unwrap_or(0.0);
    let mut distances = HashMap::new();
    let mut issues = Vec::new();
    distances.insert(root, 0.0);
    for id in tree.preorder_visible(root) {
        let base = distances.get(&id).copied().unwrap_or(0.0);
        for child in tree.node(id).children.visible() {
            let length = tree.node(*child).data.branch_length;
            let mut distance = base + effective_length(length, id == root, average);
            if !distance.is_finite() {
                log::warn!("non-finite distance at {child} (branch length {length:?}); using zero length");
                issues.push(LayoutIssue {
                    node: *child,
                    message: format!("non-finite branch length {length:?}"),
                });
                distance = base;
            }
            distances.insert(*child, distance);
        }
    }
    (distances, issues)
}

pub(super) fn horizontal(tree: &Tree, root: NodeId) -> Horizontal {
    let (distance, issues) = distances_to_root(tree, root);
    let max = distance.values().copied().fold(0.0, f64::max);
    let fraction = distance
        .iter()
        .map(|(id, d)| (*id, if max > 0.0 { d / max } else { 0.0 }))
        .collect();
    Horizontal {
        fraction,
        distance,
        issues,
    }
}
