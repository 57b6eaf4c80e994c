//! Structural edits on the arena tree: collapse state, rerooting, deletion
//! and summary statistics.

use crate::error::{EngineError, EngineResult};
use crate::ir::{Children, NodeId, Tree};
use crate::visualization::Selector;
use std::collections::{BTreeMap, HashMap};

/// Hides the children of `id`. Leaves and collapsed nodes are left alone.
pub fn collapse(tree: &mut Tree, id: NodeId) -> bool {
    let node = tree.node_mut(id);
    match &mut node.children {
        Children::Expanded(children) if !children.is_empty() => {
            let saved = std::mem::take(children);
            node.children = Children::Collapsed(saved);
            true
        }
        _ => false,
    }
}

pub fn expand(tree: &mut Tree, id: NodeId) -> bool {
    let node = tree.node_mut(id);
    match &mut node.children {
        Children::Collapsed(saved) => {
            let children = std::mem::take(saved);
            node.children = Children::Expanded(children);
            true
        }
        Children::Expanded(_) => false,
    }
}

/// Returns whether the node is collapsed afterwards.
pub fn toggle_collapse(tree: &mut Tree, id: NodeId) -> bool {
    if tree.node(id).children.is_collapsed() {
        expand(tree, id);
        false
    } else {
        collapse(tree, id)
    }
}

pub fn expand_all(tree: &mut Tree, start: NodeId) {
    for id in tree.preorder_all(start) {
        expand(tree, id);
    }
}

/// Shows `start` down to `depth` levels and collapses every internal node
/// at that depth. A depth of zero is treated as one so `start` stays open.
pub fn collapse_to_depth(tree: &mut Tree, start: NodeId, depth: usize) -> usize {
    let depth = depth.max(1);
    expand_all(tree, start);
    let mut collapsed = 0;
    let mut stack = vec![(start, 0usize)];
    while let Some((id, level)) = stack.pop() {
        if level >= depth {
            if collapse(tree, id) {
                collapsed += 1;
            }
            continue;
        }
        for child in tree.node(id).children.visible().iter().rev() {
            stack.push((*child, level + 1));
        }
    }
    collapsed
}

/// Collapses the topmost subtrees whose external nodes all share one value
/// for `selector`. Returns the shared value per collapsed node.
pub fn collapse_by_feature(
    tree: &mut Tree,
    start: NodeId,
    selector: &Selector,
) -> BTreeMap<NodeId, String> {
    expand_all(tree, start);
    let mut uniform: HashMap<NodeId, Option<String>> = HashMap::new();
    for id in tree.postorder_visible(start) {
        let node = tree.node(id);
        let value = if node.has_descendants() {
            let mut shared: Option<&str> = None;
            let mut mixed = false;
            for child in node.children.all() {
                match uniform.get(child).and_then(Option::as_deref) {
                    Some(value) if shared.is_none_or(|s| s == value) => shared = Some(value),
                    _ => {
                        mixed = true;
                        break;
                    }
                }
            }
            if mixed { None } else { shared.map(str::to_string) }
        } else {
            selector.value(&node.data).map(|v| v.into_owned())
        };
        uniform.insert(id, value);
    }

    let mut collapsed = BTreeMap::new();
    let mut stack: Vec<NodeId> = tree.node(start).children.visible().to_vec();
    stack.reverse();
    while let Some(id) = stack.pop() {
        if let Some(Some(value)) = uniform.get(&id) {
            if collapse(tree, id) {
                collapsed.insert(id, value.clone());
                continue;
            }
        }
        for child in tree.node(id).children.visible().iter().rev() {
            stack.push(*child);
        }
    }
    collapsed
}

/// Makes `new_root` the root, reversing parent links along the path to the
/// old root. Branch lengths follow their edges, so a reversed edge moves its
/// length to the node that is now the child.
pub fn reroot(tree: &mut Tree, new_root: NodeId) -> EngineResult<()> {
    if !tree.contains(new_root) {
        return Err(EngineError::UnknownNode(new_root));
    }
    if new_root == tree.root() {
        return Ok(());
    }

    let mut path = vec![new_root];
    while let Some(parent) = tree.node(*path.last().unwrap_or(&new_root)).parent {
        path.push(parent);
    }

    // Walk from the old root down so each edge is reversed exactly once.
    for pair in path.windows(2).rev() {
        let (child, parent) = (pair[0], pair[1]);
        let length = tree.node(child).data.branch_length;

        let parent_node = tree.node_mut(parent);
        parent_node.children.all_mut().retain(|id| *id != child);
        if parent_node.children.all().is_empty() {
            parent_node.children = Children::Expanded(Vec::new());
        }
        parent_node.parent = Some(child);
        parent_node.data.branch_length = length;

        let child_node = tree.node_mut(child);
        child_node.children.all_mut().push(parent);
        if child_node.children.is_collapsed() {
            let saved = std::mem::take(child_node.children.all_mut());
            child_node.children = Children::Expanded(saved);
        }
    }

    let root = tree.node_mut(new_root);
    root.parent = None;
    root.data.branch_length = None;
    tree.set_root(new_root);
    tree.rooted = true;
    log::debug!("rerooted at {new_root}");
    Ok(())
}

/// Reroots at the node closest to the midpoint of the longest leaf-to-leaf
/// path. Missing lengths count as one.
pub fn midpoint_root(tree: &mut Tree) -> EngineResult<()> {
    let nodes = tree.preorder_all(tree.root());
    let mut adjacency: HashMap<NodeId, Vec<(NodeId, f64)>> = HashMap::new();
    for id in &nodes {
        let node = tree.node(*id);
        if let Some(parent) = node.parent {
            let length = node
                .data
                .branch_length
                .filter(|l| l.is_finite() && *l >= 0.0)
                .unwrap_or(1.0);
            adjacency.entry(*id).or_default().push((parent, length));
            adjacency.entry(parent).or_default().push((*id, length));
        }
    }
    let Some(start) = nodes.iter().copied().find(|id| !tree.node(*id).has_descendants()) else {
        return Ok(());
    };
    let (first, _, _) = farthest(&adjacency, start);
    let (_, diameter, path) = farthest(&adjacency, first);
    if path.len() < 2 || diameter <= f64::EPSILON {
        return Ok(());
    }

    let half = diameter / 2.0;
    let mut traversed = 0.0;
    let mut target = path[0];
    for pair in path.windows(2) {
        let length = edge_length(&adjacency, pair[0], pair[1]);
        if traversed + length >= half {
            target = if half - traversed <= length / 2.0 { pair[0] } else { pair[1] };
            break;
        }
        traversed += length;
    }
    reroot(tree, target)
}

fn edge_length(adjacency: &HashMap<NodeId, Vec<(NodeId, f64)>>, a: NodeId, b: NodeId) -> f64 {
    adjacency
        .get(&a)
        .and_then(|edges| edges.iter().find(|(next, _)| *next == b))
        .map(|(_, length)| *length)
        .unwrap_or(0.0)
}

fn farthest(
    adjacency: &HashMap<NodeId, Vec<(NodeId, f64)>>,
    start: NodeId,
) -> (NodeId, f64, Vec<NodeId>) {
    let mut best = (start, 0.0);
    let mut previous: HashMap<NodeId, NodeId> = HashMap::new();
    let mut stack = vec![(start, None::<NodeId>, 0.0)];
    while let Some((id, from, distance)) = stack.pop() {
        if distance > best.1 {
            best = (id, distance);
        }
        for (next, length) in adjacency.get(&id).into_iter().flatten() {
            if Some(*next) == from {
                continue;
            }
            previous.insert(*next, id);
            stack.push((*next, Some(id), distance + length));
        }
    }
    let mut path = vec![best.0];
    while let Some(prev) = previous.get(path.last().unwrap_or(&start)) {
        path.push(*prev);
        if *prev == start {
            break;
        }
    }
    path.reverse();
    (best.0, best.1, path)
}

/// Detaches the subtree under `id`. Its handles stay allocated and are never
/// handed out again.
pub fn delete_subtree(tree: &mut Tree, id: NodeId) -> EngineResult<()> {
    if !tree.contains(id) {
        return Err(EngineError::UnknownNode(id));
    }
    let Some(parent) = tree.node(id).parent else {
        return Err(EngineError::EmptyTree);
    };
    let parent_node = tree.node_mut(parent);
    parent_node.children.all_mut().retain(|child| *child != id);
    if parent_node.children.all().is_empty() {
        parent_node.children = Children::Expanded(Vec::new());
    }
    tree.node_mut(id).parent = None;
    log::debug!("deleted subtree {id}");
    Ok(())
}

/// Leaves below `id`, or one for a leaf.
pub fn external_descendant_count(tree: &Tree, id: NodeId) -> usize {
    if tree.node(id).has_descendants() {
        tree.external_descendants(id).len()
    } else {
        1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TreeStats {
    pub node_count: usize,
    pub external_count: usize,
    /// Edges on the longest root-to-leaf path.
    pub max_depth: usize,
    pub min_branch_length: Option<f64>,
    pub mean_branch_length: Option<f64>,
    pub max_branch_length: Option<f64>,
}

impl TreeStats {
    /// Branch-length statistics use the finite, positive lengths of non-root
    /// nodes below `start`, collapsed ones included.
    pub fn compute(tree: &Tree, start: NodeId) -> Self {
        let mut stats = Self::default();
        let mut sum = 0.0;
        let mut counted = 0usize;
        let mut stack = vec![(start, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = tree.node(id);
            stats.node_count += 1;
            stats.max_depth = stats.max_depth.max(depth);
            if !node.has_descendants() {
                stats.external_count += 1;
            }
            if id != start {
                if let Some(length) = node.data.branch_length.filter(|l| l.is_finite() && *l > 0.0)
                {
                    sum += length;
                    counted += 1;
                    stats.min_branch_length =
                        Some(stats.min_branch_length.map_or(length, |m| m.min(length)));
                    stats.max_branch_length =
                        Some(stats.max_branch_length.map_or(length, |m| m.max(length)));
                }
            }
            for child in node.children.all() {
                stack.push((*child, depth + 1));
            }
        }
        if counted > 0 {
            stats.mean_branch_length = Some(sum / counted as f64);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::NodeData;
    use crate::parser::parse_newick;
    use crate::visualization::NodeField;

    fn names(tree: &Tree, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|id| tree.node(*id).data.name.clone().unwrap_or_default())
            .collect()
    }

    fn find(tree: &Tree, name: &str) -> NodeId {
        tree.preorder_all(tree.root())
            .into_iter()
            .find(|id| tree.node(*id).data.name.as_deref() == Some(name))
            .unwrap()
    }

    #[test]
    fn collapse_then_expand_restores_children_exactly() {
        let mut tree = parse_newick("((a,b,c)x,d)r;").unwrap();
        let x = find(&tree, "x");
        let before = tree.node(x).children.all().to_vec();
        assert!(toggle_collapse(&mut tree, x));
        assert!(tree.node(x).children.visible().is_empty());
        assert_eq!(tree.node(x).children.all(), before.as_slice());
        assert!(!toggle_collapse(&mut tree, x));
        assert_eq!(tree.node(x).children, Children::Expanded(before));
    }

    #[test]
    fn collapsing_a_leaf_is_a_noop() {
        let mut tree = parse_newick("(a,b);").unwrap();
        let a = find(&tree, "a");
        assert!(!collapse(&mut tree, a));
        assert_eq!(tree.node(a).children, Children::Expanded(Vec::new()));
    }

    #[test]
    fn collapse_to_depth_hides_deeper_levels() {
        let mut tree = parse_newick("(((a,b)p,c)q,(d,e)s)r;").unwrap();
        let root = tree.root();
        assert_eq!(collapse_to_depth(&mut tree, root, 1), 2);
        let visible = tree.preorder_visible(tree.root());
        assert_eq!(names(&tree, &visible), vec!["r", "q", "s"]);

        let root = tree.root();
        collapse_to_depth(&mut tree, root, 2);
        let visible = tree.preorder_visible(tree.root());
        assert_eq!(names(&tree, &visible), vec!["r", "q", "p", "c", "s", "d", "e"]);
    }

    #[test]
    fn collapse_by_feature_collapses_uniform_subtrees() {
        let mut tree = Tree::new(NodeData::default());
        let root = tree.root();
        let bats = tree.add_child(root, NodeData::default());
        tree.add_child(bats, NodeData::named("b1").with_property("host", "Bat"));
        tree.add_child(bats, NodeData::named("b2").with_property("host", "Bat"));
        let mixed = tree.add_child(root, NodeData::default());
        tree.add_child(mixed, NodeData::named("m1").with_property("host", "Bat"));
        tree.add_child(mixed, NodeData::named("m2").with_property("host", "Cow"));

        let collapsed =
            collapse_by_feature(&mut tree, root, &Selector::Property("host".to_string()));
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed.get(&bats).map(String::as_str), Some("Bat"));
        assert!(tree.node(bats).children.is_collapsed());
        assert!(!tree.node(mixed).children.is_collapsed());
    }

    #[test]
    fn collapse_by_feature_ignores_missing_values() {
        let mut tree = parse_newick("((a,b)x,c);").unwrap();
        let root = tree.root();
        let collapsed = collapse_by_feature(
            &mut tree,
            root,
            &Selector::Field(NodeField::TaxonomyCode),
        );
        assert!(collapsed.is_empty());
    }

    #[test]
    fn reroot_reverses_path_and_moves_lengths() {
        let mut tree = parse_newick("((a:1,b:2)x:3,c:4)r;").unwrap();
        let (a, x, r) = (find(&tree, "a"), find(&tree, "x"), find(&tree, "r"));
        reroot(&mut tree, x).unwrap();
        assert_eq!(tree.root(), x);
        assert_eq!(tree.node(x).parent, None);
        assert_eq!(tree.node(r).parent, Some(x));
        assert_eq!(tree.node(r).data.branch_length, Some(3.0));
        assert_eq!(tree.node(a).parent, Some(x));
        let leaves = tree.external_descendants(x);
        assert_eq!(names(&tree, &leaves), vec!["a", "b", "c"]);
        assert_eq!(tree.depth(find(&tree, "c")), 2);
    }

    #[test]
    fn midpoint_root_picks_center_of_longest_path() {
        let mut tree = parse_newick("((a:1,b:1)x:1,(c:1,(d:5)y:1)z:1)r;").unwrap();
        midpoint_root(&mut tree).unwrap();
        // Longest path a..d is 9 long; its midpoint lies on the d:5 branch.
        assert_eq!(tree.node(tree.root()).data.name.as_deref(), Some("y"));
    }

    #[test]
    fn delete_detaches_without_reusing_ids() {
        let mut tree = parse_newick("((a,b)x,c)r;").unwrap();
        let x = find(&tree, "x");
        let capacity = tree.capacity();
        delete_subtree(&mut tree, x).unwrap();
        assert!(!tree.contains(x));
        assert_eq!(tree.capacity(), capacity);
        assert_eq!(names(&tree, &tree.preorder_all(tree.root())), vec!["r", "c"]);
        assert!(matches!(
            delete_subtree(&mut tree, x),
            Err(EngineError::UnknownNode(_))
        ));
        let root = tree.root();
        assert!(matches!(
            delete_subtree(&mut tree, root),
            Err(EngineError::EmptyTree)
        ));
    }

    #[test]
    fn stats_cover_depth_lengths_and_leaves() {
        let mut tree = parse_newick("((a:1,b:2)x:3,c:6)r;").unwrap();
        let x = find(&tree, "x");
        collapse(&mut tree, x);
        let stats = TreeStats::compute(&tree, tree.root());
        assert_eq!(stats.node_count, 5);
        assert_eq!(stats.external_count, 3);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.min_branch_length, Some(1.0));
        assert_eq!(stats.max_branch_length, Some(6.0));
        assert_eq!(stats.mean_branch_length, Some(3.0));
        assert_eq!(external_descendant_count(&tree, x), 2);
        assert_eq!(external_descendant_count(&tree, find(&tree, "c")), 1);
    }
}
