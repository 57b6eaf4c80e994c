use std::collections::HashMap;

use crate::ir::{NodeId, Tree};

use super::Horizontal;

/// Rank-based placement: external nodes at full width, every internal node
/// one step left of its highest child. Branch lengths are ignored.
pub(super) fn horizontal(tree: &Tree, root: NodeId) -> Horizontal {
    let mut height: HashMap<NodeId, usize> = HashMap::new();
    for id in tree.postorder_visible(root) {
        let h = tree
            .node(id)
            .children
            .visible()
            .iter()
            .filter_map(|child| height.get(child))
            .max()
            .map_or(0, |max| max + 1);
        height.insert(id, h);
    }
    let root_height = height.get(&root).copied().unwrap_or(0) as f64;
    let mut fraction = HashMap::with_capacity(height.len());
    let mut distance = HashMap::with_capacity(height.len());
    for (id, h) in height {
        let h = h as f64;
        let f = if root_height > 0.0 { 1.0 - h / root_height } else { 0.0 };
        fraction.insert(id, f);
        distance.insert(id, root_height - h);
    }
    Horizontal {
        fraction,
        distance,
        issues: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_newick;

    #[test]
    fn internal_nodes_step_back_from_their_highest_child() {
        let tree = parse_newick("((a:5,b)x:9,c)r;").unwrap();
        let h = horizontal(&tree, tree.root());
        let by_name = |name: &str| {
            let id = tree
                .preorder_all(tree.root())
                .into_iter()
                .find(|id| tree.node(*id).data.name.as_deref() == Some(name))
                .unwrap();
            h.fraction[&id]
        };
        assert_eq!(by_name("r"), 0.0);
        assert_eq!(by_name("x"), 0.5);
        assert_eq!(by_name("a"), 1.0);
        assert_eq!(by_name("c"), 1.0);
    }

    #[test]
    fn single_node_sits_at_the_root_offset() {
        let tree = parse_newick("a;").unwrap();
        let h = horizontal(&tree, tree.root());
        assert_eq!(h.fraction[&tree.root()], 0.0);
    }
}
