//! Node coordinates for the visible part of the tree.
//!
//! Vertical placement is shared by both modes: external nodes (leaves and
//! collapsed nodes) are spread evenly over the display height in pre-order
//! and every internal node sits halfway between its first and last child.
//! Horizontal placement comes from [`cladogram`] or [`phylogram`].

mod cladogram;
pub mod phylogram;
pub mod text;

use crate::config::LayoutConfig;
use crate::ir::{NodeId, Tree};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub use phylogram::{distances_to_root, effective_length};
pub use text::{reserved_label_space, text_width, truncate_label};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LayoutMode {
    Cladogram,
    Phylogram {
        #[serde(default)]
        aligned: bool,
    },
}

impl Default for LayoutMode {
    fn default() -> Self {
        Self::Phylogram { aligned: false }
    }
}

impl LayoutMode {
    /// Alignment only exists for phylograms and is dropped otherwise.
    pub fn from_name(name: &str, aligned: bool) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "cladogram" => Some(Self::Cladogram),
            "phylogram" => Some(Self::Phylogram { aligned }),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Cladogram => "cladogram",
            Self::Phylogram { .. } => "phylogram",
        }
    }

    pub fn is_aligned(self) -> bool {
        matches!(self, Self::Phylogram { aligned: true })
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if self.is_aligned() {
            f.write_str(" (aligned)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
    pub label_x: f64,
    /// Cumulative branch length for phylograms, rank distance for
    /// cladograms.
    pub distance: f64,
    pub external: bool,
    /// Label suppressed by density thinning.
    pub hidden: bool,
}

/// Thin line from an external node to its aligned label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub id: NodeId,
    pub x1: f64,
    pub x2: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutIssue {
    pub node: NodeId,
    pub message: String,
}

pub(crate) struct Horizontal {
    /// Position in `[0, 1]` of the available width.
    pub fraction: HashMap<NodeId, f64>,
    pub distance: HashMap<NodeId, f64>,
    pub issues: Vec<LayoutIssue>,
}

#[derive(Debug, Clone, Default)]
pub struct TreeLayout {
    /// Visible nodes in pre-order.
    pub order: Vec<NodeId>,
    positions: HashMap<NodeId, NodePosition>,
    pub connectors: Vec<Connector>,
    pub issues: Vec<LayoutIssue>,
    pub width: f64,
    pub height: f64,
    pub available_width: f64,
    pub external_count: usize,
    /// Every `n`-th external label is kept; 1 keeps all.
    pub dynahide_factor: usize,
}

impl TreeLayout {
    pub fn get(&self, id: NodeId) -> Option<&NodePosition> {
        self.positions.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodePosition)> {
        self.order
            .iter()
            .filter_map(|id| self.positions.get(id).map(|pos| (*id, pos)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Lays out the nodes visible below `root`. `label_space` is the width kept
/// free for labels, see [`reserved_label_space`].
pub fn compute_layout(
    tree: &Tree,
    root: NodeId,
    config: &LayoutConfig,
    label_space: f64,
) -> TreeLayout {
    let order = tree.preorder_visible(root);
    let available_width = (config.width - label_space).max(0.0);

    let horizontal = match config.mode {
        LayoutMode::Cladogram => cladogram::horizontal(tree, root),
        LayoutMode::Phylogram { .. } => phylogram::horizontal(tree, root),
    };

    let externals: Vec<NodeId> = order
        .iter()
        .copied()
        .filter(|id| tree.node(*id).is_external())
        .collect();
    let y = vertical_positions(tree, root, &externals, config.height);
    let factor = dynahide_factor(config, externals.len());

    let aligned_x = config.root_offset + available_width;
    let mut positions = HashMap::with_capacity(order.len());
    let mut connectors = Vec::new();
    let mut external_index = 0usize;
    for id in &order {
        let fraction = horizontal.fraction.get(id).copied().unwrap_or(0.0);
        let x = config.root_offset + fraction * available_width;
        let y = y.get(id).copied().unwrap_or(0.0);
        let external = tree.node(*id).is_external();
        let mut hidden = false;
        let mut label_x = x + config.label_gap;
        if external {
            external_index += 1;
            hidden = factor >= 2 && external_index % factor != 0;
            if config.mode.is_aligned() {
                label_x = aligned_x + config.label_gap;
                if aligned_x - x > config.connector_threshold {
                    connectors.push(Connector {
                        id: *id,
                        x1: x,
                        x2: aligned_x,
                        y,
                    });
                }
            }
        }
        positions.insert(
            *id,
            NodePosition {
                x,
                y,
                label_x,
                distance: horizontal.distance.get(id).copied().unwrap_or(0.0),
                external,
                hidden,
            },
        );
    }

    log::debug!(
        "{} layout: {} visible, {} external, dynahide factor {factor}",
        config.mode,
        order.len(),
        externals.len()
    );

    TreeLayout {
        order,
        positions,
        connectors,
        issues: horizontal.issues,
        width: config.width,
        height: config.height,
        available_width,
        external_count: externals.len(),
        dynahide_factor: factor.max(1),
    }
}

fn vertical_positions(
    tree: &Tree,
    root: NodeId,
    externals: &[NodeId],
    height: f64,
) -> HashMap<NodeId, f64> {
    let step = height / externals.len().max(1) as f64;
    let mut y: HashMap<NodeId, f64> = externals
        .iter()
        .enumerate()
        .map(|(idx, id)| (*id, (idx as f64 + 0.5) * step))
        .collect();
    for id in tree.postorder_visible(root) {
        let children = tree.node(id).children.visible();
        if let (Some(first), Some(last)) = (children.first(), children.last()) {
            let top = y.get(first).copied().unwrap_or(0.0);
            let bottom = y.get(last).copied().unwrap_or(0.0);
            y.insert(id, (top + bottom) / 2.0);
        }
    }
    y
}

/// Label thinning factor: how many external nodes share one font height.
pub fn dynahide_factor(config: &LayoutConfig, external_count: usize) -> usize {
    if !config.dynahide || external_count == 0 || config.height <= 0.0 {
        return 1;
    }
    let spacing = config.dynahide_fraction * config.height / external_count as f64;
    if spacing <= 0.0 {
        return 1;
    }
    let factor = (config.font_size / spacing).round();
    if factor.is_finite() && factor >= 2.0 {
        factor as usize
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_newick;
    use crate::tree_ops;

    fn config(mode: LayoutMode) -> LayoutConfig {
        LayoutConfig {
            mode,
            width: 200.0,
            height: 100.0,
            root_offset: 10.0,
            label_gap: 5.0,
            dynahide: false,
            fast_text_metrics: true,
            ..LayoutConfig::default()
        }
    }

    fn find(tree: &Tree, name: &str) -> NodeId {
        tree.preorder_all(tree.root())
            .into_iter()
            .find(|id| tree.node(*id).data.name.as_deref() == Some(name))
            .unwrap()
    }

    #[test]
    fn external_nodes_are_spread_evenly_and_parents_centered() {
        let tree = parse_newick("((a:1,b:1)x:1,(c:1,d:1)y:1)r;").unwrap();
        let layout = compute_layout(&tree, tree.root(), &config(LayoutMode::default()), 50.0);
        let y = |name| layout.get(find(&tree, name)).unwrap().y;
        assert_eq!(y("a"), 12.5);
        assert_eq!(y("b"), 37.5);
        assert_eq!(y("d"), 87.5);
        assert_eq!(y("x"), 25.0);
        assert_eq!(y("r"), 50.0);
        assert_eq!(layout.external_count, 4);
    }

    #[test]
    fn phylogram_maps_distance_linearly_onto_available_width() {
        let tree = parse_newick("((a:1,b:3)x:1,c:2)r;").unwrap();
        let cfg = config(LayoutMode::Phylogram { aligned: false });
        let layout = compute_layout(&tree, tree.root(), &cfg, 50.0);
        assert_eq!(layout.available_width, 150.0);
        let pos = |name| *layout.get(find(&tree, name)).unwrap();
        assert_eq!(pos("r").x, 10.0);
        assert_eq!(pos("b").x, 160.0);
        assert_eq!(pos("x").x, 10.0 + 150.0 / 4.0);
        assert_eq!(pos("c").x, 10.0 + 150.0 / 2.0);
        assert_eq!(pos("c").label_x, pos("c").x + 5.0);
        assert!(layout.connectors.is_empty());
    }

    #[test]
    fn aligned_labels_get_connectors_beyond_threshold() {
        let tree = parse_newick("((a:1,b:3)x:1,c:2)r;").unwrap();
        let cfg = config(LayoutMode::Phylogram { aligned: true });
        let layout = compute_layout(&tree, tree.root(), &cfg, 50.0);
        let b = find(&tree, "b");
        let c = find(&tree, "c");
        assert_eq!(layout.get(c).unwrap().label_x, 165.0);
        assert_eq!(layout.get(b).unwrap().label_x, 165.0);
        let ids: Vec<NodeId> = layout.connectors.iter().map(|conn| conn.id).collect();
        assert!(ids.contains(&c));
        assert!(!ids.contains(&b));
    }

    #[test]
    fn collapsed_nodes_count_as_external() {
        let mut tree = parse_newick("((a,b)x,c)r;").unwrap();
        let x = find(&tree, "x");
        tree_ops::collapse(&mut tree, x);
        let layout = compute_layout(&tree, tree.root(), &config(LayoutMode::Cladogram), 50.0);
        assert_eq!(layout.len(), 3);
        assert!(layout.get(x).unwrap().external);
        assert!(!layout.contains(find(&tree, "a")));
        assert_eq!(layout.get(x).unwrap().x, 160.0);
    }

    #[test]
    fn dynahide_hides_all_but_every_nth_external_label() {
        let names: Vec<String> = (0..20).map(|i| format!("t{i}")).collect();
        let tree = parse_newick(&format!("({});", names.join(","))).unwrap();
        let mut cfg = config(LayoutMode::Cladogram);
        cfg.dynahide = true;
        cfg.font_size = 15.0;
        // 100px / 20 leaves = 5px per leaf; 15px font -> keep every third.
        assert_eq!(dynahide_factor(&cfg, 20), 3);
        let layout = compute_layout(&tree, tree.root(), &cfg, 50.0);
        let shown: Vec<bool> = layout
            .iter()
            .filter(|(_, pos)| pos.external)
            .map(|(_, pos)| !pos.hidden)
            .collect();
        assert_eq!(shown.iter().filter(|s| **s).count(), 6);
        assert!(!shown[0] && !shown[1] && shown[2]);

        cfg.dynahide = false;
        assert_eq!(dynahide_factor(&cfg, 20), 1);
    }

    #[test]
    fn mode_names_round_trip() {
        assert_eq!(LayoutMode::from_name("Cladogram", true), Some(LayoutMode::Cladogram));
        assert_eq!(
            LayoutMode::from_name("phylogram", true),
            Some(LayoutMode::Phylogram { aligned: true })
        );
        assert_eq!(LayoutMode::from_name("radial", false), None);
        assert_eq!(LayoutMode::Phylogram { aligned: true }.to_string(), "phylogram (aligned)");
    }
}
