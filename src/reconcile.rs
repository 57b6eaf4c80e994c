//! Render passes over a mutable tree.
//!
//! A [`Session`] owns the tree and every piece of interaction state. Each
//! call to [`Session::update`] lays out the visible nodes, resolves their
//! visual attributes and diffs the node set against the previous pass, so
//! a host only has to animate what entered, moved or left.

use crate::aggregate::{Aggregator, CollapsedSummary};
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::ir::{NodeId, Tree};
use crate::layout::{
    self, compute_layout, reserved_label_space, Connector, LayoutIssue, LayoutMode, TreeLayout,
};
use crate::overrides::{ColorOverrideStore, OverrideTarget};
use crate::search::{Highlight, SearchOptions, SearchState, Slot};
use crate::theme::Color;
use crate::tree_ops::{self, TreeStats};
use crate::visualization::{
    ActiveVisualizations, Channel, IgnoreList, LegendData, PropertyTable, Selector, Shape,
    VisualizationError, VisualizationRegistry,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const MOVE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderNode {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    pub previous_x: f64,
    pub previous_y: f64,
    pub label_x: f64,
    pub fill: Color,
    pub border_color: Color,
    pub shape: Shape,
    pub shape_path: String,
    pub size: f64,
    pub label_text: String,
    pub label_color: Color,
    pub hide: bool,
    /// Some active visualization produced a value for this node.
    pub visualized: bool,
    pub moved: bool,
    pub collapsed: Option<CollapsedSummary>,
}

/// Branch from a parent to `id`. Links are keyed by their child.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderLink {
    pub id: NodeId,
    pub parent: NodeId,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub color: Color,
}

/// Something that left the scene, with the point it should travel to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitNode {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub enter: Vec<RenderNode>,
    pub update: Vec<RenderNode>,
    pub exit: Vec<ExitNode>,
    pub links_enter: Vec<RenderLink>,
    pub links_update: Vec<RenderLink>,
    pub links_exit: Vec<ExitNode>,
    pub connectors: Vec<Connector>,
    pub connector_color: Color,
    pub issues: Vec<LayoutIssue>,
    pub width: f64,
    pub height: f64,
    /// Animation length in milliseconds, passed through to the host.
    pub transition: u32,
}

impl Frame {
    /// Entering and updated nodes in pre-order.
    pub fn nodes(&self) -> impl Iterator<Item = &RenderNode> {
        self.enter.iter().chain(self.update.iter())
    }

    pub fn node(&self, id: NodeId) -> Option<&RenderNode> {
        self.nodes().find(|node| node.id == id)
    }
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    x: f64,
    y: f64,
    root: bool,
}

pub struct Session {
    tree: Tree,
    display_root: NodeId,
    config: Config,
    registry: VisualizationRegistry,
    registry_errors: Vec<VisualizationError>,
    overrides: ColorOverrideStore,
    active: ActiveVisualizations,
    search: SearchState,
    feature_values: BTreeMap<NodeId, String>,
    previous: HashMap<NodeId, Placement>,
    label_space: f64,
}

impl Session {
    /// Refuses a tree with nothing to show: a lone root without any
    /// annotation.
    pub fn new(tree: Tree, config: Config) -> EngineResult<Self> {
        let root = tree.node(tree.root());
        if !root.has_descendants() && !root.data.is_display_eligible() {
            return Err(EngineError::EmptyTree);
        }
        let display_root = tree.root();
        let mut session = Self {
            tree,
            display_root,
            config,
            registry: VisualizationRegistry::default(),
            registry_errors: Vec::new(),
            overrides: ColorOverrideStore::new(),
            active: ActiveVisualizations::default(),
            search: SearchState::new(),
            feature_values: BTreeMap::new(),
            previous: HashMap::new(),
            label_space: 0.0,
        };
        session.rebuild_registry();
        Ok(session)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn display_root(&self) -> NodeId {
        self.display_root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &VisualizationRegistry {
        &self.registry
    }

    /// Entries rejected by the last registry rebuild.
    pub fn registry_errors(&self) -> &[VisualizationError] {
        &self.registry_errors
    }

    pub fn active(&self) -> &ActiveVisualizations {
        &self.active
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn overrides(&self) -> &ColorOverrideStore {
        &self.overrides
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats::compute(&self.tree, self.display_root)
    }

    /// One render pass. `source` is the node the gesture happened on;
    /// entering nodes grow out of its old position and exiting nodes
    /// collapse into its new one. Defaults to the display root.
    pub fn update(
        &mut self,
        source: Option<NodeId>,
        transition: u32,
        skip_width_recalc: bool,
    ) -> Frame {
        let root = self.display_root;
        let source = source
            .filter(|id| self.tree.contains(*id))
            .unwrap_or(root);

        let mut summaries = self.collapsed_summaries();
        if !skip_width_recalc || self.label_space == 0.0 {
            self.label_space = self.measure_label_space(&summaries);
        }
        let layout = compute_layout(&self.tree, root, &self.config.layout, self.label_space);

        let source_before = self
            .previous
            .get(&source)
            .or_else(|| self.previous.get(&root))
            .map(|p| (p.x, p.y));
        let source_after = layout
            .get(source)
            .or_else(|| layout.get(root))
            .map(|p| (p.x, p.y))
            .unwrap_or((0.0, 0.0));

        let mut frame = Frame {
            connectors: layout.connectors.clone(),
            connector_color: self.config.theme.connector_color,
            issues: layout.issues.clone(),
            width: layout.width,
            height: layout.height,
            transition,
            ..Frame::default()
        };

        for (id, pos) in layout.iter() {
            let previous = self.previous.get(&id).copied();
            let (previous_x, previous_y) = match previous {
                Some(p) => (p.x, p.y),
                None => source_before.unwrap_or((pos.x, pos.y)),
            };
            let moved = previous.is_some_and(|p| {
                (p.x - pos.x).abs() > MOVE_EPSILON || (p.y - pos.y).abs() > MOVE_EPSILON
            });
            let mut node = self.render_node(id, &layout, summaries.remove(&id));
            node.previous_x = previous_x;
            node.previous_y = previous_y;
            node.moved = moved;

            if let Some(parent) = self.tree.node(id).parent.filter(|_| id != root) {
                if let Some(parent_pos) = layout.get(parent) {
                    let link = RenderLink {
                        id,
                        parent,
                        x1: parent_pos.x,
                        y1: parent_pos.y,
                        x2: pos.x,
                        y2: pos.y,
                        color: self.config.theme.branch_color,
                    };
                    let linked_before = previous.is_some_and(|p| !p.root);
                    if linked_before {
                        frame.links_update.push(link);
                    } else {
                        frame.links_enter.push(link);
                    }
                }
            }

            if previous.is_some() {
                frame.update.push(node);
            } else {
                frame.enter.push(node);
            }
        }

        let mut gone: Vec<(NodeId, Placement)> = self
            .previous
            .iter()
            .filter(|(id, _)| !layout.contains(**id))
            .map(|(id, p)| (*id, *p))
            .collect();
        gone.sort_by_key(|(id, _)| *id);
        let (exit_x, exit_y) = source_after;
        for (id, placement) in &gone {
            frame.exit.push(ExitNode {
                id: *id,
                x: exit_x,
                y: exit_y,
            });
            if !placement.root {
                frame.links_exit.push(ExitNode {
                    id: *id,
                    x: exit_x,
                    y: exit_y,
                });
            }
        }
        // A node that was the display root before and is not now lost no
        // link; one that became the root lost its incoming link.
        for node in &frame.update {
            let was_root = self.previous.get(&node.id).is_some_and(|p| p.root);
            if node.id == root && !was_root {
                frame.links_exit.push(ExitNode {
                    id: node.id,
                    x: exit_x,
                    y: exit_y,
                });
            }
        }

        log::debug!(
            "pass from {source}: {} enter, {} update, {} exit",
            frame.enter.len(),
            frame.update.len(),
            frame.exit.len()
        );

        self.previous = layout
            .iter()
            .map(|(id, pos)| {
                (
                    id,
                    Placement {
                        x: pos.x,
                        y: pos.y,
                        root: id == root,
                    },
                )
            })
            .collect();
        frame
    }

    fn collapsed_summaries(&self) -> HashMap<NodeId, CollapsedSummary> {
        let aggregator = self.aggregator();
        self.tree
            .preorder_visible(self.display_root)
            .into_iter()
            .filter(|id| self.tree.node(*id).children.is_collapsed())
            .map(|id| {
                let feature = self.feature_values.get(&id).map(String::as_str);
                (id, aggregator.summarize(id, feature))
            })
            .collect()
    }

    fn aggregator(&self) -> Aggregator<'_> {
        Aggregator {
            tree: &self.tree,
            search: &self.search,
            theme: &self.config.theme,
            label_color: self
                .active
                .get(Channel::LabelColor)
                .and_then(|label| self.registry.color(label)),
            label_length: self.config.layout.collapsed_label_length,
        }
    }

    fn measure_label_space(&self, summaries: &HashMap<NodeId, CollapsedSummary>) -> f64 {
        let visible = self.tree.preorder_visible(self.display_root);
        let labels = visible.iter().filter_map(|id| match summaries.get(id) {
            Some(summary) => Some(summary.label.as_str()),
            None => self.tree.node(*id).data.display_label(),
        });
        reserved_label_space(labels, &self.config.theme.font_family, &self.config.layout)
    }

    /// Selection wins over a collapsed aggregate for fill as well as label.
    fn render_node(
        &self,
        id: NodeId,
        layout: &TreeLayout,
        summary: Option<CollapsedSummary>,
    ) -> RenderNode {
        let theme = &self.config.theme;
        let data = &self.tree.node(id).data;
        let highlight = self.search.resolve(&self.tree, id);
        let mut visualized = false;

        let color_of = |channel: Channel, visualized: &mut bool| {
            let color = self
                .active
                .get(channel)
                .and_then(|label| self.registry.color(label))
                .and_then(|vis| vis.resolve(data));
            *visualized |= color.is_some();
            color
        };
        let fill_vis = color_of(Channel::NodeFillColor, &mut visualized);
        let border_vis = color_of(Channel::NodeBorderColor, &mut visualized);
        let label_vis = color_of(Channel::LabelColor, &mut visualized);

        let shape_vis = self
            .active
            .get(Channel::NodeShape)
            .and_then(|label| self.registry.shape(label))
            .and_then(|vis| vis.resolve(data));
        let size_vis = self
            .active
            .get(Channel::NodeSize)
            .and_then(|label| self.registry.size(label))
            .and_then(|vis| vis.resolve(data));
        visualized |= shape_vis.is_some() || size_vis.is_some();

        let highlight_color = highlight.map(|h| h.color(theme));
        let fill = match (&summary, highlight) {
            (Some(_), Some(Highlight::Selected)) => theme.selection,
            (Some(summary), _) => summary.color,
            (None, _) => highlight_color.or(fill_vis).unwrap_or(theme.node_fill),
        };
        let label_color = highlight_color
            .or(label_vis)
            .unwrap_or(theme.label_color);
        let shape = shape_vis.unwrap_or_default();
        let size = size_vis
            .unwrap_or(self.config.layout.node_size)
            .min(self.config.layout.max_node_size)
            .max(0.0);
        let label_text = match &summary {
            Some(summary) => summary.label.clone(),
            None => data.display_label().unwrap_or_default().to_string(),
        };
        let (x, y, label_x, hide) = layout
            .get(id)
            .map(|pos| (pos.x, pos.y, pos.label_x, pos.hidden))
            .unwrap_or_default();

        RenderNode {
            id,
            x,
            y,
            previous_x: x,
            previous_y: y,
            label_x,
            fill,
            border_color: border_vis.unwrap_or(theme.node_border),
            shape,
            shape_path: shape.path(size / 2.0),
            size,
            label_text,
            label_color,
            hide,
            visualized,
            moved: false,
            collapsed: summary,
        }
    }

    fn check_node(&self, id: NodeId) -> EngineResult<()> {
        if self.tree.contains(id) {
            Ok(())
        } else {
            Err(EngineError::UnknownNode(id))
        }
    }

    /// Rebuilds the registry from the properties below the display root and
    /// replays the recorded color overrides.
    fn rebuild_registry(&mut self) {
        let table = PropertyTable::collect(&self.tree, self.display_root, &self.config.ignore);
        let (mut registry, errors) = VisualizationRegistry::build(
            &self.config.visualizations,
            &table,
            &self.config.registry_options(),
        );
        for error in &errors {
            log::warn!("skipping visualization: {error}");
        }
        let replayed = self.overrides.reapply(&mut registry);
        for channel in Channel::ALL {
            if let Some(label) = self.active.get(channel) {
                if !registry.contains(channel, label) {
                    log::debug!("{channel} visualization '{label}' no longer available");
                    self.active.set(channel, None);
                }
            }
        }
        log::debug!(
            "registry rebuilt: {} override(s) replayed, {} error(s)",
            replayed,
            errors.len()
        );
        self.registry = registry;
        self.registry_errors = errors;
    }

    fn structure_changed(&mut self) {
        self.feature_values
            .retain(|id, _| self.tree.contains(*id) && self.tree.node(*id).children.is_collapsed());
        self.search.refresh(&self.tree, self.display_root);
    }

    /// Returns whether `id` is collapsed afterwards.
    pub fn toggle_collapse(&mut self, id: NodeId) -> EngineResult<bool> {
        self.check_node(id)?;
        let collapsed = tree_ops::toggle_collapse(&mut self.tree, id);
        if !collapsed {
            self.feature_values.remove(&id);
        }
        Ok(collapsed)
    }

    pub fn collapse_to_depth(&mut self, depth: usize) -> usize {
        self.feature_values.clear();
        tree_ops::collapse_to_depth(&mut self.tree, self.display_root, depth)
    }

    /// Collapses uniform subtrees and labels them with their shared value.
    pub fn collapse_by_feature(&mut self, selector: &Selector) -> usize {
        self.feature_values = tree_ops::collapse_by_feature(&mut self.tree, self.display_root, selector);
        self.feature_values.len()
    }

    pub fn expand_all(&mut self) {
        tree_ops::expand_all(&mut self.tree, self.display_root);
        self.feature_values.clear();
    }

    pub fn reroot(&mut self, id: NodeId) -> EngineResult<()> {
        self.check_node(id)?;
        tree_ops::reroot(&mut self.tree, id)?;
        self.display_root = self.tree.root();
        self.structure_changed();
        self.rebuild_registry();
        Ok(())
    }

    pub fn midpoint_root(&mut self) -> EngineResult<()> {
        tree_ops::midpoint_root(&mut self.tree)?;
        self.display_root = self.tree.root();
        self.structure_changed();
        self.rebuild_registry();
        Ok(())
    }

    pub fn delete_subtree(&mut self, id: NodeId) -> EngineResult<()> {
        self.check_node(id)?;
        tree_ops::delete_subtree(&mut self.tree, id)?;
        if !self.tree.contains(self.display_root) {
            self.display_root = self.tree.root();
        }
        self.search.deselect(id);
        self.structure_changed();
        self.rebuild_registry();
        Ok(())
    }

    /// Shows only the subtree under `id`.
    pub fn navigate_to(&mut self, id: NodeId) -> EngineResult<()> {
        self.check_node(id)?;
        if id == self.display_root {
            return Ok(());
        }
        self.display_root = id;
        self.search.refresh(&self.tree, id);
        self.rebuild_registry();
        Ok(())
    }

    pub fn navigate_to_root(&mut self) {
        let root = self.tree.root();
        if self.display_root != root {
            self.display_root = root;
            self.search.refresh(&self.tree, root);
            self.rebuild_registry();
        }
    }

    /// Selects (or clears with `None`) the visualization feeding `channel`.
    pub fn set_channel_visualization(
        &mut self,
        channel: Channel,
        label: Option<&str>,
    ) -> EngineResult<()> {
        if let Some(label) = label {
            if !self.registry.contains(channel, label) {
                return Err(EngineError::UnknownVisualization {
                    channel,
                    label: label.to_string(),
                });
            }
        }
        self.active.set(channel, label.map(str::to_string));
        Ok(())
    }

    /// Runs a query in one search slot. Returns the number of hits.
    pub fn set_search_query(&mut self, slot: Slot, query: &str, options: SearchOptions) -> usize {
        self.search
            .set_query(&self.tree, self.display_root, slot, query, options)
    }

    pub fn set_negate(&mut self, negate: bool) {
        self.search.set_negate(negate);
    }

    pub fn select(&mut self, id: NodeId) -> EngineResult<()> {
        self.check_node(id)?;
        self.search.select(id);
        Ok(())
    }

    pub fn deselect(&mut self, id: NodeId) {
        self.search.deselect(id);
    }

    pub fn reset_search(&mut self) {
        self.search.reset();
    }

    pub fn apply_color_override(
        &mut self,
        channel: Channel,
        label: &str,
        target: OverrideTarget,
        color: Color,
    ) -> EngineResult<()> {
        self.overrides
            .apply_override(&mut self.registry, channel, label, target, color)
    }

    pub fn set_layout_mode(&mut self, mode: LayoutMode) {
        self.config.layout.mode = mode;
    }

    pub fn layout_mode(&self) -> LayoutMode {
        self.config.layout.mode
    }

    pub fn set_ignore_list(&mut self, ignore: IgnoreList) {
        self.config.ignore = ignore;
        self.rebuild_registry();
    }

    /// Legend of the visualization active on `channel`.
    pub fn legend(&self, channel: Channel) -> Option<LegendData> {
        let label = self.active.get(channel)?;
        self.registry.legend(channel, label)
    }

    /// Distance of every visible node from the display root, as the
    /// phylogram sees it.
    pub fn distances(&self) -> HashMap<NodeId, f64> {
        layout::distances_to_root(&self.tree, self.display_root).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_newick;
    use crate::visualization::{ColorSpec, ShapeSpec, SizeSpec, VisualizationEntry};

    fn find(tree: &Tree, name: &str) -> NodeId {
        tree.preorder_all(tree.root())
            .into_iter()
            .find(|id| tree.node(*id).data.name.as_deref() == Some(name))
            .unwrap()
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.layout.fast_text_metrics = true;
        config.layout.dynahide = false;
        config
    }

    fn session(newick: &str) -> Session {
        Session::new(parse_newick(newick).unwrap(), config()).unwrap()
    }

    #[test]
    fn empty_tree_is_refused() {
        let tree = Tree::new(Default::default());
        assert!(matches!(
            Session::new(tree, Config::default()),
            Err(EngineError::EmptyTree)
        ));
    }

    #[test]
    fn first_pass_enters_everything() {
        let mut s = session("((a:1,b:1)x:1,c:2)r;");
        let frame = s.update(None, 0, false);
        assert_eq!(frame.enter.len(), 5);
        assert!(frame.update.is_empty() && frame.exit.is_empty());
        assert_eq!(frame.links_enter.len(), 4);
        let ids: Vec<NodeId> = frame.enter.iter().map(|n| n.id).collect();
        assert_eq!(ids, s.tree().preorder_visible(s.display_root()));
    }

    #[test]
    fn collapse_exits_descendants_toward_the_source() {
        let mut s = session("((a:1,b:1)x:1,c:2)r;");
        s.update(None, 0, false);
        let x = find(s.tree(), "x");
        assert!(s.toggle_collapse(x).unwrap());
        let frame = s.update(Some(x), 250, false);
        assert_eq!(frame.exit.len(), 2);
        assert_eq!(frame.links_exit.len(), 2);
        assert!(frame.enter.is_empty());
        assert_eq!(frame.update.len(), 3);
        let x_now = frame.node(x).unwrap();
        for exit in &frame.exit {
            assert_eq!((exit.x, exit.y), (x_now.x, x_now.y));
        }
        assert!(x_now.collapsed.is_some());
        assert_eq!(frame.transition, 250);

        // Expanding again brings them back from x's old position.
        assert!(!s.toggle_collapse(x).unwrap());
        let frame = s.update(Some(x), 0, false);
        assert_eq!(frame.enter.len(), 2);
        for node in &frame.enter {
            assert_eq!((node.previous_x, node.previous_y), (x_now.x, x_now.y));
        }
    }

    #[test]
    fn unchanged_pass_moves_nothing() {
        let mut s = session("((a:1,b:1)x:1,c:2)r;");
        s.update(None, 0, false);
        let frame = s.update(None, 0, true);
        assert!(frame.update.iter().all(|n| !n.moved));
        assert!(frame.enter.is_empty());
    }

    #[test]
    fn search_highlight_beats_fill_visualization() {
        let mut cfg = config();
        cfg.visualizations.push(VisualizationEntry {
            label: "host".to_string(),
            clade_ref: Some("host".to_string()),
            colors: Some(ColorSpec::Palette("categorical".to_string())),
            ..VisualizationEntry::default()
        });
        let tree = parse_newick("(a[&&NHX:host=cow],b[&&NHX:host=pig])r;").unwrap();
        let mut s = Session::new(tree, cfg).unwrap();
        s.set_channel_visualization(Channel::NodeFillColor, Some("host"))
            .unwrap();
        s.set_search_query(Slot::A, "a", SearchOptions { whole_term: true, ..Default::default() });
        let frame = s.update(None, 0, false);
        let theme = &s.config().theme;
        let a = frame.node(find(s.tree(), "a")).unwrap();
        let b = frame.node(find(s.tree(), "b")).unwrap();
        assert_eq!(a.fill, theme.found_a);
        assert_eq!(a.label_color, theme.found_a);
        assert!(b.visualized);
        assert_ne!(b.fill, theme.node_fill);
        assert_eq!(b.label_color, theme.label_color);
    }

    #[test]
    fn unknown_visualization_is_rejected() {
        let mut s = session("(a,b)r;");
        let err = s
            .set_channel_visualization(Channel::NodeShape, Some("nope"))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownVisualization { .. }));
        assert!(s.set_channel_visualization(Channel::NodeShape, None).is_ok());
    }

    #[test]
    fn size_is_capped_and_shape_follows_the_visualization() {
        let mut cfg = config();
        cfg.layout.max_node_size = 10.0;
        cfg.visualizations.push(VisualizationEntry {
            label: "weight".to_string(),
            clade_ref: Some("weight".to_string()),
            sizes: Some(SizeSpec::Stops(vec![2.0, 50.0])),
            shapes: Some(ShapeSpec::Tokens(vec![Shape::Square, Shape::Diamond])),
            ..VisualizationEntry::default()
        });
        let tree = parse_newick("(a[&&NHX:weight=1],b[&&NHX:weight=9])r;").unwrap();
        let mut s = Session::new(tree, cfg).unwrap();
        s.set_channel_visualization(Channel::NodeSize, Some("weight"))
            .unwrap();
        s.set_channel_visualization(Channel::NodeShape, Some("weight"))
            .unwrap();
        let frame = s.update(None, 0, false);
        let a = frame.node(find(s.tree(), "a")).unwrap();
        let b = frame.node(find(s.tree(), "b")).unwrap();
        assert_eq!(a.size, 2.0);
        assert_eq!(b.size, 10.0);
        assert_eq!(a.shape, Shape::Square);
        assert_eq!(b.shape, Shape::Diamond);
        assert_eq!(b.shape_path, Shape::Diamond.path(5.0));
    }

    #[test]
    fn navigating_limits_the_pass_to_the_subtree() {
        let mut s = session("((a,b)x,(c,d)y)r;");
        s.update(None, 0, false);
        let x = find(s.tree(), "x");
        s.navigate_to(x).unwrap();
        let frame = s.update(Some(x), 0, false);
        assert_eq!(frame.update.len(), 3);
        assert_eq!(frame.exit.len(), 4);
        // x lost its incoming link when it became the display root.
        assert!(frame.links_exit.iter().any(|link| link.id == x));
        assert!(frame.links_update.iter().all(|link| link.parent == x));
        s.navigate_to_root();
        assert_eq!(s.display_root(), s.tree().root());
    }

    #[test]
    fn deleting_the_display_root_subtree_falls_back_to_the_root() {
        let mut s = session("((a,b)x,(c,d)y)r;");
        let x = find(s.tree(), "x");
        s.navigate_to(x).unwrap();
        s.delete_subtree(x).unwrap();
        assert_eq!(s.display_root(), s.tree().root());
        assert!(matches!(s.select(x), Err(EngineError::UnknownNode(_))));
    }

    #[test]
    fn feature_collapse_prefixes_the_shared_value() {
        let mut s = session("((a[&&NHX:host=cow],b[&&NHX:host=cow])x,c[&&NHX:host=pig])r;");
        let collapsed = s.collapse_by_feature(&Selector::Property("host".to_string()));
        assert_eq!(collapsed, 1);
        let frame = s.update(None, 0, false);
        let x = frame.node(find(s.tree(), "x")).unwrap();
        assert!(x.label_text.starts_with("cow: "));
        s.expand_all();
        let frame = s.update(None, 0, false);
        assert!(frame.node(find(s.tree(), "x")).unwrap().collapsed.is_none());
    }

    #[test]
    fn legend_follows_the_active_visualization() {
        let mut cfg = config();
        cfg.visualizations.push(VisualizationEntry {
            label: "host".to_string(),
            clade_ref: Some("host".to_string()),
            colors: Some(ColorSpec::Palette("categorical".to_string())),
            ..VisualizationEntry::default()
        });
        let tree = parse_newick("(a[&&NHX:host=cow],b[&&NHX:host=pig])r;").unwrap();
        let mut s = Session::new(tree, cfg).unwrap();
        assert!(s.legend(Channel::LabelColor).is_none());
        s.set_channel_visualization(Channel::LabelColor, Some("host"))
            .unwrap();
        let legend = s.legend(Channel::LabelColor).unwrap();
        assert_eq!(legend.domain, vec!["cow", "pig"]);
    }

    #[test]
    fn selection_overrides_collapsed_aggregate_fill() {
        let mut s = session("((a:1,b:1)x:1,c:2)r;");
        let x = find(s.tree(), "x");
        s.toggle_collapse(x).unwrap();
        s.set_search_query(Slot::A, "a", SearchOptions { whole_term: true, ..Default::default() });
        s.select(x).unwrap();
        let frame = s.update(None, 0, false);
        let theme = s.config().theme.clone();
        let node = frame.node(x).unwrap();
        assert_eq!(node.fill, theme.selection);
        assert_eq!(node.label_color, theme.selection);

        s.deselect(x);
        let frame = s.update(None, 0, true);
        let node = frame.node(x).unwrap();
        assert_eq!(node.fill, theme.background.lerp(theme.found_a, 0.5));
    }

    #[test]
    fn aligned_frame_carries_connector_color() {
        let mut s = session("((a:1,b:5)x:1,c:1)r;");
        s.set_layout_mode(LayoutMode::Phylogram { aligned: true });
        let frame = s.update(None, 0, false);
        assert!(!frame.connectors.is_empty());
        assert_eq!(frame.connector_color, s.config().theme.connector_color);
    }

    #[test]
    fn layout_mode_switch_changes_positions() {
        let mut s = session("((a:1,b:5)x:1,c:1)r;");
        let c = find(s.tree(), "c");
        let phylo = s.update(None, 0, false).node(c).unwrap().x;
        s.set_layout_mode(LayoutMode::Cladogram);
        let frame = s.update(None, 0, true);
        let clado = frame.node(c).unwrap();
        assert!(clado.x > phylo);
        assert!(clado.moved);
    }
}
