//! Summary color and label for collapsed subtrees.

use crate::ir::{NodeId, Tree};
use crate::layout::truncate_label;
use crate::search::SearchState;
use crate::theme::{Color, Theme};
use crate::tree_ops::external_descendant_count;
use crate::visualization::Visualization;
use serde::Serialize;

/// Search membership of the display-eligible descendants of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub both: usize,
    pub a_only: usize,
    pub b_only: usize,
    pub neither: usize,
}

impl Tally {
    pub fn hits(&self) -> usize {
        self.both + self.a_only + self.b_only
    }

    pub fn eligible(&self) -> usize {
        self.hits() + self.neither
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollapsedSummary {
    pub label: String,
    pub color: Color,
    pub tally: Tally,
    pub descendant_count: usize,
}

pub struct Aggregator<'a> {
    pub tree: &'a Tree,
    pub search: &'a SearchState,
    pub theme: &'a Theme,
    /// Active label-color visualization, if any.
    pub label_color: Option<&'a Visualization<Color>>,
    pub label_length: usize,
}

impl<'a> Aggregator<'a> {
    pub fn tally(&self, id: NodeId) -> Tally {
        let mut tally = Tally::default();
        for desc in self.eligible_descendants(id) {
            match (
                self.search.found_a(self.tree, desc),
                self.search.found_b(self.tree, desc),
            ) {
                (true, true) => tally.both += 1,
                (true, false) => tally.a_only += 1,
                (false, true) => tally.b_only += 1,
                (false, false) => tally.neither += 1,
            }
        }
        tally
    }

    pub fn color(&self, id: NodeId, tally: &Tally) -> Color {
        let hits = tally.hits();
        if hits == 0 {
            return self
                .uniform_label_color(id)
                .unwrap_or(self.theme.branch_color);
        }
        if tally.both == tally.eligible() {
            return self.theme.found_both;
        }
        let dominant = if tally.both > 0 {
            self.theme.found_both
        } else if tally.a_only > 0 {
            self.theme.found_a
        } else {
            self.theme.found_b
        };
        let proportion = hits as f64 / tally.eligible() as f64;
        self.theme.background.lerp(dominant, proportion)
    }

    /// `first ... last [count]`, prefixed with a shared feature value and
    /// suffixed with `[hits/eligible]` when the search found anything.
    pub fn label(&self, id: NodeId, tally: &Tally, feature: Option<&str>) -> String {
        let externals = self.tree.external_descendants(id);
        let count = externals.len();
        let names: Vec<&str> = externals
            .iter()
            .filter_map(|ext| self.tree.node(*ext).data.display_label())
            .collect();

        let mut label = String::new();
        if let Some(value) = feature {
            label.push_str(value);
            label.push_str(": ");
        }
        match (names.first(), names.last()) {
            (Some(first), Some(last)) if names.len() > 1 => {
                label.push_str(truncate_label(first, self.label_length));
                label.push_str(" ... ");
                label.push_str(truncate_label(last, self.label_length));
                label.push(' ');
            }
            (Some(first), _) => {
                label.push_str(truncate_label(first, self.label_length));
                label.push(' ');
            }
            _ => {}
        }
        label.push_str(&format!("[{count}]"));
        if tally.hits() > 0 {
            label.push_str(&format!(" [{}/{}]", tally.hits(), tally.eligible()));
        }
        label
    }

    pub fn summarize(&self, id: NodeId, feature: Option<&str>) -> CollapsedSummary {
        let tally = self.tally(id);
        CollapsedSummary {
            label: self.label(id, &tally, feature),
            color: self.color(id, &tally),
            tally,
            descendant_count: external_descendant_count(self.tree, id),
        }
    }

    fn eligible_descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.tree
            .preorder_all(id)
            .into_iter()
            .filter(move |desc| *desc != id && self.tree.node(*desc).data.is_display_eligible())
    }

    /// The one color every valued descendant maps to.
    fn uniform_label_color(&self, id: NodeId) -> Option<Color> {
        let vis = self.label_color?;
        let mut shared = None;
        for desc in self.eligible_descendants(id) {
            let Some(color) = vis.resolve(&self.tree.node(desc).data) else {
                continue;
            };
            match shared {
                None => shared = Some(color),
                Some(existing) if existing == color => {}
                Some(_) => return None,
            }
        }
        shared
    }
}
