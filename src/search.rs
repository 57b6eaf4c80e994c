//! Two-slot node search and the highlight policy that combines search hits,
//! manual selection and negation.

use crate::ir::{NodeData, NodeId, Tree};
use crate::theme::{Color, Theme};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

static TYPED_TERM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(NN|TC|TS|TN|SY|SN|GN|SA|MS|PR):(.*)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    /// Match complete words only.
    pub whole_term: bool,
    pub regex: bool,
    /// Also look at property values in untyped terms.
    pub include_properties: bool,
}

/// Field a typed term (`KEY:term`) is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKey {
    Name,
    TaxonomyCode,
    ScientificName,
    CommonName,
    SequenceSymbol,
    SequenceName,
    GeneName,
    Accession,
    MolecularSequence,
    Property,
}

impl SearchKey {
    fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "NN" => Self::Name,
            "TC" => Self::TaxonomyCode,
            "TS" => Self::ScientificName,
            "TN" => Self::CommonName,
            "SY" => Self::SequenceSymbol,
            "SN" => Self::SequenceName,
            "GN" => Self::GeneName,
            "SA" => Self::Accession,
            "MS" => Self::MolecularSequence,
            "PR" => Self::Property,
            _ => return None,
        })
    }

    fn values<'a>(self, data: &'a NodeData, out: &mut Vec<&'a str>) {
        match self {
            Self::Name => out.extend(data.name.as_deref()),
            Self::TaxonomyCode => out.extend(data.taxonomies.iter().filter_map(|t| t.code.as_deref())),
            Self::ScientificName => out.extend(
                data.taxonomies
                    .iter()
                    .filter_map(|t| t.scientific_name.as_deref()),
            ),
            Self::CommonName => out.extend(
                data.taxonomies
                    .iter()
                    .filter_map(|t| t.common_name.as_deref()),
            ),
            Self::SequenceSymbol => out.extend(data.sequences.iter().filter_map(|s| s.symbol.as_deref())),
            Self::SequenceName => out.extend(data.sequences.iter().filter_map(|s| s.name.as_deref())),
            Self::GeneName => out.extend(data.sequences.iter().filter_map(|s| s.gene_name.as_deref())),
            Self::Accession => out.extend(data.sequences.iter().filter_map(|s| s.accession.as_deref())),
            Self::MolecularSequence => {
                out.extend(data.sequences.iter().filter_map(|s| s.mol_seq.as_deref()))
            }
            Self::Property => out.extend(data.properties.iter().map(|p| p.value.as_str())),
        }
    }
}

/// Untyped terms look at everything except the molecular sequence.
const UNTYPED_KEYS: [SearchKey; 8] = [
    SearchKey::Name,
    SearchKey::TaxonomyCode,
    SearchKey::ScientificName,
    SearchKey::CommonName,
    SearchKey::SequenceSymbol,
    SearchKey::SequenceName,
    SearchKey::GeneName,
    SearchKey::Accession,
];

#[derive(Debug, Clone)]
enum Matcher {
    Text { needle: String, case_sensitive: bool, whole_term: bool },
    Pattern(Regex),
    Never,
}

impl Matcher {
    fn new(text: &str, options: &SearchOptions) -> Self {
        if options.regex {
            return match RegexBuilder::new(text)
                .case_insensitive(!options.case_sensitive)
                .build()
            {
                Ok(re) => Self::Pattern(re),
                Err(err) => {
                    log::warn!("search term '{text}' is not a valid pattern: {err}");
                    Self::Never
                }
            };
        }
        let needle = if options.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        };
        Self::Text {
            needle,
            case_sensitive: options.case_sensitive,
            whole_term: options.whole_term,
        }
    }

    fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Never => false,
            Self::Pattern(re) => re.is_match(value),
            Self::Text {
                needle,
                case_sensitive,
                whole_term,
            } => {
                let folded;
                let haystack = if *case_sensitive {
                    value
                } else {
                    folded = value.to_lowercase();
                    folded.as_str()
                };
                if *whole_term {
                    haystack == needle.as_str()
                        || haystack
                            .split(|c: char| !c.is_alphanumeric())
                            .any(|word| word == needle.as_str())
                } else {
                    haystack.contains(needle.as_str())
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Term {
    key: Option<SearchKey>,
    matcher: Matcher,
}

impl Term {
    fn matches(&self, data: &NodeData, include_properties: bool) -> bool {
        let mut values = Vec::new();
        match self.key {
            Some(key) => key.values(data, &mut values),
            None => {
                for key in UNTYPED_KEYS {
                    key.values(data, &mut values);
                }
                if include_properties {
                    SearchKey::Property.values(data, &mut values);
                }
            }
        }
        values.iter().any(|value| self.matcher.is_match(value))
    }
}

/// A parsed query: `,` separates alternatives, `+` joins terms that must all
/// match.
#[derive(Debug, Clone)]
pub struct Query {
    clauses: Vec<Vec<Term>>,
    include_properties: bool,
}

impl Query {
    pub fn parse(text: &str, options: &SearchOptions) -> Self {
        let clauses = text
            .split(',')
            .map(|clause| {
                clause
                    .split('+')
                    .map(str::trim)
                    .filter(|raw| !raw.is_empty())
                    .map(|raw| match TYPED_TERM_RE.captures(raw) {
                        Some(caps) => Term {
                            key: SearchKey::from_code(&caps[1]),
                            matcher: Matcher::new(caps[2].trim(), options),
                        },
                        None => Term {
                            key: None,
                            matcher: Matcher::new(raw, options),
                        },
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|terms| !terms.is_empty())
            .collect();
        Self {
            clauses,
            include_properties: options.include_properties,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, data: &NodeData) -> bool {
        self.clauses.iter().any(|clause| {
            clause
                .iter()
                .all(|term| term.matches(data, self.include_properties))
        })
    }
}

/// Display-eligible nodes below `root` (collapsed descendants included)
/// that match `query`.
pub fn search_tree(
    tree: &Tree,
    root: NodeId,
    query: &str,
    options: &SearchOptions,
) -> BTreeSet<NodeId> {
    let query = Query::parse(query, options);
    if query.is_empty() {
        return BTreeSet::new();
    }
    tree.preorder_all(root)
        .into_iter()
        .filter(|id| {
            let data = &tree.node(*id).data;
            data.is_display_eligible() && query.matches(data)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    A,
    B,
}

#[derive(Debug, Clone, Default)]
pub struct SearchSlot {
    pub query: String,
    pub options: SearchOptions,
    pub results: BTreeSet<NodeId>,
}

impl SearchSlot {
    fn run(&mut self, tree: &Tree, root: NodeId) {
        self.results = search_tree(tree, root, &self.query, &self.options);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Highlight {
    Selected,
    Both,
    A,
    B,
}

impl Highlight {
    pub fn color(self, theme: &Theme) -> Color {
        match self {
            Self::Selected => theme.selection,
            Self::Both => theme.found_both,
            Self::A => theme.found_a,
            Self::B => theme.found_b,
        }
    }
}

/// Search slots, manual selection and the global negation flag.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    a: SearchSlot,
    b: SearchSlot,
    selected: BTreeSet<NodeId>,
    negate: bool,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, slot: Slot) -> &SearchSlot {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut SearchSlot {
        match slot {
            Slot::A => &mut self.a,
            Slot::B => &mut self.b,
        }
    }

    /// Replaces the query of one slot and reruns it. Returns the hit count.
    pub fn set_query(
        &mut self,
        tree: &Tree,
        root: NodeId,
        slot: Slot,
        query: &str,
        options: SearchOptions,
    ) -> usize {
        let target = self.slot_mut(slot);
        target.query = query.to_string();
        target.options = options;
        target.run(tree, root);
        log::debug!("search {slot:?} '{query}': {} hit(s)", target.results.len());
        target.results.len()
    }

    /// Reruns both queries, e.g. after the structure changed.
    pub fn refresh(&mut self, tree: &Tree, root: NodeId) {
        self.a.run(tree, root);
        self.b.run(tree, root);
        self.selected.retain(|id| tree.contains(*id));
    }

    /// Clears both slots. Selection survives.
    pub fn reset(&mut self) {
        self.a = SearchSlot::default();
        self.b = SearchSlot::default();
    }

    pub fn set_negate(&mut self, negate: bool) {
        self.negate = negate;
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }

    pub fn select(&mut self, id: NodeId) {
        self.selected.insert(id);
    }

    pub fn deselect(&mut self, id: NodeId) {
        self.selected.remove(&id);
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selected.contains(&id)
    }

    pub fn has_results(&self) -> bool {
        !self.a.results.is_empty() || !self.b.results.is_empty()
    }

    fn found_in(&self, slot: &SearchSlot, tree: &Tree, id: NodeId) -> bool {
        if self.negate {
            !slot.results.is_empty()
                && !slot.results.contains(&id)
                && tree.node(id).data.is_display_eligible()
        } else {
            slot.results.contains(&id)
        }
    }

    pub fn found_a(&self, tree: &Tree, id: NodeId) -> bool {
        self.found_in(&self.a, tree, id)
    }

    pub fn found_b(&self, tree: &Tree, id: NodeId) -> bool {
        self.found_in(&self.b, tree, id)
    }

    /// Selection beats search hits; a hit in both slots beats a single one.
    pub fn resolve(&self, tree: &Tree, id: NodeId) -> Option<Highlight> {
        if self.is_selected(id) {
            return Some(Highlight::Selected);
        }
        match (self.found_a(tree, id), self.found_b(tree, id)) {
            (true, true) => Some(Highlight::Both),
            (true, false) => Some(Highlight::A),
            (false, true) => Some(Highlight::B),
            (false, false) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Sequence, Taxonomy};

    fn sample() -> (Tree, Vec<NodeId>) {
        let mut tree = Tree::new(NodeData::default());
        let root = tree.root();
        let mut human = NodeData::named("HUMAN_1").with_property("host", "primate");
        human.taxonomies.push(Taxonomy {
            scientific_name: Some("Homo sapiens".to_string()),
            code: Some("HUMAN".to_string()),
            ..Taxonomy::default()
        });
        let mut mouse = NodeData::named("MOUSE_1");
        mouse.sequences.push(Sequence {
            gene_name: Some("BCL2".to_string()),
            mol_seq: Some("MAHAGRT".to_string()),
            ..Sequence::default()
        });
        let ids = vec![
            tree.add_child(root, human),
            tree.add_child(root, mouse),
            tree.add_child(root, NodeData::named("yeast strain 7")),
        ];
        (tree, ids)
    }

    fn run(tree: &Tree, query: &str, options: SearchOptions) -> Vec<NodeId> {
        search_tree(tree, tree.root(), query, &options)
            .into_iter()
            .collect()
    }

    #[test]
    fn comma_is_or_and_plus_is_and() {
        let (tree, ids) = sample();
        let opts = SearchOptions::default();
        assert_eq!(run(&tree, "human, mouse", opts), vec![ids[0], ids[1]]);
        assert_eq!(run(&tree, "human+sapiens", opts), vec![ids[0]]);
        assert!(run(&tree, "human+mouse", opts).is_empty());
        assert!(run(&tree, " , ", opts).is_empty());
    }

    #[test]
    fn typed_terms_restrict_the_field() {
        let (tree, ids) = sample();
        let opts = SearchOptions::default();
        assert_eq!(run(&tree, "TS:homo", opts), vec![ids[0]]);
        assert!(run(&tree, "NN:homo", opts).is_empty());
        assert_eq!(run(&tree, "GN:bcl2", opts), vec![ids[1]]);
        assert!(run(&tree, "AHAG", opts).is_empty());
        assert_eq!(run(&tree, "MS:AHAG", opts), vec![ids[1]]);
        assert_eq!(run(&tree, "PR:primate", opts), vec![ids[0]]);
    }

    #[test]
    fn options_change_matching() {
        let (tree, ids) = sample();
        let sensitive = SearchOptions {
            case_sensitive: true,
            ..SearchOptions::default()
        };
        assert!(run(&tree, "human_1", sensitive).is_empty());
        let whole = SearchOptions {
            whole_term: true,
            ..SearchOptions::default()
        };
        assert_eq!(run(&tree, "strain", whole), vec![ids[2]]);
        assert!(run(&tree, "strai", whole).is_empty());
        let props = SearchOptions {
            include_properties: true,
            ..SearchOptions::default()
        };
        assert!(run(&tree, "primate", SearchOptions::default()).is_empty());
        assert_eq!(run(&tree, "primate", props), vec![ids[0]]);
        let regex = SearchOptions {
            regex: true,
            ..SearchOptions::default()
        };
        assert_eq!(run(&tree, "^(human|mouse)_\\d$", regex), vec![ids[0], ids[1]]);
        assert!(run(&tree, "(unclosed", regex).is_empty());
    }

    #[test]
    fn highlight_precedence_is_selection_both_a_b() {
        let (tree, ids) = sample();
        let root = tree.root();
        let mut state = SearchState::new();
        state.set_query(&tree, root, Slot::A, "human, mouse", SearchOptions::default());
        state.set_query(&tree, root, Slot::B, "mouse, yeast", SearchOptions::default());
        assert_eq!(state.resolve(&tree, ids[0]), Some(Highlight::A));
        assert_eq!(state.resolve(&tree, ids[1]), Some(Highlight::Both));
        assert_eq!(state.resolve(&tree, ids[2]), Some(Highlight::B));
        assert_eq!(state.resolve(&tree, root), None);
        state.select(ids[2]);
        assert_eq!(state.resolve(&tree, ids[2]), Some(Highlight::Selected));
        state.set_negate(true);
        assert_eq!(state.resolve(&tree, ids[2]), Some(Highlight::Selected));
        state.deselect(ids[2]);
        assert_eq!(state.resolve(&tree, ids[2]), Some(Highlight::A));
    }

    #[test]
    fn negation_reports_absent_eligible_nodes() {
        let (tree, ids) = sample();
        let root = tree.root();
        let mut state = SearchState::new();
        state.set_negate(true);
        assert!(!state.found_a(&tree, ids[2]));

        state.set_query(&tree, root, Slot::A, "human", SearchOptions::default());
        assert!(!state.found_a(&tree, ids[0]));
        assert!(state.found_a(&tree, ids[1]));
        assert!(state.found_a(&tree, ids[2]));
        // The unnamed root carries nothing to search, so negation skips it.
        assert!(!state.found_a(&tree, root));
        assert!(!state.found_b(&tree, ids[1]));
    }

    #[test]
    fn negated_miss_in_both_slots_takes_combined_highlight() {
        let (tree, ids) = sample();
        let root = tree.root();
        let mut state = SearchState::new();
        state.set_query(&tree, root, Slot::A, "human", SearchOptions::default());
        state.set_query(&tree, root, Slot::B, "mouse", SearchOptions::default());
        state.set_negate(true);
        assert_eq!(state.resolve(&tree, ids[2]), Some(Highlight::Both));
        assert_eq!(state.resolve(&tree, ids[0]), Some(Highlight::B));
        assert_eq!(state.resolve(&tree, ids[1]), Some(Highlight::A));
        assert_eq!(state.resolve(&tree, root), None);
    }

    #[test]
    fn reset_clears_slots_but_keeps_selection() {
        let (tree, ids) = sample();
        let mut state = SearchState::new();
        state.set_query(&tree, tree.root(), Slot::A, "human", SearchOptions::default());
        state.select(ids[1]);
        assert!(state.has_results());
        state.reset();
        assert!(!state.has_results());
        assert!(state.slot(Slot::A).query.is_empty());
        assert!(state.is_selected(ids[1]));
        assert_eq!(Highlight::Both.color(&Theme::classic()), Theme::classic().found_both);
    }
}
