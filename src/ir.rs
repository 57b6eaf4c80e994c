use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle of a node in the tree arena. Handles are assigned once at
/// load time and never reused, so they double as the diff key between
/// render passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Child list of a node. A leaf is `Expanded` with no children; a collapsed
/// node keeps its former children in the `Collapsed` slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Children {
    Expanded(Vec<NodeId>),
    Collapsed(Vec<NodeId>),
}

impl Children {
    /// Children that take part in layout.
    pub fn visible(&self) -> &[NodeId] {
        match self {
            Self::Expanded(children) => children,
            Self::Collapsed(_) => &[],
        }
    }

    /// Children regardless of collapse state.
    pub fn all(&self) -> &[NodeId] {
        match self {
            Self::Expanded(children) | Self::Collapsed(children) => children,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        matches!(self, Self::Collapsed(_))
    }

    pub(crate) fn all_mut(&mut self) -> &mut Vec<NodeId> {
        match self {
            Self::Expanded(children) | Self::Collapsed(children) => children,
        }
    }
}

impl Default for Children {
    fn default() -> Self {
        Self::Expanded(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppliesTo {
    #[default]
    Node,
    Clade,
    Branch,
    Phylogeny,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(rename = "ref")]
    pub reference: String,
    pub value: String,
    #[serde(default = "default_datatype")]
    pub datatype: String,
    #[serde(default)]
    pub applies_to: AppliesTo,
}

fn default_datatype() -> String {
    "xsd:string".to_string()
}

impl Property {
    pub fn node(reference: &str, value: &str) -> Self {
        Self {
            reference: reference.to_string(),
            value: value.to_string(),
            datatype: default_datatype(),
            applies_to: AppliesTo::Node,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub value: f64,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Taxonomy {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub rank: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub accession: Option<String>,
    #[serde(default)]
    pub gene_name: Option<String>,
    #[serde(default)]
    pub mol_seq: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Events {
    #[serde(default)]
    pub duplications: u32,
    #[serde(default)]
    pub speciations: u32,
    #[serde(default)]
    pub losses: u32,
}

/// Annotation payload carried by a node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeData {
    pub name: Option<String>,
    pub branch_length: Option<f64>,
    pub confidences: Vec<Confidence>,
    pub properties: Vec<Property>,
    pub taxonomies: Vec<Taxonomy>,
    pub sequences: Vec<Sequence>,
    pub events: Option<Events>,
}

impl NodeData {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.branch_length = Some(length);
        self
    }

    pub fn with_property(mut self, reference: &str, value: &str) -> Self {
        self.properties.push(Property::node(reference, value));
        self
    }

    /// First value of a property that applies to the node itself.
    pub fn node_property(&self, reference: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.applies_to == AppliesTo::Node && p.reference == reference)
            .map(|p| p.value.as_str())
    }

    /// Whether the node carries anything a search or visualization can see.
    pub fn is_display_eligible(&self) -> bool {
        self.name.as_deref().is_some_and(|name| !name.is_empty())
            || !self.taxonomies.is_empty()
            || !self.sequences.is_empty()
            || !self.properties.is_empty()
    }

    /// Text shown next to the node: name, then taxonomy, then sequence.
    pub fn display_label(&self) -> Option<&str> {
        if let Some(name) = self.name.as_deref().filter(|name| !name.is_empty()) {
            return Some(name);
        }
        let taxonomy = self.taxonomies.first().and_then(|t| {
            t.scientific_name
                .as_deref()
                .or(t.code.as_deref())
                .or(t.common_name.as_deref())
        });
        if taxonomy.is_some() {
            return taxonomy;
        }
        self.sequences
            .first()
            .and_then(|s| s.symbol.as_deref().or(s.name.as_deref()))
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Children,
    pub data: NodeData,
}

impl Node {
    pub fn has_descendants(&self) -> bool {
        !self.children.all().is_empty()
    }

    /// Leaf or collapsed node: drawn at the tips of the visible tree.
    pub fn is_external(&self) -> bool {
        self.children.visible().is_empty()
    }
}

/// Arena-backed rooted tree.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    pub rooted: bool,
}

impl Tree {
    pub fn new(root: NodeData) -> Self {
        let root_node = Node {
            id: NodeId(0),
            parent: None,
            children: Children::default(),
            data: root,
        };
        Self {
            nodes: vec![root_node],
            root: NodeId(0),
            rooted: true,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    /// Number of arena slots, including detached subtrees.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            parent: Some(parent),
            children: Children::default(),
            data,
        });
        self.nodes[parent.0].children.all_mut().push(id);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Panics on a foreign handle; use [`Tree::get`] for untrusted ids.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len() && self.is_reachable(id)
    }

    fn is_reachable(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Pre-order over nodes whose ancestors are all expanded.
    pub fn preorder_visible(&self, start: NodeId) -> Vec<NodeId> {
        self.preorder_with(start, |node| node.children.visible())
    }

    /// Pre-order over every descendant, collapsed ones included.
    pub fn preorder_all(&self, start: NodeId) -> Vec<NodeId> {
        self.preorder_with(start, |node| node.children.all())
    }

    fn preorder_with<'a>(
        &'a self,
        start: NodeId,
        children: impl Fn(&'a Node) -> &'a [NodeId],
    ) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(children(&self.nodes[id.0]).iter().rev().copied());
        }
        order
    }

    pub fn postorder_visible(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![(start, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for child in self.nodes[id.0].children.visible().iter().rev() {
                stack.push((*child, false));
            }
        }
        order
    }

    /// Leaves below `start` in pre-order, looking through collapsed nodes.
    pub fn external_descendants(&self, start: NodeId) -> Vec<NodeId> {
        self.preorder_all(start)
            .into_iter()
            .filter(|id| *id != start && !self.nodes[id.0].has_descendants())
            .collect()
    }

    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes[id.0].parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent.0].parent;
        }
        depth
    }
}
