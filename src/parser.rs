use crate::ir::{Children, Confidence, Events, NodeData, NodeId, Property, Sequence, Taxonomy, Tree};
use anyhow::{Context, Result, anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

static NHX_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^:=]+)=([^:]*)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeFormat {
    Newick,
    Json,
}

#[derive(Debug)]
pub struct ParseOutput {
    pub tree: Tree,
    pub format: TreeFormat,
}

pub fn load_tree(path: &Path) -> Result<ParseOutput> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read tree file: {}", path.display()))?;
    parse_tree(&raw).with_context(|| format!("failed to parse tree file: {}", path.display()))
}

pub fn parse_tree(input: &str) -> Result<ParseOutput> {
    match detect_format(input) {
        TreeFormat::Json => Ok(ParseOutput {
            tree: parse_json_tree(input)?,
            format: TreeFormat::Json,
        }),
        TreeFormat::Newick => Ok(ParseOutput {
            tree: parse_newick(input)?,
            format: TreeFormat::Newick,
        }),
    }
}

fn detect_format(input: &str) -> TreeFormat {
    match input.trim_start().chars().next() {
        Some('{') => TreeFormat::Json,
        _ => TreeFormat::Newick,
    }
}

/// Parses bracket notation with optional NHX comments into an arena tree.
///
/// The outermost parenthesis pair describes the root, so `(A,B)C;` yields a
/// root named `C` with two children. Node ids follow the order in which
/// nodes open in the text.
pub fn parse_newick(input: &str) -> Result<Tree> {
    let text = input.trim();
    if text.is_empty() || text == ";" {
        bail!("empty tree");
    }

    let chars: Vec<char> = text.chars().collect();
    let mut tree = Tree::new(NodeData::default());
    let mut current = tree.root();
    let mut depth = 0usize;
    let mut pos = 0usize;
    let mut finished = false;

    while pos < chars.len() {
        let ch = chars[pos];
        match ch {
            c if c.is_whitespace() => pos += 1,
            '(' => {
                current = tree.add_child(current, NodeData::default());
                depth += 1;
                pos += 1;
            }
            ',' => {
                let parent = tree
                    .node(current)
                    .parent
                    .ok_or_else(|| anyhow!("unexpected ',' at top level (offset {pos})"))?;
                current = tree.add_child(parent, NodeData::default());
                pos += 1;
            }
            ')' => {
                if depth == 0 {
                    bail!("unbalanced ')' at offset {pos}");
                }
                current = tree
                    .node(current)
                    .parent
                    .ok_or_else(|| anyhow!("unbalanced ')' at offset {pos}"))?;
                depth -= 1;
                pos += 1;
            }
            ':' => {
                let (raw, next) = read_until_delimiter(&chars, pos + 1);
                let length: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("invalid branch length '{}' at offset {pos}", raw.trim()))?;
                tree.node_mut(current).data.branch_length = Some(length);
                pos = next;
            }
            '[' => {
                let end = chars[pos..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| pos + offset)
                    .ok_or_else(|| anyhow!("unterminated comment at offset {pos}"))?;
                let comment: String = chars[pos + 1..end].iter().collect();
                apply_comment(&mut tree.node_mut(current).data, &comment);
                pos = end + 1;
            }
            ';' => {
                finished = true;
                pos += 1;
                break;
            }
            '\'' => {
                let (label, next) = read_quoted(&chars, pos)?;
                tree.node_mut(current).data.name = Some(label);
                pos = next;
            }
            _ => {
                let (raw, next) = read_until_delimiter(&chars, pos);
                let label = raw.trim();
                if !label.is_empty() {
                    tree.node_mut(current).data.name = Some(label.to_string());
                }
                pos = next;
            }
        }
    }

    if depth != 0 {
        bail!("unbalanced '(': {depth} group(s) left open");
    }
    if !finished {
        log::debug!("newick input without terminating ';'");
    }
    if chars[pos..].iter().any(|c| !c.is_whitespace()) {
        bail!("trailing content after ';' (multiple trees are not supported)");
    }
    Ok(tree)
}

fn read_until_delimiter(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && !matches!(chars[end], '(' | ')' | ',' | ':' | ';' | '[') {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn read_quoted(chars: &[char], start: usize) -> Result<(String, usize)> {
    let mut label = String::new();
    let mut pos = start + 1;
    while pos < chars.len() {
        if chars[pos] == '\'' {
            if chars.get(pos + 1) == Some(&'\'') {
                label.push('\'');
                pos += 2;
                continue;
            }
            return Ok((label, pos + 1));
        }
        label.push(chars[pos]);
        pos += 1;
    }
    Err(anyhow!("unterminated quoted label at offset {start}"))
}

fn apply_comment(data: &mut NodeData, comment: &str) {
    let Some(body) = comment.strip_prefix("&&NHX") else {
        return;
    };
    for caps in NHX_TAG_RE.captures_iter(body) {
        let key = caps[1].trim();
        let value = caps[2].trim();
        if value.is_empty() {
            continue;
        }
        match key {
            "S" => taxonomy_mut(data).scientific_name = Some(value.to_string()),
            "T" => taxonomy_mut(data).code = Some(value.to_string()),
            "GN" => sequence_mut(data).gene_name = Some(value.to_string()),
            "AC" => sequence_mut(data).accession = Some(value.to_string()),
            "D" => {
                let events = data.events.get_or_insert_with(Events::default);
                match value {
                    "Y" | "T" => events.duplications += 1,
                    "N" | "F" => events.speciations += 1,
                    _ => {}
                }
            }
            "B" => match value.parse::<f64>() {
                Ok(support) => data.confidences.push(Confidence {
                    value: support,
                    kind: Some("bootstrap".to_string()),
                }),
                Err(_) => log::warn!("ignoring non-numeric NHX support value '{value}'"),
            },
            _ => data.properties.push(Property::node(key, value)),
        }
    }
}

fn taxonomy_mut(data: &mut NodeData) -> &mut Taxonomy {
    if data.taxonomies.is_empty() {
        data.taxonomies.push(Taxonomy::default());
    }
    &mut data.taxonomies[0]
}

fn sequence_mut(data: &mut NodeData) -> &mut Sequence {
    if data.sequences.is_empty() {
        data.sequences.push(Sequence::default());
    }
    &mut data.sequences[0]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonTree {
    #[serde(default = "default_rooted")]
    rooted: bool,
    root: JsonNode,
}

fn default_rooted() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct JsonNode {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    branch_length: Option<f64>,
    #[serde(default)]
    confidences: Vec<Confidence>,
    #[serde(default)]
    properties: Vec<Property>,
    #[serde(default)]
    taxonomies: Vec<Taxonomy>,
    #[serde(default)]
    sequences: Vec<Sequence>,
    #[serde(default)]
    events: Option<Events>,
    #[serde(default)]
    collapsed: bool,
    #[serde(default)]
    children: Vec<JsonNode>,
}

impl JsonNode {
    fn take_data(&mut self) -> NodeData {
        NodeData {
            name: self.name.take(),
            branch_length: self.branch_length,
            confidences: std::mem::take(&mut self.confidences),
            properties: std::mem::take(&mut self.properties),
            taxonomies: std::mem::take(&mut self.taxonomies),
            sequences: std::mem::take(&mut self.sequences),
            events: self.events,
        }
    }
}

/// Parses the annotated JSON form: `{"rooted": true, "root": {...}}` with
/// nested `children` arrays.
pub fn parse_json_tree(input: &str) -> Result<Tree> {
    let mut parsed: JsonTree = serde_json::from_str(input).context("invalid JSON tree")?;
    let mut tree = Tree::new(parsed.root.take_data());
    tree.rooted = parsed.rooted;

    let root = tree.root();
    let mut stack: Vec<(NodeId, JsonNode)> = vec![(root, parsed.root)];
    let mut collapsed = Vec::new();
    while let Some((id, node)) = stack.pop() {
        if node.collapsed && !node.children.is_empty() {
            collapsed.push(id);
        }
        for mut child in node.children {
            let child_id = tree.add_child(id, child.take_data());
            stack.push((child_id, child));
        }
    }
    for id in collapsed {
        let saved = tree.node(id).children.all().to_vec();
        tree.node_mut(id).children = Children::Collapsed(saved);
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tree: &Tree) -> Vec<Option<String>> {
        tree.preorder_all(tree.root())
            .into_iter()
            .map(|id| tree.node(id).data.name.clone())
            .collect()
    }

    #[test]
    fn parses_simple_newick() {
        let tree = parse_newick("((A:1,B:2)AB:0.5,C:3)root;").unwrap();
        assert_eq!(
            names(&tree),
            vec![
                Some("root".to_string()),
                Some("AB".to_string()),
                Some("A".to_string()),
                Some("B".to_string()),
                Some("C".to_string()),
            ]
        );
        let ab = tree.node(tree.root()).children.all()[0];
        assert_eq!(tree.node(ab).data.branch_length, Some(0.5));
        assert_eq!(tree.external_descendants(tree.root()).len(), 3);
    }

    #[test]
    fn parses_single_leaf() {
        let tree = parse_newick("A;").unwrap();
        assert_eq!(names(&tree), vec![Some("A".to_string())]);
    }

    #[test]
    fn handles_quoted_labels_and_whitespace() {
        let tree = parse_newick("( 'Homo sapiens':1 , 'O''Brien' : 2 );").unwrap();
        let labels = names(&tree);
        assert_eq!(labels[1].as_deref(), Some("Homo sapiens"));
        assert_eq!(labels[2].as_deref(), Some("O'Brien"));
    }

    #[test]
    fn parses_nhx_annotations() {
        let tree = parse_newick("(A:1[&&NHX:S=Homo sapiens:T=HUMAN:host=Bat:B=95],B:1[&&NHX:D=Y])r;")
            .unwrap();
        let children = tree.node(tree.root()).children.all().to_vec();
        let a = &tree.node(children[0]).data;
        assert_eq!(a.taxonomies[0].scientific_name.as_deref(), Some("Homo sapiens"));
        assert_eq!(a.taxonomies[0].code.as_deref(), Some("HUMAN"));
        assert_eq!(a.node_property("host"), Some("Bat"));
        assert_eq!(a.confidences[0].value, 95.0);
        let b = &tree.node(children[1]).data;
        assert_eq!(b.events.map(|e| e.duplications), Some(1));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_newick("").is_err());
        assert!(parse_newick("((A,B);").is_err());
        assert!(parse_newick("(A,B));").is_err());
        assert!(parse_newick("(A:x,B);").is_err());
        assert!(parse_newick("(A,B);(C,D);").is_err());
    }

    #[test]
    fn parses_json_tree_with_collapsed_node() {
        let input = r#"{
            "root": {
                "children": [
                    {"name": "A", "branchLength": 1.0,
                     "properties": [{"ref": "host", "value": "Bat", "appliesTo": "node"}]},
                    {"collapsed": true, "children": [{"name": "B"}, {"name": "C"}]}
                ]
            }
        }"#;
        let parsed = parse_tree(input).unwrap();
        assert_eq!(parsed.format, TreeFormat::Json);
        let tree = parsed.tree;
        let children = tree.node(tree.root()).children.all().to_vec();
        assert_eq!(tree.node(children[0]).data.node_property("host"), Some("Bat"));
        assert!(tree.node(children[1]).children.is_collapsed());
        assert_eq!(tree.preorder_visible(tree.root()).len(), 3);
        assert_eq!(tree.preorder_all(tree.root()).len(), 5);
    }
}
