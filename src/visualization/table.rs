use std::collections::{BTreeMap, BTreeSet};

use crate::ir::{AppliesTo, NodeId, Tree};
use crate::scale::parse_number;

use super::{NodeField, Selector};

/// Property reference to the values that should not drive visualizations.
pub type IgnoreList = BTreeMap<String, BTreeSet<String>>;

/// Every value observed below a root, keyed by property reference and by
/// node field. Values are kept as a multiset so linear scales can use the
/// mean.
#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    properties: BTreeMap<String, Vec<String>>,
    fields: BTreeMap<NodeField, Vec<String>>,
    ignore: IgnoreList,
}

impl PropertyTable {
    pub fn collect(tree: &Tree, root: NodeId, ignore: &IgnoreList) -> Self {
        let mut table = Self {
            ignore: ignore.clone(),
            ..Self::default()
        };
        for id in tree.preorder_all(root) {
            let data = &tree.node(id).data;
            for property in &data.properties {
                if property.applies_to != AppliesTo::Node {
                    continue;
                }
                if ignore
                    .get(&property.reference)
                    .is_some_and(|values| values.contains(&property.value))
                {
                    continue;
                }
                table
                    .properties
                    .entry(property.reference.clone())
                    .or_default()
                    .push(property.value.clone());
            }
            for field in NodeField::ALL {
                if let Some(value) = field.value(data) {
                    table
                        .fields
                        .entry(field)
                        .or_default()
                        .push(value.to_string());
                }
            }
        }
        table
    }

    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn observed(&self, reference: &str) -> &[String] {
        self.properties
            .get(reference)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Ignored values for a property selector. Fields are never ignored.
    pub fn ignored(&self, selector: &Selector) -> BTreeSet<String> {
        match selector {
            Selector::Property(reference) => self.ignore.get(reference).cloned().unwrap_or_default(),
            _ => BTreeSet::new(),
        }
    }

    /// Observed values for a selector, duplicates included.
    pub fn values(&self, selector: &Selector) -> Vec<String> {
        match selector {
            Selector::Property(reference) => self.observed(reference).to_vec(),
            Selector::Field(field) => self.fields.get(field).cloned().unwrap_or_default(),
            Selector::Residue(position) => self
                .fields
                .get(&NodeField::MolecularSequence)
                .map(|seqs| {
                    seqs.iter()
                        .filter_map(|seq| seq.chars().nth(*position))
                        .map(|ch| ch.to_ascii_uppercase().to_string())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Distinct values, ordered numerically when every value is a number and
/// lexically otherwise.
pub fn sorted_distinct(values: &[String]) -> Vec<String> {
    let mut distinct: Vec<String> = values
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !distinct.is_empty() && distinct.iter().all(|v| parse_number(v).is_some()) {
        distinct.sort_by(|a, b| {
            let (x, y) = (parse_number(a).unwrap_or(0.0), parse_number(b).unwrap_or(0.0));
            x.total_cmp(&y)
        });
    }
    distinct
}
