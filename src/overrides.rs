//! User-edited colors layered over the registry's color visualizations.

use crate::error::{EngineError, EngineResult};
use crate::scale::{ScaleAdapter, format_number, parse_number};
use crate::theme::Color;
use crate::visualization::{Channel, ValueSource, Visualization, VisualizationRegistry};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which slot of a color visualization to rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverrideTarget {
    /// A category of an ordinal or mapped visualization, or the display
    /// value of a linear control point.
    Category(String),
    /// Zero-based range slot.
    Stop(usize),
}

impl fmt::Display for OverrideTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category(value) => f.write_str(value),
            Self::Stop(index) => write!(f, "stop {index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorOverride {
    pub label: String,
    pub target: OverrideTarget,
    pub color: Color,
}

#[derive(Debug, Clone, Default)]
pub struct ColorOverrideStore {
    records: Vec<ColorOverride>,
}

impl ColorOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrites one slot of the color visualization behind `label`. All three
    /// color channels read the same visualization, so `channel` only has to
    /// name one of them.
    pub fn apply_override(
        &mut self,
        registry: &mut VisualizationRegistry,
        channel: Channel,
        label: &str,
        target: OverrideTarget,
        color: Color,
    ) -> EngineResult<()> {
        if !channel.is_color() {
            return Err(EngineError::NotAColorChannel(channel));
        }
        let vis = registry
            .color_mut(label)
            .ok_or_else(|| EngineError::UnknownVisualization {
                channel,
                label: label.to_string(),
            })?;
        if !rewrite(vis, &target, color) {
            return Err(EngineError::UnknownOverrideTarget {
                label: label.to_string(),
                target: target.to_string(),
            });
        }
        log::debug!("override {label}/{target} -> {color}");
        self.records
            .retain(|record| !(record.label == label && record.target == target));
        self.records.push(ColorOverride {
            label: label.to_string(),
            target,
            color,
        });
        Ok(())
    }

    /// Replays recorded overrides onto a freshly built registry. Overrides
    /// whose visualization or slot disappeared are skipped. Returns how many
    /// were applied.
    pub fn reapply(&self, registry: &mut VisualizationRegistry) -> usize {
        let mut applied = 0;
        for record in &self.records {
            let Some(vis) = registry.color_mut(&record.label) else {
                log::debug!("override for '{}' no longer has a visualization", record.label);
                continue;
            };
            if rewrite(vis, &record.target, record.color) {
                applied += 1;
            } else {
                log::debug!(
                    "override {}/{} no longer resolves",
                    record.label,
                    record.target
                );
            }
        }
        applied
    }

    pub fn records(&self) -> &[ColorOverride] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

fn rewrite(vis: &mut Visualization<Color>, target: &OverrideTarget, color: Color) -> bool {
    if vis.uses_alternate() {
        if let Some(alternate) = vis.alternate.as_mut() {
            return rewrite_linear(alternate, target, color);
        }
    }
    match &mut vis.source {
        ValueSource::Scale(ScaleAdapter::Linear(scale)) => rewrite_linear(scale, target, color),
        ValueSource::Scale(ScaleAdapter::Ordinal(scale)) => {
            let index = match target {
                OverrideTarget::Category(value) => scale.index_of(value),
                OverrideTarget::Stop(index) => Some(*index).filter(|i| *i < scale.domain().len()),
            };
            let Some(index) = index else {
                return false;
            };
            // Every other slot keeps what the scale currently yields for it.
            let len = scale.range().len().max(index + 1);
            let mut range: Vec<Color> = (0..len).filter_map(|i| scale.cyclic_at(i)).collect();
            if range.len() < len {
                range.resize(len, color);
            }
            range[index] = color;
            scale.set_range(range);
            true
        }
        ValueSource::Mapping(entries) => {
            let slot = match target {
                OverrideTarget::Category(value) => entries
                    .iter_mut()
                    .find(|(key, _)| key.as_str() == value || key.matches(value)),
                OverrideTarget::Stop(index) => entries.get_mut(*index),
            };
            match slot {
                Some((_, visual)) => {
                    *visual = color;
                    true
                }
                None => false,
            }
        }
    }
}

fn rewrite_linear(
    scale: &mut crate::scale::LinearScale<Color>,
    target: &OverrideTarget,
    color: Color,
) -> bool {
    let index = match target {
        OverrideTarget::Stop(index) => Some(*index),
        OverrideTarget::Category(value) => scale.domain().iter().position(|point| {
            parse_number(value) == Some(*point) || format_number(*point, 2) == *value
        }),
    };
    let Some(index) = index.filter(|i| *i < scale.range().len()) else {
        return false;
    };
    let mut range = scale.range().to_vec();
    range[index] = color;
    scale.set_range(range).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{NodeData, Tree};
    use crate::visualization::{
        ColorSpec, IgnoreList, PropertyTable, RegistryOptions, VisualizationEntry,
    };
    use std::collections::BTreeMap;

    fn registry(hosts: &[&str], entry: VisualizationEntry) -> VisualizationRegistry {
        let mut tree = Tree::new(NodeData::default());
        let root = tree.root();
        for host in hosts {
            tree.add_child(root, NodeData::named(host).with_property("host", host));
        }
        let table = PropertyTable::collect(&tree, root, &IgnoreList::new());
        let (registry, errors) =
            VisualizationRegistry::build(&[entry], &table, &RegistryOptions::default());
        assert!(errors.is_empty());
        registry
    }

    fn entry(colors: ColorSpec) -> VisualizationEntry {
        VisualizationEntry {
            label: "Host".to_string(),
            clade_ref: Some("host".to_string()),
            colors: Some(colors),
            ..VisualizationEntry::default()
        }
    }

    const RED: Color = Color::rgb(255, 0, 0);

    #[test]
    fn ordinal_override_only_touches_its_category() {
        let mut reg = registry(
            &["Bat", "Cow", "Eel"],
            entry(ColorSpec::Palette("category10".to_string())),
        );
        let vis = reg.color("Host").unwrap();
        let before_bat = vis.resolve_value("Bat");
        let before_eel = vis.resolve_value("Eel");

        let mut store = ColorOverrideStore::new();
        store
            .apply_override(
                &mut reg,
                Channel::NodeFillColor,
                "Host",
                OverrideTarget::Category("Cow".to_string()),
                RED,
            )
            .unwrap();

        let vis = reg.color("Host").unwrap();
        assert_eq!(vis.resolve_value("Cow"), Some(RED));
        assert_eq!(vis.resolve_value("Bat"), before_bat);
        assert_eq!(vis.resolve_value("Eel"), before_eel);
    }

    #[test]
    fn consecutive_overrides_do_not_clobber_each_other() {
        let mut reg = registry(&["Bat", "Cow"], entry(ColorSpec::Palette("category10".to_string())));
        let blue = Color::rgb(0, 0, 255);
        let mut store = ColorOverrideStore::new();
        store
            .apply_override(&mut reg, Channel::LabelColor, "Host", OverrideTarget::Category("Bat".into()), RED)
            .unwrap();
        store
            .apply_override(&mut reg, Channel::NodeBorderColor, "Host", OverrideTarget::Category("Cow".into()), blue)
            .unwrap();
        let vis = reg.color("Host").unwrap();
        assert_eq!(vis.resolve_value("Bat"), Some(RED));
        assert_eq!(vis.resolve_value("Cow"), Some(blue));
        assert_eq!(store.records().len(), 2);
    }

    #[test]
    fn overflowing_ordinal_grows_range_from_cyclic_reads() {
        let hosts: Vec<String> = (0..12).map(|i| format!("h{i:02}")).collect();
        let refs: Vec<&str> = hosts.iter().map(String::as_str).collect();
        let mut reg = registry(&refs, entry(ColorSpec::Palette("category10".to_string())));
        let before: Vec<_> = refs
            .iter()
            .map(|h| reg.color("Host").unwrap().resolve_value(h))
            .collect();
        let mut store = ColorOverrideStore::new();
        store
            .apply_override(&mut reg, Channel::NodeFillColor, "Host", OverrideTarget::Category("h11".into()), RED)
            .unwrap();
        let vis = reg.color("Host").unwrap();
        for (idx, host) in refs.iter().enumerate() {
            let expected = if *host == "h11" { Some(RED) } else { before[idx] };
            assert_eq!(vis.resolve_value(host), expected, "{host}");
        }
    }

    #[test]
    fn linear_override_rewrites_control_point() {
        let mut reg = registry(
            &["1", "5"],
            entry(ColorSpec::Stops(vec!["#000000".to_string(), "#ffffff".to_string()])),
        );
        let mut store = ColorOverrideStore::new();
        store
            .apply_override(&mut reg, Channel::NodeFillColor, "Host", OverrideTarget::Category("5".into()), RED)
            .unwrap();
        let vis = reg.color("Host").unwrap();
        assert_eq!(vis.resolve_value("5"), Some(RED));
        assert_eq!(vis.resolve_value("1"), Some(Color::rgb(0, 0, 0)));
        store
            .apply_override(&mut reg, Channel::NodeFillColor, "Host", OverrideTarget::Stop(0), RED)
            .unwrap();
        assert_eq!(reg.color("Host").unwrap().resolve_value("1"), Some(RED));
    }

    #[test]
    fn mapping_override_rewrites_matching_entry() {
        let table = BTreeMap::from([
            ("Bat".to_string(), "#000000".to_string()),
            ("Cow".to_string(), "#ffffff".to_string()),
        ]);
        let mut reg = registry(&["Bat", "Cow"], entry(ColorSpec::Mapping(table)));
        let mut store = ColorOverrideStore::new();
        store
            .apply_override(&mut reg, Channel::NodeFillColor, "Host", OverrideTarget::Category("Bat".into()), RED)
            .unwrap();
        let vis = reg.color("Host").unwrap();
        assert_eq!(vis.resolve_value("Bat"), Some(RED));
        assert_eq!(vis.resolve_value("Cow"), Some(Color::rgb(255, 255, 255)));
    }

    #[test]
    fn rejects_bad_channel_label_and_target() {
        let mut reg = registry(&["Bat"], entry(ColorSpec::Palette("category10".to_string())));
        let mut store = ColorOverrideStore::new();
        let target = OverrideTarget::Category("Bat".to_string());
        assert!(matches!(
            store.apply_override(&mut reg, Channel::NodeSize, "Host", target.clone(), RED),
            Err(EngineError::NotAColorChannel(Channel::NodeSize))
        ));
        assert!(matches!(
            store.apply_override(&mut reg, Channel::NodeFillColor, "Nope", target, RED),
            Err(EngineError::UnknownVisualization { .. })
        ));
        assert!(matches!(
            store.apply_override(
                &mut reg,
                Channel::NodeFillColor,
                "Host",
                OverrideTarget::Category("Eel".to_string()),
                RED
            ),
            Err(EngineError::UnknownOverrideTarget { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn reapply_restores_overrides_after_rebuild() {
        let spec = entry(ColorSpec::Palette("category10".to_string()));
        let mut reg = registry(&["Bat", "Cow"], spec.clone());
        let mut store = ColorOverrideStore::new();
        store
            .apply_override(&mut reg, Channel::NodeFillColor, "Host", OverrideTarget::Category("Cow".into()), RED)
            .unwrap();
        store
            .apply_override(&mut reg, Channel::NodeFillColor, "Host", OverrideTarget::Category("Bat".into()), RED)
            .unwrap();

        let mut rebuilt = registry(&["Cow", "Eel"], spec);
        assert_eq!(store.reapply(&mut rebuilt), 1);
        assert_eq!(rebuilt.color("Host").unwrap().resolve_value("Cow"), Some(RED));

        store.clear();
        assert!(store.is_empty());
    }
}
