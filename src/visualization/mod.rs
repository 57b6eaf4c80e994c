//! Named property to visual-channel mappings.
//!
//! A [`VisualizationRegistry`] is built from configured
//! [`VisualizationEntry`] values and the [`PropertyTable`] observed over the
//! displayed tree. The three color channels read one shared color map, so a
//! recolored category shows up for label, fill and border alike.

mod palette;
mod shape;
mod table;

pub use palette::{AUTO_PALETTE, PALETTE_NAMES, palette, smallest_palette_for};
pub use shape::Shape;
pub use table::{IgnoreList, PropertyTable, sorted_distinct};

use crate::ir::NodeData;
use crate::scale::{
    Interpolate, LinearScale, NumericStats, OrdinalScale, ScaleAdapter, ScaleError, ScaleType,
    format_number, parse_number,
};
use crate::theme::{Color, ColorParseError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Residues offered for sequence-position visualizations.
pub const RESIDUE_ALPHABET: &str = "ACDEFGHIKLMNPQRSTUVWXY-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    LabelColor,
    NodeFillColor,
    NodeBorderColor,
    NodeShape,
    NodeSize,
}

impl Channel {
    pub const ALL: [Self; 5] = [
        Self::LabelColor,
        Self::NodeFillColor,
        Self::NodeBorderColor,
        Self::NodeShape,
        Self::NodeSize,
    ];

    pub fn is_color(self) -> bool {
        matches!(
            self,
            Self::LabelColor | Self::NodeFillColor | Self::NodeBorderColor
        )
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LabelColor => "label color",
            Self::NodeFillColor => "node fill color",
            Self::NodeBorderColor => "node border color",
            Self::NodeShape => "node shape",
            Self::NodeSize => "node size",
        };
        f.write_str(name)
    }
}

/// Built-in node fields a visualization can key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeField {
    Name,
    TaxonomyCode,
    TaxonomyScientificName,
    TaxonomyCommonName,
    TaxonomyRank,
    SequenceName,
    SequenceSymbol,
    SequenceAccession,
    SequenceGeneName,
    MolecularSequence,
}

impl NodeField {
    pub const ALL: [Self; 10] = [
        Self::Name,
        Self::TaxonomyCode,
        Self::TaxonomyScientificName,
        Self::TaxonomyCommonName,
        Self::TaxonomyRank,
        Self::SequenceName,
        Self::SequenceSymbol,
        Self::SequenceAccession,
        Self::SequenceGeneName,
        Self::MolecularSequence,
    ];

    pub fn value(self, data: &NodeData) -> Option<&str> {
        let taxonomy = data.taxonomies.first();
        let sequence = data.sequences.first();
        let value = match self {
            Self::Name => data.name.as_deref(),
            Self::TaxonomyCode => taxonomy.and_then(|t| t.code.as_deref()),
            Self::TaxonomyScientificName => taxonomy.and_then(|t| t.scientific_name.as_deref()),
            Self::TaxonomyCommonName => taxonomy.and_then(|t| t.common_name.as_deref()),
            Self::TaxonomyRank => taxonomy.and_then(|t| t.rank.as_deref()),
            Self::SequenceName => sequence.and_then(|s| s.name.as_deref()),
            Self::SequenceSymbol => sequence.and_then(|s| s.symbol.as_deref()),
            Self::SequenceAccession => sequence.and_then(|s| s.accession.as_deref()),
            Self::SequenceGeneName => sequence.and_then(|s| s.gene_name.as_deref()),
            Self::MolecularSequence => sequence.and_then(|s| s.mol_seq.as_deref()),
        };
        value.filter(|v| !v.is_empty())
    }
}

/// What part of a node a visualization reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Field(NodeField),
    /// Reference of a property that applies to the node itself.
    Property(String),
    /// Residue at a zero-based position of the molecular sequence.
    Residue(usize),
}

impl Selector {
    pub fn value<'a>(&self, data: &'a NodeData) -> Option<Cow<'a, str>> {
        match self {
            Self::Field(field) => field.value(data).map(Cow::Borrowed),
            Self::Property(reference) => data.node_property(reference).map(Cow::Borrowed),
            Self::Residue(position) => NodeField::MolecularSequence
                .value(data)
                .and_then(|seq| seq.chars().nth(*position))
                .map(|ch| Cow::Owned(ch.to_ascii_uppercase().to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub enum MappingKey {
    Exact(String),
    Pattern(Regex),
}

impl MappingKey {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Exact(key) => key == value,
            Self::Pattern(re) => re.is_match(value),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(key) => key,
            Self::Pattern(re) => re.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ValueSource<R> {
    /// Explicit table, first matching key wins.
    Mapping(Vec<(MappingKey, R)>),
    Scale(ScaleAdapter<R>),
}

/// Display form of a range value in legends.
pub trait LegendText {
    fn legend_text(&self) -> String;
}

impl LegendText for Color {
    fn legend_text(&self) -> String {
        self.to_hex()
    }
}

impl LegendText for f64 {
    fn legend_text(&self) -> String {
        format_number(*self, 2)
    }
}

impl LegendText for Shape {
    fn legend_text(&self) -> String {
        self.name().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct Visualization<R> {
    pub label: String,
    pub description: Option<String>,
    pub selector: Selector,
    pub source: ValueSource<R>,
    /// Linear fallback for an ordinal domain larger than its range.
    pub alternate: Option<LinearScale<R>>,
    /// Values on the ignore list for this selector's property.
    pub ignored: BTreeSet<String>,
}

impl<R> Visualization<R> {
    fn ignoring(mut self, ignored: &BTreeSet<String>) -> Self {
        self.ignored = ignored.clone();
        self
    }
}

impl<R: Interpolate + LegendText> Visualization<R> {
    pub fn scale_type(&self) -> ScaleType {
        match &self.source {
            ValueSource::Mapping(_) => ScaleType::Ordinal,
            ValueSource::Scale(adapter) => {
                if self.uses_alternate() {
                    ScaleType::Linear
                } else {
                    adapter.scale_type()
                }
            }
        }
    }

    pub fn is_out_of_range(&self) -> bool {
        matches!(&self.source, ValueSource::Scale(adapter) if adapter.is_out_of_range())
    }

    pub fn uses_alternate(&self) -> bool {
        self.alternate.is_some() && self.is_out_of_range()
    }

    /// Visual value for a node, or `None` when the node has no value for the
    /// selector, the value is ignored, or it is outside the mapping.
    pub fn resolve(&self, data: &NodeData) -> Option<R> {
        let value = self.selector.value(data)?;
        if self.ignored.contains(value.as_ref()) {
            return None;
        }
        self.resolve_value(&value)
    }

    pub fn resolve_value(&self, value: &str) -> Option<R> {
        match &self.source {
            ValueSource::Mapping(entries) => entries
                .iter()
                .find(|(key, _)| key.matches(value))
                .map(|(_, visual)| visual.clone()),
            ValueSource::Scale(ScaleAdapter::Linear(scale)) => {
                parse_number(value).map(|v| scale.apply(v))
            }
            ValueSource::Scale(ScaleAdapter::Ordinal(scale)) => {
                if !scale.is_out_of_range() {
                    return scale.apply(value);
                }
                match &self.alternate {
                    Some(alternate) => parse_number(value).map(|v| alternate.apply(v)),
                    None => scale.apply_cyclic(value),
                }
            }
        }
    }

    pub fn legend(&self, decimals: u32) -> LegendData {
        let (domain, range): (Vec<String>, Vec<String>) = match &self.source {
            ValueSource::Mapping(entries) => entries
                .iter()
                .map(|(key, visual)| (key.as_str().to_string(), visual.legend_text()))
                .unzip(),
            ValueSource::Scale(adapter) => match (adapter, &self.alternate) {
                (ScaleAdapter::Ordinal(scale), Some(alternate)) if scale.is_out_of_range() => {
                    linear_legend(alternate, decimals)
                }
                (ScaleAdapter::Linear(scale), _) => linear_legend(scale, decimals),
                (ScaleAdapter::Ordinal(scale), _) => (
                    scale.domain().to_vec(),
                    (0..scale.domain().len())
                        .filter_map(|idx| scale.cyclic_at(idx))
                        .map(|visual| visual.legend_text())
                        .collect(),
                ),
            },
        };
        LegendData {
            label: self.label.clone(),
            description: self.description.clone(),
            scale_type: self.scale_type(),
            domain,
            range,
            out_of_range: self.is_out_of_range(),
        }
    }
}

fn linear_legend<R: Interpolate + LegendText>(
    scale: &LinearScale<R>,
    decimals: u32,
) -> (Vec<String>, Vec<String>) {
    (
        scale
            .domain()
            .iter()
            .map(|v| format_number(*v, decimals))
            .collect(),
        scale.range().iter().map(LegendText::legend_text).collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendData {
    pub label: String,
    pub description: Option<String>,
    pub scale_type: ScaleType,
    pub domain: Vec<String>,
    pub range: Vec<String>,
    pub out_of_range: bool,
}

impl LegendData {
    /// Legend heading; an overflowing domain gets a trailing marker.
    pub fn title(&self) -> String {
        if self.out_of_range {
            format!("{} *", self.label)
        } else {
            self.label.clone()
        }
    }
}

/// Color stops, a palette name, or an explicit value→color table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Palette(String),
    Stops(Vec<String>),
    Mapping(BTreeMap<String, String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    Stops(Vec<f64>),
    Mapping(BTreeMap<String, f64>),
}

/// Shape tokens for an ordinal scale (an empty list means the globally
/// configured tokens) or an explicit value→shape table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShapeSpec {
    Tokens(Vec<Shape>),
    Mapping(BTreeMap<String, Shape>),
}

/// One configured visualization, as read from the config file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationEntry {
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub field: Option<NodeField>,
    #[serde(default)]
    pub clade_ref: Option<String>,
    #[serde(default)]
    pub residue_position: Option<usize>,
    /// Treat mapping keys as regular expressions.
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub colors: Option<ColorSpec>,
    #[serde(default)]
    pub colors_alt: Option<Vec<String>>,
    #[serde(default)]
    pub sizes: Option<SizeSpec>,
    #[serde(default)]
    pub shapes: Option<ShapeSpec>,
}

#[derive(Debug, thiserror::Error)]
pub enum VisualizationError {
    #[error("visualization '{label}': {channel} needs 2 or 3 stops, got {found}")]
    StopArity {
        label: String,
        channel: &'static str,
        found: usize,
    },
    #[error("visualization '{label}': exactly one of field or cladeRef must be set")]
    AmbiguousSelector { label: String },
    #[error("visualization '{label}': unknown palette '{palette}'")]
    UnknownPalette { label: String, palette: String },
    #[error("visualization '{label}': {source}")]
    InvalidColor {
        label: String,
        source: ColorParseError,
    },
    #[error("visualization '{label}': invalid key pattern '{pattern}': {source}")]
    InvalidPattern {
        label: String,
        pattern: String,
        source: regex::Error,
    },
    #[error("visualization '{label}': {source}")]
    Scale { label: String, source: ScaleError },
}

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Shape tokens used by entries that ask for the default list.
    pub shapes: Vec<Shape>,
    pub legend_decimals: u32,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            shapes: Shape::ALL.to_vec(),
            legend_decimals: 2,
        }
    }
}

/// The currently selected visualization label per channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveVisualizations {
    pub label_color: Option<String>,
    pub node_fill_color: Option<String>,
    pub node_border_color: Option<String>,
    pub node_shape: Option<String>,
    pub node_size: Option<String>,
}

impl ActiveVisualizations {
    pub fn get(&self, channel: Channel) -> Option<&str> {
        self.slot(channel).as_deref()
    }

    pub fn set(&mut self, channel: Channel, label: Option<String>) {
        *self.slot_mut(channel) = label;
    }

    fn slot(&self, channel: Channel) -> &Option<String> {
        match channel {
            Channel::LabelColor => &self.label_color,
            Channel::NodeFillColor => &self.node_fill_color,
            Channel::NodeBorderColor => &self.node_border_color,
            Channel::NodeShape => &self.node_shape,
            Channel::NodeSize => &self.node_size,
        }
    }

    fn slot_mut(&mut self, channel: Channel) -> &mut Option<String> {
        match channel {
            Channel::LabelColor => &mut self.label_color,
            Channel::NodeFillColor => &mut self.node_fill_color,
            Channel::NodeBorderColor => &mut self.node_border_color,
            Channel::NodeShape => &mut self.node_shape,
            Channel::NodeSize => &mut self.node_size,
        }
    }

    pub fn any(&self) -> bool {
        Channel::ALL.iter().any(|channel| self.get(*channel).is_some())
    }
}

#[derive(Debug, Clone, Default)]
pub struct VisualizationRegistry {
    colors: BTreeMap<String, Visualization<Color>>,
    shapes: BTreeMap<String, Visualization<Shape>>,
    sizes: BTreeMap<String, Visualization<f64>>,
    legend_decimals: u32,
}

struct BuiltEntry {
    color: Option<Visualization<Color>>,
    shape: Option<Visualization<Shape>>,
    size: Option<Visualization<f64>>,
}

impl VisualizationRegistry {
    /// Builds every entry independently. A malformed entry is reported and
    /// skipped; entries without observed values are omitted silently.
    pub fn build(
        entries: &[VisualizationEntry],
        table: &PropertyTable,
        options: &RegistryOptions,
    ) -> (Self, Vec<VisualizationError>) {
        let mut registry = Self {
            legend_decimals: options.legend_decimals,
            ..Self::default()
        };
        let mut errors = Vec::new();
        for entry in entries {
            match build_entry(entry, table, options) {
                Ok(Some(built)) => {
                    if let Some(color) = built.color {
                        registry.colors.insert(entry.label.clone(), color);
                    }
                    if let Some(shape) = built.shape {
                        registry.shapes.insert(entry.label.clone(), shape);
                    }
                    if let Some(size) = built.size {
                        registry.sizes.insert(entry.label.clone(), size);
                    }
                }
                Ok(None) => {
                    log::debug!("visualization '{}' has no observed values", entry.label);
                }
                Err(err) => {
                    log::warn!("{err}");
                    errors.push(err);
                }
            }
        }
        (registry, errors)
    }

    pub fn color(&self, label: &str) -> Option<&Visualization<Color>> {
        self.colors.get(label)
    }

    pub fn color_mut(&mut self, label: &str) -> Option<&mut Visualization<Color>> {
        self.colors.get_mut(label)
    }

    pub fn shape(&self, label: &str) -> Option<&Visualization<Shape>> {
        self.shapes.get(label)
    }

    pub fn size(&self, label: &str) -> Option<&Visualization<f64>> {
        self.sizes.get(label)
    }

    pub fn contains(&self, channel: Channel, label: &str) -> bool {
        match channel {
            Channel::NodeShape => self.shapes.contains_key(label),
            Channel::NodeSize => self.sizes.contains_key(label),
            _ => self.colors.contains_key(label),
        }
    }

    pub fn labels(&self, channel: Channel) -> Vec<&str> {
        match channel {
            Channel::NodeShape => self.shapes.keys().map(String::as_str).collect(),
            Channel::NodeSize => self.sizes.keys().map(String::as_str).collect(),
            _ => self.colors.keys().map(String::as_str).collect(),
        }
    }

    pub fn legend(&self, channel: Channel, label: &str) -> Option<LegendData> {
        let decimals = self.legend_decimals;
        match channel {
            Channel::NodeShape => self.shape(label).map(|v| v.legend(decimals)),
            Channel::NodeSize => self.size(label).map(|v| v.legend(decimals)),
            _ => self.color(label).map(|v| v.legend(decimals)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty() && self.shapes.is_empty() && self.sizes.is_empty()
    }
}

fn build_entry(
    entry: &VisualizationEntry,
    table: &PropertyTable,
    options: &RegistryOptions,
) -> Result<Option<BuiltEntry>, VisualizationError> {
    let selector = resolve_selector(entry)?;
    let values = table.values(&selector);
    if values.is_empty() {
        return Ok(None);
    }
    let ignored = table.ignored(&selector);
    let built = BuiltEntry {
        color: build_color(entry, &selector, &values)?.map(|v| v.ignoring(&ignored)),
        shape: build_shape(entry, &selector, &values, options)?.map(|v| v.ignoring(&ignored)),
        size: build_size(entry, &selector, &values)?.map(|v| v.ignoring(&ignored)),
    };
    Ok(Some(built))
}

fn resolve_selector(entry: &VisualizationEntry) -> Result<Selector, VisualizationError> {
    match (&entry.field, &entry.clade_ref, entry.residue_position) {
        (Some(NodeField::MolecularSequence) | None, None, Some(position)) => {
            Ok(Selector::Residue(position))
        }
        (Some(field), None, None) => Ok(Selector::Field(*field)),
        (None, Some(reference), None) => Ok(Selector::Property(reference.clone())),
        _ => Err(VisualizationError::AmbiguousSelector {
            label: entry.label.clone(),
        }),
    }
}

fn shell<R>(entry: &VisualizationEntry, selector: &Selector, source: ValueSource<R>) -> Visualization<R> {
    Visualization {
        label: entry.label.clone(),
        description: entry.description.clone(),
        selector: selector.clone(),
        source,
        alternate: None,
        ignored: BTreeSet::new(),
    }
}

fn parse_colors(label: &str, raw: &[String]) -> Result<Vec<Color>, VisualizationError> {
    raw.iter()
        .map(|value| {
            value
                .parse::<Color>()
                .map_err(|source| VisualizationError::InvalidColor {
                    label: label.to_string(),
                    source,
                })
        })
        .collect()
}

fn check_arity(label: &str, channel: &'static str, found: usize) -> Result<(), VisualizationError> {
    if (2..=3).contains(&found) {
        Ok(())
    } else {
        Err(VisualizationError::StopArity {
            label: label.to_string(),
            channel,
            found,
        })
    }
}

fn linear_from<R: Interpolate>(
    label: &str,
    values: &[String],
    range: Vec<R>,
) -> Result<Option<LinearScale<R>>, VisualizationError> {
    let Some(stats) = NumericStats::from_values(values.iter().map(String::as_str)) else {
        return Ok(None);
    };
    LinearScale::from_stats(stats, range)
        .map(Some)
        .map_err(|source| VisualizationError::Scale {
            label: label.to_string(),
            source,
        })
}

fn mapping_from<R>(
    entry: &VisualizationEntry,
    table: Vec<(String, R)>,
) -> Result<ValueSource<R>, VisualizationError> {
    let mut entries = Vec::with_capacity(table.len());
    for (key, visual) in table {
        let key = if entry.regex {
            let re = Regex::new(&key).map_err(|source| VisualizationError::InvalidPattern {
                label: entry.label.clone(),
                pattern: key.clone(),
                source,
            })?;
            MappingKey::Pattern(re)
        } else {
            MappingKey::Exact(key)
        };
        entries.push((key, visual));
    }
    Ok(ValueSource::Mapping(entries))
}

fn ordinal_domain(selector: &Selector, values: &[String]) -> Vec<String> {
    match selector {
        Selector::Residue(_) => RESIDUE_ALPHABET.chars().map(String::from).collect(),
        _ => sorted_distinct(values),
    }
}

fn build_color(
    entry: &VisualizationEntry,
    selector: &Selector,
    values: &[String],
) -> Result<Option<Visualization<Color>>, VisualizationError> {
    let label = entry.label.as_str();
    let Some(spec) = &entry.colors else {
        return Ok(None);
    };
    match spec {
        ColorSpec::Stops(stops) => {
            check_arity(label, "colors", stops.len())?;
            let range = parse_colors(label, stops)?;
            Ok(linear_from(label, values, range)?.map(|scale| {
                shell(entry, selector, ValueSource::Scale(ScaleAdapter::Linear(scale)))
            }))
        }
        ColorSpec::Palette(name) => {
            let domain = ordinal_domain(selector, values);
            let range = palette::resolve(name, domain.len()).ok_or_else(|| {
                VisualizationError::UnknownPalette {
                    label: label.to_string(),
                    palette: name.clone(),
                }
            })?;
            let scale = OrdinalScale::new(domain, range);
            let alternate = if scale.is_out_of_range() {
                overflow_alternate(entry, &scale, values)?
            } else {
                None
            };
            let mut vis = shell(entry, selector, ValueSource::Scale(ScaleAdapter::Ordinal(scale)));
            vis.alternate = alternate;
            Ok(Some(vis))
        }
        ColorSpec::Mapping(table) => {
            let mut pairs = Vec::with_capacity(table.len());
            for (key, raw) in table {
                let color = raw
                    .parse::<Color>()
                    .map_err(|source| VisualizationError::InvalidColor {
                        label: label.to_string(),
                        source,
                    })?;
                pairs.push((key.clone(), color));
            }
            Ok(Some(shell(entry, selector, mapping_from(entry, pairs)?)))
        }
    }
}

/// Alternate linear colors for an ordinal domain that outgrew its palette.
/// Usable only when every observed value is numeric; otherwise the palette
/// repeats.
fn overflow_alternate(
    entry: &VisualizationEntry,
    scale: &OrdinalScale<Color>,
    values: &[String],
) -> Result<Option<LinearScale<Color>>, VisualizationError> {
    let label = entry.label.as_str();
    let Some(stops) = &entry.colors_alt else {
        log::warn!(
            "visualization '{label}': {} categories exceed {} colors, colors will repeat",
            scale.domain().len(),
            scale.range().len()
        );
        return Ok(None);
    };
    check_arity(label, "colorsAlt", stops.len())?;
    let range = parse_colors(label, stops)?;
    if values.iter().any(|v| parse_number(v).is_none()) {
        log::warn!(
            "visualization '{label}': alternate colors need numeric values, colors will repeat"
        );
        return Ok(None);
    }
    linear_from(label, values, range)
}

fn build_shape(
    entry: &VisualizationEntry,
    selector: &Selector,
    values: &[String],
    options: &RegistryOptions,
) -> Result<Option<Visualization<Shape>>, VisualizationError> {
    let Some(spec) = &entry.shapes else {
        return Ok(None);
    };
    match spec {
        ShapeSpec::Tokens(tokens) => {
            let tokens = if tokens.is_empty() {
                options.shapes.clone()
            } else {
                tokens.clone()
            };
            if tokens.is_empty() {
                return Ok(None);
            }
            let domain = ordinal_domain(selector, values);
            let scale = OrdinalScale::new(domain, tokens);
            if scale.is_out_of_range() {
                log::warn!(
                    "visualization '{}': {} categories exceed {} shapes, shapes will repeat",
                    entry.label,
                    scale.domain().len(),
                    scale.range().len()
                );
            }
            Ok(Some(shell(
                entry,
                selector,
                ValueSource::Scale(ScaleAdapter::Ordinal(scale)),
            )))
        }
        ShapeSpec::Mapping(table) => {
            let pairs = table.iter().map(|(k, v)| (k.clone(), *v)).collect();
            Ok(Some(shell(entry, selector, mapping_from(entry, pairs)?)))
        }
    }
}

fn build_size(
    entry: &VisualizationEntry,
    selector: &Selector,
    values: &[String],
) -> Result<Option<Visualization<f64>>, VisualizationError> {
    let Some(spec) = &entry.sizes else {
        return Ok(None);
    };
    match spec {
        SizeSpec::Stops(stops) => {
            check_arity(&entry.label, "sizes", stops.len())?;
            Ok(linear_from(&entry.label, values, stops.clone())?.map(|scale| {
                shell(entry, selector, ValueSource::Scale(ScaleAdapter::Linear(scale)))
            }))
        }
        SizeSpec::Mapping(table) => {
            let pairs = table.iter().map(|(k, v)| (k.clone(), *v)).collect();
            Ok(Some(shell(entry, selector, mapping_from(entry, pairs)?)))
        }
    }
}
