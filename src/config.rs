use crate::layout::LayoutMode;
use crate::theme::{Color, Theme};
use crate::visualization::{IgnoreList, RegistryOptions, Shape, VisualizationEntry};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub mode: LayoutMode,
    /// Display area in pixels.
    pub width: f64,
    pub height: f64,
    pub font_size: f64,
    pub root_offset: f64,
    pub label_gap: f64,
    /// Aligned labels get a connector only when further than this from
    /// their node.
    pub connector_threshold: f64,
    pub dynahide: bool,
    pub dynahide_fraction: f64,
    pub collapsed_label_length: usize,
    pub node_size: f64,
    pub max_node_size: f64,
    /// Skip font lookup and use the per-character width table.
    pub fast_text_metrics: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            mode: LayoutMode::default(),
            width: 800.0,
            height: 600.0,
            font_size: 9.0,
            root_offset: 10.0,
            label_gap: 10.0,
            connector_threshold: 2.0,
            dynahide: true,
            dynahide_fraction: 1.0,
            collapsed_label_length: 7,
            node_size: 3.0,
            max_node_size: 40.0,
            fast_text_metrics: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub visualizations: Vec<VisualizationEntry>,
    /// Shape tokens for entries that do not list their own.
    pub shapes: Vec<Shape>,
    pub ignore: IgnoreList,
    pub legend_decimals: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::classic(),
            layout: LayoutConfig::default(),
            visualizations: Vec::new(),
            shapes: Shape::ALL.to_vec(),
            ignore: IgnoreList::new(),
            legend_decimals: 2,
        }
    }
}

impl Config {
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            shapes: self.shapes.clone(),
            legend_decimals: self.legend_decimals,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    background: Option<Color>,
    branch_color: Option<Color>,
    label_color: Option<Color>,
    node_fill: Option<Color>,
    node_border: Option<Color>,
    connector_color: Option<Color>,
    found_a: Option<Color>,
    found_b: Option<Color>,
    found_both: Option<Color>,
    selection: Option<Color>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    layout: Option<String>,
    aligned: Option<bool>,
    width: Option<f64>,
    height: Option<f64>,
    font_size: Option<f64>,
    root_offset: Option<f64>,
    label_gap: Option<f64>,
    connector_threshold: Option<f64>,
    dynahide: Option<bool>,
    dynahide_fraction: Option<f64>,
    collapsed_label_length: Option<usize>,
    node_size: Option<f64>,
    max_node_size: Option<f64>,
    fast_text_metrics: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfigFile>,
    visualizations: Option<Vec<VisualizationEntry>>,
    shapes: Option<Vec<Shape>>,
    ignore: Option<IgnoreList>,
    legend_decimals: Option<u32>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("parsing config {}", path.display()))
}

/// Parses JSON or JSON5 text and layers it over the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = json5::from_str(contents)?;
    let mut config = Config::default();

    match parsed.theme.as_deref() {
        Some("dark") => config.theme = Theme::dark(),
        Some("classic") | Some("default") | None => {}
        Some(other) => log::warn!("unknown theme '{other}', using classic"),
    }
    if let Some(vars) = parsed.theme_variables {
        apply_theme_variables(&mut config.theme, vars);
    }
    if let Some(layout) = parsed.layout {
        apply_layout(&mut config.layout, layout)?;
    }
    if let Some(entries) = parsed.visualizations {
        config.visualizations = entries;
    }
    if let Some(shapes) = parsed.shapes {
        config.shapes = shapes;
    }
    if let Some(ignore) = parsed.ignore {
        config.ignore = ignore;
    }
    if let Some(decimals) = parsed.legend_decimals {
        config.legend_decimals = decimals;
    }
    Ok(config)
}

fn apply_theme_variables(theme: &mut Theme, vars: ThemeVariables) {
    if let Some(v) = vars.font_family {
        theme.font_family = v;
    }
    let colors = [
        (vars.background, &mut theme.background),
        (vars.branch_color, &mut theme.branch_color),
        (vars.label_color, &mut theme.label_color),
        (vars.node_fill, &mut theme.node_fill),
        (vars.node_border, &mut theme.node_border),
        (vars.connector_color, &mut theme.connector_color),
        (vars.found_a, &mut theme.found_a),
        (vars.found_b, &mut theme.found_b),
        (vars.found_both, &mut theme.found_both),
        (vars.selection, &mut theme.selection),
    ];
    for (value, slot) in colors {
        if let Some(color) = value {
            *slot = color;
        }
    }
}

fn apply_layout(layout: &mut LayoutConfig, file: LayoutConfigFile) -> anyhow::Result<()> {
    if file.layout.is_some() || file.aligned.is_some() {
        let name = file.layout.as_deref().unwrap_or(layout.mode.name());
        let aligned = file.aligned.unwrap_or(layout.mode.is_aligned());
        layout.mode = LayoutMode::from_name(name, aligned)
            .with_context(|| format!("unknown layout '{name}'"))?;
    }
    if let Some(v) = file.width {
        layout.width = v;
    }
    if let Some(v) = file.height {
        layout.height = v;
    }
    if let Some(v) = file.font_size {
        layout.font_size = v;
    }
    if let Some(v) = file.root_offset {
        layout.root_offset = v;
    }
    if let Some(v) = file.label_gap {
        layout.label_gap = v;
    }
    if let Some(v) = file.connector_threshold {
        layout.connector_threshold = v;
    }
    if let Some(v) = file.dynahide {
        layout.dynahide = v;
    }
    if let Some(v) = file.dynahide_fraction {
        layout.dynahide_fraction = v;
    }
    if let Some(v) = file.collapsed_label_length {
        layout.collapsed_label_length = v;
    }
    if let Some(v) = file.node_size {
        layout.node_size = v;
    }
    if let Some(v) = file.max_node_size {
        layout.max_node_size = v;
    }
    if let Some(v) = file.fast_text_metrics {
        layout.fast_text_metrics = v;
    }
    Ok(())
}
