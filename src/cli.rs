use crate::config::load_config;
use crate::frame_dump::write_frame_dump;
use crate::ir::{NodeId, Tree};
use crate::layout::LayoutMode;
use crate::parser::{load_tree, parse_tree};
use crate::reconcile::Session;
use crate::search::{SearchOptions, Slot};
use crate::visualization::{Channel, Selector};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "physcene",
    version,
    about = "Lay out an annotated phylogeny and dump one render frame as JSON"
)]
pub struct Args {
    /// Input tree (Newick/NHX or JSON) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the frame JSON. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    #[arg(long = "layout", value_enum)]
    pub layout: Option<LayoutArg>,

    /// Pin leaf labels to the deepest point (phylogram only)
    #[arg(long = "aligned")]
    pub aligned: bool,

    #[arg(short = 'w', long = "width")]
    pub width: Option<f64>,

    #[arg(short = 'H', long = "height")]
    pub height: Option<f64>,

    /// Collapse every internal node at this depth
    #[arg(long = "collapse-depth")]
    pub collapse_depth: Option<usize>,

    /// Collapse subtrees sharing one value of this property
    #[arg(long = "collapse-feature")]
    pub collapse_feature: Option<String>,

    /// Reroot at the midpoint of the longest leaf-to-leaf path
    #[arg(long = "midpoint")]
    pub midpoint: bool,

    #[arg(long = "search-a")]
    pub search_a: Option<String>,

    #[arg(long = "search-b")]
    pub search_b: Option<String>,

    /// Mark nodes with this label as selected (repeatable)
    #[arg(long = "select")]
    pub select: Vec<String>,

    /// Highlight nodes the searches did not find
    #[arg(long = "negate")]
    pub negate: bool,

    #[arg(long = "case-sensitive")]
    pub case_sensitive: bool,

    #[arg(long = "whole-term")]
    pub whole_term: bool,

    #[arg(long = "regex")]
    pub regex: bool,

    /// Node fill color visualization label
    #[arg(long = "fill")]
    pub fill: Option<String>,

    #[arg(long = "label-color")]
    pub label_color: Option<String>,

    #[arg(long = "border")]
    pub border: Option<String>,

    #[arg(long = "shape")]
    pub shape: Option<String>,

    #[arg(long = "size")]
    pub size: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum LayoutArg {
    Phylogram,
    Cladogram,
}

pub fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(width) = args.width {
        config.layout.width = width;
    }
    if let Some(height) = args.height {
        config.layout.height = height;
    }
    let mode_name = match args.layout {
        Some(LayoutArg::Cladogram) => "cladogram",
        Some(LayoutArg::Phylogram) => "phylogram",
        None => config.layout.mode.name(),
    };
    let aligned = args.aligned || config.layout.mode.is_aligned();
    if let Some(mode) = LayoutMode::from_name(mode_name, aligned) {
        config.layout.mode = mode;
    }

    let tree = read_tree(args.input.as_deref())?;
    let mut session = Session::new(tree, config).context("cannot display tree")?;

    if args.midpoint {
        session.midpoint_root()?;
    }
    if let Some(depth) = args.collapse_depth {
        let collapsed = session.collapse_to_depth(depth);
        log::info!("collapsed {collapsed} node(s) at depth {depth}");
    }
    if let Some(reference) = &args.collapse_feature {
        let collapsed = session.collapse_by_feature(&Selector::Property(reference.clone()));
        log::info!("collapsed {collapsed} uniform '{reference}' subtree(s)");
    }

    let options = SearchOptions {
        case_sensitive: args.case_sensitive,
        whole_term: args.whole_term,
        regex: args.regex,
        include_properties: true,
    };
    for (slot, query) in [(Slot::A, &args.search_a), (Slot::B, &args.search_b)] {
        if let Some(query) = query {
            let hits = session.set_search_query(slot, query, options);
            log::info!("search {slot:?}: {hits} hit(s)");
        }
    }
    session.set_negate(args.negate);
    for label in &args.select {
        let ids = find_by_label(session.tree(), label);
        if ids.is_empty() {
            log::warn!("no node labelled '{label}' to select");
        }
        for id in ids {
            session.select(id)?;
        }
    }

    let channels = [
        (Channel::NodeFillColor, &args.fill),
        (Channel::LabelColor, &args.label_color),
        (Channel::NodeBorderColor, &args.border),
        (Channel::NodeShape, &args.shape),
        (Channel::NodeSize, &args.size),
    ];
    for (channel, label) in channels {
        if let Some(label) = label {
            session.set_channel_visualization(channel, Some(label.as_str()))?;
        }
    }

    let frame = session.update(None, 0, false);
    write_frame_dump(args.output.as_deref(), &session, &frame)
}

fn read_tree(path: Option<&Path>) -> Result<Tree> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(load_tree(path)?.tree);
        }
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read tree from stdin")?;
    Ok(parse_tree(&buf)?.tree)
}

/// Node handles by display label, for hosts that address nodes by name.
pub fn find_by_label(tree: &Tree, label: &str) -> Vec<NodeId> {
    tree.preorder_all(tree.root())
        .into_iter()
        .filter(|id| tree.node(*id).data.display_label() == Some(label))
        .collect()
}
