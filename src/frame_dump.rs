use crate::ir::NodeId;
use crate::layout::LayoutMode;
use crate::reconcile::{Frame, Session};
use crate::tree_ops::TreeStats;
use crate::visualization::{Channel, LegendData};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// One render pass plus the session context a host needs to draw it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDump<'a> {
    pub layout: String,
    pub aligned: bool,
    pub display_root: NodeId,
    pub stats: StatsDump,
    pub legends: Vec<LegendDump>,
    pub frame: &'a Frame,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDump {
    pub node_count: usize,
    pub external_count: usize,
    pub max_depth: usize,
    pub min_branch_length: Option<f64>,
    pub mean_branch_length: Option<f64>,
    pub max_branch_length: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendDump {
    pub channel: Channel,
    pub title: String,
    #[serde(flatten)]
    pub legend: LegendData,
}

impl From<TreeStats> for StatsDump {
    fn from(stats: TreeStats) -> Self {
        Self {
            node_count: stats.node_count,
            external_count: stats.external_count,
            max_depth: stats.max_depth,
            min_branch_length: stats.min_branch_length,
            mean_branch_length: stats.mean_branch_length,
            max_branch_length: stats.max_branch_length,
        }
    }
}

impl<'a> FrameDump<'a> {
    pub fn new(session: &Session, frame: &'a Frame) -> Self {
        let mode: LayoutMode = session.layout_mode();
        let legends = Channel::ALL
            .into_iter()
            .filter_map(|channel| {
                session.legend(channel).map(|legend| LegendDump {
                    channel,
                    title: legend.title(),
                    legend,
                })
            })
            .collect();
        FrameDump {
            layout: mode.name().to_string(),
            aligned: mode.is_aligned(),
            display_root: session.display_root(),
            stats: session.stats().into(),
            legends,
            frame,
        }
    }
}

/// Writes the dump as pretty JSON to `path`, or stdout when `None`.
pub fn write_frame_dump(path: Option<&Path>, session: &Session, frame: &Frame) -> anyhow::Result<()> {
    let dump = FrameDump::new(session, frame);
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let mut out = io::stdout().lock();
            serde_json::to_writer_pretty(&mut out, &dump)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
