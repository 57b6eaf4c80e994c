use crate::ir::NodeId;
use crate::visualization::{Channel, VisualizationError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("tree has no nodes to display")]
    EmptyTree,
    #[error("node {0} is not part of the displayed tree")]
    UnknownNode(NodeId),
    #[error("no {channel} visualization named '{label}'")]
    UnknownVisualization { channel: Channel, label: String },
    #[error("{0} is not a color channel")]
    NotAColorChannel(Channel),
    #[error("visualization '{label}' has no category or stop '{target}'")]
    UnknownOverrideTarget { label: String, target: String },
    #[error(transparent)]
    Visualization(#[from] VisualizationError),
}

pub type EngineResult<T> = Result<T, EngineError>;
