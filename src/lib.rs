pub mod aggregate;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod frame_dump;
pub mod ir;
pub mod layout;
pub mod overrides;
pub mod parser;
pub mod reconcile;
pub mod scale;
pub mod search;
pub mod text_metrics;
pub mod theme;
pub mod tree_ops;
pub mod visualization;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig};
pub use error::{EngineError, EngineResult};
pub use ir::{NodeId, Tree};
pub use reconcile::{Frame, RenderNode, Session};
