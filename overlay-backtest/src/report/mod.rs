//! Output tables and the read-only strategy viewer.

pub mod viewer;
pub mod writer;

pub use viewer::{render, DateDetail, DateView, StrategyViewer, ViewerError};
pub use writer::{
    decomposition_frame, levels_frame, write_decomposition, write_levels, ReportError,
};
