//! Pipeline errors
//!
//! One variant per failure class of the topology operations. None of them is
//! fatal: every error leaves the pipeline usable, at worst in need of an
//! explicit `stop_recording()`.

use crate::graph::{GraphError, State};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The guard or slot bookkeeping rejected the mutation. Nothing changed.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// An element or chain could not be instantiated
    #[error("Construction failed: {0}")]
    Construction(String),

    /// A structural connection could not be established
    #[error("Link failed: {0}")]
    Link(String),

    /// The pipeline refused a requested state change
    #[error("Pipeline refused to go to {0}")]
    StateTransition(State),

    #[error("No export settings given and none available from the source")]
    NoSettings,
}

impl PipelineError {
    pub(crate) fn construction(err: GraphError) -> Self {
        PipelineError::Construction(err.to_string())
    }

    pub(crate) fn link(err: GraphError) -> Self {
        PipelineError::Link(err.to_string())
    }
}

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;
