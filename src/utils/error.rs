//! Error types and handling
//!
//! Crate-level error umbrella with stable codes for callers that report
//! failures outside Rust.

use crate::graph::GraphError;
use crate::pipeline::PipelineError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Media graph error: {0}")]
    Graph(#[from] GraphError),
}

impl AppError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Pipeline(e) => match e {
                PipelineError::Precondition(_) => "PRECONDITION",
                PipelineError::Construction(_) => "CONSTRUCTION_FAILED",
                PipelineError::Link(_) => "LINK_FAILED",
                PipelineError::StateTransition(_) => "STATE_TRANSITION_FAILED",
                PipelineError::NoSettings => "NO_SETTINGS",
            },
            AppError::Graph(_) => "GRAPH_ERROR",
        }
    }
}

/// Serializable error report
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
