//! SmartBin - reusable media pipelines for a non-linear video editor.
//!
//! A `SmartBin` wraps one source (a media file, a project timeline or a
//! test pattern) in a pipeline with stable per-kind fan-out points. Preview
//! sinks can be attached and removed, and the output can be recorded to a
//! URI while previewing.

pub mod graph;
pub mod pipeline;
pub mod project;
pub mod utils;

pub use graph::{MediaGraph, MemoryGraph};
#[cfg(feature = "gstreamer")]
pub use graph::GstGraph;
pub use pipeline::{PipelineError, PipelineResult, SinkChain, SmartBin};
pub use project::{ExportSettings, Project};
pub use utils::{AppError, AppResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default log subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this more than once is
/// harmless.
pub fn init_logging() {
    let installed = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smartbin=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if installed.is_ok() {
        tracing::info!("SmartBin v{}", env!("CARGO_PKG_VERSION"));
    }
}
