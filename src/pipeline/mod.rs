//! Pipeline core
//!
//! This module provides the SmartBin and the pieces it is assembled from:
//! - `TopologyGuard`: which structural changes are allowed in which state
//! - `FanOutJunction`: one `tee` per media kind between source and consumers
//! - `SinkSlot` / `SinkChain`: attachable preview sinks
//! - `EncodeChain`: the temporary encoding sub-graph used while recording
//! - `SourceBinder`: routing of runtime source pads to junctions

pub mod binder;
pub mod encode;
pub mod error;
pub mod guard;
pub mod junction;
pub mod sink;
pub mod smartbin;
pub mod source;

pub use binder::SourceBinder;
pub use encode::EncodeChain;
pub use error::{PipelineError, PipelineResult};
pub use guard::{Mutation, TopologyGuard};
pub use junction::FanOutJunction;
pub use sink::{SinkChain, SinkSlot, DEFAULT_SINK_PAD};
pub use smartbin::SmartBin;
pub use source::{StreamInfo, StreamLayout};
