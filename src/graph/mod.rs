//! Media framework collaborator
//!
//! This module defines what the pipeline core needs from a media framework:
//! - `MediaGraph` trait: element creation, pads, linking, state, notifications
//! - Value types shared across implementations
//! - `MemoryGraph`: an in-process structural implementation
//! - `GstGraph`: the GStreamer binding (`gstreamer` feature)

pub mod error;
#[cfg(feature = "gstreamer")]
pub mod gst;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{GraphError, GraphResult};
#[cfg(feature = "gstreamer")]
pub use gst::GstGraph;
pub use memory::{FactoryInfo, MemoryGraph, PadTemplate, Presence};
pub use traits::MediaGraph;
pub use types::{
    ElementId, HandlerId, MediaKind, PadDirection, PadEvent, PadEventHandler, PadId, PropertyValue, State,
    StateChange, StateSnapshot,
};
