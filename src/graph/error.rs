//! Media graph errors

use super::types::{ElementId, HandlerId, PadId, State};
use thiserror::Error;

/// Errors reported by a `MediaGraph` implementation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("No element factory named '{0}'")]
    UnknownFactory(String),

    #[error("No sink handles URI '{0}'")]
    UnsupportedUri(String),

    #[error("Unknown element: {0}")]
    NoSuchElement(ElementId),

    #[error("Unknown pad: {0}")]
    NoSuchPad(PadId),

    #[error("Element {element} has no pad template '{template}'")]
    NoSuchTemplate { element: ElementId, template: String },

    #[error("{0} is not a bin")]
    NotABin(ElementId),

    #[error("{child} already has a parent")]
    AlreadyParented { child: ElementId },

    #[error("{child} is not a child of {bin}")]
    NotAChild { bin: ElementId, child: ElementId },

    #[error("{bin} refused to give up {child}")]
    RemovalRefused { bin: ElementId, child: ElementId },

    #[error("Cannot link {src} to {sink}: {reason}")]
    LinkRefused { src: PadId, sink: PadId, reason: String },

    #[error("No compatible pads to link {src} to {sink}")]
    NoCompatiblePads { src: ElementId, sink: ElementId },

    #[error("{src} is not linked to {sink}")]
    NotLinked { src: PadId, sink: PadId },

    #[error("{0} is not a request pad")]
    NotARequestPad(PadId),

    #[error("State change to {0} failed")]
    StateChangeFailed(State),

    #[error("{element} has no property '{key}'")]
    NoSuchProperty { element: ElementId, key: String },

    #[error("No handler {0:?} on {1}")]
    NoSuchHandler(HandlerId, ElementId),

    #[error("Media framework error: {0}")]
    Framework(String),
}

/// Result type alias using GraphError
pub type GraphResult<T> = Result<T, GraphError>;
