//! Media framework trait definitions
//!
//! The pipeline core never creates, links or schedules media elements on its
//! own. It orchestrates calls through `MediaGraph`, which a framework binding
//! implements.

use super::error::GraphResult;
use super::types::{
    ElementId, HandlerId, PadEventHandler, PadId, PropertyValue, State, StateChange, StateSnapshot,
};

/// Element creation, linking and state control provided by a media framework
pub trait MediaGraph: Send + Sync {
    // ── Element creation ────────────────────────────────────────────────────

    /// Instantiate an element from a named factory
    fn make_element(&self, factory: &str, name: &str) -> GraphResult<ElementId>;

    /// Create an empty bin
    fn make_bin(&self, name: &str) -> GraphResult<ElementId>;

    /// Create a top-level pipeline (a bin that owns a clock and a state)
    fn make_pipeline(&self, name: &str) -> GraphResult<ElementId>;

    /// Create a sink element able to write to `uri`
    fn make_element_for_uri(&self, uri: &str, name: &str) -> GraphResult<ElementId>;

    /// Name given to the element at creation
    fn element_name(&self, element: ElementId) -> Option<String>;

    /// Factory the element was created from (`"bin"` / `"pipeline"` for containers)
    fn element_factory(&self, element: ElementId) -> Option<String>;

    // ── Hierarchy ───────────────────────────────────────────────────────────

    /// Add `child` to `bin`. The child must not already have a parent.
    fn add(&self, bin: ElementId, child: ElementId) -> GraphResult<()>;

    /// Remove `child` from `bin`. Links crossing the bin boundary are broken.
    fn remove(&self, bin: ElementId, child: ElementId) -> GraphResult<()>;

    fn parent(&self, element: ElementId) -> Option<ElementId>;

    /// Children of a bin, in insertion order
    fn children(&self, bin: ElementId) -> Vec<ElementId>;

    /// Free an unparented element and everything it contains
    fn dispose(&self, element: ElementId) -> GraphResult<()>;

    // ── Properties ──────────────────────────────────────────────────────────

    fn set_property(&self, element: ElementId, key: &str, value: PropertyValue) -> GraphResult<()>;

    fn property(&self, element: ElementId, key: &str) -> Option<PropertyValue>;

    // ── Pads ────────────────────────────────────────────────────────────────

    /// Always-present pad by name
    fn static_pad(&self, element: ElementId, name: &str) -> Option<PadId>;

    /// Allocate a new pad from a request template such as `src_%u`
    fn request_pad(&self, element: ElementId, template: &str) -> GraphResult<PadId>;

    fn release_request_pad(&self, pad: PadId) -> GraphResult<()>;

    /// Expose `target` (a pad of a child) on the bin boundary as `name`
    fn add_ghost_pad(&self, bin: ElementId, name: &str, target: PadId) -> GraphResult<PadId>;

    fn pad_name(&self, pad: PadId) -> Option<String>;

    /// Negotiated media type of the pad, if any (`"audio/x-raw-int"`, ...)
    fn pad_caps(&self, pad: PadId) -> Option<String>;

    fn pad_parent(&self, pad: PadId) -> Option<ElementId>;

    fn peer(&self, pad: PadId) -> Option<PadId>;

    // ── Linking ─────────────────────────────────────────────────────────────

    fn link_pads(&self, src: PadId, sink: PadId) -> GraphResult<()>;

    fn unlink_pads(&self, src: PadId, sink: PadId) -> GraphResult<()>;

    /// Link two elements using their first free (or newly requested) pads
    fn link(&self, src: ElementId, sink: ElementId) -> GraphResult<()>;

    // ── State ───────────────────────────────────────────────────────────────

    /// Current and pending state, without waiting for pending transitions
    fn state(&self, element: ElementId) -> StateSnapshot;

    fn set_state(&self, element: ElementId, state: State) -> StateChange;

    // ── Notifications ───────────────────────────────────────────────────────

    /// Receive pad-added / pad-removed notifications from `element`
    fn connect_pad_events(&self, element: ElementId, handler: PadEventHandler) -> GraphResult<HandlerId>;

    /// Drop a handler registered with `connect_pad_events`
    fn disconnect_pad_events(&self, element: ElementId, handler: HandlerId) -> GraphResult<()>;
}
