//! Fan-out junctions
//!
//! One `tee` per media kind sits between the source and every consumer, so
//! sources never learn about preview or encode branches and consumers can
//! come and go while the source stays linked.

use super::error::{PipelineError, PipelineResult};
use crate::graph::{ElementId, MediaGraph, MediaKind, PadId};

const SRC_TEMPLATE: &str = "src_%u";

/// Single-input, multi-output junction for one media kind
#[derive(Debug)]
pub struct FanOutJunction {
    kind: MediaKind,
    element: ElementId,
    sink_pad: PadId,
}

impl FanOutJunction {
    /// Create the junction (`atee` / `vtee`) and add it to `pipeline`
    pub fn new(graph: &dyn MediaGraph, pipeline: ElementId, kind: MediaKind) -> PipelineResult<Self> {
        let name = format!("{}tee", kind.prefix());
        let element = graph
            .make_element("tee", &name)
            .map_err(PipelineError::construction)?;
        graph.add(pipeline, element).map_err(PipelineError::construction)?;

        let sink_pad = graph
            .static_pad(element, "sink")
            .ok_or_else(|| PipelineError::Construction(format!("{} has no sink pad", name)))?;

        tracing::debug!("Created {} junction {}", kind, element);
        Ok(Self {
            kind,
            element,
            sink_pad,
        })
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    /// Pad the source links into
    pub fn sink_pad(&self) -> PadId {
        self.sink_pad
    }

    /// Allocate a new output and link it to `target`.
    ///
    /// On failure the output is released again, so the junction is unchanged.
    pub fn link_output(&self, graph: &dyn MediaGraph, target: PadId) -> PipelineResult<PadId> {
        let pad = graph
            .request_pad(self.element, SRC_TEMPLATE)
            .map_err(PipelineError::link)?;

        if let Err(e) = graph.link_pads(pad, target) {
            if let Err(release) = graph.release_request_pad(pad) {
                tracing::warn!("Failed to release {} on {}: {}", pad, self.element, release);
            }
            return Err(PipelineError::link(e));
        }
        Ok(pad)
    }

    /// Unlink and release an output previously returned by `link_output`
    pub fn release_output(&self, graph: &dyn MediaGraph, pad: PadId) {
        if let Some(peer) = graph.peer(pad) {
            if let Err(e) = graph.unlink_pads(pad, peer) {
                tracing::warn!("Failed to unlink {} from {}: {}", pad, peer, e);
            }
        }
        if let Err(e) = graph.release_request_pad(pad) {
            tracing::warn!("Failed to release {} on {}: {}", pad, self.element, e);
        }
    }

    /// Link a source pad into the junction input
    pub fn connect_source(&self, graph: &dyn MediaGraph, src: PadId) -> PipelineResult<()> {
        graph.link_pads(src, self.sink_pad).map_err(PipelineError::link)
    }

    /// Undo `connect_source`; a source that is not linked here is ignored
    pub fn disconnect_source(&self, graph: &dyn MediaGraph, src: PadId) {
        if graph.peer(src) == Some(self.sink_pad) {
            if let Err(e) = graph.unlink_pads(src, self.sink_pad) {
                tracing::warn!("Failed to unlink {} from {} junction: {}", src, self.kind, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;

    fn sink_in(graph: &MemoryGraph, pipeline: ElementId, name: &str) -> PadId {
        let sink = graph.make_element("fakesink", name).unwrap();
        graph.add(pipeline, sink).unwrap();
        graph.static_pad(sink, "sink").unwrap()
    }

    #[test]
    fn test_junction_fans_out_to_independent_consumers() {
        let graph = MemoryGraph::new();
        let pipeline = graph.make_pipeline("p").unwrap();
        let junction = FanOutJunction::new(&graph, pipeline, MediaKind::Video).unwrap();

        assert_eq!(graph.element_name(junction.element()).as_deref(), Some("vtee"));

        let first = junction.link_output(&graph, sink_in(&graph, pipeline, "a")).unwrap();
        let second = junction.link_output(&graph, sink_in(&graph, pipeline, "b")).unwrap();
        assert_ne!(first, second);
        assert!(graph.is_linked(first));
        assert!(graph.is_linked(second));

        junction.release_output(&graph, first);
        assert!(graph.is_linked(second));
        assert_eq!(graph.pads(junction.element()).len(), 2);
    }

    #[test]
    fn test_failed_output_link_leaves_no_pad() {
        let graph = MemoryGraph::new();
        let pipeline = graph.make_pipeline("p").unwrap();
        let junction = FanOutJunction::new(&graph, pipeline, MediaKind::Audio).unwrap();
        let orphan = graph.make_element("fakesink", "orphan").unwrap();
        let target = graph.static_pad(orphan, "sink").unwrap();

        assert!(matches!(
            junction.link_output(&graph, target),
            Err(PipelineError::Link(_))
        ));
        assert_eq!(graph.pads(junction.element()).len(), 1);
    }

    #[test]
    fn test_source_connect_and_disconnect() {
        let graph = MemoryGraph::new();
        let pipeline = graph.make_pipeline("p").unwrap();
        let junction = FanOutJunction::new(&graph, pipeline, MediaKind::Audio).unwrap();
        let src = graph.make_element("audiotestsrc", "src").unwrap();
        graph.add(pipeline, src).unwrap();
        let pad = graph.static_pad(src, "src").unwrap();

        junction.connect_source(&graph, pad).unwrap();
        assert_eq!(graph.peer(junction.sink_pad()), Some(pad));

        junction.disconnect_source(&graph, pad);
        assert_eq!(graph.peer(junction.sink_pad()), None);
    }
}
