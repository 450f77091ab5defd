//! Sink chains and sink slots
//!
//! A `SinkChain` is a caller-built sub-graph ending in a real output (a video
//! window, a sound card). A `SinkSlot` holds at most one attached chain per
//! media kind and performs the attach/detach against the kind's junction.

use super::error::{PipelineError, PipelineResult};
use super::junction::FanOutJunction;
use crate::graph::{ElementId, MediaGraph, MediaKind, PadId};

/// Name of the sink-side pad every chain exposes on its bin
pub const DEFAULT_SINK_PAD: &str = "sink";

/// Handle to a downstream sink sub-graph.
///
/// Clones share the same underlying bin; `id()` is the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkChain {
    bin: ElementId,
    real_sink: Option<ElementId>,
}

impl SinkChain {
    /// Wrap an existing bin. `real_sink` is the innermost terminal element,
    /// if the caller wants it reachable for property tweaks.
    pub fn new(bin: ElementId, real_sink: Option<ElementId>) -> Self {
        Self { bin, real_sink }
    }

    /// Build the standard video preview chain: queue → videoconvert → autovideosink
    pub fn video_preview(graph: &dyn MediaGraph, name: &str) -> PipelineResult<Self> {
        Self::preview(graph, name, "videoconvert", "autovideosink")
    }

    /// Build the standard audio preview chain: queue → audioconvert → autoaudiosink
    pub fn audio_preview(graph: &dyn MediaGraph, name: &str) -> PipelineResult<Self> {
        Self::preview(graph, name, "audioconvert", "autoaudiosink")
    }

    fn preview(graph: &dyn MediaGraph, name: &str, converter: &str, output: &str) -> PipelineResult<Self> {
        let bin = graph.make_bin(name).map_err(PipelineError::construction)?;
        let mut elements = Vec::with_capacity(3);
        for (factory, suffix) in [("queue", "queue"), (converter, "conv"), (output, "sink")] {
            let element = graph
                .make_element(factory, &format!("{}-{}", name, suffix))
                .map_err(PipelineError::construction)?;
            graph.add(bin, element).map_err(PipelineError::construction)?;
            elements.push(element);
        }
        for pair in elements.windows(2) {
            graph.link(pair[0], pair[1]).map_err(PipelineError::link)?;
        }

        let entry = graph
            .static_pad(elements[0], "sink")
            .ok_or_else(|| PipelineError::Construction(format!("{} queue has no sink pad", name)))?;
        graph
            .add_ghost_pad(bin, DEFAULT_SINK_PAD, entry)
            .map_err(PipelineError::construction)?;

        Ok(Self::new(bin, Some(elements[2])))
    }

    /// The chain's bin, which is also its identity
    pub fn id(&self) -> ElementId {
        self.bin
    }

    /// Innermost terminal sink element, if the chain exposes one
    pub fn real_sink(&self) -> Option<ElementId> {
        self.real_sink
    }

    pub fn sink_pad(&self, graph: &dyn MediaGraph) -> Option<PadId> {
        graph.static_pad(self.bin, DEFAULT_SINK_PAD)
    }
}

/// Holder of the attached sink chain for one media kind
#[derive(Debug)]
pub struct SinkSlot {
    kind: MediaKind,
    chain: Option<SinkChain>,
    /// Junction output feeding the chain
    output: Option<PadId>,
}

impl SinkSlot {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            chain: None,
            output: None,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn chain(&self) -> Option<&SinkChain> {
        self.chain.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.chain.is_some()
    }

    /// Add `chain` to `pipeline` and feed it from `junction`.
    ///
    /// Either fully succeeds or leaves pipeline and slot untouched.
    pub fn attach(
        &mut self,
        graph: &dyn MediaGraph,
        pipeline: ElementId,
        junction: &FanOutJunction,
        chain: SinkChain,
    ) -> PipelineResult<()> {
        if let Some(existing) = &self.chain {
            return Err(PipelineError::Precondition(format!(
                "{} slot already holds {}",
                self.kind,
                existing.id()
            )));
        }
        let sink_pad = chain.sink_pad(graph).ok_or_else(|| {
            PipelineError::Link(format!("{} has no '{}' pad", chain.id(), DEFAULT_SINK_PAD))
        })?;

        graph
            .add(pipeline, chain.id())
            .map_err(PipelineError::construction)?;

        match junction.link_output(graph, sink_pad) {
            Ok(output) => {
                tracing::debug!("Attached {} sink {} through {}", self.kind, chain.id(), output);
                self.output = Some(output);
                self.chain = Some(chain);
                Ok(())
            }
            Err(e) => {
                if let Err(remove) = graph.remove(pipeline, chain.id()) {
                    tracing::warn!("Failed to take back {}: {}", chain.id(), remove);
                }
                Err(e)
            }
        }
    }

    /// Unlink the attached chain, remove it from `pipeline` and hand it back.
    ///
    /// If the pipeline refuses to give the chain up, the link is restored and
    /// the slot still holds the chain.
    pub fn detach(
        &mut self,
        graph: &dyn MediaGraph,
        pipeline: ElementId,
        junction: &FanOutJunction,
    ) -> PipelineResult<SinkChain> {
        let chain = self
            .chain
            .as_ref()
            .ok_or_else(|| PipelineError::Precondition(format!("no {} sink attached", self.kind)))?;

        let link = chain
            .sink_pad(graph)
            .and_then(|sink_pad| graph.peer(sink_pad).map(|peer| (peer, sink_pad)));
        if let Some((peer, sink_pad)) = link {
            graph.unlink_pads(peer, sink_pad).map_err(PipelineError::link)?;
        }

        if let Err(e) = graph.remove(pipeline, chain.id()) {
            if let Some((peer, sink_pad)) = link {
                if let Err(relink) = graph.link_pads(peer, sink_pad) {
                    tracing::warn!("Failed to relink {} to {}: {}", peer, sink_pad, relink);
                }
            }
            return Err(PipelineError::link(e));
        }

        if let Some(output) = self.output.take() {
            junction.release_output(graph, output);
        }

        tracing::debug!("Detached {} sink {}", self.kind, chain.id());
        self.chain
            .take()
            .ok_or_else(|| PipelineError::Precondition(format!("no {} sink attached", self.kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{MemoryGraph, PropertyValue};

    fn setup(kind: MediaKind) -> (MemoryGraph, ElementId, FanOutJunction) {
        let graph = MemoryGraph::new();
        let pipeline = graph.make_pipeline("p").unwrap();
        let junction = FanOutJunction::new(&graph, pipeline, kind).unwrap();
        (graph, pipeline, junction)
    }

    #[test]
    fn test_video_preview_exposes_real_sink() {
        let graph = MemoryGraph::new();
        let chain = SinkChain::video_preview(&graph, "vsinkthread").unwrap();

        let real = chain.real_sink().unwrap();
        assert_eq!(graph.element_factory(real).as_deref(), Some("autovideosink"));
        assert_eq!(graph.property(real, "sync"), Some(PropertyValue::Bool(true)));
        assert!(chain.sink_pad(&graph).is_some());
    }

    #[test]
    fn test_attach_then_detach_round_trip() {
        let (graph, pipeline, junction) = setup(MediaKind::Audio);
        let mut slot = SinkSlot::new(MediaKind::Audio);
        let chain = SinkChain::audio_preview(&graph, "asinkthread").unwrap();

        slot.attach(&graph, pipeline, &junction, chain.clone()).unwrap();
        assert!(slot.is_attached());
        assert_eq!(graph.parent(chain.id()), Some(pipeline));
        assert!(graph.is_linked(chain.sink_pad(&graph).unwrap()));

        let back = slot.detach(&graph, pipeline, &junction).unwrap();
        assert_eq!(back, chain);
        assert!(!slot.is_attached());
        assert_eq!(graph.parent(chain.id()), None);
        assert!(!graph.is_linked(chain.sink_pad(&graph).unwrap()));
        assert_eq!(graph.pads(junction.element()).len(), 1);
    }

    #[test]
    fn test_second_attach_is_rejected() {
        let (graph, pipeline, junction) = setup(MediaKind::Video);
        let mut slot = SinkSlot::new(MediaKind::Video);
        let first = SinkChain::video_preview(&graph, "first").unwrap();
        let second = SinkChain::video_preview(&graph, "second").unwrap();

        slot.attach(&graph, pipeline, &junction, first.clone()).unwrap();
        assert!(matches!(
            slot.attach(&graph, pipeline, &junction, second.clone()),
            Err(PipelineError::Precondition(_))
        ));
        assert_eq!(slot.chain(), Some(&first));
        assert_eq!(graph.parent(second.id()), None);
    }

    #[test]
    fn test_failed_link_is_not_a_partial_attach() {
        let (graph, pipeline, junction) = setup(MediaKind::Video);
        let mut slot = SinkSlot::new(MediaKind::Video);
        let chain = SinkChain::video_preview(&graph, "vsink").unwrap();
        graph.refuse_links_into(chain.id(), true);

        assert!(matches!(
            slot.attach(&graph, pipeline, &junction, chain.clone()),
            Err(PipelineError::Link(_))
        ));
        assert!(!slot.is_attached());
        assert_eq!(graph.parent(chain.id()), None);
        assert_eq!(graph.pads(junction.element()).len(), 1);
    }

    #[test]
    fn test_refused_removal_keeps_chain_attached() {
        let (graph, pipeline, junction) = setup(MediaKind::Audio);
        let mut slot = SinkSlot::new(MediaKind::Audio);
        let chain = SinkChain::audio_preview(&graph, "asinkthread").unwrap();
        slot.attach(&graph, pipeline, &junction, chain.clone()).unwrap();
        graph.lock_in_parent(chain.id(), true);

        assert!(matches!(
            slot.detach(&graph, pipeline, &junction),
            Err(PipelineError::Link(_))
        ));
        assert_eq!(slot.chain(), Some(&chain));
        assert_eq!(graph.parent(chain.id()), Some(pipeline));
        assert!(graph.is_linked(chain.sink_pad(&graph).unwrap()));
        assert_eq!(graph.pads(junction.element()).len(), 2);

        graph.lock_in_parent(chain.id(), false);
        assert_eq!(slot.detach(&graph, pipeline, &junction).unwrap(), chain);
        assert_eq!(graph.pads(junction.element()).len(), 1);
    }

    #[test]
    fn test_attach_of_parented_chain_is_a_construction_error() {
        let (graph, pipeline, junction) = setup(MediaKind::Video);
        let mut slot = SinkSlot::new(MediaKind::Video);
        let chain = SinkChain::video_preview(&graph, "vsink").unwrap();
        let elsewhere = graph.make_bin("elsewhere").unwrap();
        graph.add(elsewhere, chain.id()).unwrap();

        assert!(matches!(
            slot.attach(&graph, pipeline, &junction, chain.clone()),
            Err(PipelineError::Construction(_))
        ));
        assert!(!slot.is_attached());
        assert_eq!(graph.parent(chain.id()), Some(elsewhere));
    }

    #[test]
    fn test_detach_empty_slot_fails() {
        let (graph, pipeline, junction) = setup(MediaKind::Audio);
        let mut slot = SinkSlot::new(MediaKind::Audio);
        assert!(matches!(
            slot.detach(&graph, pipeline, &junction),
            Err(PipelineError::Precondition(_))
        ));
    }
}
