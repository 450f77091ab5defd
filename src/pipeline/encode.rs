//! Encode chain assembly
//!
//! The encode chain is a temporary bin built for one `record()` call:
//!
//! ```text
//! asink ─ ainq → aconv → aenc → aoutq ─┐
//!                                      ├→ mux → fsink (destination URI)
//! vsink ─ vinq → csp   → venc → voutq ─┘
//! ```
//!
//! `vsink` / `asink` are ghost pads on the bin boundary that the fan-out
//! junctions link into. Branches exist only for the kinds the pipeline has.

use super::error::{PipelineError, PipelineResult};
use super::junction::FanOutJunction;
use super::source::StreamLayout;
use crate::graph::{ElementId, MediaGraph, MediaKind, PadId, PropertyValue};
use crate::project::ExportSettings;
use std::collections::BTreeMap;

/// One input branch of the chain
#[derive(Debug, Clone, Copy)]
struct Branch {
    /// Ghost pad on the chain boundary
    entry: PadId,
    /// Junction output currently feeding `entry`
    feed: Option<PadId>,
}

/// Assembled encoding sub-graph
#[derive(Debug)]
pub struct EncodeChain {
    bin: ElementId,
    muxer: ElementId,
    audio: Option<Branch>,
    video: Option<Branch>,
}

impl EncodeChain {
    /// Build a chain writing to `uri` with the encoders named in `settings`.
    ///
    /// The chain is not added to any pipeline. On failure everything created
    /// so far is disposed of.
    pub fn assemble(
        graph: &dyn MediaGraph,
        uri: &str,
        settings: &ExportSettings,
        layout: StreamLayout,
    ) -> PipelineResult<Self> {
        let bin = graph
            .make_bin("encthread")
            .map_err(PipelineError::construction)?;

        match Self::populate(graph, bin, uri, settings, layout) {
            Ok(chain) => {
                tracing::info!(
                    "Encode chain ready: {} + {} in {} → {}",
                    settings.vencoder,
                    settings.aencoder,
                    settings.muxer,
                    uri
                );
                Ok(chain)
            }
            Err(e) => {
                tracing::warn!("Encode chain construction failed: {}", e);
                if let Err(dispose) = graph.dispose(bin) {
                    tracing::warn!("Failed to dispose partial encode chain: {}", dispose);
                }
                Err(e)
            }
        }
    }

    fn populate(
        graph: &dyn MediaGraph,
        bin: ElementId,
        uri: &str,
        settings: &ExportSettings,
        layout: StreamLayout,
    ) -> PipelineResult<Self> {
        let muxer = make_configured(graph, bin, &settings.muxer, "mux", &settings.containersettings)?;

        let file_sink = graph
            .make_element_for_uri(uri, "fsink")
            .map_err(PipelineError::construction)?;
        graph.add(bin, file_sink).map_err(PipelineError::construction)?;
        graph.link(muxer, file_sink).map_err(PipelineError::link)?;

        let audio = if layout.has_audio {
            Some(build_branch(
                graph,
                bin,
                muxer,
                MediaKind::Audio,
                ("audioconvert", "aconv"),
                &settings.aencoder,
                &settings.acodecsettings,
            )?)
        } else {
            None
        };

        let video = if layout.has_video {
            Some(build_branch(
                graph,
                bin,
                muxer,
                MediaKind::Video,
                ("videoconvert", "csp"),
                &settings.vencoder,
                &settings.vcodecsettings,
            )?)
        } else {
            None
        };

        Ok(Self {
            bin,
            muxer,
            audio,
            video,
        })
    }

    pub fn bin(&self) -> ElementId {
        self.bin
    }

    pub fn muxer(&self) -> ElementId {
        self.muxer
    }

    /// Inbound pad for `kind` (`vsink` / `asink`), if the chain has that branch
    pub fn entry(&self, kind: MediaKind) -> Option<PadId> {
        self.branch(kind).map(|b| b.entry)
    }

    fn branch(&self, kind: MediaKind) -> Option<&Branch> {
        match kind {
            MediaKind::Audio => self.audio.as_ref(),
            MediaKind::Video => self.video.as_ref(),
        }
    }

    fn branch_mut(&mut self, kind: MediaKind) -> Option<&mut Branch> {
        match kind {
            MediaKind::Audio => self.audio.as_mut(),
            MediaKind::Video => self.video.as_mut(),
        }
    }

    /// Link a new output of `junction` into the matching branch
    pub fn connect(&mut self, graph: &dyn MediaGraph, junction: &FanOutJunction) -> PipelineResult<()> {
        let kind = junction.kind();
        let branch = self
            .branch_mut(kind)
            .ok_or_else(|| PipelineError::Link(format!("encode chain has no {} branch", kind)))?;
        if branch.feed.is_some() {
            return Err(PipelineError::Precondition(format!("{} branch already fed", kind)));
        }

        let feed = junction.link_output(graph, branch.entry)?;
        tracing::debug!("Linked {} junction into encode chain through {}", kind, feed);
        branch.feed = Some(feed);
        Ok(())
    }

    /// Unlink the `kind` branch from its peer and release the junction output.
    /// An unlinked branch is a no-op.
    pub fn disconnect(&mut self, graph: &dyn MediaGraph, junction: Option<&FanOutJunction>, kind: MediaKind) {
        let Some(branch) = self.branch_mut(kind) else {
            return;
        };

        if let Some(peer) = graph.peer(branch.entry) {
            if let Err(e) = graph.unlink_pads(peer, branch.entry) {
                tracing::warn!("Failed to unlink {} branch: {}", kind, e);
            }
        }
        if let (Some(feed), Some(junction)) = (branch.feed.take(), junction) {
            junction.release_output(graph, feed);
        }
    }
}

/// Create `factory` as `name` inside `bin` with `properties` applied verbatim
fn make_configured(
    graph: &dyn MediaGraph,
    bin: ElementId,
    factory: &str,
    name: &str,
    properties: &BTreeMap<String, PropertyValue>,
) -> PipelineResult<ElementId> {
    let element = graph
        .make_element(factory, name)
        .map_err(PipelineError::construction)?;
    graph.add(bin, element).map_err(PipelineError::construction)?;

    for (key, value) in properties {
        graph
            .set_property(element, key, value.clone())
            .map_err(PipelineError::construction)?;
    }
    Ok(element)
}

/// inq → converter → encoder → outq → muxer, exposed as a `<k>sink` ghost pad
fn build_branch(
    graph: &dyn MediaGraph,
    bin: ElementId,
    muxer: ElementId,
    kind: MediaKind,
    converter: (&str, &str),
    encoder: &str,
    encoder_settings: &BTreeMap<String, PropertyValue>,
) -> PipelineResult<Branch> {
    let p = kind.prefix();
    let none = BTreeMap::new();

    let inq = make_configured(graph, bin, "queue", &format!("{}inq", p), &none)?;
    let conv = make_configured(graph, bin, converter.0, converter.1, &none)?;
    let enc = make_configured(graph, bin, encoder, &format!("{}enc", p), encoder_settings)?;
    let outq = make_configured(graph, bin, "queue", &format!("{}outq", p), &none)?;

    for (src, sink) in [(inq, conv), (conv, enc), (enc, outq), (outq, muxer)] {
        graph.link(src, sink).map_err(PipelineError::link)?;
    }

    let target = graph
        .static_pad(inq, "sink")
        .ok_or_else(|| PipelineError::Construction(format!("{}inq has no sink pad", p)))?;
    let entry = graph
        .add_ghost_pad(bin, &format!("{}sink", p), target)
        .map_err(PipelineError::construction)?;

    Ok(Branch { entry, feed: None })
}
