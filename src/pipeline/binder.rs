//! Source pad routing
//!
//! Decides which junction a runtime source pad belongs to. The SmartBin
//! performs the actual link under its topology lock.

use crate::graph::{MediaGraph, MediaKind, PadId};

/// How runtime pads of a source are matched to media kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceBinder {
    /// Decoded file source: route on the negotiated caps prefix
    DecodedMedia,
    /// Composition source: route on the fixed `asrc` / `vsrc` names
    NamedPad,
    /// Sources are linked once at construction
    None,
}

impl SourceBinder {
    /// Kind of junction `pad` should feed, or `None` to ignore it
    pub fn route(&self, graph: &dyn MediaGraph, pad: PadId) -> Option<MediaKind> {
        match self {
            SourceBinder::DecodedMedia => {
                let caps = graph.pad_caps(pad)?;
                if caps.starts_with("audio") {
                    Some(MediaKind::Audio)
                } else if caps.starts_with("video") {
                    Some(MediaKind::Video)
                } else {
                    None
                }
            }
            SourceBinder::NamedPad => match graph.pad_name(pad)?.as_str() {
                "asrc" => Some(MediaKind::Audio),
                "vsrc" => Some(MediaKind::Video),
                _ => None,
            },
            SourceBinder::None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;

    #[test]
    fn test_decoded_media_routes_on_caps() {
        let graph = MemoryGraph::new();
        let decoder = graph.make_element("decodebin", "dec").unwrap();
        let audio = graph.add_source_pad(decoder, "src_0", Some("audio/x-raw-int")).unwrap();
        let video = graph.add_source_pad(decoder, "src_1", Some("video/x-raw-yuv")).unwrap();
        let other = graph.add_source_pad(decoder, "src_2", Some("application/x-unknown")).unwrap();
        let bare = graph.add_source_pad(decoder, "src_3", None).unwrap();

        let binder = SourceBinder::DecodedMedia;
        assert_eq!(binder.route(&graph, audio), Some(MediaKind::Audio));
        assert_eq!(binder.route(&graph, video), Some(MediaKind::Video));
        assert_eq!(binder.route(&graph, other), None);
        assert_eq!(binder.route(&graph, bare), None);
    }

    #[test]
    fn test_named_pad_routes_on_name() {
        let graph = MemoryGraph::new();
        let composition = graph.make_element("nlecomposition", "comp").unwrap();
        let asrc = graph.add_source_pad(composition, "asrc", Some("video/x-raw-yuv")).unwrap();
        let vsrc = graph.add_source_pad(composition, "vsrc", None).unwrap();
        let extra = graph.add_source_pad(composition, "src_0", Some("audio/x-raw-int")).unwrap();

        let binder = SourceBinder::NamedPad;
        assert_eq!(binder.route(&graph, asrc), Some(MediaKind::Audio));
        assert_eq!(binder.route(&graph, vsrc), Some(MediaKind::Video));
        assert_eq!(binder.route(&graph, extra), None);
        assert_eq!(SourceBinder::None.route(&graph, vsrc), None);
    }
}
