//! Source factories
//!
//! A source factory knows what a media file contains (probed ahead of time)
//! and can build the decoding element for it. The pipeline core only reads
//! its flags and tells it when a built source is no longer used.

use super::schema::VideoStreamInfo;
use crate::graph::{ElementId, GraphResult, MediaGraph, PropertyValue};
use parking_lot::Mutex;
use uuid::Uuid;

/// Builder of decodable sources for one media file
pub trait SourceFactory: Send + Sync {
    /// Internal name, unique per factory
    fn name(&self) -> &str;

    /// User-facing name
    fn display_name(&self) -> &str;

    fn is_audio(&self) -> bool;

    fn is_video(&self) -> bool;

    /// Media length in the factory's time unit
    fn length(&self) -> u64;

    /// Probed video streams; the first entry describes the main stream
    fn video_info(&self) -> &[VideoStreamInfo];

    /// Build a new source element emitting decoded pads
    fn make_bin(&self, graph: &dyn MediaGraph) -> GraphResult<ElementId>;

    /// Called once the pipeline that used `bin` is torn down
    fn bin_is_destroyed(&self, bin: ElementId);
}

/// Probed facts about a media file
#[derive(Debug, Clone, Default)]
pub struct MediaProbe {
    pub has_audio: bool,
    pub has_video: bool,
    pub length: u64,
    pub video_streams: Vec<VideoStreamInfo>,
}

/// Factory for a file URI decoded with `uridecodebin`
pub struct FileSourceFactory {
    id: Uuid,
    uri: String,
    display_name: String,
    probe: MediaProbe,
    live_bins: Mutex<Vec<ElementId>>,
}

impl FileSourceFactory {
    pub fn new(uri: &str, probe: MediaProbe) -> Self {
        let basename = uri.rsplit('/').next().unwrap_or(uri);
        let display_name = urlencoding::decode(basename)
            .map(|name| name.into_owned())
            .unwrap_or_else(|_| basename.to_string());

        Self {
            id: Uuid::new_v4(),
            uri: uri.to_string(),
            display_name,
            probe,
            live_bins: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Sources built by this factory that are still in use
    pub fn live_bins(&self) -> Vec<ElementId> {
        self.live_bins.lock().clone()
    }
}

impl SourceFactory for FileSourceFactory {
    fn name(&self) -> &str {
        &self.uri
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn is_audio(&self) -> bool {
        self.probe.has_audio
    }

    fn is_video(&self) -> bool {
        self.probe.has_video
    }

    fn length(&self) -> u64 {
        self.probe.length
    }

    fn video_info(&self) -> &[VideoStreamInfo] {
        &self.probe.video_streams
    }

    fn make_bin(&self, graph: &dyn MediaGraph) -> GraphResult<ElementId> {
        let mut live = self.live_bins.lock();
        let name = format!("{}-{}", self.display_name, live.len());
        let bin = graph.make_element("uridecodebin", &name)?;
        graph.set_property(bin, "uri", PropertyValue::Str(self.uri.clone()))?;
        live.push(bin);
        tracing::debug!("{} built source {} ({} live)", self.display_name, bin, live.len());
        Ok(bin)
    }

    fn bin_is_destroyed(&self, bin: ElementId) {
        let mut live = self.live_bins.lock();
        live.retain(|b| *b != bin);
        tracing::debug!("{} released source {} ({} live)", self.display_name, bin, live.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;

    #[test]
    fn test_display_name_is_decoded_basename() {
        let factory = FileSourceFactory::new("file:///media/My%20Clip.ogv", MediaProbe::default());
        assert_eq!(factory.display_name(), "My Clip.ogv");
        assert_eq!(factory.name(), "file:///media/My%20Clip.ogv");
    }

    #[test]
    fn test_bins_are_tracked_until_destroyed() {
        let graph = MemoryGraph::new();
        let factory = FileSourceFactory::new("file:///media/clip.ogv", MediaProbe::default());

        let bin = factory.make_bin(&graph).unwrap();
        assert_eq!(
            graph.property(bin, "uri"),
            Some(PropertyValue::Str("file:///media/clip.ogv".to_string()))
        );
        assert_eq!(factory.live_bins(), vec![bin]);

        factory.bin_is_destroyed(bin);
        assert!(factory.live_bins().is_empty());
    }
}
