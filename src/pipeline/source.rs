//! Pipeline source variants
//!
//! Each SmartBin is built around exactly one source. The variant decides
//! which media kinds exist, where geometry and length come from and how the
//! source pads reach the junctions.

use super::binder::SourceBinder;
use crate::graph::{ElementId, MediaKind};
use crate::project::{DurationChanged, ExportSettings, Project, SourceFactory};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Media kinds a pipeline carries, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamLayout {
    pub has_audio: bool,
    pub has_video: bool,
}

impl StreamLayout {
    pub const BOTH: StreamLayout = StreamLayout {
        has_audio: true,
        has_video: true,
    };

    pub fn supports(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.has_audio,
            MediaKind::Video => self.has_video,
        }
    }
}

/// Derived metadata of the pipeline's source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub length: u64,
    pub width: u32,
    pub height: u32,
}

/// Geometry of the synthetic default source
pub const DEFAULT_WIDTH: u32 = 720;
pub const DEFAULT_HEIGHT: u32 = 576;

/// `videotestsrc` pattern used by the synthetic source
pub const TEST_VIDEO_PATTERN: i64 = 2;
/// `audiotestsrc` wave used by the synthetic source (silence)
pub const TEST_AUDIO_WAVE: i64 = 4;

pub(crate) enum SourceVariant {
    File {
        factory: Arc<dyn SourceFactory>,
        source: ElementId,
    },
    Timeline {
        project: Arc<Project>,
        settings_rx: Mutex<broadcast::Receiver<ExportSettings>>,
        duration_rx: Mutex<broadcast::Receiver<DurationChanged>>,
    },
    Synthetic {
        video: ElementId,
        audio: ElementId,
    },
}

impl SourceVariant {
    pub(crate) fn timeline(project: Arc<Project>) -> Self {
        let settings_rx = Mutex::new(project.settings().subscribe());
        let duration_rx = Mutex::new(project.timeline().subscribe());
        SourceVariant::Timeline {
            project,
            settings_rx,
            duration_rx,
        }
    }

    pub(crate) fn binder(&self) -> SourceBinder {
        match self {
            SourceVariant::File { .. } => SourceBinder::DecodedMedia,
            SourceVariant::Timeline { .. } => SourceBinder::NamedPad,
            SourceVariant::Synthetic { .. } => SourceBinder::None,
        }
    }

    /// Settings to fall back on when `record()` gets none
    pub(crate) fn resolve_default_settings(&self) -> Option<ExportSettings> {
        match self {
            SourceVariant::Timeline { project, .. } => Some(project.settings().snapshot()),
            SourceVariant::File { .. } | SourceVariant::Synthetic { .. } => None,
        }
    }

    pub(crate) fn project(&self) -> Option<&Arc<Project>> {
        match self {
            SourceVariant::Timeline { project, .. } => Some(project),
            _ => None,
        }
    }
}

/// Layout and initial metadata of a file-backed source
pub(crate) fn file_stream(factory: &dyn SourceFactory) -> (StreamLayout, StreamInfo) {
    let layout = StreamLayout {
        has_audio: factory.is_audio(),
        has_video: factory.is_video(),
    };
    let (width, height) = factory
        .video_info()
        .first()
        .map(|info| (info.width, info.height))
        .unwrap_or((0, 0));
    let info = StreamInfo {
        length: factory.length(),
        width,
        height,
    };
    (layout, info)
}
