//! Project schema definitions
//!
//! Serializable types for export settings and probed source streams.

use crate::graph::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Export Settings
// =============================================================================

/// Property name → value map applied verbatim to a created element
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Encoder, muxer and output geometry used when rendering.
///
/// Element identifiers are factory names; the property maps are applied to
/// the created elements without interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub videowidth: u32,
    pub videoheight: u32,
    /// Frames per second
    pub videorate: f64,
    pub audiorate: u32,
    pub audiochannels: u32,
    pub vencoder: String,
    pub aencoder: String,
    pub muxer: String,
    pub vcodecsettings: PropertyMap,
    pub acodecsettings: PropertyMap,
    pub containersettings: PropertyMap,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            videowidth: 720,
            videoheight: 576,
            videorate: 25.0,
            audiorate: 44100,
            audiochannels: 2,
            vencoder: "theoraenc".to_string(),
            aencoder: "vorbisenc".to_string(),
            muxer: "oggmux".to_string(),
            vcodecsettings: PropertyMap::new(),
            acodecsettings: PropertyMap::new(),
            containersettings: PropertyMap::new(),
        }
    }
}

impl ExportSettings {
    /// Output geometry as (width, height)
    pub fn geometry(&self) -> (u32, u32) {
        (self.videowidth, self.videoheight)
    }

    /// Parse settings from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// =============================================================================
// Source Types
// =============================================================================

/// Probed properties of one video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_partial_json() {
        let json = r#"{
            "vencoder": "x264enc",
            "muxer": "matroskamux",
            "vcodecsettings": { "bitrate": 2048, "tune": "zerolatency", "byte-stream": true }
        }"#;
        let settings = ExportSettings::from_json(json).unwrap();

        assert_eq!(settings.vencoder, "x264enc");
        assert_eq!(settings.aencoder, "vorbisenc");
        assert_eq!(settings.geometry(), (720, 576));
        assert_eq!(settings.vcodecsettings["bitrate"], PropertyValue::Int(2048));
        assert_eq!(
            settings.vcodecsettings["tune"],
            PropertyValue::Str("zerolatency".to_string())
        );
        assert_eq!(settings.vcodecsettings["byte-stream"], PropertyValue::Bool(true));
    }

    #[test]
    fn test_settings_reject_wrong_types() {
        assert!(ExportSettings::from_json(r#"{ "videowidth": "wide" }"#).is_err());
        assert!(ExportSettings::from_json("42").is_err());
    }
}
