//! External media sync model

use serde::{Deserialize, Serialize};

/// How playback of an external video is aligned with a tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMethod {
    /// Fixed offset in milliseconds
    Simple,
    /// Opaque sync curve
    Advanced,
}

/// Sync descriptor for one video attached to one tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSync {
    #[serde(rename = "videoID")]
    pub video_id: String,
    pub sync_method: SyncMethod,
    pub simple_sync: f64,
    #[serde(default)]
    pub advanced_sync: String,
}

impl MediaSync {
    /// Descriptor using a fixed offset
    pub fn simple(video_id: impl Into<String>, offset_ms: f64) -> Self {
        Self {
            video_id: video_id.into(),
            sync_method: SyncMethod::Simple,
            simple_sync: offset_ms,
            advanced_sync: String::new(),
        }
    }

    /// Descriptor using a sync curve payload
    pub fn advanced(video_id: impl Into<String>, curve: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            sync_method: SyncMethod::Advanced,
            simple_sync: 0.0,
            advanced_sync: curve.into(),
        }
    }
}
