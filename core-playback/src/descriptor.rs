//! Audio source descriptors as sent by callers.
//!
//! A descriptor is the caller's JSON description of a source tree. It is
//! decoded in full before anything is built, so a malformed descriptor never
//! leaves a half-constructed tree behind.

use crate::error::{PlaybackError, Result};
use bridge_traits::MediaKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_lazy_preparation() -> bool {
    true
}

/// Caller-side description of an audio source node.
///
/// ```
/// use core_playback::AudioSourceDescriptor;
///
/// let json = serde_json::json!({
///     "id": "playlist",
///     "type": "concatenating",
///     "audioSources": [
///         {"id": "a", "type": "progressive", "uri": "https://example.com/a.mp3"},
///         {"id": "b", "type": "looping", "count": 2,
///          "audioSource": {"id": "c", "type": "hls", "uri": "https://example.com/c.m3u8"}}
///     ]
/// });
/// let descriptor = AudioSourceDescriptor::from_value(json).unwrap();
/// assert_eq!(descriptor.id(), "playlist");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AudioSourceDescriptor {
    Progressive {
        id: String,
        uri: String,
    },
    Dash {
        id: String,
        uri: String,
    },
    Hls {
        id: String,
        uri: String,
    },
    #[serde(rename_all = "camelCase")]
    Concatenating {
        id: String,
        audio_sources: Vec<AudioSourceDescriptor>,
        #[serde(default = "default_lazy_preparation")]
        use_lazy_preparation: bool,
    },
    #[serde(rename_all = "camelCase")]
    Clipping {
        id: String,
        audio_source: Box<AudioSourceDescriptor>,
        /// Clip start in ms; absent means the start of the child.
        #[serde(default)]
        start: Option<i64>,
        /// Clip end in ms; absent means the end of the child.
        #[serde(default)]
        end: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    Looping {
        id: String,
        audio_source: Box<AudioSourceDescriptor>,
        count: u32,
    },
}

impl AudioSourceDescriptor {
    /// Decode and validate a descriptor.
    pub fn from_value(value: Value) -> Result<Self> {
        let descriptor: AudioSourceDescriptor = serde_json::from_value(value)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn id(&self) -> &str {
        match self {
            AudioSourceDescriptor::Progressive { id, .. }
            | AudioSourceDescriptor::Dash { id, .. }
            | AudioSourceDescriptor::Hls { id, .. }
            | AudioSourceDescriptor::Concatenating { id, .. }
            | AudioSourceDescriptor::Clipping { id, .. }
            | AudioSourceDescriptor::Looping { id, .. } => id,
        }
    }

    /// Leaf media kind and URI, or `None` for composite nodes.
    pub fn media(&self) -> Option<(MediaKind, &str)> {
        match self {
            AudioSourceDescriptor::Progressive { uri, .. } => Some((MediaKind::Progressive, uri)),
            AudioSourceDescriptor::Dash { uri, .. } => Some((MediaKind::Dash, uri)),
            AudioSourceDescriptor::Hls { uri, .. } => Some((MediaKind::Hls, uri)),
            _ => None,
        }
    }

    /// Structural checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        match self {
            AudioSourceDescriptor::Progressive { id, uri }
            | AudioSourceDescriptor::Dash { id, uri }
            | AudioSourceDescriptor::Hls { id, uri } => {
                if uri.is_empty() {
                    return Err(PlaybackError::decode(format!("source '{}' has an empty uri", id)));
                }
            }
            AudioSourceDescriptor::Concatenating { audio_sources, .. } => {
                for child in audio_sources {
                    child.validate()?;
                }
            }
            AudioSourceDescriptor::Clipping {
                id,
                audio_source,
                start,
                end,
            } => {
                if start.is_some_and(|start| start < 0) {
                    return Err(PlaybackError::decode(format!(
                        "clipping '{}' has a negative start",
                        id
                    )));
                }
                if let (Some(start), Some(end)) = (start, end) {
                    if end < start {
                        return Err(PlaybackError::decode(format!(
                            "clipping '{}' ends before it starts",
                            id
                        )));
                    }
                }
                audio_source.validate()?;
            }
            AudioSourceDescriptor::Looping {
                id,
                audio_source,
                count,
            } => {
                if *count == 0 {
                    return Err(PlaybackError::decode(format!(
                        "looping '{}' must repeat at least once",
                        id
                    )));
                }
                audio_source.validate()?;
            }
        }
        Ok(())
    }
}
