//! Media engine bridge traits and supporting types.
//!
//! The engine is the host's native decode/render subsystem (ExoPlayer,
//! AVPlayer, a desktop pipeline). The core never decodes audio itself: it
//! builds playlist constructs through [`Engine`], drives transport, and reacts
//! to [`EngineEvent`]s the host posts back through an [`EngineListener`].
//!
//! Engine calls are synchronous and fire-and-forget. Anything the engine
//! completes later (becoming ready, processing a seek, applying a playlist
//! edit) is reported as an event rather than a return value.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque reference to an engine-native media construct.
///
/// Handles are minted by the engine in the `create_*` calls and are only
/// meaningful to the engine instance that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaHandle(u64);

impl MediaHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media#{}", self.0)
    }
}

/// Identifier of a playlist mutation, echoed back by the engine once applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EditTicket(u64);

impl EditTicket {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Ticket issued after this one.
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Container/streaming format of a leaf media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Plain progressive download or local file.
    Progressive,
    /// MPEG-DASH manifest.
    Dash,
    /// HTTP Live Streaming playlist.
    Hls,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Progressive => "progressive",
            MediaKind::Dash => "dash",
            MediaKind::Hls => "hls",
        }
    }
}

/// Engine-side playback state, independent of the core's phase model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// No media prepared, or preparation was stopped.
    Idle,
    /// Media prepared but not enough data to play.
    Buffering,
    /// Able to play immediately from the current position.
    Ready,
    /// Reached the end of the timeline.
    Ended,
}

/// Repeat behaviour applied by the engine at the end of items and playlists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

impl RepeatMode {
    /// Integer form used on the wire (0 = off, 1 = one, 2 = all).
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(RepeatMode::Off),
            1 => Some(RepeatMode::One),
            2 => Some(RepeatMode::All),
            _ => None,
        }
    }

    pub fn index(&self) -> i64 {
        match self {
            RepeatMode::Off => 0,
            RepeatMode::One => 1,
            RepeatMode::All => 2,
        }
    }
}

/// Why the playback position jumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscontinuityReason {
    /// Automatic advance to the next period/window.
    PeriodTransition,
    /// Caller-requested seek.
    Seek,
    /// Seek target was adjusted by the engine.
    SeekAdjustment,
    /// Engine-internal reason.
    Internal,
}

/// Why the timeline changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimelineChangeReason {
    Prepared,
    Reset,
    /// Timeline changed while playing, e.g. a playlist edit.
    Dynamic,
}

/// Category of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorKind {
    /// Loading or parsing the media failed.
    Source,
    /// Decoding or output failed.
    Renderer,
    /// Anything else.
    Unexpected,
}

impl EngineErrorKind {
    /// Stable error code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            EngineErrorKind::Source => "0",
            EngineErrorKind::Renderer => "1",
            EngineErrorKind::Unexpected => "2",
        }
    }
}

/// Failure reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Stream title/url parsed from in-band ICY metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcyInfo {
    pub title: Option<String>,
    pub url: Option<String>,
}

/// Station description from ICY response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcyHeaders {
    pub bitrate: Option<i32>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub metadata_interval: Option<i32>,
    pub url: Option<String>,
    pub is_public: bool,
}

/// A single decoded metadata entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataEntry {
    IcyInfo(IcyInfo),
    IcyHeaders(IcyHeaders),
    /// Entry the core does not interpret (ID3 frames, ...).
    Other(String),
}

/// Permutation installed on a concatenating construct.
///
/// `seed` lets the engine extend the order deterministically when children are
/// inserted after the order was computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleOrder {
    pub indices: Vec<usize>,
    pub seed: u64,
}

impl ShuffleOrder {
    pub fn new(indices: Vec<usize>, seed: u64) -> Self {
        Self { indices, seed }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Child index played first, if any.
    pub fn first(&self) -> Option<usize> {
        self.indices.first().copied()
    }
}

/// Callback posted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged {
        play_when_ready: bool,
        state: EngineState,
    },
    PositionDiscontinuity(DiscontinuityReason),
    TimelineChanged(TimelineChangeReason),
    Metadata(Vec<MetadataEntry>),
    SeekProcessed,
    PlayerError(EngineError),
    /// A playlist mutation issued with this ticket has been applied.
    PlaylistEditApplied(EditTicket),
}

/// Receiver for engine callbacks.
///
/// Hosts may invoke it from any thread; implementations must only enqueue.
pub trait EngineListener: Send + Sync {
    fn on_event(&self, event: EngineEvent);
}

/// Native media engine.
///
/// # Playlist constructs
///
/// Media trees are built bottom-up: leaves with [`Engine::create_media`], then
/// wrappers around previously returned handles. Mutations of a concatenating
/// construct carry an [`EditTicket`]; the engine must post
/// [`EngineEvent::PlaylistEditApplied`] with that ticket once the change is
/// visible to playback.
///
/// # Example
///
/// ```ignore
/// let a = engine.create_media(MediaKind::Progressive, "https://x/a.mp3")?;
/// let b = engine.create_media(MediaKind::Hls, "https://x/b.m3u8")?;
/// let playlist = engine.create_concatenating(&[a, b], true)?;
/// engine.prepare(playlist);
/// ```
pub trait Engine: Send {
    fn create_media(&mut self, kind: MediaKind, uri: &str) -> Result<MediaHandle>;

    fn create_concatenating(
        &mut self,
        children: &[MediaHandle],
        use_lazy_preparation: bool,
    ) -> Result<MediaHandle>;

    /// `end_ms == None` plays to the end of the child.
    fn create_clipping(
        &mut self,
        child: MediaHandle,
        start_ms: i64,
        end_ms: Option<i64>,
    ) -> Result<MediaHandle>;

    fn create_looping(&mut self, child: MediaHandle, count: u32) -> Result<MediaHandle>;

    fn insert_children(
        &mut self,
        playlist: MediaHandle,
        index: usize,
        children: &[MediaHandle],
        ticket: EditTicket,
    );

    /// Remove children in `from..to`.
    fn remove_range(&mut self, playlist: MediaHandle, from: usize, to: usize, ticket: EditTicket);

    fn move_child(&mut self, playlist: MediaHandle, from: usize, to: usize, ticket: EditTicket);

    fn clear(&mut self, playlist: MediaHandle, ticket: EditTicket);

    fn set_shuffle_order(&mut self, playlist: MediaHandle, order: ShuffleOrder);

    fn prepare(&mut self, root: MediaHandle);

    fn stop(&mut self);

    /// Free native resources. The engine is not used afterwards.
    fn release(&mut self);

    fn set_play_when_ready(&mut self, play_when_ready: bool);

    /// `position_ms == None` seeks to the window's default position.
    fn seek_to(&mut self, window_index: usize, position_ms: Option<i64>);

    fn set_volume(&mut self, volume: f32);

    fn set_playback_rate(&mut self, rate: f32);

    fn set_repeat_mode(&mut self, mode: RepeatMode);

    fn set_shuffle_mode_enabled(&mut self, enabled: bool);

    fn shuffle_mode_enabled(&self) -> bool;

    fn state(&self) -> EngineState;

    fn current_position_ms(&self) -> i64;

    fn buffered_position_ms(&self) -> i64;

    /// `None` while the duration is unknown (live streams, unprepared media).
    fn duration_ms(&self) -> Option<i64>;

    fn current_window_index(&self) -> usize;
}

/// Constructs engines on demand.
///
/// A player asks for a new engine lazily, on its first request and again after
/// it has been disposed.
pub trait EngineFactory: Send + Sync {
    fn create(&self, listener: Arc<dyn EngineListener>) -> Result<Box<dyn Engine>>;
}
