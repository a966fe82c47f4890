//! # Player Event Model
//!
//! Types published to the caller on a player's event stream, and the
//! single-subscriber [`EventBroadcaster`] that publishes them.
//!
//! ## Overview
//!
//! - **PlaybackPhase**: the player's named state
//! - **PlaybackSnapshot**: immutable picture of the player at one instant
//! - **PlayerEvent**: a snapshot or an error notice
//! - **EventBroadcaster / EventStream**: producer and consumer ends
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  publish   ┌──────────────────┐   recv    ┌─────────────┐
//! │ player task├───────────>│ EventBroadcaster ├──────────>│ EventStream │
//! └────────────┘            │ (one sink slot)  │           └─────────────┘
//!                           └──────────────────┘
//! ```
//!
//! Unlike a broadcast bus there is at most one subscriber. Subscribing again
//! replaces the sink, and the previous stream sees the end of events. A
//! dropped stream silently discards further events; publishing never fails.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBroadcaster, PlayerEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut broadcaster = EventBroadcaster::new();
//! let mut stream = broadcaster.subscribe();
//!
//! broadcaster.publish(PlayerEvent::error("abort", "Connection aborted"));
//!
//! let event = stream.recv().await.unwrap();
//! assert!(event.is_error());
//! # }
//! ```

use bridge_traits::{IcyHeaders, IcyInfo};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

// ============================================================================
// Phase
// ============================================================================

/// Named playback state.
///
/// The declaration order is the ordinal order hosts receive over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    #[default]
    None,
    Stopped,
    Paused,
    Playing,
    Connecting,
    Completed,
}

impl PlaybackPhase {
    pub fn ordinal(&self) -> u8 {
        match self {
            PlaybackPhase::None => 0,
            PlaybackPhase::Stopped => 1,
            PlaybackPhase::Paused => 2,
            PlaybackPhase::Playing => 3,
            PlaybackPhase::Connecting => 4,
            PlaybackPhase::Completed => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackPhase::None => "none",
            PlaybackPhase::Stopped => "stopped",
            PlaybackPhase::Paused => "paused",
            PlaybackPhase::Playing => "playing",
            PlaybackPhase::Connecting => "connecting",
            PlaybackPhase::Completed => "completed",
        }
    }

    /// Whether position and duration are meaningful in this phase.
    pub fn has_media(&self) -> bool {
        !matches!(self, PlaybackPhase::None | PlaybackPhase::Connecting)
    }
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Latest ICY info and headers seen on the current stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcyMetadata {
    pub info: Option<IcyInfo>,
    pub headers: Option<IcyHeaders>,
}

impl IcyMetadata {
    pub fn is_empty(&self) -> bool {
        self.info.is_none() && self.headers.is_none()
    }
}

/// Player state at `update_time_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub phase: PlaybackPhase,
    pub buffering: bool,
    pub position_ms: i64,
    pub buffered_position_ms: i64,
    /// `None` while unknown, including the `none` and `connecting` phases.
    pub duration_ms: Option<i64>,
    /// Wall clock when the snapshot was taken, in ms since the Unix epoch.
    pub update_time_ms: i64,
    #[serde(rename = "currentIndex")]
    pub current_item_index: Option<usize>,
    pub icy_metadata: IcyMetadata,
}

// ============================================================================
// Events
// ============================================================================

/// Item on a player's event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum PlayerEvent {
    Snapshot(PlaybackSnapshot),
    Error { code: String, message: String },
}

impl PlayerEvent {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        PlayerEvent::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PlayerEvent::Error { .. })
    }

    pub fn snapshot(&self) -> Option<&PlaybackSnapshot> {
        match self {
            PlayerEvent::Snapshot(snapshot) => Some(snapshot),
            PlayerEvent::Error { .. } => None,
        }
    }
}

// ============================================================================
// Broadcaster
// ============================================================================

/// Single-slot event publisher owned by a player task.
#[derive(Default)]
pub struct EventBroadcaster {
    sink: Option<mpsc::UnboundedSender<PlayerEvent>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new stream, replacing any existing subscriber.
    pub fn subscribe(&mut self) -> EventStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.attach(sender);
        EventStream::new(receiver)
    }

    /// Install `sender` as the sink, replacing any existing one.
    pub fn attach(&mut self, sender: mpsc::UnboundedSender<PlayerEvent>) {
        self.sink = Some(sender);
    }

    /// Deliver `event` to the current subscriber, if any.
    ///
    /// Returns whether the event was handed to a live stream.
    pub fn publish(&mut self, event: PlayerEvent) -> bool {
        let Some(sink) = self.sink.as_ref() else {
            return false;
        };

        if sink.send(event).is_err() {
            // Receiver dropped; stay silent until the next subscription.
            self.sink = None;
            return false;
        }
        true
    }

    pub fn has_subscriber(&self) -> bool {
        self.sink.as_ref().is_some_and(|sink| !sink.is_closed())
    }
}

impl fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("has_subscriber", &self.has_subscriber())
            .finish()
    }
}

// ============================================================================
// Event Stream
// ============================================================================

/// Consumer end of a player's events.
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<PlayerEvent>,
}

impl EventStream {
    pub fn new(receiver: mpsc::UnboundedReceiver<PlayerEvent>) -> Self {
        Self { receiver }
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the player is gone or a newer subscription has
    /// replaced this one.
    pub async fn recv(&mut self) -> Option<PlayerEvent> {
        self.receiver.recv().await
    }

    /// Next buffered event, without waiting.
    pub fn try_recv(&mut self) -> Option<PlayerEvent> {
        self.receiver.try_recv().ok()
    }

    /// All events buffered so far.
    pub fn drain(&mut self) -> Vec<PlayerEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
