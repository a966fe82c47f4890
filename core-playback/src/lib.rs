//! # Playback Module
//!
//! Drives a native media engine from a small request/event protocol.
//!
//! ## Overview
//!
//! This module handles:
//! - Decoding method calls into typed requests
//! - The playback state machine and its snapshot events
//! - Building audio source trees on the engine and editing playlists in place
//! - Shuffle orders that keep the current item first
//! - Polling the engine's buffered position at phase-dependent intervals
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{AudioSourceDescriptor, PlayerHandle};
//!
//! let player = PlayerHandle::spawn("main", config);
//! let mut events = player.subscribe();
//!
//! let duration = player.load(AudioSourceDescriptor::Progressive {
//!     id: "intro".into(),
//!     uri: "https://example.com/intro.mp3".into(),
//! }).await?;
//! player.play().await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

mod command;
pub mod descriptor;
pub mod error;
#[cfg(test)]
mod mocks;
pub mod player;
pub mod registry;
pub mod request;
pub mod shuffle;
mod state;
pub mod tree;
pub mod watcher;

pub use descriptor::AudioSourceDescriptor;
pub use error::{PlaybackError, Result};
pub use player::PlayerHandle;
pub use registry::PlayerRegistry;
pub use request::{MethodCall, PlaylistEdit, Request};
pub use shuffle::{shuffled_indices, ShuffleGenerator};
pub use tree::SourceTree;
