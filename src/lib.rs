//! Workspace façade crate.
//!
//! Host applications depend on `player-bridge` to reach the engine contracts,
//! the runtime infrastructure and the player itself without wiring each
//! workspace crate individually.

pub use bridge_traits as bridge;
pub use core_playback as playback;
pub use core_runtime as runtime;

pub use core_playback::{MethodCall, PlaybackError, PlayerHandle, PlayerRegistry, Request};
pub use core_runtime::{
    config::PlayerConfig,
    events::{PlaybackPhase, PlaybackSnapshot, PlayerEvent},
};
