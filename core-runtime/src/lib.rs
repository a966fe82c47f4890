//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the player crates:
//! - Logging and tracing setup, with host log mirroring
//! - Player configuration
//! - The player event model and its single-subscriber broadcaster
//!
//! ## Overview
//!
//! Nothing here knows about playlists or engines beyond the bridge traits. The
//! playback logic lives in `core-playback` and depends on this crate for its
//! configuration, event types and logging conventions.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
