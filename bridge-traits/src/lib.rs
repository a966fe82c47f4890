//! # Host Bridge Traits
//!
//! Capabilities the host platform provides to the player core.
//!
//! ## Overview
//!
//! The core owns playback state and playlist composition, but never touches
//! audio data. Everything native is reached through the traits in this crate:
//!
//! - [`Engine`](engine::Engine) - native decode/render engine and its playlist constructs
//! - [`EngineFactory`](engine::EngineFactory) - lazily constructs engines for a player
//! - [`EngineListener`](engine::EngineListener) - receives engine callbacks from any thread
//! - [`Clock`](time::Clock) - wall clock used for snapshot timestamps
//! - [`LogSink`](time::LogSink) - mirrors core log records into host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Engine | Log sink |
//! |----------|--------|----------|
//! | Android  | ExoPlayer via JNI | Logcat |
//! | iOS/macOS | AVQueuePlayer | os_log |
//! | Desktop  | host pipeline | stderr |
//!
//! ## Fail-Fast Strategy
//!
//! A player cannot be configured without an [`EngineFactory`](engine::EngineFactory);
//! `PlayerConfig::builder().build()` reports a missing factory as
//! `CapabilityMissing` instead of deferring the failure to the first request.
//!
//! ## Threading
//!
//! Engines are owned by a single player task and only need `Send`. Listeners
//! and factories are shared and must be `Send + Sync`; a listener must never
//! call back into the engine, it only enqueues.

pub mod engine;
pub mod error;
pub mod time;

pub use engine::{
    DiscontinuityReason, EditTicket, Engine, EngineError, EngineErrorKind, EngineEvent,
    EngineFactory, EngineListener, EngineState, IcyHeaders, IcyInfo, MediaHandle, MediaKind,
    MetadataEntry, RepeatMode, ShuffleOrder, TimelineChangeReason,
};
pub use error::{BridgeError, Result};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LogSink, StderrLogSink, SystemClock};
