//! # Player Configuration
//!
//! A [`PlayerConfig`] carries everything a player needs besides its id: the
//! engine factory provided by the host, the clock used to timestamp
//! snapshots, the buffer polling cadence and an optional shuffle seed.
//!
//! ## Required Dependencies
//!
//! - `EngineFactory` - constructs the native engine lazily
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `Clock` - defaults to [`SystemClock`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{BufferPollIntervals, PlayerConfig};
//! use std::sync::Arc;
//!
//! let config = PlayerConfig::builder()
//!     .engine_factory(Arc::new(ExoPlayerFactory::new(jvm)))
//!     .shuffle_seed(42)
//!     .build()?;
//! ```
//!
//! Building without a factory fails fast with
//! [`Error::CapabilityMissing`](crate::Error::CapabilityMissing).

use crate::error::{Error, Result};
use bridge_traits::{Clock, EngineFactory, SystemClock};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Cadence of the buffered-position watcher.
///
/// The watcher picks the first matching interval on every tick: buffering,
/// then playing, then paused, then just connected. When none applies it
/// stops until restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPollIntervals {
    pub buffering: Duration,
    pub playing: Duration,
    pub paused: Duration,
    /// Used after a load completes and before playback starts.
    pub connected: Duration,
}

impl Default for BufferPollIntervals {
    fn default() -> Self {
        Self {
            buffering: Duration::from_millis(200),
            playing: Duration::from_millis(500),
            paused: Duration::from_millis(1000),
            connected: Duration::from_millis(1000),
        }
    }
}

impl BufferPollIntervals {
    pub fn validate(&self) -> Result<()> {
        let all = [
            ("buffering", self.buffering),
            ("playing", self.playing),
            ("paused", self.paused),
            ("connected", self.connected),
        ];
        for (name, interval) in all {
            if interval.is_zero() {
                return Err(Error::Config(format!(
                    "Buffer poll interval '{}' must be greater than 0ms",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Configuration shared by every player created from it.
#[derive(Clone)]
pub struct PlayerConfig {
    pub engine_factory: Arc<dyn EngineFactory>,
    pub clock: Arc<dyn Clock>,
    pub buffer_poll: BufferPollIntervals,
    /// Seed for shuffle orders. `None` seeds from OS entropy.
    pub shuffle_seed: Option<u64>,
}

impl fmt::Debug for PlayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerConfig")
            .field("engine_factory", &"EngineFactory { ... }")
            .field("clock", &"Clock { ... }")
            .field("buffer_poll", &self.buffer_poll)
            .field("shuffle_seed", &self.shuffle_seed)
            .finish()
    }
}

impl PlayerConfig {
    pub fn builder() -> PlayerConfigBuilder {
        PlayerConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.buffer_poll.validate()
    }
}

fn engine_factory_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "EngineFactory".to_string(),
        message: "An EngineFactory is required to construct the native media engine. \
                 Android: inject the ExoPlayer-backed factory. \
                 Apple platforms: inject the AVPlayer-backed factory. \
                 Tests: inject a fake engine factory."
            .to_string(),
    }
}

/// Builder for [`PlayerConfig`].
#[derive(Default)]
pub struct PlayerConfigBuilder {
    engine_factory: Option<Arc<dyn EngineFactory>>,
    clock: Option<Arc<dyn Clock>>,
    buffer_poll: Option<BufferPollIntervals>,
    shuffle_seed: Option<u64>,
}

impl PlayerConfigBuilder {
    pub fn engine_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.engine_factory = Some(factory);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn buffer_poll(mut self, intervals: BufferPollIntervals) -> Self {
        self.buffer_poll = Some(intervals);
        self
    }

    /// Make shuffle orders reproducible.
    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] without an engine factory
    /// - [`Error::Config`] when a poll interval is zero
    pub fn build(self) -> Result<PlayerConfig> {
        let engine_factory = self
            .engine_factory
            .ok_or_else(engine_factory_missing_error)?;

        let config = PlayerConfig {
            engine_factory,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            buffer_poll: self.buffer_poll.unwrap_or_default(),
            shuffle_seed: self.shuffle_seed,
        };

        config.validate()?;

        Ok(config)
    }
}
