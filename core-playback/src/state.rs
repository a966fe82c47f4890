//! # Playback State Machine
//!
//! Single source of truth for phase, buffering, position and the pending
//! load/seek replies. Caller operations and engine callbacks both arrive
//! here; every phase transition publishes a fresh snapshot.
//!
//! ## Phases
//!
//! ```text
//!            load                 engine ready
//!   none ───────────> connecting ─────────────> stopped
//!                        ▲  │ stop                 │ play
//!                   load │  └──────> stopped       ▼
//!                        │                      playing <──> paused
//!                     (any)                        │ engine ended
//!                                                  ▼
//!                                              completed
//! ```
//!
//! `buffering` is an overlay on top of the phase. Entering buffering is not
//! reported while stopped, since the engine pre-buffers after a load.

use crate::command::Reply;
use crate::error::{PlaybackError, Result};
use crate::watcher::next_poll_interval;
use bridge_traits::{Clock, Engine, EngineError, EngineState, MetadataEntry};
use core_runtime::config::BufferPollIntervals;
use core_runtime::events::{
    EventBroadcaster, EventStream, IcyMetadata, PlaybackPhase, PlaybackSnapshot, PlayerEvent,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error};

#[derive(Debug)]
struct PendingSeek {
    position_ms: Option<i64>,
    reply: Reply,
    /// The engine acknowledged the seek but was not ready yet.
    processed: bool,
}

pub(crate) struct PlaybackStateMachine {
    phase: PlaybackPhase,
    buffering: bool,
    /// A load completed and playback has not started since.
    just_connected: bool,
    buffered_position_ms: i64,
    current_index: Option<usize>,
    icy: IcyMetadata,
    pending_load: Option<Reply>,
    pending_seek: Option<PendingSeek>,
    /// Set when the buffer watcher should be (re)started.
    watch_requested: bool,
    broadcaster: EventBroadcaster,
    clock: Arc<dyn Clock>,
    intervals: BufferPollIntervals,
}

impl PlaybackStateMachine {
    pub fn new(clock: Arc<dyn Clock>, intervals: BufferPollIntervals) -> Self {
        Self {
            phase: PlaybackPhase::None,
            buffering: false,
            just_connected: false,
            buffered_position_ms: 0,
            current_index: None,
            icy: IcyMetadata::default(),
            pending_load: None,
            pending_seek: None,
            watch_requested: false,
            broadcaster: EventBroadcaster::new(),
            clock,
            intervals,
        }
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn subscribe(&mut self) -> EventStream {
        self.broadcaster.subscribe()
    }

    pub fn attach(&mut self, sender: mpsc::UnboundedSender<PlayerEvent>) {
        self.broadcaster.attach(sender);
    }

    /// Whether a transition asked for the buffer watcher. Clears the request.
    pub fn take_watch_request(&mut self) -> bool {
        std::mem::take(&mut self.watch_requested)
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    fn position(&self, engine: Option<&dyn Engine>) -> i64 {
        if !self.phase.has_media() {
            return 0;
        }
        if let Some(PendingSeek {
            position_ms: Some(position),
            ..
        }) = &self.pending_seek
        {
            return *position;
        }
        engine.map_or(0, |engine| engine.current_position_ms())
    }

    pub fn snapshot(&self, engine: Option<&dyn Engine>) -> PlaybackSnapshot {
        let position_ms = self.position(engine);
        let duration_ms = if self.phase.has_media() {
            engine.and_then(|engine| engine.duration_ms())
        } else {
            None
        };

        PlaybackSnapshot {
            phase: self.phase,
            buffering: self.buffering,
            position_ms,
            buffered_position_ms: position_ms.max(self.buffered_position_ms),
            duration_ms,
            update_time_ms: self.clock.unix_timestamp_millis(),
            current_item_index: self.current_index,
            icy_metadata: self.icy.clone(),
        }
    }

    pub fn broadcast(&mut self, engine: Option<&dyn Engine>) {
        let snapshot = self.snapshot(engine);
        self.broadcaster.publish(PlayerEvent::Snapshot(snapshot));
    }

    fn transition(&mut self, engine: Option<&dyn Engine>, phase: PlaybackPhase) {
        debug!(from = %self.phase, to = %phase, "Phase transition");
        self.phase = phase;
        self.broadcast(engine);
    }

    fn publish_error(&mut self, code: &str, message: &str) {
        self.broadcaster.publish(PlayerEvent::error(code, message));
    }

    // ========================================================================
    // Pending requests
    // ========================================================================

    /// Fail the pending load with `ConnectionAborted`, or report the abort
    /// on the event stream when nobody is waiting.
    fn abort_connection(&mut self) {
        match self.pending_load.take() {
            Some(reply) => reply.err(PlaybackError::ConnectionAborted),
            None => {
                let error = PlaybackError::ConnectionAborted;
                self.publish_error(error.code(), &error.to_string());
            }
        }
    }

    /// A superseded seek still counts as done.
    fn abort_seek(&mut self) {
        if let Some(seek) = self.pending_seek.take() {
            seek.reply.ok(Value::Null);
        }
    }

    fn complete_seek(&mut self) {
        if let Some(seek) = self.pending_seek.take() {
            debug!(position_ms = ?seek.position_ms, "Seek completed");
            seek.reply.ok(Value::Null);
        }
    }

    // ========================================================================
    // Caller operations
    // ========================================================================

    /// Enter `connecting`, stopping whatever was loaded before. The caller
    /// prepares the engine afterwards.
    pub fn begin_load(&mut self, engine: &mut dyn Engine, reply: Reply) {
        self.just_connected = false;
        match self.phase {
            PlaybackPhase::None => {}
            PlaybackPhase::Connecting => {
                self.abort_connection();
                engine.stop();
                engine.set_play_when_ready(false);
            }
            _ => {
                engine.stop();
                engine.set_play_when_ready(false);
            }
        }
        self.abort_seek();
        self.pending_load = Some(reply);
        self.transition(Some(&*engine), PlaybackPhase::Connecting);
    }

    pub fn play(&mut self, engine: &mut dyn Engine) -> Result<()> {
        match self.phase {
            PlaybackPhase::Playing => Ok(()),
            PlaybackPhase::Stopped | PlaybackPhase::Paused | PlaybackPhase::Completed => {
                self.just_connected = false;
                self.transition(Some(&*engine), PlaybackPhase::Playing);
                self.watch_requested = true;
                engine.set_play_when_ready(true);
                Ok(())
            }
            phase => Err(PlaybackError::invalid_state("play", phase)),
        }
    }

    pub fn pause(&mut self, engine: &mut dyn Engine) -> Result<()> {
        match self.phase {
            PlaybackPhase::Paused => Ok(()),
            PlaybackPhase::Playing => {
                engine.set_play_when_ready(false);
                self.transition(Some(&*engine), PlaybackPhase::Paused);
                Ok(())
            }
            phase => Err(PlaybackError::invalid_state("pause", phase)),
        }
    }

    pub fn stop(&mut self, engine: &mut dyn Engine) -> Result<()> {
        match self.phase {
            PlaybackPhase::Stopped => Ok(()),
            PlaybackPhase::Connecting => {
                self.abort_connection();
                self.buffering = false;
                self.transition(Some(&*engine), PlaybackPhase::Stopped);
                Ok(())
            }
            PlaybackPhase::Playing | PlaybackPhase::Paused | PlaybackPhase::Completed => {
                self.abort_seek();
                engine.set_play_when_ready(false);
                self.transition(Some(&*engine), PlaybackPhase::Stopped);
                let window = engine.current_window_index();
                engine.seek_to(window, Some(0));
                Ok(())
            }
            PlaybackPhase::None => Err(PlaybackError::invalid_state("stop", PlaybackPhase::None)),
        }
    }

    /// Seek within `index` (current window when `None`); resolves `reply` once
    /// the engine has processed the seek and is ready again.
    pub fn seek(
        &mut self,
        engine: &mut dyn Engine,
        position_ms: Option<i64>,
        index: Option<usize>,
        reply: Reply,
    ) {
        if !self.phase.has_media() {
            reply.err(PlaybackError::invalid_state("seek", self.phase));
            return;
        }

        self.abort_seek();
        self.pending_seek = Some(PendingSeek {
            position_ms,
            reply,
            processed: false,
        });
        let window = index.unwrap_or_else(|| engine.current_window_index());
        engine.seek_to(window, position_ms);
    }

    /// Speed changes move the position extrapolation, so callers get a fresh
    /// snapshot.
    pub fn speed_changed(&mut self, engine: &dyn Engine) {
        self.broadcast(Some(engine));
    }

    /// Drop everything without answering pending requests.
    pub fn dispose(&mut self) {
        self.pending_load = None;
        self.pending_seek = None;
        self.buffering = false;
        self.just_connected = false;
        self.buffered_position_ms = 0;
        self.current_index = None;
        self.icy = IcyMetadata::default();
        self.transition(None, PlaybackPhase::None);
    }

    // ========================================================================
    // Engine callbacks
    // ========================================================================

    pub fn on_engine_state(&mut self, engine: &mut dyn Engine, state: EngineState) {
        match state {
            EngineState::Ready => {
                if let Some(reply) = self.pending_load.take() {
                    let duration = engine.duration_ms();
                    self.just_connected = true;
                    self.transition(Some(&*engine), PlaybackPhase::Stopped);
                    reply.ok(duration.map_or(Value::Null, Value::from));
                }
                if self.pending_seek.as_ref().is_some_and(|seek| seek.processed) {
                    self.complete_seek();
                }
            }
            EngineState::Ended => {
                if self.phase != PlaybackPhase::Completed {
                    engine.set_play_when_ready(false);
                    self.transition(Some(&*engine), PlaybackPhase::Completed);
                }
            }
            EngineState::Idle | EngineState::Buffering => {}
        }

        let buffering = state == EngineState::Buffering;
        let notify = !buffering || self.phase != PlaybackPhase::Stopped;
        if notify && buffering != self.buffering {
            self.buffering = buffering;
            self.broadcast(Some(&*engine));
            if buffering {
                self.watch_requested = true;
            }
        }
    }

    pub fn on_seek_processed(&mut self, engine: &dyn Engine) {
        let Some(seek) = self.pending_seek.as_mut() else {
            return;
        };
        seek.processed = true;
        if engine.state() == EngineState::Ready {
            self.complete_seek();
        }
    }

    /// Position discontinuities and dynamic timeline changes may move the
    /// current item.
    pub fn on_item_may_have_changed(&mut self, engine: &dyn Engine) {
        self.current_index = Some(engine.current_window_index());
        self.broadcast(Some(engine));
    }

    pub fn on_metadata(&mut self, engine: &dyn Engine, entries: Vec<MetadataEntry>) {
        for entry in entries {
            match entry {
                MetadataEntry::IcyInfo(info) => {
                    self.icy.info = Some(info);
                    self.broadcast(Some(engine));
                }
                MetadataEntry::IcyHeaders(headers) => {
                    self.icy.headers = Some(headers);
                    self.broadcast(Some(engine));
                }
                MetadataEntry::Other(_) => {}
            }
        }
    }

    /// Engine failures go to the pending load, if any, and always to the
    /// event stream. The phase is left alone.
    pub fn on_engine_error(&mut self, error: &EngineError) {
        error!(kind = ?error.kind, code = error.kind.code(), message = %error.message, "Engine error");
        if let Some(reply) = self.pending_load.take() {
            reply.err(PlaybackError::from(error));
        }
        self.publish_error(error.kind.code(), &error.message);
    }

    // ========================================================================
    // Buffer watching
    // ========================================================================

    /// Sample the buffered position, publishing when it moved, and pick the
    /// delay before the next sample.
    pub fn poll_buffer(&mut self, engine: &dyn Engine) -> Option<Duration> {
        let buffered = engine.buffered_position_ms();
        if buffered != self.buffered_position_ms {
            self.buffered_position_ms = buffered;
            self.broadcast(Some(engine));
        }
        next_poll_interval(
            &self.intervals,
            self.phase,
            self.buffering,
            self.just_connected,
        )
    }
}
