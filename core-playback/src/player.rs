//! # Player
//!
//! Each player is a tokio task draining one command queue. Caller requests,
//! engine callbacks and buffer-watcher ticks are all queued there, so the
//! state machine and the source tree are never touched concurrently.
//!
//! [`PlayerHandle`] is the caller side: a cheap clonable sender. The task
//! ends, releasing its engine, once every handle is dropped.

use crate::command::{ChannelListener, Command, Reply};
use crate::descriptor::AudioSourceDescriptor;
use crate::error::{PlaybackError, Result};
use crate::request::{MethodCall, PlaylistEdit, Request};
use crate::shuffle::ShuffleGenerator;
use crate::state::PlaybackStateMachine;
use crate::tree::SourceTree;
use crate::watcher::BufferWatcher;
use bridge_traits::{
    DiscontinuityReason, EditTicket, Engine, EngineEvent, EngineListener, RepeatMode,
    TimelineChangeReason,
};
use core_runtime::config::PlayerConfig;
use core_runtime::events::EventStream;
use serde_json::Value;
use std::collections::HashMap;
use std::slice;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, trace, warn};

// ============================================================================
// Handle
// ============================================================================

/// Caller-side handle to a running player.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    id: Arc<str>,
    sender: mpsc::UnboundedSender<Command>,
}

impl PlayerHandle {
    /// Spawn a player task on the current tokio runtime.
    ///
    /// The engine is not created until the first request that needs it.
    pub fn spawn(id: impl Into<String>, config: PlayerConfig) -> Self {
        let id: Arc<str> = Arc::from(id.into());
        let (sender, receiver) = mpsc::unbounded_channel();
        let player = AudioPlayer::new(Arc::clone(&id), config, sender.downgrade());
        tokio::spawn(player.run(receiver));
        Self { id, sender }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns `true` once the player task has exited.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Subscribe to snapshots and error notices, replacing any previous
    /// subscriber.
    pub fn subscribe(&self) -> EventStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = self.sender.send(Command::Subscribe(sender));
        EventStream::new(receiver)
    }

    /// Decode and execute an untyped method call.
    pub async fn invoke(&self, call: &MethodCall) -> Result<Value> {
        let request = Request::decode(call)?;
        self.request(request).await
    }

    /// Execute a typed request and wait for its completion.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Disposed`] if the player goes away before
    /// answering.
    pub async fn request(&self, request: Request) -> Result<Value> {
        let (reply, receiver) = Reply::channel();
        self.sender
            .send(Command::Invoke { request, reply })
            .map_err(|_| PlaybackError::Disposed)?;
        receiver.await.map_err(|_| PlaybackError::Disposed)?
    }

    /// Load a source, resolving with its duration once the engine is ready.
    pub async fn load(&self, source: AudioSourceDescriptor) -> Result<Option<i64>> {
        let value = self.request(Request::Load(source)).await?;
        Ok(value.as_i64())
    }

    pub async fn play(&self) -> Result<()> {
        self.request(Request::Play).await.map(drop)
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Request::Pause).await.map(drop)
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(Request::Stop).await.map(drop)
    }

    /// Seek to `position_ms` in item `index`. `None` means the engine's
    /// default position and the current item respectively.
    pub async fn seek(&self, position_ms: Option<i64>, index: Option<usize>) -> Result<()> {
        self.request(Request::Seek { position_ms, index })
            .await
            .map(drop)
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.request(Request::SetVolume(volume)).await.map(drop)
    }

    pub async fn set_speed(&self, speed: f32) -> Result<()> {
        self.request(Request::SetSpeed(speed)).await.map(drop)
    }

    pub async fn set_loop_mode(&self, mode: RepeatMode) -> Result<()> {
        self.request(Request::SetLoopMode(mode)).await.map(drop)
    }

    pub async fn set_shuffle_mode_enabled(&self, enabled: bool) -> Result<()> {
        self.request(Request::SetShuffleModeEnabled(enabled))
            .await
            .map(drop)
    }

    /// Apply `edit` to the concatenating source `target`. Resolves once the
    /// engine has applied the change.
    pub async fn edit(&self, target: impl Into<String>, edit: PlaylistEdit) -> Result<()> {
        self.request(Request::Concatenating {
            target: target.into(),
            edit,
        })
        .await
        .map(drop)
    }

    pub async fn dispose(&self) -> Result<()> {
        self.request(Request::Dispose).await.map(drop)
    }
}

// ============================================================================
// Player task
// ============================================================================

struct AudioPlayer {
    id: Arc<str>,
    config: PlayerConfig,
    engine: Option<Box<dyn Engine>>,
    listener: Arc<ChannelListener>,
    tree: SourceTree,
    /// Id of the loaded top-level source.
    root: Option<String>,
    state: PlaybackStateMachine,
    watcher: BufferWatcher,
    shuffler: ShuffleGenerator,
    pending_edits: HashMap<EditTicket, Reply>,
    next_ticket: EditTicket,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl AudioPlayer {
    fn new(
        id: Arc<str>,
        config: PlayerConfig,
        commands: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        let state = PlaybackStateMachine::new(Arc::clone(&config.clock), config.buffer_poll);
        let shuffler = ShuffleGenerator::new(config.shuffle_seed);
        Self {
            id,
            listener: Arc::new(ChannelListener::new(commands.clone())),
            config,
            engine: None,
            tree: SourceTree::new(),
            root: None,
            state,
            watcher: BufferWatcher::new(),
            shuffler,
            pending_edits: HashMap::new(),
            next_ticket: EditTicket::new(0),
            commands,
        }
    }

    #[instrument(name = "player", skip_all, fields(id = %self.id))]
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Command>) {
        debug!("Player task started");

        while let Some(command) = receiver.recv().await {
            self.handle(command);
            if self.state.take_watch_request() {
                self.watcher.restart(&self.commands);
            }
        }

        self.shutdown();
        debug!("Player task stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Invoke { request, reply } => self.handle_request(request, reply),
            Command::Engine(event) => self.handle_engine_event(event),
            Command::Subscribe(sender) => self.state.attach(sender),
            Command::WatchBuffer { generation } => self.handle_watch_tick(generation),
        }
    }

    /// Create the engine on first use.
    fn ensure_engine(&mut self) -> Result<()> {
        if self.engine.is_none() {
            let listener: Arc<dyn EngineListener> = self.listener.clone();
            let engine = self.config.engine_factory.create(listener)?;
            info!("Engine created");
            self.engine = Some(engine);
        }
        Ok(())
    }

    /// Run `operation` against the state machine and the engine.
    fn with_engine<T>(
        &mut self,
        operation: impl FnOnce(&mut PlaybackStateMachine, &mut dyn Engine) -> Result<T>,
    ) -> Result<T> {
        let engine = self
            .engine
            .as_deref_mut()
            .ok_or(PlaybackError::Disposed)?;
        operation(&mut self.state, engine)
    }

    // ========================================================================
    // Requests
    // ========================================================================

    fn handle_request(&mut self, request: Request, reply: Reply) {
        debug!(method = request.name(), "Handling request");

        if let Err(error) = self.ensure_engine() {
            warn!(method = request.name(), error = %error, "Engine unavailable");
            reply.err(error);
            return;
        }

        let result = match request {
            Request::Load(source) => return self.load(source, reply),
            Request::Seek { position_ms, index } => return self.seek(position_ms, index, reply),
            Request::Concatenating { target, edit } => return self.edit(&target, edit, reply),
            Request::Play => self.with_engine(|state, engine| state.play(engine)),
            Request::Pause => self.with_engine(|state, engine| state.pause(engine)),
            Request::Stop => self.with_engine(|state, engine| state.stop(engine)),
            Request::SetVolume(volume) => self.with_engine(|_, engine| {
                engine.set_volume(volume);
                Ok(())
            }),
            Request::SetSpeed(speed) => self.with_engine(|state, engine| {
                engine.set_playback_rate(speed);
                state.speed_changed(engine);
                Ok(())
            }),
            Request::SetLoopMode(mode) => self.with_engine(|_, engine| {
                engine.set_repeat_mode(mode);
                Ok(())
            }),
            Request::SetShuffleModeEnabled(enabled) => self.set_shuffle_mode_enabled(enabled),
            Request::SetAutomaticallyWaitsToMinimizeStalling(enabled) => {
                trace!(enabled, "Stall control not supported by engine, ignoring");
                Ok(())
            }
            Request::Dispose => {
                self.dispose();
                Ok(())
            }
        };

        reply.send(result.map(|()| Value::Null));
    }

    fn load(&mut self, source: AudioSourceDescriptor, reply: Reply) {
        let Some(engine) = self.engine.as_deref_mut() else {
            return reply.err(PlaybackError::Disposed);
        };

        let handle = match self.tree.resolve(engine, &source) {
            Ok(handle) => handle,
            Err(error) => return reply.err(error),
        };
        info!(source = source.id(), nodes = self.tree.len(), "Loading source");

        self.state.begin_load(engine, reply);
        self.root = Some(source.id().to_string());
        if engine.shuffle_mode_enabled() {
            self.tree.assign_shuffle_orders(
                engine,
                &mut self.shuffler,
                source.id(),
                self.state.current_index(),
            );
        }
        engine.prepare(handle);
    }

    fn seek(&mut self, position_ms: Option<i64>, index: Option<usize>, reply: Reply) {
        match self.engine.as_deref_mut() {
            Some(engine) => self.state.seek(engine, position_ms, index, reply),
            None => reply.err(PlaybackError::Disposed),
        }
    }

    fn set_shuffle_mode_enabled(&mut self, enabled: bool) -> Result<()> {
        let engine = self
            .engine
            .as_deref_mut()
            .ok_or(PlaybackError::Disposed)?;
        if enabled {
            if let Some(root) = &self.root {
                let slots = self.tree.assign_shuffle_orders(
                    engine,
                    &mut self.shuffler,
                    root,
                    self.state.current_index(),
                );
                debug!(slots, "Shuffle orders regenerated");
            }
        }
        engine.set_shuffle_mode_enabled(enabled);
        Ok(())
    }

    /// Apply a playlist edit to the tree and forward it to the engine. The
    /// reply waits in `pending_edits` until the engine echoes the ticket.
    fn edit(&mut self, target: &str, edit: PlaylistEdit, reply: Reply) {
        let Some(engine) = self.engine.as_deref_mut() else {
            return reply.err(PlaybackError::Disposed);
        };
        let ticket = self.next_ticket;
        let name = edit.name();

        let applied = match edit {
            PlaylistEdit::Add(source) => self
                .tree
                .insert(engine, target, None, slice::from_ref(&source))
                .map(|splice| {
                    engine.insert_children(splice.playlist, splice.index, &splice.handles, ticket)
                }),
            PlaylistEdit::Insert(index, source) => self
                .tree
                .insert(engine, target, Some(index), slice::from_ref(&source))
                .map(|splice| {
                    engine.insert_children(splice.playlist, splice.index, &splice.handles, ticket)
                }),
            PlaylistEdit::AddAll(sources) => self
                .tree
                .insert(engine, target, None, &sources)
                .map(|splice| {
                    engine.insert_children(splice.playlist, splice.index, &splice.handles, ticket)
                }),
            PlaylistEdit::InsertAll(index, sources) => self
                .tree
                .insert(engine, target, Some(index), &sources)
                .map(|splice| {
                    engine.insert_children(splice.playlist, splice.index, &splice.handles, ticket)
                }),
            PlaylistEdit::RemoveAt(index) => {
                let to = index.saturating_add(1);
                self.tree
                    .remove_range(target, index, to)
                    .map(|playlist| engine.remove_range(playlist, index, to, ticket))
            }
            PlaylistEdit::RemoveRange { from, to } => self
                .tree
                .remove_range(target, from, to)
                .map(|playlist| engine.remove_range(playlist, from, to, ticket)),
            PlaylistEdit::Move { from, to } => self
                .tree
                .move_child(target, from, to)
                .map(|playlist| engine.move_child(playlist, from, to, ticket)),
            PlaylistEdit::Clear => self
                .tree
                .clear_children(target)
                .map(|playlist| engine.clear(playlist, ticket)),
        };

        match applied {
            Ok(()) => {
                debug!(edit = name, target, ticket = ticket.raw(), "Playlist edit sent to engine");
                self.next_ticket = ticket.next();
                self.pending_edits.insert(ticket, reply);
            }
            Err(error) => {
                debug!(edit = name, target, error = %error, "Playlist edit rejected");
                reply.err(error);
            }
        }
    }

    // ========================================================================
    // Engine callbacks
    // ========================================================================

    fn handle_engine_event(&mut self, event: EngineEvent) {
        if let EngineEvent::PlaylistEditApplied(ticket) = event {
            match self.pending_edits.remove(&ticket) {
                Some(reply) => reply.ok(Value::Null),
                None => warn!(ticket = ticket.raw(), "Acknowledgement for unknown playlist edit"),
            }
            return;
        }

        let Some(engine) = self.engine.as_deref_mut() else {
            debug!(?event, "Dropping engine event after release");
            return;
        };

        match event {
            EngineEvent::StateChanged {
                play_when_ready,
                state,
            } => {
                trace!(play_when_ready, ?state, "Engine state changed");
                self.state.on_engine_state(engine, state);
            }
            EngineEvent::PositionDiscontinuity(
                DiscontinuityReason::PeriodTransition | DiscontinuityReason::Seek,
            )
            | EngineEvent::TimelineChanged(TimelineChangeReason::Dynamic) => {
                self.state.on_item_may_have_changed(engine);
            }
            EngineEvent::PositionDiscontinuity(_) | EngineEvent::TimelineChanged(_) => {}
            EngineEvent::Metadata(entries) => self.state.on_metadata(engine, entries),
            EngineEvent::SeekProcessed => self.state.on_seek_processed(engine),
            EngineEvent::PlayerError(error) => self.state.on_engine_error(&error),
            EngineEvent::PlaylistEditApplied(_) => {}
        }
    }

    fn handle_watch_tick(&mut self, generation: u64) {
        if !self.watcher.is_current(generation) {
            trace!(generation, "Ignoring stale buffer tick");
            return;
        }
        let Some(engine) = self.engine.as_deref() else {
            return;
        };
        if let Some(delay) = self.state.poll_buffer(engine) {
            self.watcher.schedule(delay, self.commands.clone());
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Release the engine and forget all sources. Pending requests are dropped
    /// unanswered, so their callers observe [`PlaybackError::Disposed`].
    ///
    /// A dispose request always reaches here with an engine, so it always
    /// publishes `none`.
    fn dispose(&mut self) {
        self.tree.clear();
        self.root = None;
        self.watcher.cancel();
        self.pending_edits.clear();

        if let Some(mut engine) = self.engine.take() {
            engine.release();
            info!("Engine released");
            self.state.dispose();
        }
    }

    fn shutdown(&mut self) {
        if self.engine.is_some() {
            debug!("All handles dropped, releasing engine");
        }
        self.dispose();
    }
}
