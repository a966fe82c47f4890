//! Scripted engine shared by the player integration tests.
//!
//! The fake records every call, answers queries from a shared script and
//! lets the test push engine callbacks through the player's listener.

#![allow(dead_code)]

use bridge_traits::{
    EditTicket, Engine, EngineEvent, EngineFactory, EngineListener, EngineState, FixedClock,
    MediaHandle, MediaKind, RepeatMode, ShuffleOrder,
};
use core_playback::{AudioSourceDescriptor, PlayerHandle, Request};
use core_runtime::config::PlayerConfig;
use core_runtime::events::{EventStream, PlaybackPhase, PlaybackSnapshot, PlayerEvent};
use parking_lot::Mutex;
use std::sync::Arc;

// ============================================================================
// Recorded calls
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateMedia(MediaKind, String),
    CreateConcatenating(usize),
    CreateClipping,
    CreateLooping(u32),
    InsertChildren { index: usize, count: usize },
    RemoveRange { from: usize, to: usize },
    Move { from: usize, to: usize },
    Clear,
    SetShuffleOrder(MediaHandle, Vec<usize>),
    Prepare(MediaHandle),
    Stop,
    Release,
    SetPlayWhenReady(bool),
    SeekTo(usize, Option<i64>),
    SetVolume(f32),
    SetPlaybackRate(f32),
    SetRepeatMode(RepeatMode),
    SetShuffleModeEnabled(bool),
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    listener: Option<Arc<dyn EngineListener>>,
    engines_created: usize,
    next_handle: u64,
    unacked_edits: Vec<EditTicket>,
    /// Post `Ready` as soon as `prepare` is called.
    auto_ready: bool,
    state: Option<EngineState>,
    shuffle_enabled: bool,
    position_ms: i64,
    buffered_ms: i64,
    duration_ms: Option<i64>,
    window: usize,
}

/// Test-side control over every engine the factory creates.
#[derive(Clone, Default)]
pub struct EngineControl {
    script: Arc<Mutex<Script>>,
}

impl EngineControl {
    pub fn new() -> Self {
        let control = Self::default();
        {
            let mut script = control.script.lock();
            script.auto_ready = true;
            script.duration_ms = Some(180_000);
        }
        control
    }

    pub fn factory(&self) -> Arc<dyn EngineFactory> {
        Arc::new(FakeEngineFactory {
            script: Arc::clone(&self.script),
        })
    }

    pub fn set_auto_ready(&self, enabled: bool) {
        self.script.lock().auto_ready = enabled;
    }

    pub fn set_position(&self, position_ms: i64) {
        self.script.lock().position_ms = position_ms;
    }

    pub fn set_buffered(&self, buffered_ms: i64) {
        self.script.lock().buffered_ms = buffered_ms;
    }

    pub fn set_window(&self, window: usize) {
        self.script.lock().window = window;
    }

    pub fn set_state(&self, state: EngineState) {
        self.script.lock().state = Some(state);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.script.lock().calls.clear();
    }

    pub fn engines_created(&self) -> usize {
        self.script.lock().engines_created
    }

    pub fn unacked_edits(&self) -> usize {
        self.script.lock().unacked_edits.len()
    }

    pub fn prepared(&self) -> bool {
        self.calls().iter().any(|c| matches!(c, Call::Prepare(_)))
    }

    /// Latest shuffle order installed on any playlist.
    pub fn last_shuffle_order(&self) -> Option<Vec<usize>> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::SetShuffleOrder(_, indices) => Some(indices),
            _ => None,
        })
    }

    /// Post an engine callback to the player.
    pub fn emit(&self, event: EngineEvent) {
        let listener = self.script.lock().listener.clone();
        if let Some(listener) = listener {
            listener.on_event(event);
        }
    }

    pub fn emit_state(&self, state: EngineState) {
        self.script.lock().state = Some(state);
        self.emit(EngineEvent::StateChanged {
            play_when_ready: false,
            state,
        });
    }

    /// Acknowledge every playlist edit sent so far.
    pub fn confirm_edits(&self) {
        let tickets: Vec<EditTicket> = self.script.lock().unacked_edits.drain(..).collect();
        for ticket in tickets {
            self.emit(EngineEvent::PlaylistEditApplied(ticket));
        }
    }
}

struct FakeEngineFactory {
    script: Arc<Mutex<Script>>,
}

impl EngineFactory for FakeEngineFactory {
    fn create(&self, listener: Arc<dyn EngineListener>) -> bridge_traits::Result<Box<dyn Engine>> {
        let mut script = self.script.lock();
        script.listener = Some(listener);
        script.engines_created += 1;
        Ok(Box::new(FakeEngine {
            script: Arc::clone(&self.script),
        }))
    }
}

struct FakeEngine {
    script: Arc<Mutex<Script>>,
}

impl FakeEngine {
    fn record(&self, call: Call) {
        self.script.lock().calls.push(call);
    }

    fn mint(&self, call: Call) -> bridge_traits::Result<MediaHandle> {
        let mut script = self.script.lock();
        script.calls.push(call);
        script.next_handle += 1;
        Ok(MediaHandle::new(script.next_handle))
    }

    fn edit(&self, call: Call, ticket: EditTicket) {
        let mut script = self.script.lock();
        script.calls.push(call);
        script.unacked_edits.push(ticket);
    }
}

impl Engine for FakeEngine {
    fn create_media(&mut self, kind: MediaKind, uri: &str) -> bridge_traits::Result<MediaHandle> {
        self.mint(Call::CreateMedia(kind, uri.to_string()))
    }

    fn create_concatenating(
        &mut self,
        children: &[MediaHandle],
        _use_lazy_preparation: bool,
    ) -> bridge_traits::Result<MediaHandle> {
        self.mint(Call::CreateConcatenating(children.len()))
    }

    fn create_clipping(
        &mut self,
        _child: MediaHandle,
        _start_ms: i64,
        _end_ms: Option<i64>,
    ) -> bridge_traits::Result<MediaHandle> {
        self.mint(Call::CreateClipping)
    }

    fn create_looping(&mut self, _child: MediaHandle, count: u32) -> bridge_traits::Result<MediaHandle> {
        self.mint(Call::CreateLooping(count))
    }

    fn insert_children(
        &mut self,
        _playlist: MediaHandle,
        index: usize,
        children: &[MediaHandle],
        ticket: EditTicket,
    ) {
        self.edit(
            Call::InsertChildren {
                index,
                count: children.len(),
            },
            ticket,
        );
    }

    fn remove_range(&mut self, _playlist: MediaHandle, from: usize, to: usize, ticket: EditTicket) {
        self.edit(Call::RemoveRange { from, to }, ticket);
    }

    fn move_child(&mut self, _playlist: MediaHandle, from: usize, to: usize, ticket: EditTicket) {
        self.edit(Call::Move { from, to }, ticket);
    }

    fn clear(&mut self, _playlist: MediaHandle, ticket: EditTicket) {
        self.edit(Call::Clear, ticket);
    }

    fn set_shuffle_order(&mut self, playlist: MediaHandle, order: ShuffleOrder) {
        self.record(Call::SetShuffleOrder(playlist, order.indices));
    }

    fn prepare(&mut self, root: MediaHandle) {
        let listener = {
            let mut script = self.script.lock();
            script.calls.push(Call::Prepare(root));
            if script.auto_ready {
                script.state = Some(EngineState::Ready);
                script.listener.clone()
            } else {
                script.state = Some(EngineState::Buffering);
                None
            }
        };
        if let Some(listener) = listener {
            listener.on_event(EngineEvent::StateChanged {
                play_when_ready: false,
                state: EngineState::Ready,
            });
        }
    }

    fn stop(&mut self) {
        self.record(Call::Stop);
    }

    fn release(&mut self) {
        self.record(Call::Release);
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.record(Call::SetPlayWhenReady(play_when_ready));
    }

    fn seek_to(&mut self, window_index: usize, position_ms: Option<i64>) {
        self.record(Call::SeekTo(window_index, position_ms));
    }

    fn set_volume(&mut self, volume: f32) {
        self.record(Call::SetVolume(volume));
    }

    fn set_playback_rate(&mut self, rate: f32) {
        self.record(Call::SetPlaybackRate(rate));
    }

    fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.record(Call::SetRepeatMode(mode));
    }

    fn set_shuffle_mode_enabled(&mut self, enabled: bool) {
        let mut script = self.script.lock();
        script.calls.push(Call::SetShuffleModeEnabled(enabled));
        script.shuffle_enabled = enabled;
    }

    fn shuffle_mode_enabled(&self) -> bool {
        self.script.lock().shuffle_enabled
    }

    fn state(&self) -> EngineState {
        self.script.lock().state.unwrap_or(EngineState::Idle)
    }

    fn current_position_ms(&self) -> i64 {
        self.script.lock().position_ms
    }

    fn buffered_position_ms(&self) -> i64 {
        self.script.lock().buffered_ms
    }

    fn duration_ms(&self) -> Option<i64> {
        self.script.lock().duration_ms
    }

    fn current_window_index(&self) -> usize {
        self.script.lock().window
    }
}

// ============================================================================
// Player helpers
// ============================================================================

pub fn spawn_player(control: &EngineControl) -> PlayerHandle {
    let config = PlayerConfig::builder()
        .engine_factory(control.factory())
        .clock(Arc::new(FixedClock::from_millis(1_700_000_000_000)))
        .shuffle_seed(42)
        .build()
        .unwrap();
    PlayerHandle::spawn("test", config)
}

/// Wait until the player has handled everything queued before this call.
pub async fn settle(player: &PlayerHandle) {
    player
        .request(Request::SetAutomaticallyWaitsToMinimizeStalling(false))
        .await
        .unwrap();
}

/// Yield until `condition` holds, giving spawned requests a chance to run.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

pub fn progressive(id: &str) -> AudioSourceDescriptor {
    AudioSourceDescriptor::Progressive {
        id: id.to_string(),
        uri: format!("https://cdn.example.com/{id}.mp3"),
    }
}

pub fn playlist(id: &str, children: Vec<AudioSourceDescriptor>) -> AudioSourceDescriptor {
    AudioSourceDescriptor::Concatenating {
        id: id.to_string(),
        audio_sources: children,
        use_lazy_preparation: true,
    }
}

pub fn snapshots(events: Vec<PlayerEvent>) -> Vec<PlaybackSnapshot> {
    events
        .into_iter()
        .filter_map(|event| match event {
            PlayerEvent::Snapshot(snapshot) => Some(snapshot),
            PlayerEvent::Error { .. } => None,
        })
        .collect()
}

pub fn phases(events: &mut EventStream) -> Vec<PlaybackPhase> {
    snapshots(events.drain()).iter().map(|s| s.phase).collect()
}
